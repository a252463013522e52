use std::time::Duration;

use crate::quiz::ai_helper::Personality;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_DIALOGUE_DB: &str = "db.sqlite";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chatgpt_api_key: String,
    pub personality: Personality,
    pub chatgpt_timeout: Duration,
    pub dialogue_db: String,
}

impl Config {
    /// Reads the process environment. `.env` is loaded by the caller first.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let chatgpt_api_key = lookup("CHATGPT_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("CHATGPT_API_KEY"))?;

        let personality = match lookup("QUIZ_PERSONALITY") {
            Some(value) => value.parse::<Personality>().map_err(|reason| ConfigError::Invalid {
                name: "QUIZ_PERSONALITY",
                reason,
            })?,
            None => Personality::Tutor,
        };

        let timeout_secs = match lookup("CHATGPT_TIMEOUT_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid {
                    name: "CHATGPT_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            chatgpt_api_key,
            personality,
            chatgpt_timeout: Duration::from_secs(timeout_secs),
            dialogue_db: lookup("DIALOGUE_DB").unwrap_or_else(|| DEFAULT_DIALOGUE_DB.to_string()),
        })
    }
}
