//! Normalizer for completions that carry a JSON array of questions.
//!
//! Never fails: when no usable array can be read, the requested number of
//! placeholder questions is synthesized instead and the result is tagged
//! [`Origin::Fallback`].

use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use serde::Deserialize;

use crate::quiz::ids::{fallback_id, stamped_id, StampSource};
use crate::quiz::{
    AnswerKey, DifficultyChoice, MockTest, MockTestRequest, Origin, Question, QuestionId,
    DEFAULT_EXPLANATION, OPTION_LABELS,
};

// First `[` to last `]`, across lines.
static ARRAY_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("no JSON array found in completion")]
    NoArray,
    #[error("invalid question array: {0}")]
    Json(#[from] serde_json::Error),
}

/// One array element as the model writes it. A `difficulty` or any other
/// extra field is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    question: String,
    options: [String; 4],
    correct_answer: AnswerKey,
    #[serde(default)]
    explanation: Option<String>,
}

pub fn normalize_questions(
    completion: &str,
    request: &MockTestRequest,
    stamps: &dyn StampSource,
) -> MockTest {
    match parse_array(completion) {
        Ok(raw) => MockTest::parsed(stamp_questions(raw, request.difficulty, stamps)),
        Err(e) => {
            warn!(
                "Falling back to {} placeholder questions for {}/{}: {}",
                request.question_count, request.exam, request.subject, e
            );
            fallback_questions(request, stamps)
        }
    }
}

fn parse_array(completion: &str) -> Result<Vec<RawQuestion>, PayloadError> {
    let span = ARRAY_SPAN
        .find(completion)
        .ok_or(PayloadError::NoArray)?;
    Ok(serde_json::from_str(span.as_str())?)
}

fn stamp_questions(
    raw: Vec<RawQuestion>,
    difficulty: DifficultyChoice,
    stamps: &dyn StampSource,
) -> Vec<Question> {
    let stamp = stamps.stamp();
    raw.into_iter()
        .enumerate()
        .map(|(position, raw)| Question {
            id: QuestionId::Stamped(stamped_id(&stamp, position)),
            question: raw.question,
            options: raw.options,
            correct_answer: raw.correct_answer,
            explanation: raw
                .explanation
                .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
            difficulty: Some(difficulty.for_position(position)),
        })
        .collect()
}

/// Deterministic placeholders: exactly `question_count` of them, each with
/// its own text and the correct answer cycling A, B, C, D.
pub fn fallback_questions(request: &MockTestRequest, stamps: &dyn StampSource) -> MockTest {
    let stamp = stamps.stamp();
    let questions = (0..request.question_count)
        .map(|position| {
            let n = position + 1;
            Question {
                id: QuestionId::Stamped(fallback_id(&stamp, position)),
                question: format!(
                    "Sample {} question {} for the {} exam",
                    request.subject, n, request.exam
                ),
                options: OPTION_LABELS.map(|label| format!("Option {} for question {}", label, n)),
                correct_answer: AnswerKey::cycling(position),
                explanation: format!(
                    "This is a placeholder explanation for {} question {}.",
                    request.subject, n
                ),
                difficulty: Some(request.difficulty.for_position(position)),
            }
        })
        .collect();

    MockTest {
        origin: Origin::Fallback,
        questions,
    }
}
