pub mod ai_helper;
pub mod ids;
pub mod json_parser;
pub mod text_parser;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Labels of the four option slots, in slot order.
pub const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

pub const DEFAULT_EXPLANATION: &str = "No explanation provided";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub exam: String,
    pub subject: String,
    pub origin: Origin,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn new(exam: String, subject: String, test: MockTest) -> Self {
        Self {
            exam,
            subject,
            origin: test.origin,
            questions: test.questions,
        }
    }
}

/// Where a set of questions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Built from what the model returned.
    Parsed,
    /// The model's output was unusable and placeholders were synthesized.
    Fallback,
}

/// What the caller asked the model for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTestRequest {
    pub exam: String,
    pub subject: String,
    pub question_count: usize,
    pub difficulty: DifficultyChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTest {
    pub origin: Origin,
    pub questions: Vec<Question>,
}

impl MockTest {
    pub fn parsed(questions: Vec<Question>) -> Self {
        Self {
            origin: Origin::Parsed,
            questions,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.origin == Origin::Fallback
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub question: String,
    pub options: [String; 4],
    pub correct_answer: AnswerKey,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl Question {
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_answer.index()]
    }

    /// Options paired with their `A`..`D` labels.
    pub fn labelled_options(&self) -> impl Iterator<Item = (char, &str)> {
        OPTION_LABELS
            .iter()
            .copied()
            .zip(self.options.iter().map(String::as_str))
    }
}

/// Identifier of a question inside one generated set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    /// Ordinal of the block in a free-text completion.
    Seq(usize),
    /// Stamp-and-position id from the JSON path.
    Stamped(String),
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionId::Seq(n) => write!(f, "{}", n),
            QuestionId::Stamped(s) => f.write_str(s),
        }
    }
}

/// Zero-based index of the correct option.
///
/// Free-text completions name the answer by letter, JSON completions usually
/// by index. Both are converted to this type at the parsing boundary, and it
/// always serializes as the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "AnswerRepr", into = "u8")]
pub struct AnswerKey(u8);

impl AnswerKey {
    pub fn from_index(index: usize) -> Option<Self> {
        (index < OPTION_LABELS.len()).then(|| Self(index as u8))
    }

    /// Accepts `B`, `b`, `B.` or `B 4` but not a word that merely starts
    /// with a label letter, like `Both`.
    pub fn from_letter(text: &str) -> Option<Self> {
        let mut chars = text.trim().chars();
        let first = chars.next()?.to_ascii_uppercase();
        if chars.next().is_some_and(|c| c.is_alphanumeric()) {
            return None;
        }
        OPTION_LABELS
            .iter()
            .position(|label| *label == first)
            .and_then(Self::from_index)
    }

    /// Cycles through the four slots by position.
    pub fn cycling(position: usize) -> Self {
        Self((position % OPTION_LABELS.len()) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn letter(self) -> char {
        OPTION_LABELS[self.index()]
    }
}

impl From<AnswerKey> for u8 {
    fn from(key: AnswerKey) -> Self {
        key.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerRepr {
    Index(u64),
    Letter(String),
}

impl TryFrom<AnswerRepr> for AnswerKey {
    type Error = String;

    fn try_from(repr: AnswerRepr) -> Result<Self, Self::Error> {
        match repr {
            AnswerRepr::Index(i) => usize::try_from(i)
                .ok()
                .and_then(AnswerKey::from_index)
                .ok_or_else(|| format!("answer index {} is out of range 0-3", i)),
            AnswerRepr::Letter(s) => {
                AnswerKey::from_letter(&s).ok_or_else(|| format!("unknown answer label {:?}", s))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The difficulty a caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifficultyChoice {
    Fixed(Difficulty),
    Mixed,
}

impl DifficultyChoice {
    /// `Mixed` rotates easy, medium, hard by position; a fixed choice wins
    /// over anything the model put on the question.
    pub fn for_position(self, position: usize) -> Difficulty {
        match self {
            DifficultyChoice::Fixed(difficulty) => difficulty,
            DifficultyChoice::Mixed => Difficulty::ALL[position % Difficulty::ALL.len()],
        }
    }

    pub fn apply(self, questions: &mut [Question]) {
        for (position, question) in questions.iter_mut().enumerate() {
            question.difficulty = Some(self.for_position(position));
        }
    }
}

impl fmt::Display for DifficultyChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyChoice::Fixed(difficulty) => difficulty.fmt(f),
            DifficultyChoice::Mixed => f.write_str("mixed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown difficulty {0:?}, expected easy, medium, hard or mixed")]
pub struct UnknownDifficulty(pub String);

impl FromStr for DifficultyChoice {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(DifficultyChoice::Fixed(Difficulty::Easy)),
            "medium" => Ok(DifficultyChoice::Fixed(Difficulty::Medium)),
            "hard" => Ok(DifficultyChoice::Fixed(Difficulty::Hard)),
            "mixed" => Ok(DifficultyChoice::Mixed),
            _ => Err(UnknownDifficulty(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Question {
        Question {
            id: QuestionId::Seq(1),
            question: "What is 2+2?".to_string(),
            options: ["3", "4", "5", "6"].map(String::from),
            correct_answer: AnswerKey::from_letter("B").unwrap(),
            explanation: DEFAULT_EXPLANATION.to_string(),
            difficulty: None,
        }
    }

    #[test]
    fn answer_key_from_letter() {
        assert_eq!(AnswerKey::from_letter("A").map(AnswerKey::index), Some(0));
        assert_eq!(AnswerKey::from_letter(" d ").map(AnswerKey::index), Some(3));
        assert_eq!(AnswerKey::from_letter("C. 5").map(AnswerKey::index), Some(2));
        assert_eq!(AnswerKey::from_letter("E"), None);
        assert_eq!(AnswerKey::from_letter("Both"), None);
        assert_eq!(AnswerKey::from_letter(""), None);
    }

    #[test]
    fn answer_key_cycles() {
        let letters: String = (0..6).map(|i| AnswerKey::cycling(i).letter()).collect();
        assert_eq!(letters, "ABCDAB");
    }

    #[test]
    fn answer_key_deserializes_index_or_letter() {
        let from_index: AnswerKey = serde_json::from_str("2").unwrap();
        let from_letter: AnswerKey = serde_json::from_str("\"c\"").unwrap();
        assert_eq!(from_index, from_letter);
        assert!(serde_json::from_str::<AnswerKey>("4").is_err());
        assert!(serde_json::from_str::<AnswerKey>("\"Z\"").is_err());
    }

    #[test]
    fn question_serializes_camel_case_with_index_answer() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["correctAnswer"], 1);
        assert_eq!(json["options"][1], "4");
        assert!(json.get("difficulty").is_none());
    }

    #[test]
    fn correct_option_and_labels() {
        let question = sample();
        assert_eq!(question.correct_option(), "4");
        let labels: Vec<_> = question.labelled_options().collect();
        assert_eq!(labels[3], ('D', "6"));
    }

    #[test]
    fn parsed_test_is_not_degraded() {
        let test = MockTest::parsed(vec![sample()]);
        assert_eq!(test.origin, Origin::Parsed);
        assert!(!test.is_degraded());
        assert_eq!(test.questions.len(), 1);
    }

    #[test]
    fn difficulty_choice_parsing() {
        assert_eq!(
            "Hard".parse::<DifficultyChoice>(),
            Ok(DifficultyChoice::Fixed(Difficulty::Hard))
        );
        assert_eq!("mixed".parse::<DifficultyChoice>(), Ok(DifficultyChoice::Mixed));
        assert!("extreme".parse::<DifficultyChoice>().is_err());
    }

    #[test]
    fn mixed_rotates_fixed_overwrites() {
        let mut questions = vec![sample(), sample(), sample(), sample()];
        questions[0].difficulty = Some(Difficulty::Hard);

        DifficultyChoice::Mixed.apply(&mut questions);
        let got: Vec<_> = questions.iter().map(|q| q.difficulty.unwrap()).collect();
        assert_eq!(
            got,
            vec![Difficulty::Easy, Difficulty::Medium, Difficulty::Hard, Difficulty::Easy]
        );

        DifficultyChoice::Fixed(Difficulty::Medium).apply(&mut questions);
        assert!(questions
            .iter()
            .all(|q| q.difficulty == Some(Difficulty::Medium)));
    }
}
