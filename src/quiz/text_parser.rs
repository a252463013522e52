//! Parser for the free-text question format:
//!
//! ```text
//! Q1. What is 2+2?
//! A) 3
//! B) 4
//! C) 5
//! D) 6
//! Correct Answer: B
//! Explanation: Basic arithmetic
//! ```
//!
//! Each `Q<n>.` marker starts a block. A block that does not describe a
//! complete question is logged and skipped, so one bad block never costs the
//! rest of the completion.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::quiz::{AnswerKey, Question, QuestionId, DEFAULT_EXPLANATION, OPTION_LABELS};

static QUESTION_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Q\d+\.").unwrap());

static OPTION_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-D]\)").unwrap());

const ANSWER_LABEL: &str = "Correct Answer:";
const EXPLANATION_LABEL: &str = "Explanation:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("block has no question text")]
    MissingQuestion,
    #[error("expected 4 options, found {0}")]
    WrongOptionCount(usize),
    #[error("more than 4 options")]
    TooManyOptions,
    #[error("no correct answer given")]
    MissingAnswer,
    #[error("correct answer {0:?} does not name any option")]
    UnknownAnswer(String),
}

/// Extracts every well-formed question block from `text`.
///
/// Ids are the ordinal of the block's marker, so a skipped block still uses
/// up its number. Difficulty is left for the caller to assign.
pub fn parse_questions(text: &str) -> Vec<Question> {
    let mut questions = Vec::new();

    // The first piece is whatever came before `Q1.`
    for (ordinal, block) in QUESTION_MARKER.split(text).skip(1).enumerate() {
        let id = ordinal + 1;
        if block.trim().is_empty() {
            continue;
        }
        match parse_block(id, block) {
            Ok(question) => questions.push(question),
            Err(e) => debug!("Skipping question block {}: {}", id, e),
        }
    }

    questions
}

pub fn parse_block(id: usize, block: &str) -> Result<Question, BlockError> {
    let mut builder = BlockBuilder::default();
    for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
        builder.feed(line)?;
    }
    builder.finish(QuestionId::Seq(id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    AwaitingQuestion,
    CollectingOptions,
    AwaitingMeta,
}

enum Line<'a> {
    Option(&'a str),
    Answer(&'a str),
    Explanation(&'a str),
    Other,
}

impl<'a> Line<'a> {
    fn classify(line: &'a str) -> Self {
        if OPTION_LINE.is_match(line) {
            // "X)" is two ASCII bytes
            Line::Option(line[2..].trim())
        } else if let Some(rest) = line.strip_prefix(ANSWER_LABEL) {
            Line::Answer(rest)
        } else if let Some(rest) = line.strip_prefix(EXPLANATION_LABEL) {
            Line::Explanation(rest.trim())
        } else {
            Line::Other
        }
    }
}

#[derive(Default)]
struct BlockBuilder {
    state: State,
    question: String,
    options: Vec<String>,
    answer: Option<String>,
    explanation: Option<String>,
}

impl BlockBuilder {
    fn feed(&mut self, line: &str) -> Result<(), BlockError> {
        if self.state == State::AwaitingQuestion {
            self.question = line.to_string();
            self.state = State::CollectingOptions;
            return Ok(());
        }

        match Line::classify(line) {
            // Options may come before or after the meta lines
            Line::Option(text) => {
                if self.options.len() == OPTION_LABELS.len() {
                    return Err(BlockError::TooManyOptions);
                }
                self.options.push(text.to_string());
            }
            Line::Answer(text) => {
                let text = text.replace(['(', ')'], "");
                self.answer = Some(text.trim().to_string());
                self.state = State::AwaitingMeta;
            }
            Line::Explanation(text) => {
                self.explanation = Some(text.to_string());
                self.state = State::AwaitingMeta;
            }
            Line::Other => {}
        }
        Ok(())
    }

    fn finish(self, id: QuestionId) -> Result<Question, BlockError> {
        if self.question.is_empty() {
            return Err(BlockError::MissingQuestion);
        }
        let count = self.options.len();
        let options: [String; 4] = self
            .options
            .try_into()
            .map_err(|_| BlockError::WrongOptionCount(count))?;
        let answer = self
            .answer
            .filter(|a| !a.is_empty())
            .ok_or(BlockError::MissingAnswer)?;
        let correct_answer =
            resolve_answer(&answer, &options).ok_or(BlockError::UnknownAnswer(answer))?;
        let explanation = self
            .explanation
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());

        Ok(Question {
            id,
            question: self.question,
            options,
            correct_answer,
            explanation,
            difficulty: None,
        })
    }
}

/// Maps the text after `Correct Answer:` to a slot. Besides a bare label it
/// accepts `Option B` and the text of one of the options.
fn resolve_answer(answer: &str, options: &[String; 4]) -> Option<AnswerKey> {
    AnswerKey::from_letter(answer)
        .or_else(|| {
            let rest = answer.get(..7)?;
            if !rest.eq_ignore_ascii_case("option ") {
                return None;
            }
            AnswerKey::from_letter(&answer[7..])
        })
        .or_else(|| {
            options
                .iter()
                .position(|option| option.eq_ignore_ascii_case(answer))
                .and_then(AnswerKey::from_index)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARITHMETIC: &str = "Q1. What is 2+2?\nA) 3\nB) 4\nC) 5\nD) 6\nCorrect Answer: B\nExplanation: Basic arithmetic";

    fn block(question: &str, options: &[&str], tail: &str) -> String {
        let mut text = format!("{}\n", question);
        for (label, option) in OPTION_LABELS.iter().zip(options) {
            text.push_str(&format!("{}) {}\n", label, option));
        }
        text.push_str(tail);
        text
    }

    #[test]
    fn parses_single_block() {
        let questions = parse_questions(ARITHMETIC);
        assert_eq!(questions.len(), 1);

        let q = &questions[0];
        assert_eq!(q.id, QuestionId::Seq(1));
        assert_eq!(q.question, "What is 2+2?");
        assert_eq!(q.options, ["3", "4", "5", "6"].map(String::from));
        assert_eq!(q.correct_answer.letter(), 'B');
        assert_eq!(q.explanation, "Basic arithmetic");
        assert_eq!(q.difficulty, None);
    }

    #[test]
    fn parses_several_blocks_in_order() {
        let text = format!(
            "Here are your questions:\n\nQ1. {}\n\nQ2. {}",
            block("Capital of France?", &["Rome", "Paris", "Oslo", "Bern"], "Correct Answer: B"),
            block("Largest planet?", &["Mars", "Venus", "Jupiter", "Earth"], "Correct Answer: C\nExplanation: It is a gas giant"),
        );
        let questions = parse_questions(&text);

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question, "Capital of France?");
        assert_eq!(questions[0].explanation, DEFAULT_EXPLANATION);
        assert_eq!(questions[1].correct_option(), "Jupiter");
        assert_eq!(questions[1].id, QuestionId::Seq(2));
    }

    #[test]
    fn bad_block_keeps_its_id_slot() {
        let text = format!(
            "Q1. {}\nQ2. {}\nQ3. {}",
            block("First?", &["a", "b", "c", "d"], "Correct Answer: A"),
            block("Only three?", &["a", "b", "c"], "Correct Answer: A"),
            block("Third?", &["a", "b", "c", "d"], "Correct Answer: D"),
        );
        let ids: Vec<_> = parse_questions(&text).into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![QuestionId::Seq(1), QuestionId::Seq(3)]);
    }

    #[test]
    fn empty_block_keeps_its_id_slot() {
        let text = format!(
            "Q1.\n   \nQ2. {}",
            block("Second?", &["a", "b", "c", "d"], "Correct Answer: C")
        );
        let questions = parse_questions(&text);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, QuestionId::Seq(2));
    }

    #[test]
    fn no_markers_yields_nothing() {
        assert!(parse_questions("").is_empty());
        assert!(parse_questions("I could not come up with questions, sorry.").is_empty());
    }

    #[test]
    fn answer_parentheses_are_removed() {
        let text = format!(
            "Q1. {}",
            block("Pick C", &["a", "b", "c", "d"], "Correct Answer: (C)")
        );
        assert_eq!(parse_questions(&text)[0].correct_answer.index(), 2);
    }

    #[test]
    fn answer_with_option_text_is_accepted() {
        let text = format!(
            "Q1. {}",
            block("Pick D", &["a", "b", "c", "d"], "Correct Answer: D) d")
        );
        assert_eq!(parse_questions(&text)[0].correct_answer.letter(), 'D');
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let text = "Q1. Which gas do plants absorb?\n(think about photosynthesis)\nA) Oxygen\nB) Carbon dioxide\nnote: only one is right\nC) Nitrogen\nD) Helium\nCorrect Answer: B";
        let questions = parse_questions(text);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].options[3], "Helium");
    }

    #[test]
    fn option_text_is_trimmed() {
        let text = "Q1. Spacing?\nA)    left\nB)right   \nC) mid\nD)\nCorrect Answer: A";
        let q = &parse_questions(text)[0];
        assert_eq!(q.options, ["left", "right", "mid", ""].map(String::from));
    }

    #[test]
    fn block_errors() {
        let four = ["a", "b", "c", "d"];

        assert_eq!(
            parse_block(1, &block("Q?", &four[..2], "Correct Answer: A")),
            Err(BlockError::WrongOptionCount(2))
        );
        assert_eq!(
            parse_block(1, &format!("{}\nA) again\nCorrect Answer: A", block("Q?", &four, ""))),
            Err(BlockError::TooManyOptions)
        );
        assert_eq!(
            parse_block(1, &block("Q?", &four, "Explanation: none")),
            Err(BlockError::MissingAnswer)
        );
        assert_eq!(
            parse_block(1, &block("Q?", &four, "Correct Answer: ()")),
            Err(BlockError::MissingAnswer)
        );
        assert_eq!(
            parse_block(1, &block("Q?", &four, "Correct Answer: E")),
            Err(BlockError::UnknownAnswer("E".to_string()))
        );
        assert_eq!(parse_block(1, "  \n "), Err(BlockError::MissingQuestion));
    }

    #[test]
    fn meta_lines_before_options() {
        let answer_first = "Q1. What is 2+2?\nCorrect Answer: B\nA) 3\nB) 4\nC) 5\nD) 6\nExplanation: Basic arithmetic";
        let questions = parse_questions(answer_first);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_option(), "4");
        assert_eq!(questions[0].explanation, "Basic arithmetic");

        let explanation_first = "Q1. What is 2+2?\nExplanation: Basic arithmetic\nA) 3\nB) 4\nC) 5\nD) 6\nCorrect Answer: B";
        let questions = parse_questions(explanation_first);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_answer.letter(), 'B');

        let split = "Q?\nA) a\nB) b\nC) c\nCorrect Answer: A\nD) d";
        assert_eq!(parse_block(1, split).map(|q| q.options[3].clone()), Ok("d".to_string()));
    }

    #[test]
    fn fifth_option_after_meta_is_rejected() {
        let text = "Q?\nA) a\nB) b\nCorrect Answer: A\nC) c\nD) d\nA) again";
        assert_eq!(parse_block(1, text), Err(BlockError::TooManyOptions));
    }

    #[test]
    fn answer_given_as_option_text_or_spelled_label() {
        let four = ["3", "4", "Five", "6"];

        let by_text = parse_block(1, &block("Q?", &four, "Correct Answer: 4")).unwrap();
        assert_eq!(by_text.correct_answer.index(), 1);

        let by_text_any_case = parse_block(1, &block("Q?", &four, "Correct Answer: five")).unwrap();
        assert_eq!(by_text_any_case.correct_answer.index(), 2);

        let spelled = parse_block(1, &block("Q?", &four, "Correct Answer: Option D")).unwrap();
        assert_eq!(spelled.correct_answer.letter(), 'D');

        assert_eq!(
            parse_block(1, &block("Q?", &four, "Correct Answer: seven")),
            Err(BlockError::UnknownAnswer("seven".to_string()))
        );
    }

    #[test]
    fn empty_explanation_uses_default() {
        let q = parse_block(
            1,
            &block("Q?", &["a", "b", "c", "d"], "Correct Answer: A\nExplanation:   "),
        )
        .unwrap();
        assert_eq!(q.explanation, DEFAULT_EXPLANATION);
    }

    #[test]
    fn last_answer_line_wins() {
        let q = parse_block(
            7,
            &block("Q?", &["a", "b", "c", "d"], "Correct Answer: A\nCorrect Answer: C"),
        )
        .unwrap();
        assert_eq!(q.correct_answer.letter(), 'C');
        assert_eq!(q.id, QuestionId::Seq(7));
    }

    #[test]
    fn parsing_is_repeatable() {
        assert_eq!(parse_questions(ARITHMETIC), parse_questions(ARITHMETIC));
    }
}
