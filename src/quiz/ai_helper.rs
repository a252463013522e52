use std::str::FromStr;

use async_trait::async_trait;
use chatgpt::client::ChatGPT;
use chatgpt::types::{ChatMessage, CompletionResponse, Role};
use log::{debug, info, warn};

use crate::quiz::ids::{StampSource, SystemClock};
use crate::quiz::json_parser::{fallback_questions, normalize_questions};
use crate::quiz::text_parser::parse_questions;
use crate::quiz::{AnswerKey, MockTest, MockTestRequest, Question};

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("ChatGPT request failed: {0}")]
    ChatGpt(#[from] chatgpt::err::Error),
    #[error("the model returned an empty completion")]
    EmptyCompletion,
    #[error("no usable questions in the completion")]
    NoQuestions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
}

impl From<ChatRole> for Role {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::System => Role::System,
            ChatRole::User => Role::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Something that can turn a conversation into a text completion.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, QuizError>;
}

#[async_trait]
impl Completion for ChatGPT {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, QuizError> {
        let history: Vec<ChatMessage> = turns
            .iter()
            .map(|turn| ChatMessage {
                role: turn.role.into(),
                content: turn.content.clone(),
            })
            .collect();

        let response: CompletionResponse = self.send_history(&history).await?;
        Ok(response.message().content.clone())
    }
}

pub struct QuizHelper<C = ChatGPT> {
    personality: Personality,
    backend: C,
    stamps: Box<dyn StampSource + Send + Sync>,
}

impl<C: Completion> QuizHelper<C> {
    pub fn new(backend: C, personality: Personality) -> Self {
        Self {
            personality,
            backend,
            stamps: Box::new(SystemClock),
        }
    }

    pub fn with_stamps(mut self, stamps: impl StampSource + Send + Sync + 'static) -> Self {
        self.stamps = Box::new(stamps);
        self
    }

    /// Asks for a JSON array of questions. Always produces a test: a failed
    /// request or an unreadable reply both end in placeholder questions.
    pub async fn generate_mock_test(&self, request: &MockTestRequest) -> MockTest {
        info!(
            "Generating {} {} questions for {}/{}",
            request.question_count, request.difficulty, request.exam, request.subject
        );

        match self.ask(mock_test_prompt(request)).await {
            Ok(completion) => normalize_questions(&completion, request, self.stamps.as_ref()),
            Err(e) => {
                warn!("Mock test request failed: {}", e);
                fallback_questions(request, self.stamps.as_ref())
            }
        }
    }

    /// Asks for the free-text `Q1.` format. Unlike the mock test, an answer
    /// with nothing usable in it is an error.
    pub async fn generate_practice_questions(
        &self,
        request: &MockTestRequest,
    ) -> Result<Vec<Question>, QuizError> {
        let completion = self.ask(practice_prompt(request)).await?;

        let mut questions = parse_questions(&completion);
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        if questions.len() < request.question_count {
            info!(
                "Asked for {} practice questions, got {}",
                request.question_count,
                questions.len()
            );
        }
        request.difficulty.apply(&mut questions);
        Ok(questions)
    }

    pub async fn explain_wrong_answer(
        &self,
        question: &Question,
        chosen: AnswerKey,
    ) -> Result<String, QuizError> {
        debug!("Explaining wrong answer for question {}", question.id);
        self.ask(wrong_answer_prompt(question, chosen)).await
    }

    async fn ask(&self, prompt: String) -> Result<String, QuizError> {
        let turns = [
            ChatTurn::system(self.personality.system_prompt()),
            ChatTurn::user(prompt),
        ];
        debug!("Prompt: {:?}", turns[1].content);

        let completion = self.backend.complete(&turns).await?;
        debug!("Completion: {:?}", completion);

        if completion.trim().is_empty() {
            return Err(QuizError::EmptyCompletion);
        }
        Ok(completion)
    }
}

fn mock_test_prompt(request: &MockTestRequest) -> String {
    format!(
        "Create {count} multiple-choice questions for the {exam} exam on {subject}, \
        difficulty: {difficulty}.
Reply with only a JSON array. Each element must look like:
{{\"question\": \"...\", \"options\": [\"...\", \"...\", \"...\", \"...\"], \"correctAnswer\": 0, \"explanation\": \"...\"}}
\"options\" has exactly 4 entries and \"correctAnswer\" is the 0-based index of the right one. \
Vary the position of the correct answer.",
        count = request.question_count,
        exam = request.exam,
        subject = request.subject,
        difficulty = request.difficulty,
    )
}

fn practice_prompt(request: &MockTestRequest) -> String {
    format!(
        "Create {count} multiple-choice practice questions for the {exam} exam on {subject}, \
        difficulty: {difficulty}.
Use exactly this format for every question, numbering them Q1., Q2., ...:
Q1. <question>
A) <option>
B) <option>
C) <option>
D) <option>
Correct Answer: <letter>
Explanation: <one or two sentences>",
        count = request.question_count,
        exam = request.exam,
        subject = request.subject,
        difficulty = request.difficulty,
    )
}

fn wrong_answer_prompt(question: &Question, chosen: AnswerKey) -> String {
    let options = question
        .labelled_options()
        .map(|(label, text)| format!("{}) {}", label, text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "A student answered this question:
{}
{}
They chose {}, but the correct answer is {}.
Explain in 2-3 sentences why {} is right and where the mistake is.",
        question.question,
        options,
        chosen.letter(),
        question.correct_answer.letter(),
        question.correct_answer.letter()
    )
}

/// Persona the model writes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Personality {
    Tutor,
    Examiner,
    Coach,
}

impl Personality {
    pub fn get_personality(&self) -> String {
        match self {
            Personality::Tutor => "a patient tutor who explains things simply",
            Personality::Examiner => "a strict examiner who writes precise exam questions",
            Personality::Coach => "an upbeat study coach who keeps students motivated",
        }
        .to_string()
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an assistant that helps students prepare for exams. Write as {}.",
            self.get_personality()
        )
    }
}

impl FromStr for Personality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tutor" => Ok(Personality::Tutor),
            "examiner" => Ok(Personality::Examiner),
            "coach" => Ok(Personality::Coach),
            other => Err(format!(
                "unknown personality {:?}, expected tutor, examiner or coach",
                other
            )),
        }
    }
}
