mod config;
mod quiz;

use std::sync::Arc;

use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use dotenv::dotenv;
use log::{info, warn};
use quiz::ai_helper::QuizHelper;
use quiz::{AnswerKey, DifficultyChoice, MockTest, MockTestRequest, Origin, Question, OPTION_LABELS};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup, KeyboardRemove},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TestKind {
    /// JSON questions, placeholders if generation fails.
    MockTest,
    /// Free-text questions, no placeholders.
    Practice,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveTestKind,
    ReceiveExam {
        kind: TestKind,
    },
    ReceiveSubject {
        kind: TestKind,
        exam: String,
    },
    ReceiveQuestionCount {
        kind: TestKind,
        exam: String,
        subject: String,
    },
    ReceiveDifficulty {
        kind: TestKind,
        exam: String,
        subject: String,
        question_count: usize,
    },
    MockTest {
        quiz: quiz::Quiz,
        question_number: usize,
        score: usize,
    },
}

type DialogueStorage = std::sync::Arc<ErasedStorage<State>>;

const MAX_QUESTIONS: usize = 30;
const RETRY_TEXT: &str =
    "I couldn't come up with any questions this time. Pick a difficulty to try again.";

#[tokio::main]
async fn main() -> HandlerResult {
    // Variables may also come straight from the environment
    if dotenv().is_err() {
        eprintln!("No .env file found, using the process environment");
    }
    pretty_env_logger::init();
    log::info!("Starting mock test bot...");

    let config = config::Config::from_env()?;

    let bot = Bot::from_env();

    info!("Opening dialogue storage at {}", config.dialogue_db);
    let storage: DialogueStorage = SqliteStorage::open(&config.dialogue_db, Json)
        .await?
        .erase();

    let gpt = {
        let mut gpt = ChatGPT::new(config.chatgpt_api_key.clone())?;

        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.timeout = config.chatgpt_timeout;

        gpt
    };

    info!("Using the {:?} personality", config.personality);
    let quiz_helper: Arc<QuizHelper> = Arc::new(QuizHelper::new(gpt, config.personality));

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveTestKind].endpoint(receive_test_kind))
            .branch(dptree::case![State::ReceiveExam { kind }].endpoint(receive_exam))
            .branch(
                dptree::case![State::ReceiveSubject { kind, exam }].endpoint(receive_subject),
            )
            .branch(
                dptree::case![State::ReceiveQuestionCount {
                    kind,
                    exam,
                    subject
                }]
                .endpoint(receive_question_count),
            )
            .branch(
                dptree::case![State::ReceiveDifficulty {
                    kind,
                    exam,
                    subject,
                    question_count
                }]
                .endpoint(receive_difficulty),
            )
            .branch(
                dptree::case![State::MockTest {
                    quiz,
                    question_number,
                    score
                }]
                .endpoint(mock_test),
            ),
    )
    .dependencies(dptree::deps![storage, quiz_helper])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    Ok(())
}

const GREETING_TEXT: &str = "Hi! I build tests to help you get ready for your exams.";
const MOCK_TEST_GAME: &str = "Take a mock test";
const PRACTICE_GAME: &str = "Practice questions";

fn test_kind_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(MOCK_TEST_GAME),
        KeyboardButton::new(PRACTICE_GAME),
    ]])
}

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;
    bot.send_message(msg.chat.id, "What would you like to do?")
        .reply_markup(test_kind_keyboard())
        .await?;

    dialogue.update(State::ReceiveTestKind).await?;
    Ok(())
}

async fn receive_test_kind(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    let kind = match msg.text() {
        Some(MOCK_TEST_GAME) => TestKind::MockTest,
        Some(PRACTICE_GAME) => TestKind::Practice,
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options")
                .reply_markup(test_kind_keyboard())
                .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "Which exam are you preparing for?")
        .reply_markup(KeyboardRemove::new())
        .await?;

    dialogue.update(State::ReceiveExam { kind }).await?;
    Ok(())
}

async fn receive_exam(
    bot: Bot,
    dialogue: QuizDialogue,
    kind: TestKind,
    msg: Message,
) -> HandlerResult {
    let Some(exam) = non_empty_text(&msg) else {
        bot.send_message(msg.chat.id, "Please type the name of the exam")
            .await?;
        return Ok(());
    };

    bot.send_message(
        msg.chat.id,
        format!("Got it: {}. Which subject should the test cover?", exam),
    )
    .await?;

    dialogue.update(State::ReceiveSubject { kind, exam }).await?;
    Ok(())
}

async fn receive_subject(
    bot: Bot,
    dialogue: QuizDialogue,
    (kind, exam): (TestKind, String),
    msg: Message,
) -> HandlerResult {
    let Some(subject) = non_empty_text(&msg) else {
        bot.send_message(msg.chat.id, "Please type the subject").await?;
        return Ok(());
    };

    let keyboard = KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("5")],
        vec![KeyboardButton::new("10")],
        vec![KeyboardButton::new("15")],
    ]);
    bot.send_message(msg.chat.id, "How many questions?")
        .reply_markup(keyboard)
        .await?;

    dialogue
        .update(State::ReceiveQuestionCount {
            kind,
            exam,
            subject,
        })
        .await?;
    Ok(())
}

async fn receive_question_count(
    bot: Bot,
    dialogue: QuizDialogue,
    (kind, exam, subject): (TestKind, String, String),
    msg: Message,
) -> HandlerResult {
    let Some(question_count) = msg.text().and_then(|t| t.trim().parse::<usize>().ok()) else {
        bot.send_message(msg.chat.id, "Please enter a number").await?;
        return Ok(());
    };
    if question_count == 0 || question_count > MAX_QUESTIONS {
        bot.send_message(
            msg.chat.id,
            format!("The number of questions must be between 1 and {}", MAX_QUESTIONS),
        )
        .await?;
        return Ok(());
    }

    let keyboard = KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("easy"), KeyboardButton::new("medium")],
        vec![KeyboardButton::new("hard"), KeyboardButton::new("mixed")],
    ]);
    bot.send_message(msg.chat.id, "Choose the difficulty")
        .reply_markup(keyboard)
        .await?;

    dialogue
        .update(State::ReceiveDifficulty {
            kind,
            exam,
            subject,
            question_count,
        })
        .await?;
    Ok(())
}

async fn receive_difficulty(
    ai_helper: Arc<QuizHelper>,
    bot: Bot,
    dialogue: QuizDialogue,
    (kind, exam, subject, question_count): (TestKind, String, String, usize),
    msg: Message,
) -> HandlerResult {
    let difficulty = match msg.text().map(str::parse::<DifficultyChoice>) {
        Some(Ok(difficulty)) => difficulty,
        _ => {
            bot.send_message(msg.chat.id, "Please pick one of: easy, medium, hard, mixed")
                .await?;
            return Ok(());
        }
    };

    // Generation takes a while, the typing indicator is only a courtesy
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let request = MockTestRequest {
        exam,
        subject,
        question_count,
        difficulty,
    };
    let test = match kind {
        TestKind::MockTest => ai_helper.generate_mock_test(&request).await,
        TestKind::Practice => match ai_helper.generate_practice_questions(&request).await {
            Ok(questions) => MockTest::parsed(questions),
            Err(e) => {
                warn!("Practice questions for chat {} failed: {}", msg.chat.id.0, e);
                bot.send_message(msg.chat.id, RETRY_TEXT).await?;
                return Ok(());
            }
        },
    };

    // The model may still answer the mock test prompt with `[]`
    if test.questions.is_empty() {
        bot.send_message(msg.chat.id, RETRY_TEXT).await?;
        return Ok(());
    }
    if test.is_degraded() {
        warn!(
            "Serving placeholder questions for {}/{} in chat {}",
            request.exam, request.subject, msg.chat.id.0
        );
        bot.send_message(
            msg.chat.id,
            "The question generator is having trouble, so this test uses sample questions.",
        )
        .await?;
    }

    let quiz = quiz::Quiz::new(request.exam, request.subject, test);

    bot.send_message(msg.chat.id, "Your mock test is ready!")
        .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new("Start")]]))
        .await?;

    dialogue
        .update(State::MockTest {
            quiz,
            question_number: 0,
            score: 0,
        })
        .await?;
    Ok(())
}

async fn mock_test(
    ai_helper: Arc<QuizHelper>,
    bot: Bot,
    dialogue: QuizDialogue,
    (quiz, question_number, score): (quiz::Quiz, usize, usize),
    msg: Message,
) -> HandlerResult {
    let mut current_score = score;
    if question_number != 0 {
        let question = &quiz.questions[question_number - 1];
        let Some(chosen) = msg.text().and_then(AnswerKey::from_letter) else {
            bot.send_message(msg.chat.id, "Please answer with A, B, C or D")
                .await?;
            return Ok(());
        };

        if chosen == question.correct_answer {
            bot.send_message(msg.chat.id, "Correct!").await?;
            current_score += 1;
        } else {
            let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

            // The stored explanation is good enough if the model is unavailable
            let explanation = ai_helper
                .explain_wrong_answer(question, chosen)
                .await
                .unwrap_or_else(|_| question.explanation.clone());

            bot.send_message(
                msg.chat.id,
                format!(
                    "Wrong! The correct answer is {}) {}\n\n{}",
                    question.correct_answer.letter(),
                    question.correct_option(),
                    explanation
                ),
            )
            .await?;
        }
    }

    if question_number >= quiz.questions.len() {
        if quiz.origin == Origin::Fallback {
            info!("Chat {} finished a placeholder test", msg.chat.id.0);
        }
        let quiz_score = format!(
            "The {} {} test is over! You answered {} of {} questions correctly.\nWhat would you like to do next?",
            quiz.exam,
            quiz.subject,
            current_score,
            quiz.questions.len()
        );
        bot.send_message(msg.chat.id, quiz_score)
            .reply_markup(test_kind_keyboard())
            .await?;

        dialogue.update(State::ReceiveTestKind).await?;
        return Ok(());
    }

    let question = &quiz.questions[question_number];
    let answers = OPTION_LABELS
        .iter()
        .map(|label| KeyboardButton::new(label.to_string()))
        .collect::<Vec<_>>();

    bot.send_message(
        msg.chat.id,
        question_text(question, question_number + 1, quiz.questions.len()),
    )
    .reply_markup(KeyboardMarkup::new(vec![answers]))
    .await?;

    dialogue
        .update(State::MockTest {
            quiz,
            question_number: question_number + 1,
            score: current_score,
        })
        .await?;
    Ok(())
}

fn non_empty_text(msg: &Message) -> Option<String> {
    msg.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn question_text(question: &Question, number: usize, total: usize) -> String {
    let options = question
        .labelled_options()
        .map(|(label, text)| format!("{}) {}", label, text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Question {} of {}:\n{}\n\n{}",
        number, total, question.question, options
    )
}
