//! Error taxonomy of the practice core.
//!
//! Every failure is scoped to one question attempt. The session state itself
//! never fails; these errors only come out of the fetch and submit boundaries.

use thiserror::Error;

pub const RUN_FAILED_MESSAGE: &str = "Failed to run code.";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    /// The question has no identifier; nothing was sent to the grader
    #[error("question has no identifier")]
    MissingQuestionId,
    #[error("question not found")]
    QuestionNotFound,
    #[error("failed to load question: {0}")]
    QuestionFetch(String),
    /// Transport failure, non-2xx status or malformed grading body
    #[error("grading service error: {message}")]
    GradingService {
        message: String,
        status: Option<u16>,
    },
    #[error("failed to list questions: {0}")]
    QuestionListFetch(String),
    #[error("failed to fetch progress: {0}")]
    ProgressFetch(String),
    #[error(transparent)]
    Storage(#[from] redis::RedisError),
}

impl PracticeError {
    /// Message suitable for a learner-facing notification
    pub fn user_message(&self) -> String {
        match self {
            PracticeError::MissingQuestionId => "No question ID found!".to_string(),
            PracticeError::QuestionNotFound => "Question not found in database.".to_string(),
            PracticeError::QuestionFetch(_) => "Failed to load question data.".to_string(),
            PracticeError::GradingService { message, .. } => message.clone(),
            PracticeError::QuestionListFetch(_) | PracticeError::ProgressFetch(_) => {
                "Failed to fetch questions.".to_string()
            }
            PracticeError::Storage(_) => "Failed to save progress.".to_string(),
        }
    }

    pub(crate) fn grading(message: Option<String>, status: Option<u16>) -> Self {
        PracticeError::GradingService {
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| RUN_FAILED_MESSAGE.to_string()),
            status,
        }
    }
}
