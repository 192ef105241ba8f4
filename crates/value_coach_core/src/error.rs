//! crates/value_coach_core/src/error.rs
//!
//! The typed failures surfaced by the engine and the orchestrator.

use crate::domain::Stage;
use crate::ports::PortError;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Unknown user or session, or an answer sent to a completed session.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid stage: '{0}'")]
    InvalidStage(String),

    #[error("Question {index} is out of range for stage {stage} ({count} questions)")]
    OutOfRange { stage: Stage, index: u32, count: u32 },

    /// No prompt template is registered for a question.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Text generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("Text generation failed: {0}")]
    GenerationFailure(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The session moved on between reading it and committing the answer.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Store(String),
}

impl From<PortError> for FlowError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => FlowError::NotFound(msg),
            PortError::Conflict(msg) => FlowError::Conflict(msg),
            PortError::Unexpected(msg) => FlowError::Store(msg),
        }
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
