//! crates/value_coach_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The five phases of the VALUE questionnaire, in flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vision,
    Auditing,
    Leverage,
    Upskill,
    Execute,
}

impl Stage {
    /// Every stage, in the fixed order the flow walks through them.
    pub const ALL: [Stage; 5] = [
        Stage::Vision,
        Stage::Auditing,
        Stage::Leverage,
        Stage::Upskill,
        Stage::Execute,
    ];

    /// The lowercase identifier used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Vision => "vision",
            Stage::Auditing => "auditing",
            Stage::Leverage => "leverage",
            Stage::Upskill => "upskill",
            Stage::Execute => "execute",
        }
    }

    /// Zero-based position of the stage in the flow.
    pub fn position(&self) -> usize {
        match self {
            Stage::Vision => 0,
            Stage::Auditing => 1,
            Stage::Leverage => 2,
            Stage::Upskill => 3,
            Stage::Execute => 4,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name one of the five stages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a recognized stage")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vision" => Ok(Stage::Vision),
            "auditing" => Ok(Stage::Auditing),
            "leverage" => Ok(Stage::Leverage),
            "upskill" => Ok(Stage::Upskill),
            "execute" => Ok(Stage::Execute),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

/// One user's attempt at one stage.
///
/// `current_question_index` is 1-based and never exceeds the stage's question
/// count. Completed sessions keep the index of their last question.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stage: Stage,
    pub current_question_index: u32,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single recorded answer, plus the commentary generated for it.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_number: u32,
    pub question_text: String,
    pub answer_text: String,
    pub generated_text: String,
    pub created_at: DateTime<Utc>,
}

/// A response joined with the stage of the session it belongs to.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub stage: Stage,
    pub response: Response,
}

/// A session together with aggregate information about its responses.
#[derive(Debug, Clone)]
pub struct SessionOverview {
    pub session: Session,
    pub response_count: u32,
    pub last_response_at: Option<DateTime<Utc>>,
}

/// How a committed answer moves the session forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Move to the given question number.
    NextQuestion(u32),
    /// The answered question was the last one; mark the session completed.
    Complete,
}

/// Everything the store must write, all-or-nothing, when an answer is accepted.
///
/// The write only applies if the stored session is still at
/// `expected_index` and not completed.
#[derive(Debug, Clone)]
pub struct AnswerCommit {
    pub session_id: Uuid,
    pub expected_index: u32,
    pub response: Response,
    pub advance: Advance,
}
