//! crates/value_coach_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{
    AnswerCommit, HistoryEntry, Response, Session, SessionOverview, Stage, User,
};
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A guarded write found the stored state had already moved on.
    #[error("Conflicting update: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Generation Context
//=========================================================================================

/// What the generator knows about the person it is talking to.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_name: String,
    pub user_location: String,
}

/// Context handed to the generator when commenting on an answer.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub user: UserContext,
    /// Every prior response of the user, across all stages, in flow order.
    pub previous_responses: Vec<HistoryEntry>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(&self, name: &str, location: &str) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    // --- Session Management ---
    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session>;

    /// The most recently created session for `(user_id, stage)`, if any.
    async fn find_latest_session(
        &self,
        user_id: Uuid,
        stage: Stage,
    ) -> PortResult<Option<Session>>;

    /// Creates a session at question 1.
    ///
    /// If another caller created an active session for the same `(user_id, stage)`
    /// concurrently, that session is returned instead.
    async fn create_session(&self, user_id: Uuid, stage: Stage) -> PortResult<Session>;

    async fn get_sessions_by_user(&self, user_id: Uuid) -> PortResult<Vec<SessionOverview>>;

    // --- Responses ---

    /// Atomically inserts the response and applies the session advance.
    ///
    /// Fails with `PortError::Conflict` and writes nothing when the session is no
    /// longer at `commit.expected_index` or is already completed.
    async fn record_answer(&self, commit: AnswerCommit) -> PortResult<Session>;

    async fn get_responses_for_session(&self, session_id: Uuid) -> PortResult<Vec<Response>>;

    /// All responses of a user ordered by session creation, then question number.
    async fn get_responses_for_user(&self, user_id: Uuid) -> PortResult<Vec<HistoryEntry>>;
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produces commentary on an answer, driven by a question's prompt template.
    async fn generate_commentary(
        &self,
        prompt_template: &str,
        answer: &str,
        context: &GenerationContext,
    ) -> PortResult<String>;

    /// Produces an open-ended conversational reply.
    async fn generate_reply(&self, message: &str, context: &UserContext) -> PortResult<String>;
}
