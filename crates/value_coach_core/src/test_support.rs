//! In-memory implementations of the ports, used by the unit tests.

use crate::domain::{
    Advance, AnswerCommit, HistoryEntry, Response, Session, SessionOverview, Stage, User,
};
use crate::ports::{
    DatabaseService, GenerationContext, GenerationService, PortError, PortResult, UserContext,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct StoreState {
    users: Vec<User>,
    sessions: Vec<Session>,
    responses: Vec<Response>,
}

/// A `DatabaseService` holding everything in vectors behind one lock.
///
/// `record_answer` checks and writes under the same lock, which gives it the
/// same all-or-nothing behavior as the Postgres transaction.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responses(&self) -> Vec<Response> {
        self.state.lock().unwrap().responses.clone()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.state.lock().unwrap().sessions.clone()
    }
}

#[async_trait]
impl DatabaseService for InMemoryStore {
    async fn create_user(&self, name: &str, location: &str) -> PortResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location: location.to_string(),
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn find_latest_session(
        &self,
        user_id: Uuid,
        stage: Stage,
    ) -> PortResult<Option<Session>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .sessions
            .iter()
            .rev()
            .find(|s| s.user_id == user_id && s.stage == stage)
            .cloned())
    }

    async fn create_session(&self, user_id: Uuid, stage: Stage) -> PortResult<Session> {
        let mut state = self.state.lock().unwrap();
        if let Some(active) = state
            .sessions
            .iter()
            .find(|s| s.user_id == user_id && s.stage == stage && !s.is_completed)
        {
            return Ok(active.clone());
        }
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            stage,
            current_question_index: 1,
            is_completed: false,
            created_at: now,
            updated_at: now,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_sessions_by_user(&self, user_id: Uuid) -> PortResult<Vec<SessionOverview>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .map(|s| {
                let responses: Vec<&Response> = state
                    .responses
                    .iter()
                    .filter(|r| r.session_id == s.id)
                    .collect();
                SessionOverview {
                    session: s.clone(),
                    response_count: responses.len() as u32,
                    last_response_at: responses.iter().map(|r| r.created_at).max(),
                }
            })
            .collect())
    }

    async fn record_answer(&self, commit: AnswerCommit) -> PortResult<Session> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == commit.session_id)
            .ok_or_else(|| {
                PortError::NotFound(format!("Session {} not found", commit.session_id))
            })?;
        if session.is_completed || session.current_question_index != commit.expected_index {
            return Err(PortError::Conflict(format!(
                "Session {} is no longer at question {}",
                commit.session_id, commit.expected_index
            )));
        }
        match commit.advance {
            Advance::NextQuestion(next) => session.current_question_index = next,
            Advance::Complete => session.is_completed = true,
        }
        session.updated_at = Utc::now();
        let updated = session.clone();
        state.responses.push(commit.response);
        Ok(updated)
    }

    async fn get_responses_for_session(&self, session_id: Uuid) -> PortResult<Vec<Response>> {
        let mut responses: Vec<Response> = self
            .state
            .lock()
            .unwrap()
            .responses
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        responses.sort_by_key(|r| r.question_number);
        Ok(responses)
    }

    async fn get_responses_for_user(&self, user_id: Uuid) -> PortResult<Vec<HistoryEntry>> {
        let state = self.state.lock().unwrap();
        let mut entries = Vec::new();
        // Sessions are stored in creation order.
        for session in state.sessions.iter().filter(|s| s.user_id == user_id) {
            let mut responses: Vec<&Response> = state
                .responses
                .iter()
                .filter(|r| r.session_id == session.id)
                .collect();
            responses.sort_by_key(|r| r.question_number);
            entries.extend(responses.into_iter().map(|r| HistoryEntry {
                stage: session.stage,
                response: r.clone(),
            }));
        }
        Ok(entries)
    }
}

/// A single recorded call to `generate_commentary`.
#[derive(Debug, Clone)]
pub struct CommentaryCall {
    pub prompt_template: String,
    pub answer: String,
    pub context: GenerationContext,
}

/// A `GenerationService` that echoes its inputs, with optional delay and
/// failure injection.
#[derive(Default)]
pub struct ScriptedGenerator {
    delay: Duration,
    failures: Mutex<VecDeque<String>>,
    commentary_calls: Mutex<Vec<CommentaryCall>>,
    reply_calls: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The next call fails with this message.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.failures.lock().unwrap().push_back(message.into());
        self
    }

    pub fn commentary_calls(&self) -> Vec<CommentaryCall> {
        self.commentary_calls.lock().unwrap().clone()
    }

    pub fn reply_calls(&self) -> Vec<String> {
        self.reply_calls.lock().unwrap().clone()
    }

    async fn pause_or_fail(&self) -> PortResult<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.failures.lock().unwrap().pop_front() {
            Some(message) => Err(PortError::Unexpected(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate_commentary(
        &self,
        prompt_template: &str,
        answer: &str,
        context: &GenerationContext,
    ) -> PortResult<String> {
        self.commentary_calls.lock().unwrap().push(CommentaryCall {
            prompt_template: prompt_template.to_string(),
            answer: answer.to_string(),
            context: context.clone(),
        });
        self.pause_or_fail().await?;
        Ok(format!("commentary on: {}", answer))
    }

    async fn generate_reply(&self, message: &str, context: &UserContext) -> PortResult<String> {
        self.reply_calls.lock().unwrap().push(message.to_string());
        self.pause_or_fail().await?;
        Ok(format!("Hello {}, you said: {}", context.user_name, message))
    }
}
