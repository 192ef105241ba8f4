//! crates/value_coach_core/src/engine.rs
//!
//! The session progression engine. It owns the per-session state machine
//! `Active(index) -> Completed`, picks questions from the catalog and decides
//! when a stage completes and which stage follows.
//!
//! Answer submission runs in two phases: the commentary is generated first,
//! outside any storage transaction, and only then is the response written
//! together with the session advance in one guarded `record_answer` call.

use crate::catalog::Catalog;
use crate::domain::{Advance, AnswerCommit, Response, Session, Stage};
use crate::error::{FlowError, FlowResult};
use crate::ports::{DatabaseService, GenerationContext, GenerationService, PortResult, UserContext};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// The state of a stage session after `start_stage`.
#[derive(Debug, Clone)]
pub struct StageStart {
    pub session_id: Uuid,
    pub stage: Stage,
    pub question_text: String,
    pub question_number: u32,
    pub total_questions: u32,
}

/// Where the flow stands after an accepted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    NextQuestion {
        question_text: String,
        question_number: u32,
        total_questions: u32,
    },
    StageCompleted {
        next_stage: Stage,
    },
    FlowCompleted {
        final_message: String,
    },
}

#[derive(Debug, Clone)]
pub struct AnswerResult {
    pub session_id: Uuid,
    pub stage: Stage,
    pub generated_commentary: String,
    pub outcome: AnswerOutcome,
}

pub struct ProgressionEngine {
    catalog: Arc<Catalog>,
    db: Arc<dyn DatabaseService>,
    generator: Arc<dyn GenerationService>,
    generation_timeout: Duration,
}

impl ProgressionEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        db: Arc<dyn DatabaseService>,
        generator: Arc<dyn GenerationService>,
    ) -> Self {
        Self {
            catalog,
            db,
            generator,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    /// Reuses the latest session for `(user_id, stage)` while it is still
    /// active, otherwise creates a fresh one at question 1.
    pub async fn resolve_session(&self, user_id: Uuid, stage: Stage) -> FlowResult<Session> {
        match self.db.find_latest_session(user_id, stage).await? {
            Some(session) if !session.is_completed => Ok(session),
            _ => {
                let session = self.db.create_session(user_id, stage).await?;
                info!(
                    "Created session {} for user {} at stage {}",
                    session.id, user_id, stage
                );
                Ok(session)
            }
        }
    }

    pub async fn start_stage(&self, user_id: Uuid, stage: &str) -> FlowResult<StageStart> {
        let stage: Stage = stage
            .parse()
            .map_err(|_| FlowError::InvalidStage(stage.to_string()))?;
        self.db.get_user_by_id(user_id).await?;

        let session = self.resolve_session(user_id, stage).await?;
        let question = self
            .catalog
            .question_at(stage, session.current_question_index)?;

        Ok(StageStart {
            session_id: session.id,
            stage,
            question_text: question.text.clone(),
            question_number: session.current_question_index,
            total_questions: self.catalog.question_count(stage),
        })
    }

    /// Records an answer to the session's current question and advances it.
    ///
    /// When `expected_question` is given it must match the session's current
    /// question number, otherwise the call fails with `Conflict` before any
    /// generation happens.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        answer: &str,
        expected_question: Option<u32>,
    ) -> FlowResult<AnswerResult> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(FlowError::Validation("answer must not be empty".to_string()));
        }

        // --- 1. Read the session state ---
        let session = self.db.get_session_by_id(session_id).await?;
        if session.is_completed {
            warn!("Rejected answer for completed session {}", session_id);
            return Err(FlowError::NotFound(format!(
                "Session {} is already completed",
                session_id
            )));
        }
        let index = session.current_question_index;
        if let Some(expected) = expected_question {
            if expected != index {
                warn!(
                    "Rejected answer for session {}: expected question {}, session is at {}",
                    session_id, expected, index
                );
                return Err(FlowError::Conflict(format!(
                    "Session {} is at question {}, not {}",
                    session_id, index, expected
                )));
            }
        }

        let stage = session.stage;
        let question = self.catalog.question_at(stage, index)?;
        let prompt_template = question.prompt_template.as_deref().ok_or_else(|| {
            FlowError::Configuration(format!(
                "no active prompt template for {} question {}",
                stage, index
            ))
        })?;

        // --- 2. Generate the commentary, outside any transaction ---
        let user = self.db.get_user_by_id(session.user_id).await?;
        let context = GenerationContext {
            user: UserContext {
                user_name: user.name,
                user_location: user.location,
            },
            previous_responses: self.db.get_responses_for_user(session.user_id).await?,
        };
        let generated_commentary = self
            .bounded(
                self.generator
                    .generate_commentary(prompt_template, answer, &context),
            )
            .await?;

        // --- 3. Commit the response and the advance as one unit ---
        let total = self.catalog.question_count(stage);
        let advance = if index < total {
            Advance::NextQuestion(index + 1)
        } else {
            Advance::Complete
        };
        let commit = AnswerCommit {
            session_id,
            expected_index: index,
            response: Response {
                id: Uuid::new_v4(),
                session_id,
                question_number: index,
                question_text: question.text.clone(),
                answer_text: answer.to_string(),
                generated_text: generated_commentary.clone(),
                created_at: Utc::now(),
            },
            advance,
        };
        self.db.record_answer(commit).await.map_err(|e| {
            warn!("Failed to commit answer for session {}: {}", session_id, e);
            FlowError::from(e)
        })?;

        // --- 4. Work out what comes next ---
        let outcome = match advance {
            Advance::NextQuestion(next) => AnswerOutcome::NextQuestion {
                question_text: self.catalog.question_at(stage, next)?.text.clone(),
                question_number: next,
                total_questions: total,
            },
            Advance::Complete => match self.catalog.next_stage(stage) {
                Some(next_stage) => {
                    info!("Session {} completed stage {}", session_id, stage);
                    AnswerOutcome::StageCompleted { next_stage }
                }
                None => {
                    info!(
                        "Session {} completed the final stage; flow finished for user {}",
                        session_id, session.user_id
                    );
                    AnswerOutcome::FlowCompleted {
                        final_message: self.catalog.messages().closing.clone(),
                    }
                }
            },
        };

        Ok(AnswerResult {
            session_id,
            stage,
            generated_commentary,
            outcome,
        })
    }

    /// Runs a generation call under the configured timeout.
    pub(crate) async fn bounded<F>(&self, call: F) -> FlowResult<String>
    where
        F: Future<Output = PortResult<String>>,
    {
        match tokio::time::timeout(self.generation_timeout, call).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(FlowError::GenerationFailure(e.to_string())),
            Err(_) => Err(FlowError::GenerationTimeout(self.generation_timeout)),
        }
    }
}
