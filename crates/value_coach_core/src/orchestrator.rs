//! crates/value_coach_core/src/orchestrator.rs
//!
//! Maps the inbound conversation actions onto the engine and shapes the
//! replies. The orchestrator keeps no state of its own between calls; the
//! phase a caller is in follows from the replies it received.

use crate::domain::{HistoryEntry, SessionOverview, Stage, User};
use crate::engine::{AnswerOutcome, AnswerResult, ProgressionEngine, StageStart};
use crate::error::{FlowError, FlowResult};
use crate::ports::{DatabaseService, GenerationService, UserContext};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Words that, anywhere in a free-form message, signal the user is ready to
/// start the staged flow. This is a plain keyword heuristic.
pub const READINESS_TOKENS: [&str; 3] = ["okay", "yes", "ready"];

/// Case-insensitive substring match against `READINESS_TOKENS`.
pub fn signals_readiness(text: &str) -> bool {
    let lowered = text.to_lowercase();
    READINESS_TOKENS.iter().any(|token| lowered.contains(token))
}

/// The conversation phases: `Intro -> Freeform -> StagedFlow -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationPhase {
    Intro,
    Freeform,
    StagedFlow { stage: Stage, question_number: u32 },
    Done,
}

#[derive(Debug, Clone)]
pub struct BeginReply {
    pub user_id: Uuid,
    pub welcome_message: String,
}

#[derive(Debug, Clone)]
pub struct ConverseReply {
    pub reply_message: String,
    pub advance_to_staged_flow: bool,
}

#[derive(Debug, Clone)]
pub struct StageStartReply {
    pub session_id: Uuid,
    pub stage: Stage,
    pub stage_title: String,
    pub intro_message: String,
    pub question_text: String,
    pub question_number: u32,
    pub total_questions: u32,
}

#[derive(Debug, Clone)]
pub struct AnswerReply {
    pub generated_commentary: String,
    pub outcome: AnswerOutcome,
    /// Shown with a stage completion, absent otherwise.
    pub message: Option<String>,
    /// The stage of the session that was answered.
    pub stage: Stage,
}

#[derive(Debug, Clone)]
pub struct UserSummary {
    pub user: User,
    pub sessions: Vec<SessionOverview>,
    pub responses: Vec<HistoryEntry>,
}

impl BeginReply {
    /// The welcome opens the conversation; free-form messages follow it.
    pub fn phase(&self) -> ConversationPhase {
        ConversationPhase::Intro
    }
}

impl ConverseReply {
    pub fn phase(&self) -> ConversationPhase {
        if self.advance_to_staged_flow {
            ConversationPhase::StagedFlow {
                stage: Stage::Vision,
                question_number: 1,
            }
        } else {
            ConversationPhase::Freeform
        }
    }
}

impl StageStartReply {
    pub fn phase(&self) -> ConversationPhase {
        ConversationPhase::StagedFlow {
            stage: self.stage,
            question_number: self.question_number,
        }
    }
}

impl AnswerReply {
    pub fn phase(&self) -> ConversationPhase {
        match &self.outcome {
            AnswerOutcome::NextQuestion {
                question_number, ..
            } => ConversationPhase::StagedFlow {
                stage: self.stage,
                question_number: *question_number,
            },
            AnswerOutcome::StageCompleted { next_stage } => ConversationPhase::StagedFlow {
                stage: *next_stage,
                question_number: 1,
            },
            AnswerOutcome::FlowCompleted { .. } => ConversationPhase::Done,
        }
    }
}

pub struct Orchestrator {
    engine: Arc<ProgressionEngine>,
    db: Arc<dyn DatabaseService>,
    generator: Arc<dyn GenerationService>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<ProgressionEngine>,
        db: Arc<dyn DatabaseService>,
        generator: Arc<dyn GenerationService>,
    ) -> Self {
        Self {
            engine,
            db,
            generator,
        }
    }

    pub fn engine(&self) -> &ProgressionEngine {
        &self.engine
    }

    /// Creates the user and asks the generator for a welcome message.
    pub async fn begin(&self, name: &str, location: &str) -> FlowResult<BeginReply> {
        let name = require_non_empty(name, "name")?;
        let location = require_non_empty(location, "location")?;

        let user = self.db.create_user(name, location).await?;
        info!("New user {} started a conversation", user.id);

        let greeting = format!(
            "My name is {} and I am chatting from {}. How are you?",
            name, location
        );
        let welcome_message = self
            .engine
            .bounded(self.generator.generate_reply(&greeting, &user_context(&user)))
            .await?;

        Ok(BeginReply {
            user_id: user.id,
            welcome_message,
        })
    }

    /// Replies to a free-form message and reports whether the staged flow should start.
    pub async fn converse(&self, user_id: Uuid, text: &str) -> FlowResult<ConverseReply> {
        let text = require_non_empty(text, "message")?;
        let user = self.db.get_user_by_id(user_id).await?;

        let reply_message = self
            .engine
            .bounded(self.generator.generate_reply(text, &user_context(&user)))
            .await?;

        Ok(ConverseReply {
            reply_message,
            advance_to_staged_flow: signals_readiness(text),
        })
    }

    /// The message introducing the five stages, shown before the first one starts.
    pub async fn introduce_framework(&self, user_id: Uuid) -> FlowResult<String> {
        self.db.get_user_by_id(user_id).await?;
        Ok(self.engine.catalog().messages().framework_intro.clone())
    }

    pub async fn start_stage(&self, user_id: Uuid, stage: &str) -> FlowResult<StageStartReply> {
        let StageStart {
            session_id,
            stage,
            question_text,
            question_number,
            total_questions,
        } = self.engine.start_stage(user_id, stage).await?;
        let definition = self.engine.catalog().definition(stage);

        Ok(StageStartReply {
            session_id,
            stage,
            stage_title: definition.title.clone(),
            intro_message: definition.intro.clone(),
            question_text,
            question_number,
            total_questions,
        })
    }

    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        answer: &str,
        expected_question: Option<u32>,
    ) -> FlowResult<AnswerReply> {
        let AnswerResult {
            stage,
            generated_commentary,
            outcome,
            ..
        } = self
            .engine
            .submit_answer(session_id, answer, expected_question)
            .await?;

        let message = match outcome {
            AnswerOutcome::StageCompleted { .. } => {
                Some(self.engine.catalog().messages().stage_completed.clone())
            }
            _ => None,
        };

        Ok(AnswerReply {
            generated_commentary,
            outcome,
            message,
            stage,
        })
    }

    pub async fn summary(&self, user_id: Uuid) -> FlowResult<UserSummary> {
        let user = self.db.get_user_by_id(user_id).await?;
        let sessions = self.db.get_sessions_by_user(user_id).await?;
        let responses = self.db.get_responses_for_user(user_id).await?;
        Ok(UserSummary {
            user,
            sessions,
            responses,
        })
    }
}

fn require_non_empty<'a>(value: &'a str, field: &str) -> FlowResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(FlowError::Validation(format!("{} is required", field)))
    } else {
        Ok(trimmed)
    }
}

fn user_context(user: &User) -> UserContext {
    UserContext {
        user_name: user.name.clone(),
        user_location: user.location.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::test_support::{InMemoryStore, ScriptedGenerator};

    type Fixture = (Orchestrator, Arc<InMemoryStore>, Arc<ScriptedGenerator>);

    fn orchestrator_with(generator: ScriptedGenerator) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let generator = Arc::new(generator);
        let engine = Arc::new(ProgressionEngine::new(
            Arc::new(Catalog::value_framework()),
            store.clone(),
            generator.clone(),
        ));
        (
            Orchestrator::new(engine, store.clone(), generator.clone()),
            store,
            generator,
        )
    }

    fn orchestrator() -> Fixture {
        orchestrator_with(ScriptedGenerator::new())
    }

    #[test]
    fn readiness_matches_tokens_case_insensitively_as_substrings() {
        assert!(signals_readiness("Yes I'm ready"));
        assert!(signals_readiness("OKAY let's go"));
        assert!(signals_readiness("I am all READY"));
        assert!(signals_readiness("eyes open"));
        assert!(!signals_readiness("tell me more"));
        assert!(!signals_readiness("no"));
        assert!(!signals_readiness(""));
    }

    #[tokio::test]
    async fn begin_creates_the_user_and_returns_a_welcome() {
        let (orchestrator, store, generator) = orchestrator();
        let reply = orchestrator.begin("  Ada ", " Lagos ").await.unwrap();

        let user = store.get_user_by_id(reply.user_id).await.unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(user.location, "Lagos");
        assert_eq!(
            generator.reply_calls(),
            vec!["My name is Ada and I am chatting from Lagos. How are you?".to_string()]
        );
        assert!(reply.welcome_message.starts_with("Hello Ada"));
        assert_eq!(reply.phase(), ConversationPhase::Intro);
    }

    #[tokio::test]
    async fn begin_requires_name_and_location() {
        let (orchestrator, _, generator) = orchestrator();
        assert!(matches!(
            orchestrator.begin("", "Lagos").await,
            Err(FlowError::Validation(_))
        ));
        assert!(matches!(
            orchestrator.begin("Ada", "   ").await,
            Err(FlowError::Validation(_))
        ));
        assert!(generator.reply_calls().is_empty());
    }

    #[tokio::test]
    async fn converse_flags_readiness() {
        let (orchestrator, _, _) = orchestrator();
        let user_id = orchestrator.begin("Ada", "Lagos").await.unwrap().user_id;

        let ready = orchestrator.converse(user_id, "Yes I'm ready").await.unwrap();
        assert!(ready.advance_to_staged_flow);
        assert_eq!(
            ready.phase(),
            ConversationPhase::StagedFlow {
                stage: Stage::Vision,
                question_number: 1
            }
        );

        let chatting = orchestrator.converse(user_id, "tell me more").await.unwrap();
        assert!(!chatting.advance_to_staged_flow);
        assert_eq!(chatting.reply_message, "Hello Ada, you said: tell me more");
        assert_eq!(chatting.phase(), ConversationPhase::Freeform);
    }

    #[tokio::test]
    async fn converse_rejects_unknown_users() {
        let (orchestrator, _, _) = orchestrator();
        assert!(matches!(
            orchestrator.converse(Uuid::new_v4(), "hi").await,
            Err(FlowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn generator_failures_surface_as_typed_errors() {
        let (orchestrator, _, _) = orchestrator_with(ScriptedGenerator::new().with_failure("boom"));
        assert!(matches!(
            orchestrator.begin("Ada", "Lagos").await,
            Err(FlowError::GenerationFailure(_))
        ));
    }

    #[tokio::test]
    async fn framework_intro_names_all_five_stages() {
        let (orchestrator, _, _) = orchestrator();
        let user_id = orchestrator.begin("Ada", "Lagos").await.unwrap().user_id;
        let intro = orchestrator.introduce_framework(user_id).await.unwrap();
        for word in ["Vision", "Auditing", "Leverage", "Upskill", "Execute"] {
            assert!(intro.contains(word), "{word}");
        }
        assert!(matches!(
            orchestrator.introduce_framework(Uuid::new_v4()).await,
            Err(FlowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn start_stage_adds_title_and_intro() {
        let (orchestrator, _, _) = orchestrator();
        let user_id = orchestrator.begin("Ada", "Lagos").await.unwrap().user_id;
        let reply = orchestrator.start_stage(user_id, "auditing").await.unwrap();

        assert_eq!(reply.stage_title, "SESSION 2: AUDITING (Skills)");
        assert!(!reply.intro_message.is_empty());
        assert_eq!(reply.total_questions, 4);
        assert_eq!(
            reply.phase(),
            ConversationPhase::StagedFlow {
                stage: Stage::Auditing,
                question_number: 1
            }
        );
    }

    #[tokio::test]
    async fn walking_the_whole_flow_ends_in_done() {
        let (orchestrator, store, _) = orchestrator();
        let begin = orchestrator.begin("Ada", "Lagos").await.unwrap();
        let user_id = begin.user_id;

        let mut stage = Some(Stage::Vision);
        let mut phase = begin.phase();
        assert_eq!(phase, ConversationPhase::Intro);
        while let Some(current) = stage {
            let start = orchestrator
                .start_stage(user_id, current.as_str())
                .await
                .unwrap();
            stage = None;
            for n in 1..=start.total_questions {
                let reply = orchestrator
                    .submit_answer(start.session_id, &format!("answer {n}"), Some(n))
                    .await
                    .unwrap();
                phase = reply.phase();
                match &reply.outcome {
                    AnswerOutcome::NextQuestion { .. } => assert!(reply.message.is_none()),
                    AnswerOutcome::StageCompleted { next_stage } => {
                        assert!(reply.message.is_some());
                        stage = Some(*next_stage);
                    }
                    AnswerOutcome::FlowCompleted { final_message } => {
                        assert_eq!(current, Stage::Execute);
                        assert!(!final_message.is_empty());
                    }
                }
            }
        }

        assert_eq!(phase, ConversationPhase::Done);
        assert_eq!(store.responses().len(), 12);

        let summary = orchestrator.summary(user_id).await.unwrap();
        assert_eq!(summary.user.id, user_id);
        assert_eq!(summary.sessions.len(), 5);
        assert!(summary.sessions.iter().all(|s| s.session.is_completed));
        assert_eq!(
            summary.sessions.iter().map(|s| s.response_count).sum::<u32>(),
            12
        );
        assert_eq!(summary.responses.len(), 12);
        assert_eq!(summary.responses[0].stage, Stage::Vision);
        assert_eq!(summary.responses[11].stage, Stage::Execute);
    }
}
