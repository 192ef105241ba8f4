//! services/api/src/web/protocol.rs
//!
//! Defines the JSON request and response bodies exchanged between the client
//! and the API server, and their conversion from the core reply types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use value_coach_core::{
    AnswerOutcome, AnswerReply, BeginReply, ConversationPhase, ConverseReply, HistoryEntry,
    SessionOverview, StageStartReply, User, UserSummary,
};

//=========================================================================================
// Requests FROM the Client
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct StartRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct MessageRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct StartValueRequest {
    pub user_id: Uuid,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct StartSessionRequest {
    pub user_id: Uuid,
    /// One of `vision`, `auditing`, `leverage`, `upskill`, `execute`.
    #[serde(alias = "session_type")]
    pub stage: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct AnswerRequest {
    pub session_id: Uuid,
    #[serde(default)]
    pub answer: String,
    /// The question being answered. When given, a stale number is rejected with 409.
    #[serde(default)]
    pub question_number: Option<u32>,
}

//=========================================================================================
// Responses TO the Client
//=========================================================================================

/// Where the client should go next.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    Introduction,
    Conversation,
    StagedFlow,
    Done,
}

impl From<ConversationPhase> for NextStep {
    fn from(phase: ConversationPhase) -> Self {
        match phase {
            ConversationPhase::Intro => NextStep::Introduction,
            ConversationPhase::Freeform => NextStep::Conversation,
            ConversationPhase::StagedFlow { .. } => NextStep::StagedFlow,
            ConversationPhase::Done => NextStep::Done,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct StartResponse {
    pub user_id: Uuid,
    pub message: String,
    pub next_step: NextStep,
}

impl From<BeginReply> for StartResponse {
    fn from(reply: BeginReply) -> Self {
        Self {
            next_step: reply.phase().into(),
            user_id: reply.user_id,
            message: reply.welcome_message,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct MessageResponse {
    pub message: String,
    pub show_value_introduction: bool,
    pub next_step: NextStep,
}

impl From<ConverseReply> for MessageResponse {
    fn from(reply: ConverseReply) -> Self {
        Self {
            next_step: reply.phase().into(),
            message: reply.reply_message,
            show_value_introduction: reply.advance_to_staged_flow,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct StartValueResponse {
    pub message: String,
    pub show_start_button: bool,
    /// The stage the start button begins.
    pub first_stage: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub stage: String,
    pub session_title: String,
    pub message: String,
    pub question: String,
    pub question_number: u32,
    pub total_questions: u32,
}

impl From<StageStartReply> for StartSessionResponse {
    fn from(reply: StageStartReply) -> Self {
        Self {
            session_id: reply.session_id,
            stage: reply.stage.as_str().to_string(),
            session_title: reply.stage_title,
            message: reply.intro_message,
            question: reply.question_text,
            question_number: reply.question_number,
            total_questions: reply.total_questions,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct AnswerResponse {
    pub generated_commentary: String,
    pub next_step: NextStep,
    #[serde(flatten)]
    pub outcome: AnswerOutcomeBody,
}

/// Exactly one of these follows every accepted answer.
#[derive(Serialize, Debug, PartialEq, Eq, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcomeBody {
    NextQuestion {
        next_question: String,
        question_number: u32,
        total_questions: u32,
    },
    StageCompleted {
        stage_completed: bool,
        next_stage: String,
        message: Option<String>,
    },
    FlowCompleted {
        flow_completed: bool,
        final_message: String,
    },
}

impl From<AnswerReply> for AnswerResponse {
    fn from(reply: AnswerReply) -> Self {
        let next_step = reply.phase().into();
        let outcome = match reply.outcome {
            AnswerOutcome::NextQuestion {
                question_text,
                question_number,
                total_questions,
            } => AnswerOutcomeBody::NextQuestion {
                next_question: question_text,
                question_number,
                total_questions,
            },
            AnswerOutcome::StageCompleted { next_stage } => AnswerOutcomeBody::StageCompleted {
                stage_completed: true,
                next_stage: next_stage.as_str().to_string(),
                message: reply.message,
            },
            AnswerOutcome::FlowCompleted { final_message } => AnswerOutcomeBody::FlowCompleted {
                flow_completed: true,
                final_message,
            },
        };
        Self {
            generated_commentary: reply.generated_commentary,
            next_step,
            outcome,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct UserBody {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserBody {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            location: user.location,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SessionBody {
    pub id: Uuid,
    pub stage: String,
    pub current_question_index: u32,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub response_count: u32,
    pub last_response_at: Option<DateTime<Utc>>,
}

impl From<SessionOverview> for SessionBody {
    fn from(overview: SessionOverview) -> Self {
        let session = overview.session;
        Self {
            id: session.id,
            stage: session.stage.as_str().to_string(),
            current_question_index: session.current_question_index,
            is_completed: session.is_completed,
            created_at: session.created_at,
            updated_at: session.updated_at,
            response_count: overview.response_count,
            last_response_at: overview.last_response_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ResponseBody {
    pub id: Uuid,
    pub session_id: Uuid,
    pub stage: String,
    pub question_number: u32,
    pub question_text: String,
    pub answer_text: String,
    pub generated_text: String,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryEntry> for ResponseBody {
    fn from(entry: HistoryEntry) -> Self {
        let response = entry.response;
        Self {
            id: response.id,
            session_id: response.session_id,
            stage: entry.stage.as_str().to_string(),
            question_number: response.question_number,
            question_text: response.question_text,
            answer_text: response.answer_text,
            generated_text: response.generated_text,
            created_at: response.created_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SummaryResponse {
    pub user: UserBody,
    pub sessions: Vec<SessionBody>,
    pub responses: Vec<ResponseBody>,
}

impl From<UserSummary> for SummaryResponse {
    fn from(summary: UserSummary) -> Self {
        Self {
            user: summary.user.into(),
            sessions: summary.sessions.into_iter().map(Into::into).collect(),
            responses: summary.responses.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
