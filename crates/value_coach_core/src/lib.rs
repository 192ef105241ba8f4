pub mod catalog;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod ports;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{Catalog, CatalogError, FlowMessages, Question, StageDefinition};
pub use domain::{
    Advance, AnswerCommit, HistoryEntry, Response, Session, SessionOverview, Stage, UnknownStage,
    User,
};
pub use engine::{AnswerOutcome, AnswerResult, ProgressionEngine, StageStart};
pub use error::{FlowError, FlowResult};
pub use orchestrator::{
    signals_readiness, AnswerReply, BeginReply, ConversationPhase, ConverseReply, Orchestrator,
    StageStartReply, UserSummary,
};
pub use ports::{
    DatabaseService, GenerationContext, GenerationService, PortError, PortResult, UserContext,
};
