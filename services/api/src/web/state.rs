//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;
use value_coach_core::Orchestrator;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}
