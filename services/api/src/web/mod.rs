pub mod extract;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::{
    answer_handler, health_handler, message_handler, router, start_handler,
    start_session_handler, start_value_handler, summary_handler,
};
