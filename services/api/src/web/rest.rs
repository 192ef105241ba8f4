//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints, the router, and the
//! master definition for the OpenAPI specification.

use crate::error::HttpError;
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::protocol::{
    AnswerOutcomeBody, AnswerRequest, AnswerResponse, HealthResponse, MessageRequest,
    MessageResponse, NextStep, ResponseBody, SessionBody, StartRequest, StartResponse,
    StartSessionRequest, StartSessionResponse, StartValueRequest, StartValueResponse,
    SummaryResponse, UserBody,
};
use crate::web::state::AppState;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        start_handler,
        message_handler,
        start_value_handler,
        start_session_handler,
        answer_handler,
        summary_handler,
        health_handler,
    ),
    components(
        schemas(
            StartRequest, StartResponse, MessageRequest, MessageResponse,
            StartValueRequest, StartValueResponse, StartSessionRequest,
            StartSessionResponse, AnswerRequest, AnswerResponse, AnswerOutcomeBody,
            NextStep, SummaryResponse, UserBody, SessionBody, ResponseBody, HealthResponse
        )
    ),
    tags(
        (name = "VALUE Coach API", description = "API endpoints for the guided VALUE self-assessment.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// All API routes, without middleware layers.
pub fn router(app_state: Arc<AppState>) -> Router {
    let chat_routes = Router::new()
        .route("/start", post(start_handler))
        .route("/message", post(message_handler))
        .route("/start-value", post(start_value_handler))
        .route("/session/start", post(start_session_handler))
        .route("/session/answer", post(answer_handler))
        .route("/user/{user_id}/summary", get(summary_handler));

    Router::new()
        .nest("/api/chat", chat_routes)
        .route("/health", get(health_handler))
        .with_state(app_state)
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Start a conversation by introducing the user.
#[utoipa::path(
    post,
    path = "/api/chat/start",
    request_body = StartRequest,
    responses(
        (status = 200, description = "User created and welcomed", body = StartResponse),
        (status = 400, description = "Name or location missing"),
        (status = 502, description = "Text generation failed"),
        (status = 504, description = "Text generation timed out")
    )
)]
pub async fn start_handler(
    State(app_state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<StartRequest>,
) -> Result<Json<StartResponse>, HttpError> {
    let reply = app_state
        .orchestrator
        .begin(&req.name, &req.location)
        .await?;
    Ok(Json(reply.into()))
}

/// Send a free-form message before the staged flow begins.
#[utoipa::path(
    post,
    path = "/api/chat/message",
    request_body = MessageRequest,
    responses(
        (status = 200, description = "Conversational reply", body = MessageResponse),
        (status = 400, description = "Empty message"),
        (status = 404, description = "User not found")
    )
)]
pub async fn message_handler(
    State(app_state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<MessageRequest>,
) -> Result<Json<MessageResponse>, HttpError> {
    let reply = app_state
        .orchestrator
        .converse(req.user_id, &req.message)
        .await?;
    Ok(Json(reply.into()))
}

/// Introduce the five stages of the VALUE framework.
#[utoipa::path(
    post,
    path = "/api/chat/start-value",
    request_body = StartValueRequest,
    responses(
        (status = 200, description = "Framework introduction", body = StartValueResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn start_value_handler(
    State(app_state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<StartValueRequest>,
) -> Result<Json<StartValueResponse>, HttpError> {
    let message = app_state
        .orchestrator
        .introduce_framework(req.user_id)
        .await?;
    let first_stage = app_state.orchestrator.engine().catalog().stage_order()[0];
    Ok(Json(StartValueResponse {
        message,
        show_start_button: true,
        first_stage: first_stage.as_str().to_string(),
    }))
}

/// Start a stage, or resume the user's active session for it.
#[utoipa::path(
    post,
    path = "/api/chat/session/start",
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Current question of the stage", body = StartSessionResponse),
        (status = 400, description = "Invalid stage"),
        (status = 404, description = "User not found")
    )
)]
pub async fn start_session_handler(
    State(app_state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, HttpError> {
    let reply = app_state
        .orchestrator
        .start_stage(req.user_id, &req.stage)
        .await?;
    Ok(Json(reply.into()))
}

/// Answer the current question of a session.
#[utoipa::path(
    post,
    path = "/api/chat/session/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Commentary and what comes next", body = AnswerResponse),
        (status = 400, description = "Empty answer"),
        (status = 404, description = "Session not found or already completed"),
        (status = 409, description = "The question was already answered"),
        (status = 500, description = "No prompt template for the question"),
        (status = 502, description = "Text generation failed"),
        (status = 504, description = "Text generation timed out")
    )
)]
pub async fn answer_handler(
    State(app_state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<AnswerRequest>,
) -> Result<Json<AnswerResponse>, HttpError> {
    let reply = app_state
        .orchestrator
        .submit_answer(req.session_id, &req.answer, req.question_number)
        .await?;
    Ok(Json(reply.into()))
}

/// Everything recorded for a user.
#[utoipa::path(
    get,
    path = "/api/chat/user/{user_id}/summary",
    responses(
        (status = 200, description = "User, sessions and responses", body = SummaryResponse),
        (status = 404, description = "User not found")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The unique ID of the user.")
    )
)]
pub async fn summary_handler(
    State(app_state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<SummaryResponse>, HttpError> {
    let summary = app_state.orchestrator.summary(user_id).await?;
    Ok(Json(summary.into()))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
    })
}
