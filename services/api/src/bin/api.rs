//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::DbAdapter, generation_llm::OpenAiGenerationAdapter},
    config::Config,
    error::ApiError,
    prompts::apply_prompt_overrides,
    web::{rest::ApiDoc, router, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, Method};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use value_coach_core::{Catalog, Orchestrator, ProgressionEngine};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Load the Question Catalog ---
    let catalog = Arc::new(apply_prompt_overrides(
        Catalog::value_framework(),
        &config.prompts_path,
    )?);
    info!("Question catalog loaded.");

    // --- 3. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 4. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(config.openai_api_key.as_str());
    let openai_client = Client::with_config(openai_config);
    let generation_adapter = Arc::new(OpenAiGenerationAdapter::new(
        openai_client,
        config.generation_model.clone(),
    ));

    // --- 5. Build the Engine and the Shared AppState ---
    let engine = Arc::new(
        ProgressionEngine::new(catalog, db_adapter.clone(), generation_adapter.clone())
            .with_generation_timeout(config.generation_timeout),
    );
    let orchestrator = Arc::new(Orchestrator::new(engine, db_adapter, generation_adapter));
    let app_state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.clone())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
