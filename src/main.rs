//! HealthCheck AI - guided symptom triage chat service
//!
//! A Rust backend implementing a scripted intake state machine that hands
//! the collected symptoms to an LLM for a structured assessment.

mod api;
mod assessment;
mod db;
mod llm;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use assessment::{LlmAssessmentClient, DEFAULT_ASSESSMENT_TIMEOUT};
use db::Database;
use llm::{LlmConfig, ModelRegistry};
use runtime::{DatabaseStore, SessionManager, TypingDelay};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_TYPING_DELAY_MS: u64 = 1000;

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "healthcheck_ai=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let db_path = std::env::var("HEALTHCHECK_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.healthcheck-ai/assessments.db")
    });

    let port: u16 = env_parse("HEALTHCHECK_PORT").unwrap_or(8000);

    let typing_delay = Duration::from_millis(
        env_parse("HEALTHCHECK_TYPING_DELAY_MS").unwrap_or(DEFAULT_TYPING_DELAY_MS),
    );

    let assessment_timeout = env_parse("HEALTHCHECK_ASSESSMENT_TIMEOUT_SECS")
        .map_or(DEFAULT_ASSESSMENT_TIMEOUT, Duration::from_secs);

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    tracing::info!(path = %db_path, "Opening database");
    let db = Database::open(&db_path)?;

    // Initialize LLM registry
    let llm_config = LlmConfig::from_env();
    let llm_registry = Arc::new(ModelRegistry::new(&llm_config));

    if llm_registry.default().is_some() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!(
            default = %llm_registry.default_model_id(),
            "No usable LLM configured; assessments will fail. Set ANTHROPIC_API_KEY or LLM_GATEWAY."
        );
    }

    // Create application state
    let sessions = SessionManager::new(
        Arc::new(DatabaseStore::new(db)),
        Arc::new(LlmAssessmentClient::new(llm_registry, assessment_timeout)),
        Arc::new(TypingDelay::new(typing_delay)),
    );
    let state = AppState::new(Arc::new(sessions));

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(
        typing_delay_ms = %typing_delay.as_millis(),
        assessment_timeout_secs = assessment_timeout.as_secs(),
        "HealthCheck AI server listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
