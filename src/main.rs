//! Gita Essence - a streaming chat guide to the Bhagavad Gita
//!
//! A Rust backend driving a single conversation through a state machine,
//! with replies streamed from Gemini.

mod api;
mod config;
mod llm;
mod runtime;
mod state_machine;
mod system_prompt;
mod transcript;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{GeminiService, LlmService, LoggingService};
use runtime::{RuntimeHandle, ServiceLlmClient};
use state_machine::ConvContext;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gita_essence=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env()?;
    let system_instruction =
        system_prompt::load_system_instruction(config.system_prompt_file.as_deref())?;
    if let Some(path) = &config.system_prompt_file {
        tracing::info!(path = %path.display(), "Using system prompt override");
    }

    // Initialize LLM
    let gemini: Arc<dyn LlmService> = Arc::new(GeminiService::new(&config.llm)?);
    let service: Arc<dyn LlmService> = Arc::new(LoggingService::new(gemini));
    let model_id = service.model_id().to_string();
    tracing::info!(
        model = %model_id,
        gateway = ?config.llm.gateway,
        "LLM initialized"
    );

    // Start the conversation runtime
    let runtime = RuntimeHandle::spawn(
        ServiceLlmClient::new(service),
        system_instruction,
        ConvContext::default(),
    );
    let state = AppState::new(runtime, model_id);

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
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Gita Essence server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
