//! Companion chat - a passphrase-gated conversation with a remote model
//!
//! A single runtime task owns the session and dispatches one reply
//! request at a time; the HTTP layer only talks to it through a handle.

mod api;
mod composer;
mod config;
mod llm;
mod prompt;
mod runtime;
mod session;
mod state_machine;
mod storage;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{GeminiService, LlmService, LoggingService, UnconfiguredService};
use runtime::ChatHandle;
use session::ChatSession;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use storage::SqliteKvStore;
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
                .unwrap_or_else(|_| "companion_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let store = SqliteKvStore::open(&config.db_path)?;
    let session = ChatSession::load(store, config.passphrase.clone());

    let llm: Arc<dyn LlmService> = match &config.gemini {
        Some(gemini) => {
            let service = GeminiService::new(gemini)?;
            tracing::info!(
                model = %gemini.model,
                proxied = gemini.proxy.is_some(),
                timeout_secs = ?gemini.timeout.map(|t| t.as_secs()),
                "Gemini client initialized"
            );
            Arc::new(LoggingService::new(Arc::new(service)))
        }
        None => {
            tracing::warn!("No LLM API key configured. Set GEMINI_API_KEY; replies will fail.");
            Arc::new(LoggingService::new(Arc::new(UnconfiguredService)))
        }
    };

    let chat = ChatHandle::spawn(session, llm, config.dispatch.clone());
    let state = AppState::new(chat);

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
    tracing::info!("Companion chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
