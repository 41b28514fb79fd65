use std::sync::Arc;

use caes::config::AppConfig;
use caes::core::pipeline::llm::{AnthropicProvider, LlmProvider};
use caes::core::rag::{LexicalIndex, SqliteLexicalIndex};
use caes::core::logging;
use caes::database::Database;
use caes::server::{build_router, AppState};

/// Builds the LLM provider from environment configuration. Returns
/// `None` when no credentials are configured — `POST …/enrich` then
/// answers `400 no LLM configured` instead of failing at startup.
fn build_provider() -> Option<Arc<dyn LlmProvider>> {
    let api_key = std::env::var("CAES_ANTHROPIC_API_KEY").ok()?;
    let model = std::env::var("CAES_ANTHROPIC_MODEL").unwrap_or_else(|_| "claude-3-5-sonnet-latest".to_string());
    Some(Arc::new(AnthropicProvider::new(api_key, model)))
}

#[tokio::main]
async fn main() {
    logging::init();
    tracing::info!(version = caes::VERSION, "{} starting", caes::NAME);

    let config = AppConfig::load();

    let db = match Database::new(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, "failed to open database");
            std::process::exit(1);
        }
    };

    let provider = build_provider();
    if provider.is_none() {
        tracing::warn!("no LLM provider configured — enrichment requests will 400 until CAES_ANTHROPIC_API_KEY is set");
    }
    let lexical_index: Arc<dyn LexicalIndex> = Arc::new(SqliteLexicalIndex::new(db.clone()));

    let state = AppState {
        db,
        config: config.clone(),
        provider,
        lexical_index,
    };

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&config.server.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.server.bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %config.server.bind_addr, "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
