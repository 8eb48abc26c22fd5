//! HTTP service: `/health`, `/cover` and `/metadata` on axum.
//!
//! The only shared value is an immutable [`AppState`] behind an `Arc`; each
//! request owns its documents and drops them on every exit path.

pub mod error;
pub mod handlers;

use crate::config::ServerConfig;
use crate::error::CoverError;
use crate::pipeline::caption::CaptionGenerator;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Shared, read-only state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub captioner: CaptionGenerator,
}

impl AppState {
    pub fn new(captioner: CaptionGenerator) -> Self {
        Self { captioner }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .route("/cover", post(handlers::create_cover))
        .route("/metadata", post(handlers::extract_metadata))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: ServerConfig, state: AppState) -> Result<(), CoverError> {
    let addr = config.bind_addr();
    let app = router(Arc::new(state), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CoverError::Internal(format!("failed to bind {addr}: {e}")))?;

    info!("PDF Cover Service listening on http://{}", addr);
    info!("  GET  /health   - health check");
    info!("  POST /cover    - create accessible cover (multipart 'file')");
    info!("  POST /metadata - extract title, language, page count");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CoverError::Internal(format!("server error: {e}")))?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, shutting down..."),
        _ = terminate => warn!("Received terminate signal, shutting down..."),
    }
}
