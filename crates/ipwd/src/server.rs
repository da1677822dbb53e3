//! HTTP server: routing, the review handler and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ipw_core::{EngineConnector, ImageReview, ReviewChain, WebhookConfig};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::{ApiError, DaemonError, DaemonResult};

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WebhookConfig>,
    pub connector: Arc<dyn EngineConnector>,
}

impl AppState {
    pub fn new(config: WebhookConfig, connector: Arc<dyn EngineConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }
}

/// Build the webhook router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ipw", post(review).fallback(method_not_supported))
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run one image review through a freshly assembled chain.
async fn review(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body.map_err(|e| ApiError::UnreadableBody(e.body_text()))?;
    debug!(
        uri = %uri,
        headers = ?headers,
        body = %String::from_utf8_lossy(&body),
        "image review request"
    );

    let mut review: ImageReview = serde_json::from_slice(&body).map_err(ApiError::BadRequest)?;

    let chain = ReviewChain::assemble(&state.config, state.connector.clone())?;
    chain.run(&mut review).await?;

    let status = if review.status.allowed {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(review)).into_response())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn method_not_supported() -> ApiError {
    ApiError::MethodNotSupported
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// IPW daemon server
pub struct Server {
    addr: SocketAddr,
    state: AppState,
}

impl Server {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    /// Serve until a shutdown signal arrives.
    pub async fn run(self) -> DaemonResult<()> {
        let app = create_router(self.state);
        let listener = TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, "Starting server");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        info!("ipwd shutting down");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received terminate signal, initiating graceful shutdown"),
    }
}
