//! Firefeed Web Server
//!
//! Axum-based chat webhook for the firefeed importer.
//!
//! - `POST /api/telegram?api_key=<secret>` receives chat updates: documents
//!   and text are stored as records, commands run the import pipeline
//! - `GET /health` for liveness probes
//!
//! Every request runs to completion under the configured deadline.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use firefeed_core::chat::ChatApi;
use firefeed_core::config::{ChatSources, DEFAULT_TIMEOUT_SECS};
use firefeed_core::pipeline::Pipeline;

mod handlers;
mod scheduler;

pub use scheduler::{start_snapshot_scheduler, SnapshotScheduleConfig};

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether the webhook requires the `api_key` query parameter (secure by default)
    pub require_auth: bool,
    /// Shared secret for the webhook
    pub api_key: Option<String>,
    /// Deadline for one webhook request
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub pipeline: Pipeline,
    pub chat: Arc<dyn ChatApi>,
    pub chat_sources: ChatSources,
    pub config: ServerConfig,
}

/// Validate an API key using constant-time comparison to prevent timing attacks
fn validate_api_key(provided: &str, expected: &str) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();
    // Only compare if lengths match (constant-time for same-length keys)
    provided_bytes.len() == expected_bytes.len() && provided_bytes.ct_eq(expected_bytes).into()
}

/// Check the webhook `api_key` query parameter against the configured secret
pub(crate) fn is_authorized(config: &ServerConfig, provided: Option<&str>) -> bool {
    if !config.require_auth {
        return true;
    }
    match (provided, config.api_key.as_deref()) {
        (Some(provided), Some(expected)) => validate_api_key(provided, expected),
        _ => false,
    }
}

pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/telegram", post(handlers::telegram_webhook))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the server
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    if !state.config.require_auth {
        warn!("⚠️  Webhook authentication disabled - do not expose to network!");
    } else if state.config.api_key.is_none() {
        anyhow::bail!("FIREFEED_API_KEY must be set unless authentication is disabled");
    }

    info!(
        "Serving {} mapped chat(s), request deadline {}s",
        state.chat_sources.len(),
        state.config.timeout.as_secs()
    );

    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
///
/// The body is the plain error message; the chat service shows it when a
/// delivery fails.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "unauthorized".to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = ?err, "Request failed");
        }

        (self.status, self.message).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
            internal: Some(err),
        }
    }
}
