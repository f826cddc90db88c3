//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::secrets::{SecretBroker, SecretRequest, SharedFinder};

use super::error::ApiError;
use super::response;
use super::signature;

/// Largest request body read before the signature is checked.
pub const MAX_REQUEST_BODY: usize = 1024 * 1024;

/// Shared application state. Read-only after startup.
pub struct AppState {
    /// Shared secret for signatures and response encryption
    pub secret: String,
    /// Resolves secret requests
    pub finder: SharedFinder,
}

impl AppState {
    pub fn new(secret: impl Into<String>, finder: SharedFinder) -> Self {
        Self {
            secret: secret.into(),
            finder,
        }
    }
}

/// Build the router. The extension answers `POST` on any path.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(find_secret))
        .route("/*path", post(find_secret))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let broker = SecretBroker::from_store_config(&config.store)?;
    tracing::info!(
        template = %broker.template(),
        vault = %config.store.address,
        "Secret broker initialized"
    );

    let state = Arc::new(AppState::new(config.secret.clone(), Arc::new(broker)));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.listen.as_str()).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening on {}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// POST /{any}
///
/// Verify the signature, decode the request, look the secret up and
/// optionally encrypt the answer. The first failing step ends the request.
async fn find_secret(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    tracing::debug!("received request");

    let body = body.map_err(|e| {
        tracing::debug!("secrets: cannot read request body: {}", e);
        ApiError::InvalidInput(e.body_text())
    })?;

    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    if let Err(e) = signature::verify_request(&state.secret, &method, target, &headers, &body) {
        tracing::debug!("secrets: rejected request signature: {}", e);
        return Err(e.into());
    }

    let request: SecretRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("secrets: cannot unmarshal request body: {}", e);
        ApiError::InvalidInput(e.to_string())
    })?;

    tracing::debug!("fetching secret {:?} for {}", request.name, request.repo.slug);

    let secret = state.finder.find(&request).await.map_err(|e| {
        tracing::debug!("secrets: cannot find secret {}: {}", request.name, e);
        ApiError::from(e)
    })?;

    let payload = serde_json::to_vec(&secret).map_err(|e| ApiError::Internal(e.to_string()))?;

    let encoded = response::maybe_encrypt(
        payload,
        &state.secret,
        response::wants_encryption(&headers),
    )
    .map_err(|e| {
        tracing::error!("secrets: cannot encrypt response: {}", e);
        ApiError::from(e)
    })?;

    Ok(encoded.into_response())
}
