use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use tracing::{info, warn};

use crate::bot::AppState;
use crate::platform::telegram::parse_update;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub fn router(state: Arc<AppState>) -> Router {
    let path = state.config.server.webhook_path.clone();
    Router::new()
        .route("/", get(index))
        .route(&path, post(receive_update))
        .with_state(state)
}

async fn index() -> &'static str {
    "Bot is running."
}

/// Telegram retries any non-2xx answer, so undecodable bodies are
/// acknowledged and dropped.
async fn receive_update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if let Some(expected) = state.config.server.secret_token.as_deref() {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Rejected webhook request with missing or wrong secret token");
            return (StatusCode::UNAUTHORIZED, "unauthorized");
        }
    }

    match parse_update(&body) {
        Ok(update) => state.handle_update(update).await,
        Err(e) => warn!("Dropping undecodable webhook body: {:#}", e),
    }

    (StatusCode::OK, "ok")
}

/// Serve the webhook endpoint until Ctrl-C
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let path = state.config.server.webhook_path.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Webhook server listening on http://{addr}{path}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down webhook server");
        })
        .await
        .context("Server error")?;

    Ok(())
}
