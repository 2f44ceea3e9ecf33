use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::session::SessionStore;

pub fn router(sessions: Arc<SessionStore>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .with_state(sessions)
}

async fn status(State(sessions): State<Arc<SessionStore>>) -> Json<Value> {
    Json(json!({ "sessions": sessions.len().await }))
}

pub async fn serve(bind: SocketAddr, sessions: Arc<SessionStore>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "Starting health endpoint");
    axum::serve(listener, router(sessions)).await
}
