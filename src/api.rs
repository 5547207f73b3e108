use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::sentiment::normalize_topic;
use crate::status::{StatusBoard, StatusSnapshot, TopicStatus};

#[derive(Clone)]
pub struct AppState {
    status: StatusBoard,
}

/// Read-only status surface. Merge a metrics router on top when one is
/// installed.
pub fn router(status: StatusBoard) -> Router {
    let state = AppState { status };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/topics", get(topics))
        .route("/topics/{topic}", get(topic))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn topics(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}

async fn topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Json<TopicStatus>, StatusCode> {
    let key = normalize_topic(&topic);
    state
        .status
        .snapshot()
        .topics
        .into_iter()
        .find(|t| t.topic == key)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
