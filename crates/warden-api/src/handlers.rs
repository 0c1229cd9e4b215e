use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::state::AppState;

/// Static dashboard shell; it polls `/api/v1/info` client-side.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../static/dashboard.html"))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Current per-node evaluation snapshots.
pub async fn info(State(state): State<AppState>) -> Response {
    Json(state.info_cache.snapshot()).into_response()
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub node: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

/// Recent controller events, optionally filtered to one node.
pub async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    match state
        .cluster
        .list_events(query.node.as_deref(), query.limit)
        .await
    {
        Ok(events) => Json(events).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "event listing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
