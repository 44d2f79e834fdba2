//! Event ingestion endpoint.

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::events::StateChangeEvent;
use axum::{extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(publish_event))
        .with_state(state)
}

/// POST /events - Route a state-change event to its targets.
///
/// An event that matches no rule is accepted and reported with
/// `"routed": false`.
async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<StateChangeEvent>,
) -> ApiResult<Json<Value>> {
    let id = event.id;
    let report = state.pipeline.on_event(event).await;
    let routed = !report.is_unrouted();
    let trigger = report.trigger.clone();
    let targets = report.summaries();
    report.into_result()?;

    Ok(Json(json!({
        "id": id,
        "trigger": trigger,
        "routed": routed,
        "targets": targets,
    })))
}
