//! Topology endpoint.

use crate::api::AppState;
use crate::topology::Topology;
use axum::{extract::State, response::Json, routing::get, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/topology", get(get_topology))
        .with_state(state)
}

/// GET /topology - The assembled deployment topology.
async fn get_topology(State(state): State<AppState>) -> Json<Topology> {
    Json(state.pipeline.topology().clone())
}
