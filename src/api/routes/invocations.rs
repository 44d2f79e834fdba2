//! Invocation log endpoint.

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::db::InvocationRecord;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct InvocationParams {
    /// Maximum results (default 20)
    pub limit: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/invocations", get(list_invocations))
        .with_state(state)
}

/// GET /invocations - Recent invocations, newest first.
async fn list_invocations(
    State(state): State<AppState>,
    Query(params): Query<InvocationParams>,
) -> ApiResult<Json<Vec<InvocationRecord>>> {
    let log = state
        .pipeline
        .invocation_log()
        .ok_or_else(|| ApiError::not_found("Invocation log is disabled"))?;

    let records = log.recent(params.limit.unwrap_or(20))?;
    Ok(Json(records))
}
