//! Object store endpoints.
//!
//! Uploads go through the pipeline so that store notifications fire exactly
//! as they would for any other writer of the inbound bucket.

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    /// Only keys starting with this prefix
    pub prefix: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/buckets/:bucket", get(list_objects))
        .route("/buckets/:bucket/*key", get(get_object).put(put_object))
        .with_state(state)
}

/// GET /buckets/:bucket - List object keys.
async fn list_objects(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let prefix = params.prefix.unwrap_or_default();
    let keys = state.pipeline.store().list(&bucket, &prefix).await?;
    Ok(Json(json!({ "bucket": bucket, "keys": keys })))
}

/// GET /buckets/:bucket/*key - Fetch an object body.
async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> ApiResult<Response> {
    let object = state.pipeline.store().get(&bucket, &key).await?;
    let content_type = object
        .meta
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));

    Ok(([(header::CONTENT_TYPE, content_type)], object.body).into_response())
}

/// PUT /buckets/:bucket/*key - Upload an object and deliver its create event.
///
/// Returns 201 with the per-target outcomes, or an error status when a
/// triggered handler failed.
async fn put_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Request body is empty"));
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let size = body.len();

    info!("Upload received for {}/{} ({} bytes)", bucket, key, size);

    let report = state
        .pipeline
        .upload(&bucket, &key, body.to_vec(), content_type)
        .await?;
    let targets = report.summaries();
    report.into_result()?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "bucket": bucket,
            "key": key,
            "size": size,
            "targets": targets,
        })),
    ))
}
