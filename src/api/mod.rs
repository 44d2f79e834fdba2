//! REST API server for minutes-relay.
//!
//! Provides HTTP endpoints for:
//! - Uploading objects into a bucket (fires store notifications)
//! - Publishing transcription state-change events
//! - Inspecting the topology and the invocation log

pub mod error;
pub mod routes;

use crate::config::ApiConfig;
use crate::pipeline::Pipeline;
use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

pub struct ApiServer {
    host: String,
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(pipeline: Arc<Pipeline>, config: &ApiConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            state: AppState { pipeline },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = create_router(self.state);
        let addr = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", addr))?;

        info!("API server listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /                       - Service info");
        info!("  GET  /version                - Version info");
        info!("  GET  /topology               - Deployment topology");
        info!("  GET  /buckets/:bucket        - List object keys");
        info!("  GET  /buckets/:bucket/*key   - Fetch an object");
        info!("  PUT  /buckets/:bucket/*key   - Upload an object");
        info!("  POST /events                 - Publish a state-change event");
        info!("  GET  /invocations            - Recent invocations");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/version", get(version))
        .merge(routes::topology::router(state.clone()))
        .merge(routes::buckets::router(state.clone()))
        .merge(routes::events::router(state.clone()))
        .merge(routes::invocations::router(state))
        .layer(ServiceBuilder::new())
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "minutes-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "minutes-relay"
    }))
}
