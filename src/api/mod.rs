//! REST API server for WrapUp.
//!
//! Provides HTTP endpoints for:
//! - Meeting processing (upload + full pipeline)
//! - Meeting record lookup and listing

pub mod error;
pub mod routes;

use crate::pipeline::Pipeline;
use anyhow::Result;
use axum::{extract::DefaultBodyLimit, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

/// Upload cap: meeting recordings can be long.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Shared state for API routes.
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
    pub fn new(host: String, port: u16, pipeline: Arc<Pipeline>) -> Self {
        Self {
            host,
            port,
            state: AppState { pipeline },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .merge(routes::meetings::router(self.state))
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .layer(ServiceBuilder::new());

        let listener =
            tokio::net::TcpListener::bind(&format!("{}:{}", self.host, self.port)).await?;

        info!(
            "API server listening on http://{}:{}",
            self.host, self.port
        );
        info!("Endpoints:");
        info!("  GET  /                  - Service info");
        info!("  GET  /version           - Get version info");
        info!("  POST /meetings/process  - Process a recorded meeting");
        info!("  GET  /meetings          - List meeting records");
        info!("  GET  /meetings/:id      - Get a single meeting record");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "wrapup",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "wrapup"
    }))
}
