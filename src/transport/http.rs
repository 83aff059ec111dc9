//! HTTP transport: one JSON-RPC message per `POST /mcp`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::GatewayError;
use crate::mcp::{Correlator, McpResponse, SubmitOutcome};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    correlator: Arc<Correlator>,
}

impl HttpState {
    pub fn new(correlator: Arc<Correlator>) -> Self {
        Self { correlator }
    }
}

/// HTTP server
pub struct HttpServer {
    correlator: Arc<Correlator>,
    addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(correlator: Arc<Correlator>, addr: SocketAddr) -> Self {
        Self { correlator, addr }
    }

    /// Build the router
    pub fn router(correlator: Arc<Correlator>) -> Router {
        Router::new()
            .route("/mcp", post(mcp_handler).options(preflight_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(HttpState::new(correlator))
    }

    /// Start the server and run until a shutdown signal arrives
    pub async fn start(self) -> std::io::Result<()> {
        let app = Self::router(self.correlator);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("MCP HTTP server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(super::shutdown_signal())
            .await?;

        Ok(())
    }
}

/// Health check endpoint
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": crate::SERVICE_NAME,
        "transport": "http",
        "version": crate::VERSION,
    }))
}

/// Plain `OPTIONS` requests; CORS preflights are answered by the CORS layer
async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

/// JSON-RPC endpoint
async fn mcp_handler(State(state): State<HttpState>, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            let error = GatewayError::Parse(e.to_string());
            return (status_for(&error), Json(McpResponse::from_error(None, error))).into_response();
        }
    };

    match state.correlator.submit_value(raw).await {
        Ok(SubmitOutcome::NoReply) => StatusCode::NO_CONTENT.into_response(),
        Ok(SubmitOutcome::Reply(response)) => (StatusCode::OK, Json(response)).into_response(),
        Err(rejection) => {
            let status = status_for(&rejection.error);
            tracing::debug!(status = status.as_u16(), error = %rejection.error, "Rejected MCP message");
            (status, Json(rejection.into_response())).into_response()
        }
    }
}

fn status_for(error: &GatewayError) -> StatusCode {
    StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
