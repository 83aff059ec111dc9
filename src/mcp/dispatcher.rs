//! Method dispatch for inbound MCP messages

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::protocol::{
    methods, InboundMessage, InitializeResult, McpResponse, RequestId, ToolCallResult,
};
use super::tools::ToolRegistry;
use crate::error::{codes, GatewayError};

/// Capacity of the channels between transports and the dispatcher
pub const CHANNEL_CAPACITY: usize = 256;

/// Trait for handling MCP messages.
///
/// Returns `None` for notifications, which are never answered.
#[async_trait]
pub trait McpHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> Option<McpResponse>;
}

/// Start a handler loop fed by the returned inbound channel.
///
/// Every message is handled on its own task, so replies are pushed to
/// `outbound` in completion order rather than submission order. The loop ends
/// once all inbound senders are dropped; in-flight tasks still deliver.
pub fn spawn_handler(
    handler: Arc<dyn McpHandler>,
    outbound: mpsc::Sender<McpResponse>,
) -> mpsc::Sender<InboundMessage> {
    let (tx, mut rx) = mpsc::channel::<InboundMessage>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let handler = handler.clone();
            let outbound = outbound.clone();
            tokio::spawn(async move {
                if let Some(response) = handler.handle(message).await {
                    if outbound.send(response).await.is_err() {
                        tracing::debug!("Outbound channel closed, dropping reply");
                    }
                }
            });
        }
        tracing::debug!("Inbound channel closed, dispatcher loop exiting");
    });

    tx
}

/// Dispatches MCP methods against the tool registry
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Produce the reply for a request; notifications are handled by `handle`
    async fn dispatch(&self, id: Option<RequestId>, method: &str, params: Value) -> McpResponse {
        match method {
            methods::INITIALIZE => {
                let result = InitializeResult::default();
                McpResponse::success(id, json!(result))
            }
            methods::PING => McpResponse::success(id, json!({})),
            methods::INITIALIZED => McpResponse::success(id, json!({})),
            methods::LIST_TOOLS => {
                let tools = self.registry.definitions();
                McpResponse::success(id, json!({ "tools": tools }))
            }
            methods::CALL_TOOL => self.call_tool(id, params).await,
            _ => McpResponse::error_with_data(
                id,
                codes::METHOD_NOT_FOUND,
                GatewayError::MethodNotFound(method.to_string()).to_string(),
                json!({ "supportedMethods": methods::SUPPORTED }),
            ),
        }
    }

    async fn call_tool(&self, id: Option<RequestId>, params: Value) -> McpResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return McpResponse::from_error(
                id,
                GatewayError::InvalidParams("missing tool name".to_string()),
            );
        };

        let Some(operation) = self.registry.get(name) else {
            return McpResponse::error_with_data(
                id,
                codes::METHOD_NOT_FOUND,
                GatewayError::MethodNotFound(format!("unknown tool '{}'", name)).to_string(),
                json!({ "availableTools": self.registry.names() }),
            );
        };

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let tool_result = match operation.execute(arguments).await {
            Ok(value) => ToolCallResult::json(&value),
            Err(e) => {
                tracing::info!(tool = name, error = %e, "Tool execution failed");
                ToolCallResult::error(format!("Error: {}", e))
            }
        };
        McpResponse::success(id, json!(tool_result))
    }
}

#[async_trait]
impl McpHandler for Dispatcher {
    async fn handle(&self, message: InboundMessage) -> Option<McpResponse> {
        let InboundMessage { id, method, params } = message;

        if id.is_none() {
            // Notification, no response even on failure
            let response = self.dispatch(None, &method, params).await;
            if let Some(error) = response.error {
                tracing::debug!(method = %method, error = %error.message, "Notification failed");
            }
            return None;
        }

        Some(self.dispatch(id, &method, params).await)
    }
}
