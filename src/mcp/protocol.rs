//! MCP JSON-RPC protocol types and envelope validation

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::GatewayError;

/// The only JSON-RPC version accepted on either transport
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision reported by `initialize`
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Correlation id of a JSON-RPC request.
///
/// Only strings and integers are accepted; anything else is an invalid request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    /// Interpret a raw JSON id. Returns `None` for null and unsupported types.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RequestId::Number),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<i32> for RequestId {
    fn from(value: i32) -> Self {
        RequestId::Number(i64::from(value))
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        RequestId::String(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

/// A validated inbound request or notification
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// `None` marks a notification
    pub id: Option<RequestId>,
    pub method: String,
    /// Always a JSON object; absent params are normalized to `{}`
    pub params: Value,
}

impl InboundMessage {
    /// Build a request carrying a correlation id
    pub fn request(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Some(id.into()),
            method: method.into(),
            params: normalize_params(params),
        }
    }

    /// Build a notification (no reply expected)
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params: normalize_params(params),
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Validate a raw JSON envelope.
    ///
    /// Checks run in wire order: `jsonrpc`, then `method`, then `id`, then `params`.
    /// The rejection echoes the id whenever it could be read.
    pub fn parse(value: Value) -> std::result::Result<Self, Rejection> {
        let Value::Object(mut envelope) = value else {
            return Err(Rejection::new(
                None,
                GatewayError::InvalidRequest("expected a JSON object".to_string()),
            ));
        };

        let raw_id = envelope.remove("id").unwrap_or(Value::Null);
        let id = RequestId::from_value(&raw_id);

        match envelope.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            other => {
                let received = other.cloned().unwrap_or(Value::Null);
                return Err(Rejection::new(
                    id,
                    GatewayError::InvalidRequest("missing or invalid jsonrpc field".to_string()),
                )
                .with_data(json!({
                    "expected": JSONRPC_VERSION,
                    "received": received,
                })));
            }
        }

        let method = match envelope.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => {
                return Err(Rejection::new(
                    id,
                    GatewayError::InvalidRequest("method must be a string".to_string()),
                ))
            }
            None => {
                return Err(Rejection::new(
                    id,
                    GatewayError::InvalidRequest("missing method field".to_string()),
                ))
            }
        };

        if id.is_none() && !raw_id.is_null() {
            return Err(Rejection::new(
                None,
                GatewayError::InvalidRequest("id must be a string or an integer".to_string()),
            ));
        }

        let params = match envelope.remove("params") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(params @ Value::Object(_)) => params,
            Some(_) => {
                return Err(Rejection::new(
                    id,
                    GatewayError::InvalidRequest("params must be an object".to_string()),
                ))
            }
        };

        Ok(Self { id, method, params })
    }
}

fn normalize_params(params: Value) -> Value {
    if params.is_null() {
        Value::Object(Map::new())
    } else {
        params
    }
}

/// An envelope refused before it reached the dispatcher
#[derive(Debug)]
pub struct Rejection {
    pub id: Option<RequestId>,
    pub error: GatewayError,
    pub data: Option<Value>,
}

impl Rejection {
    pub fn new(id: Option<RequestId>, error: GatewayError) -> Self {
        Self {
            id,
            error,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Render the rejection as an outbound error envelope
    pub fn into_response(self) -> McpResponse {
        let mut response = McpResponse::from_error(self.id, self.error);
        if let (Some(error), Some(data)) = (response.error.as_mut(), self.data) {
            error.data = Some(data);
        }
        response
    }
}

/// MCP JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    /// Serialized as `null` when the request id could not be determined
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

/// MCP error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpResponse {
    /// Create a success response
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<RequestId>, code: i64, message: String) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message,
                data: None,
            }),
        }
    }

    /// Create an error response with a `data` payload
    pub fn error_with_data(id: Option<RequestId>, code: i64, message: String, data: Value) -> Self {
        let mut response = Self::error(id, code, message);
        if let Some(error) = response.error.as_mut() {
            error.data = Some(data);
        }
        response
    }

    /// Create error from GatewayError
    pub fn from_error(id: Option<RequestId>, err: GatewayError) -> Self {
        Self::error(id, err.code(), err.to_string())
    }
}

/// Standard MCP methods
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const LIST_TOOLS: &str = "tools/list";
    pub const CALL_TOOL: &str = "tools/call";

    /// Methods the dispatcher answers
    pub const SUPPORTED: &[&str] = &[INITIALIZE, INITIALIZED, PING, LIST_TOOLS, CALL_TOOL];
}

/// MCP tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// MCP initialize result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Server capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for InitializeResult {
    fn default() -> Self {
        Self {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: crate::SERVICE_NAME.to_string(),
                version: crate::VERSION.to_string(),
            },
        }
    }
}

/// Tool call result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolCallResult {
    /// Create a text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// Create a JSON result
    pub fn json(value: &impl Serialize) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_default();
        Self::text(text)
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_request() {
        let msg = InboundMessage::parse(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/list"
        }))
        .unwrap();
        assert_eq!(msg.id, Some(RequestId::Number(7)));
        assert_eq!(msg.method, "tools/list");
        assert_eq!(msg.params, json!({}));
        assert!(!msg.is_notification());
    }

    #[test]
    fn test_parse_notification_null_id() {
        let msg = InboundMessage::parse(json!({
            "jsonrpc": "2.0",
            "id": null,
            "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(msg.is_notification());
    }

    #[test]
    fn test_parse_rejects_wrong_version_and_echoes_id() {
        let rejection = InboundMessage::parse(json!({
            "jsonrpc": "1.0",
            "id": "abc",
            "method": "x"
        }))
        .unwrap_err();
        assert_eq!(rejection.id, Some(RequestId::String("abc".into())));
        assert_eq!(rejection.error.code(), -32600);

        let response = rejection.into_response();
        let error = response.error.unwrap();
        assert_eq!(
            error.message,
            "Invalid Request: missing or invalid jsonrpc field"
        );
        assert_eq!(error.data.unwrap()["received"], "1.0");
    }

    #[test]
    fn test_parse_rejects_missing_method() {
        let rejection = InboundMessage::parse(json!({"jsonrpc": "2.0", "id": 1})).unwrap_err();
        assert_eq!(rejection.id, Some(RequestId::Number(1)));
        assert!(rejection.error.to_string().contains("missing method field"));
    }

    #[test]
    fn test_parse_rejects_unsupported_id_types() {
        for id in [json!(1.5), json!(true), json!({"a": 1}), json!([1])] {
            let rejection = InboundMessage::parse(json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "ping"
            }))
            .unwrap_err();
            assert_eq!(rejection.id, None);
            assert_eq!(rejection.error.code(), -32600);
        }
    }

    #[test]
    fn test_parse_rejects_non_object_params() {
        let rejection = InboundMessage::parse(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": "nope"
        }))
        .unwrap_err();
        assert_eq!(rejection.error.code(), -32600);
    }

    #[test]
    fn test_error_response_serializes_null_id() {
        let response = McpResponse::error(None, -32700, "Parse error".into());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_request_id_roundtrip_shape() {
        let response = McpResponse::success(Some(RequestId::from("req-1")), json!({}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], "req-1");

        let response = McpResponse::success(Some(RequestId::from(42)), json!({}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], 42);
    }

    #[test]
    fn test_tool_call_result_error_flag() {
        let value = serde_json::to_value(ToolCallResult::error("boom")).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "boom");

        let value = serde_json::to_value(ToolCallResult::text("ok")).unwrap();
        assert!(value.get("isError").is_none());
    }
}
