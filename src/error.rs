//! Error types for the Purelymail MCP gateway

use std::time::Duration;

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// JSON-RPC error codes used on the wire
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const SERVER_ERROR: i64 = -32000;
    pub const REQUEST_TIMEOUT: i64 = -32001;
}

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Purelymail API error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Get error code for the JSON-RPC envelope
    pub fn code(&self) -> i64 {
        match self {
            GatewayError::Parse(_) => codes::PARSE_ERROR,
            GatewayError::InvalidRequest(_) => codes::INVALID_REQUEST,
            GatewayError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            GatewayError::InvalidParams(_) => codes::INVALID_PARAMS,
            GatewayError::Internal(_) => codes::INTERNAL_ERROR,
            GatewayError::Timeout(_) => codes::REQUEST_TIMEOUT,
            _ => codes::SERVER_ERROR,
        }
    }

    /// HTTP status used when the error is returned directly by the HTTP transport
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::Parse(_)
            | GatewayError::InvalidRequest(_)
            | GatewayError::InvalidParams(_) => 400,
            GatewayError::MethodNotFound(_) => 404,
            GatewayError::Timeout(_) => 504,
            GatewayError::Upstream { .. } | GatewayError::Http(_) => 502,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_codes() {
        assert_eq!(GatewayError::Parse("x".into()).code(), -32700);
        assert_eq!(GatewayError::InvalidRequest("x".into()).code(), -32600);
        assert_eq!(GatewayError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(GatewayError::InvalidParams("x".into()).code(), -32602);
        assert_eq!(GatewayError::Internal("x".into()).code(), -32603);
        assert_eq!(GatewayError::Timeout(Duration::from_secs(30)).code(), -32001);
    }

    #[test]
    fn test_http_status() {
        assert_eq!(GatewayError::InvalidRequest("x".into()).http_status(), 400);
        assert_eq!(GatewayError::Internal("x".into()).http_status(), 500);
        assert_eq!(GatewayError::Timeout(Duration::from_secs(30)).http_status(), 504);
    }

    #[test]
    fn test_timeout_message_keeps_subsecond_precision() {
        let err = GatewayError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Request timeout after 250ms");
    }
}
