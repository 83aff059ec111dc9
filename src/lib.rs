//! Purelymail MCP - email hosting tools for AI agents
//!
//! Exposes the Purelymail API as MCP tools over stdio or HTTP.

pub mod config;
pub mod error;
pub mod integrations;
pub mod mcp;
pub mod transport;

pub use error::{GatewayError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name reported in `initialize` and the health check
pub const SERVICE_NAME: &str = "purelymail-mcp";
