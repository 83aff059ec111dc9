//! MCP (Model Context Protocol) server implementation
//!
//! JSON-RPC envelopes, tool registry, dispatch, and the request correlator
//! used by the HTTP transport.

pub mod correlator;
pub mod dispatcher;
pub mod protocol;
pub mod tools;

pub use correlator::{Correlator, SubmitOutcome, DEFAULT_REQUEST_TIMEOUT};
pub use dispatcher::{spawn_handler, Dispatcher, McpHandler};
pub use protocol::{
    methods, InboundMessage, InitializeResult, McpError, McpResponse, Rejection, RequestId,
    ToolCallResult, ToolDefinition,
};
pub use tools::{purelymail_registry, Operation, ToolExecutor, ToolRegistry, TOOL_DEFINITIONS};
