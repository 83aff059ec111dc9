//! stdio transport for the MCP server.
//!
//! - Messages are UTF-8 encoded JSON-RPC, one per line
//! - Lines that are not valid JSON (or not UTF-8) get a parse error reply
//! - stdin: receives messages from the client
//! - stdout: sends replies to the client
//! - stderr: logging only
//!
//! There is a single logical channel, so no correlation is needed: replies are
//! written in the order the dispatcher produces them, and notifications are
//! never answered.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::{GatewayError, Result};
use crate::mcp::dispatcher::CHANNEL_CAPACITY;
use crate::mcp::{spawn_handler, InboundMessage, McpHandler, McpResponse};

/// MCP server handling stdio communication
pub struct StdioServer {
    handler: Arc<dyn McpHandler>,
}

impl StdioServer {
    /// Create a new stdio server
    pub fn new(handler: Arc<dyn McpHandler>) -> Self {
        Self { handler }
    }

    /// Run the server, reading from stdin and writing to stdout until EOF
    pub async fn run(self) -> Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve one newline-delimited stream.
    ///
    /// Returns once the reader hits EOF and every in-flight reply is written.
    pub async fn serve<R, W>(self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, mut out_rx) = mpsc::channel::<McpResponse>(CHANNEL_CAPACITY);
        let inbound = spawn_handler(self.handler, out_tx.clone());

        let writer_task = tokio::spawn(async move {
            while let Some(response) = out_rx.recv().await {
                write_message(&mut writer, &response).await?;
            }
            Ok::<(), GatewayError>(())
        });

        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }

            // Invalid UTF-8 falls through to the parse error reply
            let trimmed = trim_line(&buf);
            if trimmed.is_empty() {
                continue;
            }

            let reply = match serde_json::from_slice::<Value>(trimmed) {
                Ok(raw) => match InboundMessage::parse(raw) {
                    Ok(message) => {
                        if inbound.send(message).await.is_err() {
                            tracing::error!("Dispatcher stopped accepting messages");
                            break;
                        }
                        None
                    }
                    Err(rejection) => Some(rejection.into_response()),
                },
                Err(e) => Some(McpResponse::from_error(
                    None,
                    GatewayError::Parse(e.to_string()),
                )),
            };

            if let Some(reply) = reply {
                if out_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }

        drop(inbound);
        drop(out_tx);

        writer_task
            .await
            .map_err(|e| GatewayError::Internal(format!("stdio writer task failed: {}", e)))?
    }
}

/// Strip surrounding ASCII whitespace, including the `\r\n` terminator
fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}

/// Write one message followed by a newline and flush
async fn write_message<W>(writer: &mut W, response: &McpResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)?;
    debug_assert!(
        !json.contains('\n'),
        "JSON message must not contain embedded newlines"
    );

    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
