//! Newline-delimited JSON-RPC 2.0 over stdio. One request per line in, one
//! response per line out; logs go to stderr so stdout stays clean for the
//! protocol.

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::tools::ToolRegistry;
use crate::{SERVER_NAME, SERVER_VERSION};

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

pub struct McpServer {
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Serve until stdin closes or we get a shutdown signal.
    pub async fn run(&self) -> Result<()> {
        let stdin = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        let mut lines = stdin.lines();

        info!(server = SERVER_NAME, version = SERVER_VERSION, "serving on stdio");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("stdin closed, shutting down");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Some(response) = self.handle_line(&line).await {
                        let mut payload = serde_json::to_vec(&response)?;
                        payload.push(b'\n');
                        stdout.write_all(&payload).await?;
                        stdout.flush().await?;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Returns `None` for notifications (no `id`), which get no response.
    async fn handle_line(&self, line: &str) -> Option<Value> {
        let request: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                return Some(error_response(
                    Value::Null,
                    PARSE_ERROR,
                    &format!("parse error: {e}"),
                ));
            }
        };

        let id = request.get("id").cloned();
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        debug!(method = %method, "request");

        let result = match method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION,
                },
                "capabilities": {
                    "tools": {},
                },
            })),
            "tools/list" => Ok(json!({"tools": self.registry.tool_list()})),
            "tools/call" => self.handle_tool_call(&request).await,
            "ping" => Ok(json!({})),
            other => Err((METHOD_NOT_FOUND, format!("method not found: {other}"))),
        };

        // Notifications never get a response, success or failure.
        let id = id?;
        Some(match result {
            Ok(value) => json!({"jsonrpc": "2.0", "id": id, "result": value}),
            Err((code, message)) => error_response(id, code, &message),
        })
    }

    async fn handle_tool_call(&self, request: &Value) -> std::result::Result<Value, (i64, String)> {
        let params = request.get("params").unwrap_or(&Value::Null);
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| (INVALID_PARAMS, "missing tool name".to_string()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let outcome = self.registry.handle(name, &arguments).await;
        let is_error = outcome.get("error").is_some();
        let text = serde_json::to_string_pretty(&outcome)
            .unwrap_or_else(|_| outcome.to_string());

        Ok(json!({
            "content": [{"type": "text", "text": text}],
            "isError": is_error,
        }))
    }
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
}
