//! Line-delimited JSON-RPC 2.0 over stdio. Tool failures are returned as
//! tool results with the is-error flag set, never as JSON-RPC-level errors,
//! so agent logs keep the full trace.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use adt_rs::Engine;

use crate::catalog::Tool;
use crate::handlers;

/// JSON-RPC 2.0 request (or notification when `id` is absent).
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: String) -> Self {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// The MCP server: one engine, one tool catalog.
pub struct McpServer {
    engine: Arc<Engine>,
    tools: Vec<Tool>,
}

impl McpServer {
    pub fn new(engine: Arc<Engine>, tools: Vec<Tool>) -> McpServer {
        McpServer { engine, tools }
    }

    /// Serve until stdin closes. Stdout carries only JSON-RPC responses;
    /// logs go to stderr.
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        info!(tool_count = self.tools.len(), "MCP server serving on stdio");
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                stdout.write_all(response.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
        info!("stdin closed, MCP server shutting down");
        Ok(())
    }

    /// Process one line; `None` means a notification (no response).
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await?,
            Err(err) => {
                error!(error = %err, "unparseable JSON-RPC message");
                JsonRpcResponse::error(Value::Null, -32700, format!("Parse error: {err}"))
            }
        };
        Some(serde_json::to_string(&response).expect("response serialization"))
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id?;
        debug!(method = %request.method, "JSON-RPC request");
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {
                        "name": "adt-mcp",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                let definitions: Vec<Value> = self.tools.iter().map(Tool::definition).collect();
                JsonRpcResponse::success(id, json!({"tools": definitions}))
            }
            "tools/call" => self.handle_tool_call(id, request.params).await,
            other => JsonRpcResponse::error(id, -32601, format!("Method not found: {other}")),
        };
        Some(response)
    }

    async fn handle_tool_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(err) => {
                return JsonRpcResponse::error(id, -32602, format!("Invalid tool call params: {err}"))
            }
        };

        let Some(tool) = self.tools.iter().find(|tool| tool.name == call.name) else {
            return JsonRpcResponse::error(id, -32602, format!("Unknown tool: {}", call.name));
        };

        info!(tool = %call.name, "tool call");
        let outcome = handlers::dispatch(&self.engine, tool, &call.arguments).await;
        if outcome.is_error {
            debug!(tool = %call.name, error = %outcome.text, "tool call failed");
        }

        let mut result = json!({
            "content": [{"type": "text", "text": outcome.text}],
        });
        if outcome.is_error {
            result["isError"] = json!(true);
        }
        JsonRpcResponse::success(id, result)
    }
}
