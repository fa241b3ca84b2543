//! Minimal MCP client over stdio (JSON-RPC 2.0, one message per line).
//!
//! Only what the live smoke test needs: spawn, `initialize`,
//! `notifications/initialized`, `tools/list`.

use crate::error::{Error, Result};
use crate::probe::ServerConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    #[serde(default)]
    pub capabilities: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<ToolInfo>,
}

pub struct McpClient {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Spawn the server described by `config` and complete the handshake.
    pub async fn connect(config: &ServerConfig) -> Result<Self> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::mcp(format!("failed to spawn '{}': {e}", config.command)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::mcp("child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::mcp("child stdout unavailable"))?;

        let mut client = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            server_info: None,
        };
        client.initialize().await?;
        Ok(client)
    }

    async fn initialize(&mut self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": "topic-scout",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {},
        });
        let result: InitializeResult = self.request("initialize", Some(params)).await?;
        self.notify("notifications/initialized").await?;

        debug!(
            server = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP session initialized"
        );
        self.server_info = Some(result.server_info);
        Ok(())
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub async fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
        let result: ToolsListResult = self.request("tools/list", None).await?;
        Ok(result.tools)
    }

    /// Close stdin and stop the server process.
    pub async fn shutdown(mut self) {
        let _ = self.stdin.shutdown().await;
        let _ = self.child.kill().await;
    }

    async fn request<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let line = serde_json::to_string(&request)
            .map_err(|e| Error::parse(format!("serialize {method}: {e}")))?;
        self.write_line(&line).await?;

        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(Error::mcp(format!(
                    "server closed connection during {method}"
                )));
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response: JsonRpcResponse = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(_) => {
                    // npx prints install chatter before the protocol starts
                    debug!(line = trimmed, "skipping non-JSON-RPC output");
                    continue;
                }
            };
            if response.id != Some(id) {
                continue;
            }
            if let Some(err) = response.error {
                return Err(Error::mcp(format!(
                    "{method} failed: code={}, message={}",
                    err.code, err.message
                )));
            }
            let result = response
                .result
                .ok_or_else(|| Error::mcp(format!("{method}: missing result")))?;
            return serde_json::from_value(result)
                .map_err(|e| Error::parse(format!("{method} result: {e}")));
        }
    }

    async fn notify(&mut self, method: &str) -> Result<()> {
        let line = json!({ "jsonrpc": "2.0", "method": method }).to_string();
        self.write_line(&line).await
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization_omits_missing_params() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "tools/list",
            params: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"method\":\"tools/list\""));
        assert!(json.contains("\"id\":7"));
        assert!(!json.contains("params"));
    }

    #[test]
    fn error_response_parses() {
        let json = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, Some(1));
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[test]
    fn tools_list_tolerates_missing_descriptions() {
        let value = json!({"tools": [{"name": "brave_search"}, {"name": "image_creation_openai", "description": "Create an image"}]});
        let parsed: ToolsListResult = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.tools.len(), 2);
        assert!(parsed.tools[0].description.is_none());
    }
}
