//! Tool backends: anything that can list tools and run one.

pub mod http;
pub mod stdio;

pub use http::McpHttpBackend;
pub use stdio::McpStdioBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool information as reported by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Backend-side failure, before classification by the invoker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The tool ran and reported a failure. Not retried.
    #[error("{0}")]
    Domain(String),

    /// The backend could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with something that is not valid MCP.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The backend does not provide this tool.
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
}

/// A source of tools.
///
/// Implementations must be cheap to share; the registry hands out
/// `Arc<dyn ToolBackend>` to every descriptor the backend owns.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Backend name from configuration.
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, BackendError>;

    /// Run `tool` with already validated `arguments`.
    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, BackendError>;
}

pub(crate) const PROTOCOL_VERSION: &str = "2025-06-18";

pub(crate) fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "toolrelay",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Pull the `tools` array out of a `tools/list` response.
pub(crate) fn parse_tools_list(response: &Value) -> Result<Vec<ToolInfo>, BackendError> {
    if let Some(error) = response.get("error") {
        return Err(BackendError::Protocol(format!(
            "tools/list failed: {}",
            rpc_error_message(error)
        )));
    }

    let tools = response
        .get("result")
        .and_then(|r| r.get("tools"))
        .ok_or_else(|| BackendError::Protocol("Missing tools in response".into()))?;

    serde_json::from_value(tools.clone())
        .map_err(|e| BackendError::Protocol(format!("Failed to parse tools: {}", e)))
}

/// Turn a `tools/call` response into a payload or a classified failure.
///
/// Text content wins, then `structuredContent`, then the raw result.
pub(crate) fn parse_call_response(response: &Value) -> Result<Value, BackendError> {
    if let Some(error) = response.get("error") {
        return Err(BackendError::Domain(rpc_error_message(error)));
    }

    let result = response
        .get("result")
        .ok_or_else(|| BackendError::Protocol("Missing result in response".into()))?;

    let text = result
        .get("content")
        .and_then(|c| c.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|joined| !joined.is_empty());

    if result.get("isError").and_then(|e| e.as_bool()) == Some(true) {
        return Err(BackendError::Domain(
            text.unwrap_or_else(|| "Tool reported an error".to_string()),
        ));
    }

    if let Some(text) = text {
        return Ok(Value::String(text));
    }

    if let Some(structured) = result.get("structuredContent") {
        return Ok(structured.clone());
    }

    Ok(result.clone())
}

fn rpc_error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string()
}
