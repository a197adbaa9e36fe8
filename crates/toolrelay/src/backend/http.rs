//! Streamable HTTP MCP backend.
//!
//! Every JSON-RPC message is a POST to one endpoint. Servers may answer with a
//! plain JSON body or with a short `text/event-stream` carrying the response
//! as a `data:` event; both are accepted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    initialize_params, parse_call_response, parse_tools_list, BackendError, ToolBackend, ToolInfo,
};

const SESSION_HEADER: &str = "Mcp-Session-Id";

pub struct McpHttpBackend {
    name: String,
    url: String,
    client: Client,
    session_id: RwLock<Option<String>>,
    initialized: RwLock<bool>,
    /// Set when the server rejected our session id; forces a new handshake.
    session_expired: AtomicBool,
    request_id: AtomicU64,
}

impl McpHttpBackend {
    pub fn new(name: &str, url: &str) -> Self {
        Self::with_client(name, url, Client::new())
    }

    pub fn with_client(name: &str, url: &str, client: Client) -> Self {
        Self {
            name: name.to_string(),
            url: url.trim_end_matches('/').to_string(),
            client,
            session_id: RwLock::new(None),
            initialized: RwLock::new(false),
            session_expired: AtomicBool::new(false),
            request_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn ensure_initialized(&self) -> Result<(), BackendError> {
        let mut initialized = self.initialized.write().await;
        if self.session_expired.swap(false, Ordering::AcqRel) {
            *initialized = false;
        }
        if *initialized {
            return Ok(());
        }

        self.initialize().await?;
        *initialized = true;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(mcp.url = %self.url))]
    async fn initialize(&self) -> Result<(), BackendError> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id(),
            "method": "initialize",
            "params": initialize_params()
        });

        let response = self.send_request(request).await?;
        if let Some(error) = response.get("error") {
            return Err(BackendError::Protocol(format!("initialize failed: {}", error)));
        }

        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        });
        self.send_notification(notification).await?;

        tracing::debug!(backend = %self.name, "MCP session initialized");
        Ok(())
    }

    /// POST a JSON-RPC request and decode the response body.
    async fn send_request(&self, request: Value) -> Result<Value, BackendError> {
        let mut req_builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream");

        let sent_session = self.session_id.read().await.clone();
        if let Some(session) = sent_session.as_deref() {
            req_builder = req_builder.header(SESSION_HEADER, session);
        }

        let response = req_builder
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to send MCP request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let rejected = status == reqwest::StatusCode::NOT_FOUND
                || status == reqwest::StatusCode::BAD_REQUEST;
            if rejected && sent_session.is_some() {
                tracing::info!(backend = %self.name, %status, "MCP session rejected, will re-initialize");
                *self.session_id.write().await = None;
                self.session_expired.store(true, Ordering::Release);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Transport(format!(
                "MCP request failed with status {}: {}",
                status, body
            )));
        }

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.write().await = Some(session.to_string());
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to read MCP response: {}", e)))?;

        if is_event_stream {
            parse_sse_result(&body)
                .ok_or_else(|| BackendError::Protocol("No JSON-RPC message in event stream".into()))
        } else {
            serde_json::from_str(&body)
                .map_err(|e| BackendError::Protocol(format!("Failed to parse MCP response: {}", e)))
        }
    }

    /// Send a notification (no response expected)
    async fn send_notification(&self, notification: Value) -> Result<(), BackendError> {
        let mut req_builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream");

        if let Some(session) = self.session_id.read().await.as_deref() {
            req_builder = req_builder.header(SESSION_HEADER, session);
        }

        let response = req_builder.json(&notification).send().await.map_err(|e| {
            BackendError::Transport(format!("Failed to send MCP notification: {}", e))
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::ACCEPTED && !status.is_success() {
            return Err(BackendError::Transport(format!(
                "MCP notification failed with status {}",
                status
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ToolBackend for McpHttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self), fields(backend = %self.name))]
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, BackendError> {
        self.ensure_initialized().await?;

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id(),
            "method": "tools/list",
            "params": {}
        });

        let response = self.send_request(request).await?;
        parse_tools_list(&response)
    }

    #[tracing::instrument(skip(self, arguments), fields(backend = %self.name, tool.name = %tool))]
    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, BackendError> {
        self.ensure_initialized().await?;

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id(),
            "method": "tools/call",
            "params": {
                "name": tool,
                "arguments": arguments
            }
        });

        let response = self.send_request(request).await?;
        parse_call_response(&response)
    }
}

/// Extract the JSON-RPC message from an SSE body. The last parseable
/// `data:` event wins.
pub fn parse_sse_result(body: &str) -> Option<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .last()
}
