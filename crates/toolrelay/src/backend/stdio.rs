//! MCP over a child process's stdin/stdout, one JSON message per line.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::{
    initialize_params, parse_call_response, parse_tools_list, BackendError, ToolBackend, ToolInfo,
};

/// Live child process, killed on drop.
struct StdioSession {
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

pub struct McpStdioBackend {
    name: String,
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    session: Mutex<Option<StdioSession>>,
    request_id: AtomicU64,
}

impl McpStdioBackend {
    pub fn new(name: &str, command: &str, args: Vec<String>, env: BTreeMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            args,
            env,
            session: Mutex::new(None),
            request_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn spawn(&self) -> Result<StdioSession, BackendError> {
        let program = relayconf::loader::expand_path(&self.command);
        let mut child = Command::new(&program)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackendError::Transport(format!("Failed to spawn '{}': {}", self.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::Transport("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Transport("child stdout unavailable".into()))?;

        Ok(StdioSession {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Send one request and wait for the response with the same id.
    ///
    /// The session is held outside the slot for the whole exchange. If the
    /// exchange is cancelled (a caller's timeout) or fails in transport, the
    /// child is dropped and killed, and the next request spawns a new one.
    async fn request(&self, method: &str, params: Value) -> Result<Value, BackendError> {
        let mut guard = self.session.lock().await;

        let mut session = match guard.take() {
            Some(session) => session,
            None => {
                let mut session = self.spawn()?;
                self.handshake(&mut session).await?;
                tracing::debug!(backend = %self.name, "MCP stdio session initialized");
                session
            }
        };

        let id = self.next_id();
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        let result = exchange(&mut session, &request, id).await;
        if !matches!(result, Err(BackendError::Transport(_))) {
            *guard = Some(session);
        }
        result
    }

    async fn handshake(&self, session: &mut StdioSession) -> Result<(), BackendError> {
        let id = self.next_id();
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "initialize",
            "params": initialize_params()
        });

        let response = exchange(session, &request, id).await?;
        if let Some(error) = response.get("error") {
            return Err(BackendError::Protocol(format!("initialize failed: {}", error)));
        }

        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        });
        write_line(session, &notification).await
    }
}

async fn write_line(session: &mut StdioSession, message: &Value) -> Result<(), BackendError> {
    let mut line = serde_json::to_string(message)
        .map_err(|e| BackendError::Protocol(format!("Failed to encode request: {}", e)))?;
    line.push('\n');

    session
        .stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| BackendError::Transport(format!("Failed to write to server: {}", e)))?;
    session
        .stdin
        .flush()
        .await
        .map_err(|e| BackendError::Transport(format!("Failed to flush server stdin: {}", e)))
}

/// Write `request` and read lines until the matching response arrives.
/// Server notifications and non-JSON lines are skipped.
async fn exchange(
    session: &mut StdioSession,
    request: &Value,
    id: u64,
) -> Result<Value, BackendError> {
    write_line(session, request).await?;

    let mut line = String::new();
    loop {
        line.clear();
        let read = session
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to read from server: {}", e)))?;
        if read == 0 {
            return Err(BackendError::Transport("server closed stdout".into()));
        }

        let Ok(message) = serde_json::from_str::<Value>(line.trim()) else {
            tracing::trace!(line = %line.trim(), "Skipping non-JSON line");
            continue;
        };

        if message.get("id").and_then(|v| v.as_u64()) == Some(id) {
            return Ok(message);
        }
    }
}

#[async_trait]
impl ToolBackend for McpStdioBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self), fields(backend = %self.name))]
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, BackendError> {
        let response = self.request("tools/list", serde_json::json!({})).await?;
        parse_tools_list(&response)
    }

    #[tracing::instrument(skip(self, arguments), fields(backend = %self.name, tool.name = %tool))]
    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, BackendError> {
        let response = self
            .request(
                "tools/call",
                serde_json::json!({ "name": tool, "arguments": arguments }),
            )
            .await?;
        parse_call_response(&response)
    }
}
