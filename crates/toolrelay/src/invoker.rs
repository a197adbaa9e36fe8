use std::sync::Arc;
use std::time::Duration;

use crate::backend::BackendError;
use crate::error::{ErrorKind, RelayError};
use crate::registry::ToolRegistry;
use crate::schema::validate_arguments;
use crate::types::{ToolCallRequest, ToolCallResult, ToolPayload};

/// Attempts per call when the backend is unavailable: the first try plus one retry.
const MAX_ATTEMPTS: u32 = 2;

/// Validates and dispatches tool calls against a registry.
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run one tool call. Never errors; every failure is a classified result.
    #[tracing::instrument(
        skip(self, request),
        fields(tool.name = %request.tool_name, timeout_ms = timeout.as_millis() as u64)
    )]
    pub async fn invoke(&self, request: &ToolCallRequest, timeout: Duration) -> ToolCallResult {
        let descriptor = match self.registry.lookup(&request.tool_name) {
            Ok(d) => d,
            Err(e) => return ToolCallResult::failure(ErrorKind::NotFound, e.to_string()),
        };

        let arguments = match validate_arguments(&descriptor.params, &request.arguments) {
            Ok(args) => serde_json::Value::Object(args),
            Err(message) => {
                let err = RelayError::Validation {
                    tool: descriptor.name.clone(),
                    message,
                };
                tracing::warn!(error = %err, "Rejected tool arguments");
                return ToolCallResult::failure(ErrorKind::Validation, err.to_string());
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            let outcome =
                tokio::time::timeout(timeout, descriptor.backend.call_tool(&descriptor.name, arguments.clone()))
                    .await;

            let error = match outcome {
                Ok(Ok(value)) => {
                    tracing::debug!(attempt, "Tool call succeeded");
                    return ToolCallResult::Success(ToolPayload::from(value));
                }
                Ok(Err(BackendError::Domain(message))) => {
                    tracing::info!(%message, "Tool reported a domain error");
                    return ToolCallResult::failure(ErrorKind::Domain, message);
                }
                Ok(Err(BackendError::UnknownTool(name))) => {
                    tracing::error!(tool = %name, "Backend does not serve a registered tool");
                    return ToolCallResult::failure(
                        ErrorKind::NotFound,
                        format!("Unknown tool '{}'", name),
                    );
                }
                Ok(Err(e @ (BackendError::Transport(_) | BackendError::Protocol(_)))) => e.to_string(),
                Err(_) => format!("Tool '{}' timed out after {:?}", descriptor.name, timeout),
            };

            if attempt >= MAX_ATTEMPTS {
                tracing::warn!(attempt, %error, "Backend unavailable, giving up");
                return ToolCallResult::failure(ErrorKind::BackendUnavailable, error);
            }
            tracing::warn!(attempt, %error, "Backend unavailable, retrying once");
        }
    }
}
