use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::backend::ToolBackend;
use crate::error::{RelayError, Result};
use crate::schema::parse_input_schema;
use crate::types::{ToolDescriptor, ToolSpec};

/// Every tool the relay can call, keyed by name. Read-only after discovery.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<ToolDescriptor>>,
}

impl ToolRegistry {
    /// Ask every backend for its tools. Any unreachable backend, malformed
    /// schema or duplicate name fails the whole discovery.
    #[tracing::instrument(skip(backends), fields(backends = backends.len()))]
    pub async fn discover(
        backends: &[Arc<dyn ToolBackend>],
        timeout: Duration,
    ) -> Result<Self> {
        let mut tools: BTreeMap<String, Arc<ToolDescriptor>> = BTreeMap::new();

        for backend in backends {
            let listed = tokio::time::timeout(timeout, backend.list_tools())
                .await
                .map_err(|_| {
                    RelayError::Discovery(format!(
                        "backend '{}' did not list tools within {:?}",
                        backend.name(),
                        timeout
                    ))
                })?
                .map_err(|e| {
                    RelayError::Discovery(format!("backend '{}': {}", backend.name(), e))
                })?;

            for info in listed {
                if info.name.trim().is_empty() {
                    return Err(RelayError::Discovery(format!(
                        "backend '{}' reported a tool with no name",
                        backend.name()
                    )));
                }

                // Tools that take no input may omit the schema entirely
                let input_schema = if info.input_schema.is_null() {
                    json!({"type": "object", "properties": {}})
                } else {
                    info.input_schema
                };

                let params = parse_input_schema(&input_schema).map_err(|e| {
                    RelayError::Discovery(format!(
                        "tool '{}' from backend '{}' has a malformed schema: {}",
                        info.name,
                        backend.name(),
                        e
                    ))
                })?;

                if let Some(existing) = tools.get(&info.name) {
                    return Err(RelayError::Discovery(format!(
                        "tool '{}' is provided by both '{}' and '{}'",
                        info.name,
                        existing.backend.name(),
                        backend.name()
                    )));
                }

                tracing::debug!(tool = %info.name, backend = %backend.name(), "Registered tool");
                tools.insert(
                    info.name.clone(),
                    Arc::new(ToolDescriptor {
                        name: info.name,
                        description: info.description,
                        params,
                        input_schema,
                        backend: Arc::clone(backend),
                    }),
                );
            }
        }

        tracing::info!(tools = tools.len(), "Tool discovery complete");
        Ok(Self { tools })
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<ToolDescriptor>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> BTreeSet<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<ToolDescriptor>> {
        self.tools.values()
    }

    /// Model-facing tool definitions, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|d| d.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
