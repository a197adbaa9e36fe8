//! Wiring from `RelayConfig` to a ready dispatcher.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relayconf::{BackendConfig, BackendTransport, RelayConfig};

use crate::backend::{McpHttpBackend, McpStdioBackend, ToolBackend};
use crate::builtin::BuiltinBackend;
use crate::dispatcher::{DispatchSettings, QueryDispatcher};
use crate::invoker::ToolInvoker;
use crate::provider::{ModelService, OpenAiProvider};
use crate::registry::ToolRegistry;
use crate::routing::InstructionPolicy;

/// A discovered registry plus the dispatcher answering queries over it.
pub struct Relay {
    registry: Arc<ToolRegistry>,
    dispatcher: QueryDispatcher,
}

impl Relay {
    /// Discover tools and connect to the configured model service.
    pub async fn from_config(config: &RelayConfig) -> Result<Self> {
        let model = OpenAiProvider::new(&config.model).context("Failed to create model client")?;
        Self::with_model(config, Arc::new(model)).await
    }

    /// Same as `from_config` with a caller-supplied model service.
    pub async fn with_model(config: &RelayConfig, model: Arc<dyn ModelService>) -> Result<Self> {
        let registry = Arc::new(discover_tools(config).await?);

        let dispatcher = QueryDispatcher::new(
            model,
            ToolInvoker::new(Arc::clone(&registry)),
            InstructionPolicy::from_config(&config.routing),
            DispatchSettings::from_config(&config.agent),
        );

        Ok(Self {
            registry,
            dispatcher,
        })
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &QueryDispatcher {
        &self.dispatcher
    }

    pub async fn answer(&self, query: &str) -> String {
        self.dispatcher.answer(query).await
    }

    /// Answer queries one after another, in input order.
    pub async fn answer_all<S: AsRef<str>>(&self, queries: &[S]) -> Vec<String> {
        let mut answers = Vec::with_capacity(queries.len());
        for query in queries {
            answers.push(self.dispatcher.answer(query.as_ref()).await);
        }
        answers
    }
}

/// Build and query every configured backend.
pub async fn discover_tools(config: &RelayConfig) -> Result<ToolRegistry> {
    let backends = build_backends(config);
    let timeout = Duration::from_millis(config.agent.discovery_timeout_ms);
    ToolRegistry::discover(&backends, timeout)
        .await
        .context("Failed to discover tools")
}

pub fn build_backends(config: &RelayConfig) -> Vec<Arc<dyn ToolBackend>> {
    config
        .backends
        .iter()
        .map(|backend| build_backend(backend, config))
        .collect()
}

fn build_backend(backend: &BackendConfig, config: &RelayConfig) -> Arc<dyn ToolBackend> {
    tracing::debug!(
        backend = %backend.name,
        transport = %backend.transport.describe(),
        "Configuring backend"
    );

    match &backend.transport {
        BackendTransport::Builtin { toolkit } => {
            Arc::new(BuiltinBackend::new(&backend.name, *toolkit, config))
        }
        BackendTransport::Stdio { command, args, env } => Arc::new(McpStdioBackend::new(
            &backend.name,
            command,
            args.clone(),
            env.clone(),
        )),
        BackendTransport::Http { url } => Arc::new(McpHttpBackend::new(&backend.name, url)),
    }
}
