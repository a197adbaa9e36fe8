//! Layered configuration loading for the tool relay.
//!
//! The relay needs to know three things at startup: where the model service
//! lives, which tool backends to discover, and how patient to be with each of
//! them. Everything else is derived at runtime.
//!
//! # Usage
//!
//! ```rust,no_run
//! use relayconf::RelayConfig;
//!
//! let config = RelayConfig::load().expect("Failed to load config");
//!
//! println!("Model: {} at {}", config.model.model, config.model.base_url);
//! for backend in &config.backends {
//!     println!("Backend {}: {}", backend.name, backend.transport.describe());
//! }
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/toolrelay/config.toml` (system)
//! 2. `~/.config/toolrelay/config.toml` (user)
//! 3. `./toolrelay.toml` (local override, or the `--config` path)
//! 4. Environment variables (`TOOLRELAY_*`, `GROQ_API_KEY`, `WEATHER_API_KEY`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [model]
//! base_url = "https://api.groq.com/openai/v1"
//! model = "llama-3.3-70b-versatile"
//! temperature = 0.0
//!
//! [agent]
//! max_turns = 8
//! tool_timeout_ms = 15000
//!
//! [routing]
//! forced = true
//!
//! [[backends]]
//! name = "math"
//! transport = "stdio"
//! command = "python"
//! args = ["mathserver.py"]
//!
//! [[backends]]
//! name = "weather"
//! transport = "http"
//! url = "http://localhost:8000/mcp"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{
    AgentConfig, BackendConfig, BackendTransport, ModelConfig, RoutingConfig, SearchConfig,
    TelemetryConfig, Toolkit, WeatherConfig,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// OpenAI-compatible model service.
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent loop budgets and timeouts.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Deterministic routing policy.
    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Credentials and endpoint for the builtin weather toolkit.
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Endpoint for the builtin search toolkit.
    #[serde(default)]
    pub search: SearchConfig,

    /// Tool backends queried at discovery time.
    #[serde(default = "sections::default_backends")]
    pub backends: Vec<BackendConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            agent: AgentConfig::default(),
            routing: RoutingConfig::default(),
            telemetry: TelemetryConfig::default(),
            weather: WeatherConfig::default(),
            search: SearchConfig::default(),
            backends: sections::default_backends(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/toolrelay/config.toml`
    /// 3. `~/.config/toolrelay/config.toml`
    /// 4. `./toolrelay.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./toolrelay.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::FileRead {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                });
            }
        }

        let mut sources = ConfigSources::default();
        let mut config = RelayConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Reject configurations that cannot produce a usable registry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_turns == 0 {
            return Err(ConfigError::Invalid("agent.max_turns must be at least 1".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if backend.name.trim().is_empty() {
                return Err(ConfigError::Invalid("backend with empty name".into()));
            }
            if !seen.insert(backend.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate backend name '{}'",
                    backend.name
                )));
            }
        }

        Ok(())
    }

    /// Serialize config to TOML string. Secrets are never written out.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# Tool Relay Configuration\n\n");

        output.push_str("[model]\n");
        output.push_str(&format!("base_url = \"{}\"\n", self.model.base_url));
        output.push_str(&format!("model = \"{}\"\n", self.model.model));
        output.push_str(&format!("temperature = {:?}\n", self.model.temperature));
        output.push_str(&format!("max_tokens = {}\n", self.model.max_tokens));
        output.push_str(&format!("timeout_ms = {}\n", self.model.timeout_ms));
        if self.model.api_key.is_some() {
            output.push_str("# api_key is set\n");
        }

        output.push_str("\n[agent]\n");
        output.push_str(&format!("max_turns = {}\n", self.agent.max_turns));
        output.push_str(&format!("tool_timeout_ms = {}\n", self.agent.tool_timeout_ms));
        output.push_str(&format!(
            "forced_tool_timeout_ms = {}\n",
            self.agent.forced_tool_timeout_ms
        ));
        output.push_str(&format!(
            "discovery_timeout_ms = {}\n",
            self.agent.discovery_timeout_ms
        ));
        output.push_str(&format!(
            "summary_max_words = {}\n",
            self.agent.summary_max_words
        ));

        output.push_str("\n[routing]\n");
        output.push_str(&format!("forced = {}\n", self.routing.forced));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output.push_str("\n[weather]\n");
        output.push_str(&format!("base_url = \"{}\"\n", self.weather.base_url));
        output.push_str(&format!("timeout_ms = {}\n", self.weather.timeout_ms));
        if self.weather.api_key.is_some() {
            output.push_str("# api_key is set\n");
        }

        output.push_str("\n[search]\n");
        output.push_str(&format!("base_url = \"{}\"\n", self.search.base_url));
        output.push_str(&format!("timeout_ms = {}\n", self.search.timeout_ms));

        for backend in &self.backends {
            output.push_str("\n[[backends]]\n");
            output.push_str(&format!("name = \"{}\"\n", backend.name));
            match &backend.transport {
                BackendTransport::Builtin { toolkit } => {
                    output.push_str("transport = \"builtin\"\n");
                    output.push_str(&format!("toolkit = \"{}\"\n", toolkit.as_str()));
                }
                BackendTransport::Stdio { command, args, env } => {
                    output.push_str("transport = \"stdio\"\n");
                    output.push_str(&format!("command = \"{}\"\n", command));
                    let quoted: Vec<String> = args.iter().map(|a| format!("\"{}\"", a)).collect();
                    output.push_str(&format!("args = [{}]\n", quoted.join(", ")));
                    if !env.is_empty() {
                        let pairs: Vec<String> =
                            env.keys().map(|k| format!("{} = \"…\"", k)).collect();
                        output.push_str(&format!("# env: {}\n", pairs.join(", ")));
                    }
                }
                BackendTransport::Http { url } => {
                    output.push_str("transport = \"http\"\n");
                    output.push_str(&format!("url = \"{}\"\n", url));
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.model.model, "llama-3.3-70b-versatile");
        assert_eq!(config.agent.max_turns, 8);
        assert!(config.routing.forced);
        let names: Vec<_> = config.backends.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["math", "weather"]);
    }

    #[test]
    fn test_to_toml() {
        let config = RelayConfig::default();
        let toml = config.to_toml();
        assert!(toml.contains("[model]"));
        assert!(toml.contains("[agent]"));
        assert!(toml.contains("[[backends]]"));
        assert!(toml.contains("toolkit = \"math\""));
    }

    #[test]
    fn test_to_toml_hides_secrets() {
        let mut config = RelayConfig::default();
        config.model.api_key = Some("gsk_secret".to_string());
        config.weather.api_key = Some("wx_secret".to_string());
        let toml = config.to_toml();
        assert!(!toml.contains("gsk_secret"));
        assert!(!toml.contains("wx_secret"));
        assert!(toml.contains("# api_key is set"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let config = RelayConfig::default();
        let parsed: RelayConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.backends, config.backends);
        assert_eq!(parsed.agent, config.agent);
    }

    #[test]
    fn test_validate_rejects_duplicate_backends() {
        let mut config = RelayConfig::default();
        config.backends.push(config.backends[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_turns() {
        let mut config = RelayConfig::default();
        config.agent.max_turns = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_cli_path_is_an_error() {
        let result = RelayConfig::load_from(Some(std::path::Path::new("/nonexistent/relay.toml")));
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }
}
