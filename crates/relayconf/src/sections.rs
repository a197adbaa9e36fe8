//! Config sections. Every field has a compiled default so a missing file is
//! never an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OpenAI-compatible model service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL for the chat completions API.
    /// Default: https://api.groq.com/openai/v1
    #[serde(default = "ModelConfig::default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    /// Default: llama-3.3-70b-versatile
    #[serde(default = "ModelConfig::default_model")]
    pub model: String,

    /// API key. Usually supplied through `GROQ_API_KEY` rather than a file.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sampling temperature.
    /// Default: 0.0
    #[serde(default)]
    pub temperature: f32,

    /// Maximum completion tokens per request.
    /// Default: 1024
    #[serde(default = "ModelConfig::default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout.
    /// Default: 60000
    #[serde(default = "ModelConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ModelConfig {
    fn default_base_url() -> String {
        "https://api.groq.com/openai/v1".to_string()
    }

    fn default_model() -> String {
        "llama-3.3-70b-versatile".to_string()
    }

    fn default_max_tokens() -> u32 {
        1024
    }

    fn default_timeout_ms() -> u64 {
        60_000
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            api_key: None,
            temperature: 0.0,
            max_tokens: Self::default_max_tokens(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// Agent loop budgets and tool timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model turns allowed per query before giving up.
    /// Default: 8
    #[serde(default = "AgentConfig::default_max_turns")]
    pub max_turns: u32,

    /// Timeout for tool calls proposed by the model.
    /// Default: 15000
    #[serde(default = "AgentConfig::default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,

    /// Timeout for tools forced by the routing heuristic.
    /// Default: 30000
    #[serde(default = "AgentConfig::default_forced_tool_timeout_ms")]
    pub forced_tool_timeout_ms: u64,

    /// Timeout for one backend's tool listing.
    /// Default: 10000
    #[serde(default = "AgentConfig::default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    /// Word cap applied to search summaries.
    /// Default: 180
    #[serde(default = "AgentConfig::default_summary_max_words")]
    pub summary_max_words: usize,
}

impl AgentConfig {
    fn default_max_turns() -> u32 {
        8
    }

    fn default_tool_timeout_ms() -> u64 {
        15_000
    }

    fn default_forced_tool_timeout_ms() -> u64 {
        30_000
    }

    fn default_discovery_timeout_ms() -> u64 {
        10_000
    }

    fn default_summary_max_words() -> usize {
        180
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: Self::default_max_turns(),
            tool_timeout_ms: Self::default_tool_timeout_ms(),
            forced_tool_timeout_ms: Self::default_forced_tool_timeout_ms(),
            discovery_timeout_ms: Self::default_discovery_timeout_ms(),
            summary_max_words: Self::default_summary_max_words(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Force weather and search tools when the query matches their pattern.
    /// Default: true
    #[serde(default = "default_true")]
    pub forced: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { forced: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// WeatherAPI.com access for the builtin weather toolkit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Usually supplied through `WEATHER_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default: http://api.weatherapi.com/v1
    #[serde(default = "WeatherConfig::default_base_url")]
    pub base_url: String,

    /// Default: 8000
    #[serde(default = "WeatherConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl WeatherConfig {
    fn default_base_url() -> String {
        "http://api.weatherapi.com/v1".to_string()
    }

    fn default_timeout_ms() -> u64 {
        8_000
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// Web search endpoints for the builtin search toolkit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// DuckDuckGo HTML results endpoint.
    /// Default: https://html.duckduckgo.com/html/
    #[serde(default = "SearchConfig::default_base_url")]
    pub base_url: String,

    /// Timeout for the results page and for each fetched page.
    /// Default: 8000
    #[serde(default = "SearchConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SearchConfig {
    fn default_base_url() -> String {
        "https://html.duckduckgo.com/html/".to_string()
    }

    fn default_timeout_ms() -> u64 {
        8_000
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// One tool backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Unique backend name, used in logs and collision errors.
    pub name: String,

    #[serde(flatten)]
    pub transport: BackendTransport,
}

/// How to reach a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum BackendTransport {
    /// In-process toolkit compiled into the relay.
    Builtin { toolkit: Toolkit },

    /// MCP server spoken to over a child process's stdin/stdout.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },

    /// MCP server behind Streamable HTTP.
    Http { url: String },
}

impl BackendTransport {
    /// Short human-readable description for listings.
    pub fn describe(&self) -> String {
        match self {
            Self::Builtin { toolkit } => format!("builtin:{}", toolkit.as_str()),
            Self::Stdio { command, args, .. } if args.is_empty() => format!("stdio:{}", command),
            Self::Stdio { command, args, .. } => format!("stdio:{} {}", command, args.join(" ")),
            Self::Http { url } => format!("http:{}", url),
        }
    }
}

/// Toolkits compiled into the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toolkit {
    Math,
    Weather,
    Search,
}

impl Toolkit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Math => "math",
            Self::Weather => "weather",
            Self::Search => "search",
        }
    }
}

pub(crate) fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig {
            name: "math".to_string(),
            transport: BackendTransport::Builtin {
                toolkit: Toolkit::Math,
            },
        },
        BackendConfig {
            name: "weather".to_string(),
            transport: BackendTransport::Builtin {
                toolkit: Toolkit::Weather,
            },
        },
    ]
}

fn default_true() -> bool {
    true
}
