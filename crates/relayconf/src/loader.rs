//! Config file discovery, loading, and environment variable overlay.

use crate::{
    AgentConfig, ConfigError, ModelConfig, RelayConfig, RoutingConfig, SearchConfig,
    TelemetryConfig, WeatherConfig,
};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/toolrelay/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("toolrelay/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("toolrelay.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<RelayConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from TOML string. Missing sections take their defaults.
fn parse_toml(contents: &str, path: &Path) -> Result<RelayConfig, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}

/// Pick the overlay value when it differs from the compiled default.
fn layer<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configs, with `overlay` taking precedence field by field.
pub fn merge_configs(base: RelayConfig, overlay: RelayConfig) -> RelayConfig {
    let model_default = ModelConfig::default();
    let agent_default = AgentConfig::default();
    let weather_default = WeatherConfig::default();
    let search_default = SearchConfig::default();

    RelayConfig {
        model: ModelConfig {
            base_url: layer(base.model.base_url, overlay.model.base_url, model_default.base_url),
            model: layer(base.model.model, overlay.model.model, model_default.model),
            api_key: overlay.model.api_key.or(base.model.api_key),
            temperature: layer(
                base.model.temperature,
                overlay.model.temperature,
                model_default.temperature,
            ),
            max_tokens: layer(
                base.model.max_tokens,
                overlay.model.max_tokens,
                model_default.max_tokens,
            ),
            timeout_ms: layer(
                base.model.timeout_ms,
                overlay.model.timeout_ms,
                model_default.timeout_ms,
            ),
        },
        agent: AgentConfig {
            max_turns: layer(
                base.agent.max_turns,
                overlay.agent.max_turns,
                agent_default.max_turns,
            ),
            tool_timeout_ms: layer(
                base.agent.tool_timeout_ms,
                overlay.agent.tool_timeout_ms,
                agent_default.tool_timeout_ms,
            ),
            forced_tool_timeout_ms: layer(
                base.agent.forced_tool_timeout_ms,
                overlay.agent.forced_tool_timeout_ms,
                agent_default.forced_tool_timeout_ms,
            ),
            discovery_timeout_ms: layer(
                base.agent.discovery_timeout_ms,
                overlay.agent.discovery_timeout_ms,
                agent_default.discovery_timeout_ms,
            ),
            summary_max_words: layer(
                base.agent.summary_max_words,
                overlay.agent.summary_max_words,
                agent_default.summary_max_words,
            ),
        },
        routing: RoutingConfig {
            forced: layer(
                base.routing.forced,
                overlay.routing.forced,
                RoutingConfig::default().forced,
            ),
        },
        telemetry: TelemetryConfig {
            log_level: layer(
                base.telemetry.log_level,
                overlay.telemetry.log_level,
                TelemetryConfig::default().log_level,
            ),
        },
        weather: WeatherConfig {
            api_key: overlay.weather.api_key.or(base.weather.api_key),
            base_url: layer(
                base.weather.base_url,
                overlay.weather.base_url,
                weather_default.base_url,
            ),
            timeout_ms: layer(
                base.weather.timeout_ms,
                overlay.weather.timeout_ms,
                weather_default.timeout_ms,
            ),
        },
        search: SearchConfig {
            base_url: layer(
                base.search.base_url,
                overlay.search.base_url,
                search_default.base_url,
            ),
            timeout_ms: layer(
                base.search.timeout_ms,
                overlay.search.timeout_ms,
                search_default.timeout_ms,
            ),
        },
        // A file that lists backends replaces the whole list
        backends: layer(
            base.backends,
            overlay.backends,
            crate::sections::default_backends(),
        ),
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut RelayConfig, sources: &mut ConfigSources) {
    // Model service
    if let Ok(v) = env::var("TOOLRELAY_MODEL_BASE_URL") {
        config.model.base_url = v;
        sources.env_overrides.push("TOOLRELAY_MODEL_BASE_URL".to_string());
    }
    if let Ok(v) = env::var("TOOLRELAY_MODEL") {
        config.model.model = v;
        sources.env_overrides.push("TOOLRELAY_MODEL".to_string());
    }
    // Provider-specific keys first so TOOLRELAY_API_KEY wins
    for key in ["OPENAI_API_KEY", "GROQ_API_KEY", "TOOLRELAY_API_KEY"] {
        if let Ok(v) = env::var(key) {
            if !v.is_empty() {
                config.model.api_key = Some(v);
                sources.env_overrides.push(key.to_string());
            }
        }
    }

    // Agent
    if let Ok(v) = env::var("TOOLRELAY_MAX_TURNS") {
        if let Ok(turns) = v.parse() {
            config.agent.max_turns = turns;
            sources.env_overrides.push("TOOLRELAY_MAX_TURNS".to_string());
        }
    }
    if let Ok(v) = env::var("TOOLRELAY_TOOL_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.agent.tool_timeout_ms = ms;
            sources.env_overrides.push("TOOLRELAY_TOOL_TIMEOUT_MS".to_string());
        }
    }
    if let Ok(v) = env::var("TOOLRELAY_FORCED_ROUTING") {
        if let Some(forced) = parse_bool(&v) {
            config.routing.forced = forced;
            sources.env_overrides.push("TOOLRELAY_FORCED_ROUTING".to_string());
        }
    }

    // Builtin toolkits
    if let Ok(v) = env::var("WEATHER_API_KEY") {
        if !v.is_empty() {
            config.weather.api_key = Some(v);
            sources.env_overrides.push("WEATHER_API_KEY".to_string());
        }
    }

    // Telemetry
    if let Ok(v) = env::var("TOOLRELAY_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("TOOLRELAY_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
        return PathBuf::from(path);
    }

    if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        return match stripped.split_once('/') {
            Some((var_name, rest)) => env::var(var_name)
                .map(|v| PathBuf::from(v).join(rest))
                .unwrap_or_else(|_| PathBuf::from(path)),
            None => env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path)),
        };
    }

    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendTransport, Toolkit};
    use std::io::Write;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[agent]
max_turns = 4
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.agent.max_turns, 4);
        // Other values should be defaults
        assert_eq!(config.agent.tool_timeout_ms, 15_000);
        assert_eq!(config.backends.len(), 2);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[model]
base_url = "http://localhost:11434/v1"
model = "qwen2.5"
temperature = 0.2
max_tokens = 512

[agent]
max_turns = 6
tool_timeout_ms = 2000
summary_max_words = 120

[routing]
forced = false

[telemetry]
log_level = "debug"

[weather]
base_url = "http://weather.test/v1"

[[backends]]
name = "math"
transport = "stdio"
command = "python"
args = ["mathserver.py"]

[[backends]]
name = "weather"
transport = "http"
url = "http://localhost:8000/mcp"

[[backends]]
name = "search"
transport = "builtin"
toolkit = "search"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.model.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model.model, "qwen2.5");
        assert_eq!(config.model.max_tokens, 512);
        assert_eq!(config.agent.max_turns, 6);
        assert_eq!(config.agent.summary_max_words, 120);
        assert!(!config.routing.forced);
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.weather.base_url, "http://weather.test/v1");
        assert_eq!(config.backends.len(), 3);
        assert_eq!(
            config.backends[1].transport,
            BackendTransport::Http {
                url: "http://localhost:8000/mcp".into()
            }
        );
        assert_eq!(
            config.backends[2].transport,
            BackendTransport::Builtin {
                toolkit: Toolkit::Search
            }
        );
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_toml("[agent\nmax_turns = ", Path::new("broken.toml")).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_merge_keeps_base_when_overlay_is_default() {
        let mut base = RelayConfig::default();
        base.agent.max_turns = 3;
        base.model.api_key = Some("from-system".into());

        let mut overlay = RelayConfig::default();
        overlay.model.model = "other-model".into();

        let merged = merge_configs(base, overlay);
        assert_eq!(merged.agent.max_turns, 3);
        assert_eq!(merged.model.model, "other-model");
        assert_eq!(merged.model.api_key.as_deref(), Some("from-system"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[routing]\nforced = false").unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert!(!config.routing.forced);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
