//! Toolkits compiled into the relay, served through the same `ToolBackend`
//! interface as remote MCP servers.

pub mod math;
pub mod search;
pub mod weather;

use async_trait::async_trait;
use relayconf::Toolkit;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::{BackendError, ToolBackend, ToolInfo};
use math::{MathArgs, MathOp};
use search::{SearchArgs, SearchClient};
use weather::{WeatherArgs, WeatherClient};

/// Every tool name a builtin toolkit can serve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KnownTool {
    Add,
    Multiple,
    Subtract,
    Divide,
    Power,
    GetWeather,
    WebSearch,
    Unknown(String),
}

impl KnownTool {
    pub fn from_name(name: &str) -> Self {
        match name {
            "add" => Self::Add,
            "multiple" => Self::Multiple,
            "subtract" => Self::Subtract,
            "divide" => Self::Divide,
            "power" => Self::Power,
            "get_weather" => Self::GetWeather,
            "web_search" => Self::WebSearch,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Add => "add",
            Self::Multiple => "multiple",
            Self::Subtract => "subtract",
            Self::Divide => "divide",
            Self::Power => "power",
            Self::GetWeather => "get_weather",
            Self::WebSearch => "web_search",
            Self::Unknown(name) => name,
        }
    }

    fn math_op(&self) -> Option<MathOp> {
        match self {
            Self::Add => Some(MathOp::Add),
            Self::Multiple => Some(MathOp::Multiply),
            Self::Subtract => Some(MathOp::Subtract),
            Self::Divide => Some(MathOp::Divide),
            Self::Power => Some(MathOp::Power),
            _ => None,
        }
    }
}

/// JSON schema for a tool's argument struct, inlined draft-07.
pub fn schema_for<T: JsonSchema>() -> Value {
    let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let gen = settings.into_generator();
    let schema = gen.into_root_schema_for::<T>();
    serde_json::to_value(&schema).unwrap_or_default()
}

fn tool_info<T: JsonSchema>(tool: KnownTool, description: &str) -> ToolInfo {
    ToolInfo {
        name: tool.as_str().to_string(),
        description: Some(description.to_string()),
        input_schema: schema_for::<T>(),
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, BackendError> {
    serde_json::from_value(arguments)
        .map_err(|e| BackendError::Domain(format!("Invalid arguments for {}: {}", tool, e)))
}

enum Kit {
    Math,
    Weather(WeatherClient),
    Search(SearchClient),
}

/// In-process backend for one toolkit.
pub struct BuiltinBackend {
    name: String,
    kit: Kit,
}

impl BuiltinBackend {
    pub fn new(name: &str, toolkit: Toolkit, config: &relayconf::RelayConfig) -> Self {
        let kit = match toolkit {
            Toolkit::Math => Kit::Math,
            Toolkit::Weather => Kit::Weather(WeatherClient::new(&config.weather)),
            Toolkit::Search => Kit::Search(SearchClient::new(&config.search)),
        };
        Self {
            name: name.to_string(),
            kit,
        }
    }

    pub fn math(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kit: Kit::Math,
        }
    }

    pub fn weather(name: &str, client: WeatherClient) -> Self {
        Self {
            name: name.to_string(),
            kit: Kit::Weather(client),
        }
    }

    pub fn search(name: &str, client: SearchClient) -> Self {
        Self {
            name: name.to_string(),
            kit: Kit::Search(client),
        }
    }
}

#[async_trait]
impl ToolBackend for BuiltinBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, BackendError> {
        let tools = match &self.kit {
            Kit::Math => vec![
                tool_info::<MathArgs>(KnownTool::Add, "Add two integers."),
                tool_info::<MathArgs>(KnownTool::Multiple, "Multiply two integers."),
                tool_info::<MathArgs>(KnownTool::Subtract, "Subtract b from a."),
                tool_info::<MathArgs>(KnownTool::Divide, "Divide a by b."),
                tool_info::<MathArgs>(KnownTool::Power, "Raise a to the power of b."),
            ],
            Kit::Weather(_) => vec![tool_info::<WeatherArgs>(
                KnownTool::GetWeather,
                "Get the current weather for a location such as 'San Francisco, US'.",
            )],
            Kit::Search(_) => vec![tool_info::<SearchArgs>(
                KnownTool::WebSearch,
                "Search the web and return result titles with cleaned page text.",
            )],
        };
        Ok(tools)
    }

    #[tracing::instrument(skip(self, arguments), fields(backend = %self.name, tool.name = %tool))]
    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, BackendError> {
        let known = KnownTool::from_name(tool);

        if let (Kit::Math, Some(op)) = (&self.kit, known.math_op()) {
            let args: MathArgs = parse_args(tool, arguments)?;
            return op.apply(args.a, args.b).map_err(BackendError::Domain);
        }

        match (&self.kit, &known) {
            (Kit::Weather(client), KnownTool::GetWeather) => {
                let args: WeatherArgs = parse_args(tool, arguments)?;
                client.current(&args.location).await.map(Value::String)
            }
            (Kit::Search(client), KnownTool::WebSearch) => {
                let args: SearchArgs = parse_args(tool, arguments)?;
                client.search(&args).await.map(Value::String)
            }
            _ => Err(BackendError::UnknownTool(tool.to_string())),
        }
    }
}
