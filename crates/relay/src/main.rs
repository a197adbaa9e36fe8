mod telemetry;

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relayconf::RelayConfig;
use toolrelay::{Relay, ToolRegistry};

/// Queries an LLM with tools discovered from MCP backends.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about, long_about = None)]
struct Cli {
    /// Config file, replacing ./toolrelay.toml
    #[arg(short, long, env = "TOOLRELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer each query in order
    Ask {
        #[arg(required = true)]
        queries: Vec<String>,
    },
    /// Answer one query per non-empty line of FILE, or stdin
    Batch { file: Option<PathBuf> },
    /// Answer the built-in sample queries
    Demo,
    /// List discovered tools and their parameters
    Tools,
    /// Print the effective configuration and where it came from
    Config,
}

const DEMO_QUERIES: [&str; 2] = [
    "what's (3 + 5) x 12?",
    "What's the current weather in San Francisco, US?",
];

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let (config, sources) = RelayConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    telemetry::init(&config.telemetry.log_level)?;
    tracing::debug!(files = ?sources.files, env = ?sources.env_overrides, "Configuration loaded");

    match cli.command.unwrap_or(Command::Demo) {
        Command::Config => {
            print_config(&config, &sources);
            Ok(())
        }
        Command::Tools => {
            let registry = toolrelay::relay::discover_tools(&config).await?;
            print_tools(&registry);
            Ok(())
        }
        Command::Ask { queries } => answer_all(&config, &queries).await,
        Command::Batch { file } => {
            let queries = read_queries(file.as_deref())?;
            answer_all(&config, &queries).await
        }
        Command::Demo => answer_all(&config, &DEMO_QUERIES).await,
    }
}

async fn answer_all<S: AsRef<str>>(config: &RelayConfig, queries: &[S]) -> Result<()> {
    if config.model.api_key.is_none() {
        tracing::warn!("No model API key configured; set GROQ_API_KEY or OPENAI_API_KEY");
    }

    let relay = Relay::from_config(config).await?;
    tracing::info!(tools = relay.registry().len(), "Relay ready");

    for (i, query) in queries.iter().enumerate() {
        let answer = relay.answer(query.as_ref()).await;
        println!("Message {} response: {}", i + 1, answer);
    }

    Ok(())
}

fn read_queries(file: Option<&Path>) -> Result<Vec<String>> {
    let lines: Vec<String> = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read queries from {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect(),
        None => std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<_>>()
            .context("Failed to read queries from stdin")?,
    };

    Ok(lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

fn print_config(config: &RelayConfig, sources: &relayconf::ConfigSources) {
    if sources.files.is_empty() {
        println!("# No config files found, using defaults");
    }
    for file in &sources.files {
        println!("# Loaded from: {}", file.display());
    }
    if !sources.env_overrides.is_empty() {
        println!("# Environment overrides: {}", sources.env_overrides.join(", "));
    }
    println!();
    print!("{}", config.to_toml());
}

fn print_tools(registry: &ToolRegistry) {
    for tool in registry.descriptors() {
        println!("{} [{}]", tool.name, tool.backend.name());
        if let Some(description) = &tool.description {
            println!("    {}", description);
        }
        for (name, spec) in &tool.params {
            let required = if spec.required { ", required" } else { "" };
            println!("    - {}: {}{}", name, spec.ty, required);
        }
    }
    println!("{} tools", registry.len());
}
