//! Main entrypoint for the agentfsm terminal agent.
//!
//! `run` does the following:
//! 1. Loads settings from the environment and the agent configuration file.
//! 2. Initializes logging, optionally with a session transcript file.
//! 3. Resolves the API key and the display mode, asking on the terminal when needed.
//! 4. Builds the model client and the built-in action registry.
//! 5. Runs one session and logs its summary.

use agentfsm::{
    actions::builtin_registry,
    cli::{Cli, Commands, ConfigArgs, RunArgs},
    console::Console,
    graph::to_dot,
    logging,
    settings::Settings,
};
use agentfsm_core::{AgentConfig, Engine, EndReason, Mode, OpenAICompatibleClient};
use anyhow::{Context, bail};
use async_openai::config::OpenAIConfig;
use clap::Parser;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

fn config_path(args: &ConfigArgs, settings: &Settings) -> PathBuf {
    args.config
        .clone()
        .unwrap_or_else(|| settings.agent_config.clone())
}

fn load_config(path: &Path) -> anyhow::Result<AgentConfig> {
    AgentConfig::from_path(path)
        .with_context(|| format!("Failed to load agent configuration {}", path.display()))
}

fn check(config: &AgentConfig, path: &Path) {
    println!("{} is valid", path.display());
    println!("  initial state: {}", config.initial_state());
    println!("  exit state:    {}", config.exit_state());
    println!("  error state:   {}", config.error_state());
    println!("  states:");
    for state in config.states() {
        let transitions = if state.transitions.is_empty() {
            "(none)".to_string()
        } else {
            state.transitions.join(", ")
        };
        println!(
            "    {} [model={}, temperature={}] -> {}",
            state.name, state.model, state.temperature, transitions
        );
    }
}

async fn run(args: RunArgs, settings: Settings) -> anyhow::Result<()> {
    let path = config_path(&args.config, &settings);
    let config = Arc::new(load_config(&path)?);

    let _guard = logging::init(&settings.log_filter, args.log_dir.as_deref())?;
    info!(config = %path.display(), "Configuration loaded");

    let mut console = Console::stdio();

    let api_key = match settings.require_api_key() {
        Ok(key) => key.to_string(),
        Err(missing) => match console.ask("Please enter your OpenRouter API key: ").await? {
            Some(key) if !key.is_empty() => key,
            _ => bail!("An API key is required: {missing}"),
        },
    };

    let mode = match args.mode() {
        Some(mode) => mode,
        None => {
            let answer = console
                .ask("Enable development mode with detailed logging? (y/n): ")
                .await?
                .unwrap_or_default();
            Mode::from_answer(&answer)
        }
    };
    if mode.is_dev() {
        console.say("Starting agent in DEVELOPMENT mode - detailed logs will be shown")?;
    }

    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(&settings.api_base);
    let mut client = OpenAICompatibleClient::new(openai_config);
    if let Some(timeout) = settings.llm_timeout {
        client = client.with_timeout(timeout);
    }

    let registry = Arc::new(
        builtin_registry(&settings.search_url).context("Failed to register built-in actions")?,
    );
    info!(actions = ?registry.names(), %mode, "Starting session");

    let mut engine = Engine::new(config, registry, Arc::new(client), console, mode);
    let report = engine.run(Some(&args.greeting)).await?;

    let reason = match report.end {
        EndReason::ExitState => "exit state reached",
        EndReason::InputClosed => "input closed",
    };
    info!(
        session_id = %report.session_id,
        final_state = %report.final_state,
        iterations = report.iterations,
        protocol_errors = report.protocol_errors,
        invocation_errors = report.invocation_errors,
        turns = report.history.len(),
        "Session finished: {reason}"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env().context("Failed to load settings")?;

    match cli.command {
        Commands::Run(args) => run(args, settings).await,
        Commands::Check(args) => {
            let path = config_path(&args, &settings);
            let config = load_config(&path)?;
            check(&config, &path);
            Ok(())
        }
        Commands::Graph(args) => {
            let path = config_path(&args, &settings);
            let config = load_config(&path)?;
            print!("{}", to_dot(&config));
            Ok(())
        }
    }
}
