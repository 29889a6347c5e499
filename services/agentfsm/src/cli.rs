use agentfsm_core::Mode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_GREETING: &str = "Hello, I need some help.";

#[derive(Parser, Debug)]
#[command(name = "agentfsm")]
#[command(version, about = "Run a state-machine driven LLM agent in the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive agent session
    Run(RunArgs),

    /// Validate an agent configuration and summarize its states
    Check(ConfigArgs),

    /// Print the state graph of an agent configuration as Graphviz DOT
    Graph(ConfigArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Agent configuration file (defaults to AGENT_CONFIG or agent_config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Trace every iteration on the terminal
    #[arg(long, conflicts_with = "user")]
    pub dev: bool,

    /// Show only agent messages
    #[arg(long)]
    pub user: bool,

    /// Also write a DEBUG transcript of the session into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Opening user turn sent before the first model call
    #[arg(long, default_value = DEFAULT_GREETING)]
    pub greeting: String,
}

impl RunArgs {
    /// The mode chosen on the command line, if any.
    pub fn mode(&self) -> Option<Mode> {
        match (self.dev, self.user) {
            (true, _) => Some(Mode::Dev),
            (_, true) => Some(Mode::User),
            _ => None,
        }
    }
}
