use crate::config::ConfigError;

/// Fatal errors that end a session. Protocol, model and action failures are
/// recovered inside the loop and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Current state '{0}' is not defined in the configuration")]
    UnknownState(String),
    #[error("User channel failed: {0:#}")]
    Channel(anyhow::Error),
}
