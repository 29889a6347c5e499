use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_AGENT_CONFIG: &str = "agent_config.toml";
pub const DEFAULT_SEARCH_URL: &str = "https://search.bostonlistener-career.org/search";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// A custom error type for settings loading failures.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all process settings loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    /// `None` when no key is in the environment; the binary then asks for one.
    pub api_key: Option<String>,
    pub api_base: String,
    pub agent_config: PathBuf,
    pub search_url: String,
    pub llm_timeout: Option<Duration>,
    pub log_filter: String,
}

impl Settings {
    /// Loads settings from environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_key = std::env::var("OPENROUTER_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        let api_base =
            std::env::var("LLM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let agent_config = std::env::var("AGENT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_AGENT_CONFIG));

        let search_url =
            std::env::var("SEARCH_URL").unwrap_or_else(|_| DEFAULT_SEARCH_URL.to_string());

        let llm_timeout = match std::env::var("LLM_TIMEOUT_SECS") {
            Ok(value) => {
                let secs = value.parse::<u64>().map_err(|_| {
                    SettingsError::InvalidValue(
                        "LLM_TIMEOUT_SECS".to_string(),
                        format!("'{}' is not a whole number of seconds", value),
                    )
                })?;
                if secs == 0 {
                    return Err(SettingsError::InvalidValue(
                        "LLM_TIMEOUT_SECS".to_string(),
                        "timeout must be greater than zero".to_string(),
                    ));
                }
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let log_filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        EnvFilter::try_new(&log_filter).map_err(|_| {
            SettingsError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log filter", log_filter),
            )
        })?;

        Ok(Self {
            api_key,
            api_base,
            agent_config,
            search_url,
            llm_timeout,
            log_filter,
        })
    }

    /// Returns the API key, or an error naming the variables that were checked.
    pub fn require_api_key(&self) -> Result<&str, SettingsError> {
        self.api_key.as_deref().ok_or_else(|| {
            SettingsError::MissingVar("OPENROUTER_API_KEY (or OPENAI_API_KEY)".to_string())
        })
    }
}
