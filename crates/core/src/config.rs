//! Configuration Model
//!
//! The declarative state table that drives an agent. A configuration is
//! loaded from TOML into raw serde structs and then compiled into an
//! immutable [`AgentConfig`], validating every invariant once at load time:
//! the initial, exit and error states exist, every transition target exists, and
//! every temperature is in range. Nothing downstream re-checks these.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Sampling temperature used when a state does not declare one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Model identifier used when a state does not declare one.
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";
/// Name of the state that ends a session when entered.
pub const DEFAULT_EXIT_STATE: &str = "exit";
/// Name of the state the engine forces on protocol or model failures.
pub const DEFAULT_ERROR_STATE: &str = "error";
/// User-facing text shown when the engine forces the error state.
pub const DEFAULT_ERROR_MESSAGE: &str =
    "I apologize, but I encountered an error processing your request.";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration defines no states")]
    NoStates,
    #[error("Initial state '{0}' is not defined")]
    MissingInitialState(String),
    #[error("Error state '{0}' is not defined")]
    MissingErrorState(String),
    #[error("Exit state '{0}' is not defined")]
    MissingExitState(String),
    #[error("State '{from}' lists undefined transition target '{to}'")]
    DanglingTransition { from: String, to: String },
    #[error("State '{state}' has temperature {value}, expected a value in 0.0..=1.0")]
    InvalidTemperature { state: String, value: f32 },
}

/// Global role and behavior text prepended to every state's prompt.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Description {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub state_machine_logic: String,
    #[serde(default)]
    pub work_principles: String,
}

#[derive(Debug, Deserialize)]
struct RawAgentConfig {
    initial_state: String,
    #[serde(default = "default_exit_state")]
    exit_state: String,
    #[serde(default = "default_error_state")]
    error_state: String,
    #[serde(default = "default_error_message")]
    error_message: String,
    #[serde(default)]
    description: Description,
    #[serde(default)]
    states: BTreeMap<String, RawState>,
}

#[derive(Debug, Deserialize)]
struct RawState {
    prompt: String,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default)]
    transitions: Vec<String>,
}

fn default_exit_state() -> String {
    DEFAULT_EXIT_STATE.to_string()
}

fn default_error_state() -> String {
    DEFAULT_ERROR_STATE.to_string()
}

fn default_error_message() -> String {
    DEFAULT_ERROR_MESSAGE.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// One node of the state graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDefinition {
    pub name: String,
    pub prompt: String,
    pub temperature: f32,
    pub model: String,
    /// Allowed successor states, in declaration order. May include the state itself.
    pub transitions: Vec<String>,
}

impl StateDefinition {
    /// Creates a state with the default model and temperature and no transitions.
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            temperature: DEFAULT_TEMPERATURE,
            model: DEFAULT_MODEL.to_string(),
            transitions: Vec::new(),
        }
    }

    pub fn with_transitions<I, S>(mut self, transitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transitions = transitions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, temperature: f32) -> Self {
        self.model = model.into();
        self.temperature = temperature;
        self
    }

    /// Whether leaving this state for `target` is a legal transition.
    pub fn allows(&self, target: &str) -> bool {
        self.transitions.iter().any(|t| t == target)
    }
}

/// The validated, immutable state table.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    initial_state: String,
    exit_state: String,
    error_state: String,
    error_message: String,
    description: Description,
    states: BTreeMap<String, StateDefinition>,
}

impl AgentConfig {
    /// Compiles and validates a configuration from its parts.
    pub fn new(
        initial_state: impl Into<String>,
        description: Description,
        states: impl IntoIterator<Item = StateDefinition>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            initial_state: initial_state.into(),
            exit_state: default_exit_state(),
            error_state: default_error_state(),
            error_message: default_error_message(),
            description,
            states: states.into_iter().map(|s| (s.name.clone(), s)).collect(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawAgentConfig = toml::from_str(text)?;
        let states = raw
            .states
            .into_iter()
            .map(|(name, state)| {
                let definition = StateDefinition {
                    name: name.clone(),
                    prompt: state.prompt,
                    temperature: state.temperature,
                    model: state.model,
                    transitions: state.transitions,
                };
                (name, definition)
            })
            .collect();

        let config = Self {
            initial_state: raw.initial_state,
            exit_state: raw.exit_state,
            error_state: raw.error_state,
            error_message: raw.error_message,
            description: raw.description,
            states,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.states.is_empty() {
            return Err(ConfigError::NoStates);
        }
        if !self.states.contains_key(&self.initial_state) {
            return Err(ConfigError::MissingInitialState(self.initial_state.clone()));
        }
        if !self.states.contains_key(&self.error_state) {
            return Err(ConfigError::MissingErrorState(self.error_state.clone()));
        }
        if !self.states.contains_key(&self.exit_state) {
            return Err(ConfigError::MissingExitState(self.exit_state.clone()));
        }
        for state in self.states.values() {
            if !(0.0..=1.0).contains(&state.temperature) {
                return Err(ConfigError::InvalidTemperature {
                    state: state.name.clone(),
                    value: state.temperature,
                });
            }
            if let Some(target) = state
                .transitions
                .iter()
                .find(|t| !self.states.contains_key(t.as_str()))
            {
                return Err(ConfigError::DanglingTransition {
                    from: state.name.clone(),
                    to: target.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    pub fn exit_state(&self) -> &str {
        &self.exit_state
    }

    pub fn error_state(&self) -> &str {
        &self.error_state
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.get(name)
    }

    /// All states, ordered by name.
    pub fn states(&self) -> impl Iterator<Item = &StateDefinition> {
        self.states.values()
    }

    pub fn is_exit(&self, name: &str) -> bool {
        self.exit_state == name
    }
}
