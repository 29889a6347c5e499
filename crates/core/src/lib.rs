//! Agent Execution Engine
//!
//! Drives a conversational agent whose behavior is a declarative finite
//! state machine. Each state carries a prompt, a model, a temperature and
//! the set of states it may move to. The [`engine::Engine`] renders the
//! current state into a model request, validates the structured JSON reply
//! against the wire protocol, dispatches any requested action, applies the
//! transition and decides whether to wait for the user.

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod io;
pub mod llm_client;
pub mod mode;
pub mod protocol;

#[cfg(test)]
mod testing;

pub use action::{
    ActionDispatcher, ActionExecutionError, ActionHandler, ActionParams, ActionRegistry,
    ActionRegistryBuilder, RegistrationError, action_fn,
};
pub use config::{AgentConfig, ConfigError, Description, StateDefinition};
pub use engine::{EndReason, Engine, SessionReport};
pub use error::EngineError;
pub use history::{ConversationHistory, Speaker, Turn};
pub use io::UserChannel;
pub use llm_client::{LLMClient, LLMInvocationError, ModelRequest, OpenAICompatibleClient};
pub use mode::{Mode, Presenter};
pub use protocol::{ActionRequest, AgentResponse, ProtocolError, parse_response};
