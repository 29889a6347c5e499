//! Mode Controller
//!
//! A session runs in exactly one [`Mode`], chosen before the loop starts.
//! User mode shows only messages. Dev mode also traces each iteration: the
//! outgoing request, the raw reply, the validation outcome, actions and
//! transitions. The [`Presenter`] decides what reaches the [`UserChannel`];
//! it never influences control flow. Every event is also logged through
//! `tracing` regardless of mode.

use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::action::{ActionExecutionError, ActionParams};
use crate::history;
use crate::io::UserChannel;
use crate::llm_client::{LLMInvocationError, ModelRequest};
use crate::protocol::{AgentResponse, ProtocolError};

/// Number of history turns echoed with each request in dev mode.
const DEV_HISTORY_TAIL: usize = 6;
const DEV_PREFIX: &str = "[DEV]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    User,
    Dev,
}

impl Mode {
    /// Interprets the answer to "Enable development mode? (y/n)".
    pub fn from_answer(answer: &str) -> Self {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Mode::Dev,
            _ => Mode::User,
        }
    }

    pub fn is_dev(self) -> bool {
        self == Mode::Dev
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::User => write!(f, "user"),
            Mode::Dev => write!(f, "dev"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown mode '{0}', expected 'user' or 'dev'")]
pub struct UnknownMode(String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Mode::User),
            "dev" => Ok(Mode::Dev),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Mode-aware renderer in front of a [`UserChannel`].
pub struct Presenter<C> {
    mode: Mode,
    channel: C,
}

impl<C: UserChannel> Presenter<C> {
    pub fn new(mode: Mode, channel: C) -> Self {
        Self { mode, channel }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// User-facing text. Shown in every mode.
    pub fn message(&mut self, message: &str) -> anyhow::Result<()> {
        debug!(%message, "Displaying message");
        self.channel.show_message(message)
    }

    pub fn session_started(&mut self, session_id: &str, state: &str) -> anyhow::Result<()> {
        info!(%session_id, %state, mode = %self.mode, "Session started");
        self.dev(|| vec![format!("Session {session_id} started in state '{state}'")])
    }

    pub fn user_input(&mut self, text: &str) -> anyhow::Result<()> {
        debug!(%text, "User input");
        self.dev(|| vec![format!("User input: {text}")])
    }

    pub fn request(&mut self, request: &ModelRequest) -> anyhow::Result<()> {
        debug!(
            state = %request.state,
            model = %request.model,
            temperature = request.temperature,
            history_len = request.history.len(),
            system_prompt = %request.system_prompt,
            "Calling model"
        );
        self.dev(|| {
            let mut lines = vec![
                format!(
                    "CALLING LLM state={} model={} temperature={}",
                    request.state, request.model, request.temperature
                ),
                "System prompt:".to_string(),
            ];
            lines.extend(request.system_prompt.lines().map(|l| format!("  {l}")));
            let recent = history::tail(&request.history, DEV_HISTORY_TAIL);
            lines.push(format!(
                "History (last {} of {} turns):",
                recent.len(),
                request.history.len()
            ));
            lines.extend(recent.iter().map(|turn| {
                format!("  [{}] {}", turn.speaker, ModelRequest::render_turn(turn))
            }));
            lines
        })
    }

    pub fn raw_response(&mut self, raw: &str) -> anyhow::Result<()> {
        debug!(%raw, "Raw model response");
        self.dev(|| vec![format!("LLM RAW RESPONSE: {raw}")])
    }

    pub fn accepted(&mut self, response: &AgentResponse) -> anyhow::Result<()> {
        debug!(
            action = %response.action.name(),
            next_state = %response.next_state,
            require_input = response.require_input,
            "Response validated"
        );
        self.dev(|| vec![format!("Validation OK: {}", response.to_wire())])
    }

    pub fn rejected(&mut self, error: &ProtocolError, raw: &str) -> anyhow::Result<()> {
        warn!(code = error.code(), %error, %raw, "Model response rejected");
        self.dev(|| {
            vec![
                format!("Validation FAILED {}: {error}", error.code()),
                format!("Rejected text: {raw}"),
            ]
        })
    }

    pub fn invocation_failed(&mut self, error: &LLMInvocationError) -> anyhow::Result<()> {
        warn!(%error, "Model invocation failed");
        self.dev(|| vec![format!("LLMInvocationError: {error}")])
    }

    pub fn action_started(&mut self, name: &str, params: &ActionParams) -> anyhow::Result<()> {
        let params = serde_json::Value::Object(params.clone());
        debug!(action = %name, %params, "Dispatching action");
        self.dev(|| vec![format!("Executing action '{name}' with {params}")])
    }

    pub fn action_finished(
        &mut self,
        name: &str,
        outcome: &Result<String, ActionExecutionError>,
    ) -> anyhow::Result<()> {
        match outcome {
            Ok(result) => {
                debug!(action = %name, %result, "Action completed");
                self.dev(|| vec![format!("Action '{name}' result: {result}")])
            }
            Err(error) => {
                warn!(action = %name, %error, "Action failed");
                self.dev(|| vec![format!("ActionExecutionError: {error}")])
            }
        }
    }

    pub fn transition(&mut self, from: &str, to: &str, forced: bool) -> anyhow::Result<()> {
        info!(%from, %to, forced, "State transition");
        self.dev(|| {
            let kind = if forced { "Forced transition" } else { "Transitioning" };
            vec![format!("{kind} from '{from}' to '{to}'")]
        })
    }

    pub fn waiting_for_input(&mut self, waiting: bool) -> anyhow::Result<()> {
        self.dev(|| {
            let line = if waiting {
                "Waiting for user input"
            } else {
                "No user input required, continuing"
            };
            vec![line.to_string()]
        })
    }

    pub fn session_ended(&mut self, state: &str, reason: &str) -> anyhow::Result<()> {
        info!(%state, %reason, "Session ended");
        self.dev(|| vec![format!("Session ended in state '{state}': {reason}")])
    }

    fn dev(&mut self, lines: impl FnOnce() -> Vec<String>) -> anyhow::Result<()> {
        if !self.mode.is_dev() {
            return Ok(());
        }
        for line in lines() {
            self.channel.show_diagnostic(&format!("{DEV_PREFIX} {line}"))?;
        }
        Ok(())
    }
}
