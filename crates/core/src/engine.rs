//! State Machine Controller
//!
//! Owns the session loop. Each iteration:
//! 1. looks up the current [`StateDefinition`](crate::config::StateDefinition),
//! 2. flushes a pending action result into history and composes a [`ModelRequest`],
//! 3. calls the model and validates the reply with [`parse_response`],
//! 4. shows the message and dispatches the requested action, if any,
//! 5. applies the validated transition,
//! 6. either loops straight away or waits for the user.
//!
//! Protocol violations and model failures never escape the loop: they are
//! recorded as a diagnostic turn and force the configured error state,
//! which then waits for user direction.

use std::sync::Arc;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::action::{ActionDispatcher, ActionRegistry};
use crate::config::AgentConfig;
use crate::error::EngineError;
use crate::history::{ConversationHistory, Turn};
use crate::io::UserChannel;
use crate::llm_client::{LLMClient, LLMInvocationError, ModelRequest};
use crate::mode::{Mode, Presenter};
use crate::protocol::{ActionRequest, ProtocolError, parse_response};

/// Mutable state of one session. Only the controller writes to it.
#[derive(Debug)]
pub(crate) struct SessionState {
    id: String,
    current_state: String,
    history: ConversationHistory,
    mode: Mode,
    /// An action result waiting to be shown to the model on the next call.
    pending_result: Option<Turn>,
    iterations: u64,
    protocol_errors: u64,
    invocation_errors: u64,
}

impl SessionState {
    fn new(id: String, initial_state: &str, mode: Mode) -> Self {
        Self {
            id,
            current_state: initial_state.to_string(),
            history: ConversationHistory::new(),
            mode,
            pending_result: None,
            iterations: 0,
            protocol_errors: 0,
            invocation_errors: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn current_state(&self) -> &str {
        &self.current_state
    }

    fn into_report(self, end: EndReason) -> SessionReport {
        SessionReport {
            session_id: self.id,
            final_state: self.current_state,
            mode: self.mode,
            end,
            iterations: self.iterations,
            protocol_errors: self.protocol_errors,
            invocation_errors: self.invocation_errors,
            history: self.history,
        }
    }

    fn flush_pending(&mut self) {
        if let Some(turn) = self.pending_result.take() {
            self.history.push(turn);
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The exit state was entered.
    ExitState,
    /// The user channel closed while the engine was waiting for input.
    InputClosed,
}

/// Summary handed back when a session ends.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: String,
    pub final_state: String,
    pub mode: Mode,
    pub end: EndReason,
    pub iterations: u64,
    pub protocol_errors: u64,
    pub invocation_errors: u64,
    pub history: ConversationHistory,
}

enum Step {
    Continue,
    AwaitInput,
    Finished,
}

enum Failure {
    Protocol { error: ProtocolError, raw: String },
    Invocation(LLMInvocationError),
}

impl Failure {
    /// Diagnostic text recorded in history for the model to see.
    fn describe(&self) -> String {
        match self {
            Failure::Protocol { error, .. } => format!("{}: {error}", error.code()),
            Failure::Invocation(error) => format!("LLMInvocationError: {error}"),
        }
    }
}

/// Drives sessions against one configuration, registry and model client.
pub struct Engine<C> {
    config: Arc<AgentConfig>,
    dispatcher: ActionDispatcher,
    llm: Arc<dyn LLMClient>,
    presenter: Presenter<C>,
}

impl<C: UserChannel> Engine<C> {
    pub fn new(
        config: Arc<AgentConfig>,
        registry: Arc<ActionRegistry>,
        llm: Arc<dyn LLMClient>,
        channel: C,
        mode: Mode,
    ) -> Self {
        Self {
            config,
            dispatcher: ActionDispatcher::new(registry),
            llm,
            presenter: Presenter::new(mode, channel),
        }
    }

    pub fn mode(&self) -> Mode {
        self.presenter.mode()
    }

    pub fn channel(&self) -> &C {
        self.presenter.channel()
    }

    pub fn into_channel(self) -> C {
        self.presenter.into_channel()
    }

    /// Runs one session to completion. `opening` is recorded as the first user turn.
    pub async fn run(&mut self, opening: Option<&str>) -> Result<SessionReport, EngineError> {
        let session_id = Uuid::new_v4().to_string();
        let span = info_span!("agent_session", session_id = %session_id);
        self.run_session(session_id, opening).instrument(span).await
    }

    async fn run_session(
        &mut self,
        session_id: String,
        opening: Option<&str>,
    ) -> Result<SessionReport, EngineError> {
        let mut session =
            SessionState::new(session_id, self.config.initial_state(), self.presenter.mode());
        self.presenter
            .session_started(session.id(), session.current_state())
            .map_err(EngineError::Channel)?;

        if let Some(text) = opening {
            self.accept_input(&mut session, text)?;
        }

        let end = if self.config.is_exit(session.current_state()) {
            EndReason::ExitState
        } else {
            loop {
                match self.step(&mut session).await? {
                    Step::Continue => {}
                    Step::Finished => break EndReason::ExitState,
                    Step::AwaitInput => {
                        let line = self
                            .presenter
                            .channel_mut()
                            .read_line()
                            .await
                            .map_err(EngineError::Channel)?;
                        match line {
                            Some(text) => self.accept_input(&mut session, &text)?,
                            None => break EndReason::InputClosed,
                        }
                    }
                }
            }
        };

        session.flush_pending();
        let reason = match end {
            EndReason::ExitState => "exit state reached",
            EndReason::InputClosed => "user input closed",
        };
        self.presenter
            .session_ended(session.current_state(), reason)
            .map_err(EngineError::Channel)?;

        Ok(session.into_report(end))
    }

    async fn step(&mut self, session: &mut SessionState) -> Result<Step, EngineError> {
        session.iterations += 1;
        let config = Arc::clone(&self.config);
        let state = config
            .state(&session.current_state)
            .ok_or_else(|| EngineError::UnknownState(session.current_state.clone()))?;
        debug!(
            iteration = session.iterations,
            state = %state.name,
            transitions = ?state.transitions,
            "Starting iteration"
        );

        session.flush_pending();
        let request = ModelRequest::compose(config.description(), state, &session.history);
        self.presenter
            .request(&request)
            .map_err(EngineError::Channel)?;

        let raw = match self.llm.complete(&request).await {
            Ok(raw) => raw,
            Err(error) => return self.fail(session, Failure::Invocation(error)),
        };
        self.presenter
            .raw_response(&raw)
            .map_err(EngineError::Channel)?;

        let response = match parse_response(&raw, state, self.dispatcher.registry()) {
            Ok(response) => response,
            Err(error) => return self.fail(session, Failure::Protocol { error, raw }),
        };
        self.presenter
            .accepted(&response)
            .map_err(EngineError::Channel)?;

        session
            .history
            .push(Turn::assistant(&response.message, &state.name));
        self.presenter
            .message(&response.message)
            .map_err(EngineError::Channel)?;

        // The action always runs before any pause; its result is shown to the
        // model on the next call, in whichever state `next_state` names.
        let acted = match &response.action {
            ActionRequest::None => false,
            ActionRequest::Invoke { name, params } => {
                self.presenter
                    .action_started(name, params)
                    .map_err(EngineError::Channel)?;
                let outcome = self.dispatcher.dispatch(name, params).await;
                self.presenter
                    .action_finished(name, &outcome)
                    .map_err(EngineError::Channel)?;
                let content = match outcome {
                    Ok(result) => result,
                    Err(error) => format!("Error: {error}"),
                };
                session.pending_result = Some(Turn::action_result(name, content, &state.name));
                true
            }
        };

        self.enter(session, &response.next_state, false)?;

        if self.config.is_exit(&session.current_state) {
            return Ok(Step::Finished);
        }
        let wait = response.require_input && !acted;
        self.presenter
            .waiting_for_input(wait)
            .map_err(EngineError::Channel)?;
        Ok(if wait { Step::AwaitInput } else { Step::Continue })
    }

    fn fail(&mut self, session: &mut SessionState, failure: Failure) -> Result<Step, EngineError> {
        let shown = match &failure {
            Failure::Protocol { error, raw } => {
                session.protocol_errors += 1;
                self.presenter.rejected(error, raw)
            }
            Failure::Invocation(error) => {
                session.invocation_errors += 1;
                self.presenter.invocation_failed(error)
            }
        };
        shown.map_err(EngineError::Channel)?;

        session
            .history
            .push(Turn::diagnostic(failure.describe(), &session.current_state));
        let error_state = self.config.error_state().to_string();
        self.enter(session, &error_state, true)?;
        self.presenter
            .message(self.config.error_message())
            .map_err(EngineError::Channel)?;
        self.presenter
            .waiting_for_input(true)
            .map_err(EngineError::Channel)?;
        Ok(Step::AwaitInput)
    }

    fn enter(
        &mut self,
        session: &mut SessionState,
        next: &str,
        forced: bool,
    ) -> Result<(), EngineError> {
        let from = std::mem::replace(&mut session.current_state, next.to_string());
        self.presenter
            .transition(&from, next, forced)
            .map_err(EngineError::Channel)
    }

    fn accept_input(&mut self, session: &mut SessionState, text: &str) -> Result<(), EngineError> {
        session
            .history
            .push(Turn::user(text, &session.current_state));
        self.presenter
            .user_input(text)
            .map_err(EngineError::Channel)
    }
}
