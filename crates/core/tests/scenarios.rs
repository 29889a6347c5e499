//! End-to-end sessions against a scripted model and a recording user channel.

use agentfsm_core::{
    ActionParams, ActionRegistry, AgentConfig, EndReason, Engine, LLMClient, LLMInvocationError,
    Mode, ModelRequest, Speaker, UserChannel, action_fn,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const CONFIG: &str = r#"
initial_state = "greeting"

[description]
role = "You are a helpful assistant that can search and calculate."
state_machine_logic = "Always reply with a JSON object."

[states.greeting]
prompt = "Greet the user and ask what they need."
transitions = ["greeting", "awaiting_task"]

[states.awaiting_task]
prompt = "Understand the task and pick an action."
temperature = 0.3
transitions = ["awaiting_task", "processing_task", "exit"]

[states.processing_task]
prompt = "Explain the action result to the user."
transitions = ["awaiting_task", "exit"]

[states.error]
prompt = "Apologize and ask the user how to continue."
transitions = ["greeting", "awaiting_task"]

[states.exit]
prompt = "Say goodbye."
"#;

struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LLMClient for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<String, LLMInvocationError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LLMInvocationError::Provider("no more replies".to_string()))
    }
}

#[derive(Default)]
struct Terminal {
    inputs: VecDeque<String>,
    shown: Vec<String>,
    dev: Vec<String>,
    reads: usize,
}

#[async_trait]
impl UserChannel for Terminal {
    async fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        self.reads += 1;
        Ok(self.inputs.pop_front())
    }

    fn show_message(&mut self, message: &str) -> anyhow::Result<()> {
        self.shown.push(message.to_string());
        Ok(())
    }

    fn show_diagnostic(&mut self, line: &str) -> anyhow::Result<()> {
        self.dev.push(line.to_string());
        Ok(())
    }
}

fn terminal(inputs: &[&str]) -> Terminal {
    Terminal {
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        ..Terminal::default()
    }
}

fn calculator(received: Arc<Mutex<Vec<ActionParams>>>) -> Arc<ActionRegistry> {
    let registry = ActionRegistry::builder()
        .register(
            "calculate",
            action_fn(move |params| {
                received.lock().unwrap().push(params.clone());
                Ok("Result: 4".to_string())
            }),
        )
        .unwrap()
        .build();
    Arc::new(registry)
}

fn config() -> Arc<AgentConfig> {
    Arc::new(AgentConfig::from_toml_str(CONFIG).unwrap())
}

#[tokio::test]
async fn greeting_displays_message_and_blocks_for_input() {
    let model = ScriptedModel::new(&[
        r#"{"action":"none","message":"Hi! How can I help?","next_state":"greeting","require_input":"1"}"#,
    ]);
    let mut engine = Engine::new(
        config(),
        Arc::new(ActionRegistry::empty()),
        model.clone(),
        terminal(&[]),
        Mode::User,
    );

    let report = engine.run(None).await.unwrap();

    assert_eq!(report.final_state, "greeting");
    assert_eq!(report.end, EndReason::InputClosed);
    let terminal = engine.into_channel();
    assert_eq!(terminal.shown, vec!["Hi! How can I help?"]);
    assert_eq!(terminal.reads, 1);
}

#[tokio::test]
async fn calculation_request_dispatches_without_blocking() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let model = ScriptedModel::new(&[
        r#"{"action":"none","message":"What can I do for you?","next_state":"awaiting_task","require_input":"1"}"#,
        r#"{"action":"calculate","action_params":{"expression":"2+2"},"message":"Calculating...","next_state":"processing_task","require_input":"0"}"#,
        r#"{"action":"none","message":"2+2 = 4. Bye!","next_state":"exit","require_input":"0"}"#,
    ]);
    let mut engine = Engine::new(
        config(),
        calculator(received.clone()),
        model.clone(),
        terminal(&["what's 2+2"]),
        Mode::User,
    );

    let report = engine.run(None).await.unwrap();

    let expected: Value = json!({"expression": "2+2"});
    assert_eq!(
        received.lock().unwrap().as_slice(),
        &[expected.as_object().unwrap().clone()]
    );
    assert_eq!(report.end, EndReason::ExitState);
    // Only the first reply asked for input; the action turn did not.
    assert_eq!(engine.channel().reads, 1);

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen[2].state, "processing_task");
    let injected = seen[2].history.last().unwrap();
    assert_eq!(injected.speaker, Speaker::ActionResult);
    assert_eq!(injected.content, "Result: 4");
}

#[tokio::test]
async fn illegal_transition_forces_error_state_with_dev_trace() {
    // `exit` exists but is not reachable from `greeting`.
    let model = ScriptedModel::new(&[
        r#"{"action":"none","message":"Goodbye","next_state":"exit","require_input":"0"}"#,
    ]);
    let mut engine = Engine::new(
        config(),
        Arc::new(ActionRegistry::empty()),
        model,
        terminal(&[]),
        Mode::Dev,
    );

    let report = engine.run(Some("hello")).await.unwrap();

    assert_eq!(report.final_state, "error");
    assert_eq!(report.protocol_errors, 1);
    let terminal = engine.into_channel();
    assert!(
        terminal
            .dev
            .iter()
            .any(|line| line.contains("ProtocolError:IllegalTransition"))
    );
    assert!(!terminal.shown.contains(&"Goodbye".to_string()));
}

#[tokio::test]
async fn unknown_action_shows_apology_not_internals() {
    let model = ScriptedModel::new(&[
        r#"{"action":"lookup","action_params":{"q":"rust"},"message":"Looking it up","next_state":"greeting","require_input":"0"}"#,
    ]);
    let mut engine = Engine::new(
        config(),
        calculator(Arc::new(Mutex::new(Vec::new()))),
        model,
        terminal(&[]),
        Mode::User,
    );

    let report = engine.run(Some("look up rust")).await.unwrap();

    assert_eq!(report.final_state, "error");
    let terminal = engine.into_channel();
    assert_eq!(
        terminal.shown,
        vec!["I apologize, but I encountered an error processing your request."]
    );
    assert!(terminal.dev.is_empty());
    assert!(terminal.shown.iter().all(|m| !m.contains("ProtocolError")));

    let diagnostic = report.history.last().unwrap();
    assert_eq!(diagnostic.speaker, Speaker::Diagnostic);
    assert!(diagnostic.content.contains("ProtocolError:UnknownAction"));
}
