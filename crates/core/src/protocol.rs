//! Response Parser & Validator
//!
//! The model must answer every turn with a single JSON object:
//!
//! ```json
//! {
//!   "action": "calculate",
//!   "action_params": {"expression": "2+2"},
//!   "message": "Calculating...",
//!   "next_state": "processing_task",
//!   "require_input": "0"
//! }
//! ```
//!
//! [`parse_response`] turns that text into an [`AgentResponse`] or a single
//! [`ProtocolError`]. There is no partial success: the first violated rule
//! rejects the whole reply. The `"0"`/`"1"` flag becomes a `bool` here and is
//! only turned back into a string by [`AgentResponse::to_wire`].

use serde_json::{Map, Value, json};

use crate::action::{ActionParams, ActionRegistry};
use crate::config::StateDefinition;

/// The `action` value meaning "no side effect this turn".
pub const NO_ACTION: &str = "none";

/// The side effect requested by a validated response.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    None,
    Invoke { name: String, params: ActionParams },
}

impl ActionRequest {
    pub fn name(&self) -> &str {
        match self {
            ActionRequest::None => NO_ACTION,
            ActionRequest::Invoke { name, .. } => name,
        }
    }
}

/// A parsed, validated model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    pub action: ActionRequest,
    pub message: String,
    pub next_state: String,
    pub require_input: bool,
}

impl AgentResponse {
    /// Serializes back to the wire shape, including the string-typed flag.
    pub fn to_wire(&self) -> Value {
        let mut wire = Map::new();
        wire.insert("action".into(), Value::from(self.action.name()));
        if let ActionRequest::Invoke { params, .. } = &self.action {
            wire.insert("action_params".into(), Value::Object(params.clone()));
        }
        wire.insert("message".into(), Value::from(self.message.as_str()));
        wire.insert("next_state".into(), Value::from(self.next_state.as_str()));
        wire.insert(
            "require_input".into(),
            json!(if self.require_input { "1" } else { "0" }),
        );
        Value::Object(wire)
    }
}

/// Every way a model reply can violate the protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("response is not a single JSON object: {0}")]
    MalformedJson(String),
    #[error("required field `{field}` is missing or is not {expected}")]
    MissingField {
        field: &'static str,
        expected: &'static str,
    },
    #[error("action `{0}` is not registered")]
    UnknownAction(String),
    #[error("transition from `{from}` to `{to}` is not allowed")]
    IllegalTransition { from: String, to: String },
    #[error("`require_input` must be \"0\" or \"1\", got {0}")]
    InvalidFlag(String),
}

impl ProtocolError {
    /// Stable identifier of the violated rule, shown in dev mode.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::MalformedJson(_) => "ProtocolError:MalformedJSON",
            ProtocolError::MissingField { .. } => "ProtocolError:MissingField",
            ProtocolError::UnknownAction(_) => "ProtocolError:UnknownAction",
            ProtocolError::IllegalTransition { .. } => "ProtocolError:IllegalTransition",
            ProtocolError::InvalidFlag(_) => "ProtocolError:InvalidFlag",
        }
    }
}

/// Parses and validates a raw model reply against the state being left and
/// the registered actions.
pub fn parse_response(
    raw: &str,
    current: &StateDefinition,
    actions: &ActionRegistry,
) -> Result<AgentResponse, ProtocolError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(ProtocolError::MalformedJson(format!(
                "top-level value is {}, not an object",
                kind_of(&other)
            )));
        }
    };

    // Presence and type of every required field comes first.
    let action = required_str(&object, "action")?;
    let message = required_str(&object, "message")?;
    let next_state = required_str(&object, "next_state")?;
    let flag = object.get("require_input").ok_or(ProtocolError::MissingField {
        field: "require_input",
        expected: "a string",
    })?;
    let params = if action == NO_ACTION {
        None
    } else {
        match object.get("action_params") {
            Some(Value::Object(params)) => Some(params.clone()),
            _ => {
                return Err(ProtocolError::MissingField {
                    field: "action_params",
                    expected: "an object",
                });
            }
        }
    };

    let action = match params {
        None => ActionRequest::None,
        Some(params) => {
            if !actions.contains(action) {
                return Err(ProtocolError::UnknownAction(action.to_string()));
            }
            ActionRequest::Invoke {
                name: action.to_string(),
                params,
            }
        }
    };

    if !current.allows(next_state) {
        return Err(ProtocolError::IllegalTransition {
            from: current.name.clone(),
            to: next_state.to_string(),
        });
    }

    let require_input = match flag.as_str() {
        Some("1") => true,
        Some("0") => false,
        _ => return Err(ProtocolError::InvalidFlag(flag.to_string())),
    };

    Ok(AgentResponse {
        action,
        message: message.to_string(),
        next_state: next_state.to_string(),
        require_input,
    })
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ProtocolError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField {
            field,
            expected: "a string",
        })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
