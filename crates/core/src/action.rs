//! Action Registry and Dispatcher
//!
//! Actions are the side-effecting capabilities the model may request by
//! name. Handlers are registered once through [`ActionRegistryBuilder`];
//! the resulting [`ActionRegistry`] is immutable and can be shared across
//! sessions. The [`ActionDispatcher`] runs a handler to completion and turns
//! any failure, including a panic, into an [`ActionExecutionError`] instead
//! of letting it escape the session loop.

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{info, warn};

use crate::protocol::NO_ACTION;

/// The JSON-decoded `action_params` object, passed to handlers verbatim.
pub type ActionParams = Map<String, Value>;

/// A named capability the model can invoke.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Runs the action. The returned text is shown to the model as the action result.
    async fn invoke(&self, params: &ActionParams) -> anyhow::Result<String>;
}

/// Adapter that lets a plain closure act as an [`ActionHandler`].
pub struct FnAction<F>(F);

/// Wraps a synchronous closure as an action handler.
pub fn action_fn<F>(f: F) -> FnAction<F>
where
    F: Fn(&ActionParams) -> anyhow::Result<String> + Send + Sync,
{
    FnAction(f)
}

#[async_trait]
impl<F> ActionHandler for FnAction<F>
where
    F: Fn(&ActionParams) -> anyhow::Result<String> + Send + Sync,
{
    async fn invoke(&self, params: &ActionParams) -> anyhow::Result<String> {
        (self.0)(params)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Action name must not be empty")]
    EmptyName,
    #[error("Action name '{0}' is reserved")]
    Reserved(String),
    #[error("Action '{0}' is already registered")]
    Duplicate(String),
}

/// Collects handlers before a session starts.
#[derive(Default)]
pub struct ActionRegistryBuilder {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistryBuilder {
    pub fn register<H>(
        mut self,
        name: impl Into<String>,
        handler: H,
    ) -> Result<Self, RegistrationError>
    where
        H: ActionHandler + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if name == NO_ACTION {
            return Err(RegistrationError::Reserved(name));
        }
        if self.handlers.contains_key(&name) {
            return Err(RegistrationError::Duplicate(name));
        }
        info!(action = %name, "Registered action");
        self.handlers.insert(name, Arc::new(handler));
        Ok(self)
    }

    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            handlers: self.handlers,
        }
    }
}

/// Read-only mapping from action name to handler.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::default()
    }

    /// A registry with no actions; every non-"none" action is then unknown.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

/// A handler failed, panicked, or was not found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Action '{action}' failed: {reason}")]
pub struct ActionExecutionError {
    pub action: String,
    pub reason: String,
}

/// Invokes registered handlers on behalf of the session controller.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    registry: Arc<ActionRegistry>,
}

impl ActionDispatcher {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Runs `name` once with `params`. Failures are returned, never retried.
    pub async fn dispatch(
        &self,
        name: &str,
        params: &ActionParams,
    ) -> Result<String, ActionExecutionError> {
        let handler = self.registry.get(name).ok_or_else(|| ActionExecutionError {
            action: name.to_string(),
            reason: "no handler is registered under this name".to_string(),
        })?;

        info!(action = %name, "Executing action");
        let outcome = AssertUnwindSafe(handler.invoke(params))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                warn!(action = %name, error = %e, "Action returned an error");
                Err(ActionExecutionError {
                    action: name.to_string(),
                    reason: format!("{e:#}"),
                })
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                warn!(action = %name, %reason, "Action panicked");
                Err(ActionExecutionError {
                    action: name.to_string(),
                    reason: format!("handler panicked: {reason}"),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::Mutex;

    fn params(value: Value) -> ActionParams {
        value.as_object().cloned().unwrap()
    }

    /// Records the params it receives so tests can inspect them.
    struct Recorder {
        seen: Arc<Mutex<Vec<ActionParams>>>,
    }

    #[async_trait]
    impl ActionHandler for Recorder {
        async fn invoke(&self, params: &ActionParams) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(params.clone());
            Ok("recorded".to_string())
        }
    }

    fn ok(_: &ActionParams) -> anyhow::Result<String> {
        Ok("ok".to_string())
    }

    #[test]
    fn test_registration_rules() {
        let err = ActionRegistry::builder().register("", action_fn(ok)).err();
        assert_eq!(err, Some(RegistrationError::EmptyName));

        let err = ActionRegistry::builder().register("none", action_fn(ok)).err();
        assert_eq!(err, Some(RegistrationError::Reserved("none".to_string())));

        let err = ActionRegistry::builder()
            .register("calculate", action_fn(ok))
            .unwrap()
            .register("calculate", action_fn(ok))
            .err();
        assert_eq!(err, Some(RegistrationError::Duplicate("calculate".to_string())));

        let registry = ActionRegistry::builder()
            .register("search", action_fn(ok))
            .unwrap()
            .register("calculate", action_fn(ok))
            .unwrap()
            .build();
        assert_eq!(registry.names(), vec!["calculate", "search"]);
        assert!(registry.contains("search"));
        assert!(!registry.contains("lookup"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_params_reach_handler_verbatim() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ActionRegistry::builder()
            .register("record", Recorder { seen: seen.clone() })
            .unwrap()
            .build();
        let dispatcher = ActionDispatcher::new(Arc::new(registry));

        let sent = params(json!({
            "expression": "2+2",
            "nested": {"list": [1, 2.5, null, true], "Key With Space": "x"},
            "big": 12345678901234_i64
        }));
        let result = dispatcher.dispatch("record", &sent).await.unwrap();

        assert_eq!(result, "recorded");
        assert_eq!(seen.lock().unwrap().as_slice(), &[sent]);
    }

    #[tokio::test]
    async fn test_handler_error_is_captured() {
        let registry = ActionRegistry::builder()
            .register("calculate", action_fn(|_| Err(anyhow!("division by zero"))))
            .unwrap()
            .build();
        let dispatcher = ActionDispatcher::new(Arc::new(registry));

        let err = dispatcher
            .dispatch("calculate", &ActionParams::new())
            .await
            .unwrap_err();
        assert_eq!(err.action, "calculate");
        assert_eq!(err.reason, "division by zero");
        assert_eq!(err.to_string(), "Action 'calculate' failed: division by zero");
    }

    #[tokio::test]
    async fn test_handler_panic_is_captured() {
        let registry = ActionRegistry::builder()
            .register("explode", action_fn(|_| panic!("boom")))
            .unwrap()
            .build();
        let dispatcher = ActionDispatcher::new(Arc::new(registry));

        let err = dispatcher
            .dispatch("explode", &ActionParams::new())
            .await
            .unwrap_err();
        assert!(err.reason.contains("boom"), "reason was {}", err.reason);
    }

    #[tokio::test]
    async fn test_unregistered_action() {
        let dispatcher = ActionDispatcher::new(Arc::new(ActionRegistry::empty()));
        let err = dispatcher
            .dispatch("lookup", &ActionParams::new())
            .await
            .unwrap_err();
        assert_eq!(err.action, "lookup");
    }
}
