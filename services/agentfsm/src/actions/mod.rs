pub mod calculate;
pub mod search;

use agentfsm_core::{ActionRegistry, RegistrationError, action_fn};

pub use search::SearchAction;

/// Registry with the `calculate` and `search` actions.
pub fn builtin_registry(search_url: &str) -> Result<ActionRegistry, RegistrationError> {
    Ok(ActionRegistry::builder()
        .register("calculate", action_fn(calculate::handle))?
        .register("search", SearchAction::new(search_url))?
        .build())
}
