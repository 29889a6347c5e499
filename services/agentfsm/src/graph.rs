//! Graphviz rendering of an agent's state machine.

use agentfsm_core::AgentConfig;

/// Renders the configuration as a DOT digraph. The initial state is drawn
/// bold, the exit state as a double circle and the error state in red.
pub fn to_dot(config: &AgentConfig) -> String {
    let mut out = String::from("digraph agent {\n    rankdir=LR;\n    node [shape=box];\n");

    for state in config.states() {
        let mut attrs = Vec::new();
        if state.name == config.initial_state() {
            attrs.push("style=bold");
        }
        if state.name == config.exit_state() {
            attrs.push("shape=doublecircle");
        }
        if state.name == config.error_state() {
            attrs.push("color=red");
        }
        out.push_str(&format!("    {}", quote(&state.name)));
        if !attrs.is_empty() {
            out.push_str(&format!(" [{}]", attrs.join(", ")));
        }
        out.push_str(";\n");
    }

    for state in config.states() {
        for target in &state.transitions {
            out.push_str(&format!("    {} -> {};\n", quote(&state.name), quote(target)));
        }
    }

    out.push_str("}\n");
    out
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}
