//! Terminal frontend for the agent engine: settings, CLI, console I/O,
//! built-in actions, configuration graphs and logging.

pub mod actions;
pub mod cli;
pub mod console;
pub mod graph;
pub mod logging;
pub mod settings;
