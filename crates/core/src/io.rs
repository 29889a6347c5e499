//! User I/O seam.
//!
//! The engine never touches a terminal directly. A [`UserChannel`] reads the
//! user's text and renders whatever the presenter decides to show, so the same
//! session loop can drive a console, a test script, or any other frontend.

use async_trait::async_trait;

#[async_trait]
pub trait UserChannel: Send {
    /// Blocks until the user submits a line. `Ok(None)` means the channel is closed.
    async fn read_line(&mut self) -> anyhow::Result<Option<String>>;

    /// Shows a model-authored (or apology) message to the user.
    fn show_message(&mut self, message: &str) -> anyhow::Result<()>;

    /// Shows one line of dev-mode trace. Never called in user mode.
    fn show_diagnostic(&mut self, line: &str) -> anyhow::Result<()>;
}
