//! Terminal implementation of [`UserChannel`].
//!
//! Agent messages go to stdout as `Agent: ...`, dev traces as-is, and user
//! lines are read from stdin after a `You: ` prompt. Logging stays on stderr.

use agentfsm_core::UserChannel;
use anyhow::Context;
use async_trait::async_trait;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

const USER_PROMPT: &str = "You: ";
const AGENT_PREFIX: &str = "Agent: ";

pub struct Console<R, W> {
    reader: R,
    writer: W,
}

impl Console<BufReader<Stdin>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), std::io::stdout())
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Prints `question` without a newline and returns the trimmed answer.
    /// `None` when input is closed.
    pub async fn ask(&mut self, question: &str) -> anyhow::Result<Option<String>> {
        write!(self.writer, "{question}")?;
        self.writer.flush()?;
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .context("Failed to read from terminal")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    pub fn say(&mut self, line: &str) -> anyhow::Result<()> {
        writeln!(self.writer, "{line}")?;
        Ok(())
    }
}

#[async_trait]
impl<R, W> UserChannel for Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    /// Blank lines are skipped; the prompt is shown again.
    async fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        loop {
            match self.ask(USER_PROMPT).await? {
                None => {
                    writeln!(self.writer)?;
                    return Ok(None);
                }
                Some(line) if line.is_empty() => continue,
                Some(line) => return Ok(Some(line)),
            }
        }
    }

    fn show_message(&mut self, message: &str) -> anyhow::Result<()> {
        writeln!(self.writer, "\n{AGENT_PREFIX}{message}\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn show_diagnostic(&mut self, line: &str) -> anyhow::Result<()> {
        writeln!(self.writer, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console(input: &'static str) -> Console<&'static [u8], Vec<u8>> {
        Console::new(input.as_bytes(), Vec::new())
    }

    fn output(console: Console<&'static [u8], Vec<u8>>) -> String {
        String::from_utf8(console.into_writer()).unwrap()
    }

    #[tokio::test]
    async fn test_read_line_prompts_and_trims() {
        let mut console = console("  what's 2+2 \n");

        let line = console.read_line().await.unwrap();

        assert_eq!(line.as_deref(), Some("what's 2+2"));
        assert_eq!(output(console), "You: ");
    }

    #[tokio::test]
    async fn test_read_line_skips_blank_lines() {
        let mut console = console("\n   \nsearch rust\n");

        let line = console.read_line().await.unwrap();

        assert_eq!(line.as_deref(), Some("search rust"));
        assert_eq!(output(console), "You: You: You: ");
    }

    #[tokio::test]
    async fn test_read_line_reports_end_of_input() {
        let mut console = console("");

        assert_eq!(console.read_line().await.unwrap(), None);
        assert_eq!(console.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ask_returns_answer() {
        let mut console = console("y\n");

        let answer = console.ask("Enable? (y/n): ").await.unwrap();

        assert_eq!(answer.as_deref(), Some("y"));
        assert_eq!(output(console), "Enable? (y/n): ");
    }

    #[test]
    fn test_messages_and_diagnostics() {
        let mut console = console("");

        console.show_message("Hi! How can I help?").unwrap();
        console.show_diagnostic("[DEV] Transitioning").unwrap();

        assert_eq!(
            output(console),
            "\nAgent: Hi! How can I help?\n\n[DEV] Transitioning\n"
        );
    }
}
