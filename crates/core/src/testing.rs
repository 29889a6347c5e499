//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::io::UserChannel;
use crate::llm_client::{LLMClient, LLMInvocationError, ModelRequest};

/// A user channel fed from a script of lines that records everything shown.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    pub inputs: VecDeque<String>,
    pub messages: Vec<String>,
    pub diagnostics: Vec<String>,
    pub reads: usize,
}

impl RecordingChannel {
    pub fn with_inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl UserChannel for RecordingChannel {
    async fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        self.reads += 1;
        Ok(self.inputs.pop_front())
    }

    fn show_message(&mut self, message: &str) -> anyhow::Result<()> {
        self.messages.push(message.to_string());
        Ok(())
    }

    fn show_diagnostic(&mut self, line: &str) -> anyhow::Result<()> {
        self.diagnostics.push(line.to_string());
        Ok(())
    }
}

/// A model that answers from a fixed script and keeps every request it saw.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, LLMInvocationError>>>,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedClient {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LLMInvocationError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String, LLMInvocationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LLMInvocationError::Provider("script exhausted".to_string())))
    }
}
