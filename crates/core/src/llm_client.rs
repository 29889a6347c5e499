use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::{Description, StateDefinition};
use crate::history::{ConversationHistory, Speaker, Turn};

/// Upper bound on generated tokens per model call.
pub const DEFAULT_MAX_TOKENS: u32 = 5000;

/// Everything the model needs for one turn: the composed system prompt, the
/// ordered history, and the sampling settings of the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub state: String,
    pub system_prompt: String,
    pub history: Vec<Turn>,
    pub temperature: f32,
    pub model: String,
}

impl ModelRequest {
    /// Builds the request for `state` from the global description and the session history.
    pub fn compose(
        description: &Description,
        state: &StateDefinition,
        history: &ConversationHistory,
    ) -> Self {
        let current = format!("CURRENT STATE: {}", state.name);
        let system_prompt = [
            description.role.as_str(),
            description.state_machine_logic.as_str(),
            description.work_principles.as_str(),
            current.as_str(),
            state.prompt.as_str(),
        ]
        .iter()
        .map(|section| section.trim())
        .filter(|section| !section.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

        Self {
            state: state.name.clone(),
            system_prompt,
            history: history.turns().to_vec(),
            temperature: state.temperature,
            model: state.model.clone(),
        }
    }

    /// The text a turn contributes to the model context.
    pub fn render_turn(turn: &Turn) -> String {
        match turn.speaker {
            Speaker::User | Speaker::Assistant => turn.content.clone(),
            Speaker::ActionResult => match &turn.action {
                Some(action) => format!("Action result ({action}): {}", turn.content),
                None => format!("Action result: {}", turn.content),
            },
            Speaker::Diagnostic => format!("Diagnostic: {}", turn.content),
        }
    }
}

/// Failure to obtain any text from the model provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LLMInvocationError {
    #[error("Model request could not be built: {0}")]
    InvalidRequest(String),
    #[error("Model provider call failed: {0}")]
    Provider(String),
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Model response had no content")]
    EmptyResponse,
}

impl From<OpenAIError> for LLMInvocationError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::InvalidArgument(msg) => LLMInvocationError::InvalidRequest(msg),
            other => LLMInvocationError::Provider(other.to_string()),
        }
    }
}

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming call and returns the raw reply text.
    async fn complete(&self, request: &ModelRequest) -> Result<String, LLMInvocationError>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    max_tokens: u32,
    timeout: Option<Duration>,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    ///
    /// The model and temperature come from each request, since every state may pick its own.
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: None,
        }
    }

    /// Bounds every call; an expired call fails with [`LLMInvocationError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

fn to_chat_messages(
    request: &ModelRequest,
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_prompt.clone())
            .build()?
            .into(),
    ];
    for turn in &request.history {
        let content = ModelRequest::render_turn(turn);
        let message = match turn.speaker {
            Speaker::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()?
                .into(),
            Speaker::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()?
                .into(),
            Speaker::ActionResult | Speaker::Diagnostic => {
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(content)
                    .build()?
                    .into()
            }
        };
        messages.push(message);
    }
    Ok(messages)
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    #[allow(deprecated)]
    async fn complete(&self, request: &ModelRequest) -> Result<String, LLMInvocationError> {
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .temperature(request.temperature)
            .max_tokens(self.max_tokens)
            .response_format(ResponseFormat::JsonObject)
            .messages(to_chat_messages(request)?)
            .build()?;

        let chat = self.client.chat();
        let call = chat.create(chat_request);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| LLMInvocationError::Timeout(limit))?,
            None => call.await,
        }?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or(LLMInvocationError::EmptyResponse)
    }
}
