//! Chat completion capability used to phrase answers from retrieved context

use crate::config::ChatConfig;
use crate::error::{EmbedError, Result};
use crate::http::{Capability, build_client, post_json};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Turns a conversation into a single answer string.
#[async_trait]
pub trait AnswerComposer: Send + Sync {
    /// Produce the next assistant message for `messages`
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get the name/identifier of this composer
    fn provider_name(&self) -> &str;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChat {
    config: ChatConfig,
    client: Client,
    endpoint: String,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl OpenAiChat {
    pub fn new(config: ChatConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config.api_key, config.timeout())?;
        let endpoint = config.endpoint();
        tracing::info!(
            "Created OpenAI chat client for model {} at {}",
            config.model,
            endpoint
        );
        Ok(Self {
            config,
            client,
            endpoint,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }
}

#[async_trait]
impl AnswerComposer for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        if messages.is_empty() {
            return Err(EmbedError::completion_unavailable(
                "cannot complete an empty conversation",
            ));
        }

        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response: CompletionResponse = post_json(
            &self.client,
            &self.endpoint,
            &request,
            self.config.retry_policy(),
            self.config.timeout(),
            Capability::Completion,
        )
        .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Capability::Completion.unavailable("response contained no choices"))?;
        choice
            .message
            .content
            .ok_or_else(|| Capability::Completion.unavailable("first choice has no content"))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}
