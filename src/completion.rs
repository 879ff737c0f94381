//! The single-shot completion call the chat page is built around.
//!
//! [`CompletionClient`] wraps [`OpenAi`] with the fixed system instruction,
//! token ceiling and temperature.  Its [`Completer`] implementation never
//! fails: any error is rendered as an `"Error: ..."` reply so the page can
//! show it in place of the assistant's answer.

use std::sync::Arc;

use crate::chat::ChatConfig;
use crate::client::{ClientOptions, OpenAi};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::observability::{COMPLETION_FAILURES, CONNECT_FAILURES};
use crate::types::{ChatCompletionRequest, ChatMessage, Model};

/// Prefix placed in front of a failed completion's message.
pub const ERROR_PREFIX: &str = "Error: ";

/// Something that turns user text into assistant text.
#[async_trait::async_trait]
pub trait Completer: Send + Sync {
    /// Produce the assistant reply for `user_text`.
    ///
    /// Failures are returned as text starting with [`ERROR_PREFIX`].
    async fn complete(&self, user_text: &str) -> String;
}

/// Builds a [`Completer`] once a credential is known.
pub trait Connector: Send + Sync {
    /// Construct the completer for a session.
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn Completer>>;
}

/// Format an error the way it appears in the transcript.
pub fn error_reply(err: &Error) -> String {
    format!("{ERROR_PREFIX}{err}")
}

/// A completion client with the request parameters fixed at construction.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: OpenAi,
    model: Model,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl CompletionClient {
    /// Build the client for `credential` using the endpoint and sampling
    /// settings in `config`.
    pub fn construct(credential: &Credential, config: &ChatConfig) -> Result<Self> {
        let client = OpenAi::new(
            credential,
            ClientOptions {
                base_url: config.base_url.clone(),
                timeout: config.timeout,
            },
        )?;
        Ok(Self {
            client,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// The request sent for `user_text`.
    pub fn request_for(&self, user_text: &str) -> ChatCompletionRequest {
        ChatCompletionRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(user_text),
            ],
        )
        .with_max_tokens(self.max_tokens)
        .with_temperature(self.temperature)
    }

    /// Ask for a completion, returning the trimmed text of the first choice.
    pub async fn try_complete(&self, user_text: &str) -> Result<String> {
        let completion = self.client.send(&self.request_for(user_text)).await?;
        completion
            .first_text()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| Error::invalid_response("completion contained no message text"))
    }
}

#[async_trait::async_trait]
impl Completer for CompletionClient {
    async fn complete(&self, user_text: &str) -> String {
        match self.try_complete(user_text).await {
            Ok(text) => text,
            Err(err) => {
                COMPLETION_FAILURES.click();
                tracing::warn!(error = %err, "completion request failed");
                error_reply(&err)
            }
        }
    }
}

/// Connects sessions to the configured OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConnector {
    config: ChatConfig,
}

impl OpenAiConnector {
    /// Create a connector that builds clients from `config`.
    pub fn new(config: ChatConfig) -> Self {
        Self { config }
    }
}

impl Connector for OpenAiConnector {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn Completer>> {
        match CompletionClient::construct(credential, &self.config) {
            Ok(client) => Ok(Arc::new(client)),
            Err(err) => {
                CONNECT_FAILURES.click();
                tracing::warn!(error = %err, "failed to construct completion client");
                Err(err)
            }
        }
    }
}
