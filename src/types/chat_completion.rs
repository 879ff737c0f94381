use serde::{Deserialize, Serialize};

use crate::types::Model;

/// Role of a message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions that frame the conversation.
    System,
    /// Message authored by the person chatting.
    User,
    /// Message authored by the model.
    Assistant,
}

/// A message in a chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: MessageRole,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Parameters for `POST chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model that generates the completion.
    pub model: Model,

    /// Conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,

    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatCompletionRequest {
    /// Create a request with no sampling overrides.
    pub fn new(model: Model, messages: Vec<ChatMessage>) -> Self {
        Self {
            model,
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the generated-token ceiling.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Message returned inside a [`Choice`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    /// Normally `assistant`.
    pub role: MessageRole,
    /// Generated text; absent for refusals and tool calls.
    #[serde(default)]
    pub content: Option<String>,
}

/// One candidate completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Position of this choice in the response.
    #[serde(default)]
    pub index: u32,
    /// The generated message.
    pub message: ChoiceMessage,
    /// Why generation stopped (`stop`, `length`, ...).
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting for a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated.
    pub completion_tokens: u32,
    /// Sum of both.
    pub total_tokens: u32,
}

/// Response body of `POST chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Server-assigned identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Model that actually served the request.
    #[serde(default)]
    pub model: Option<String>,
    /// Candidate completions.
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Token accounting, when reported.
    #[serde(default)]
    pub usage: Option<CompletionUsage>,
}

impl ChatCompletion {
    /// Text of the first choice, if the server produced one.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}
