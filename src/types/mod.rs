// Public modules
pub mod chat_completion;
pub mod chat_turn;
pub mod model;

// Re-exports
pub use chat_completion::{
    ChatCompletion, ChatCompletionRequest, ChatMessage, Choice, ChoiceMessage, CompletionUsage,
    MessageRole,
};
pub use chat_turn::{ChatTurn, Role};
pub use model::{KnownModel, Model};
