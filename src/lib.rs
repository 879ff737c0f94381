// Public modules
pub mod chat;
pub mod client;
pub mod completion;
pub mod credential;
pub mod error;
pub mod types;

mod observability;

// Re-exports
pub use client::{ClientOptions, OpenAi};
pub use completion::{Completer, CompletionClient, Connector, OpenAiConnector};
pub use credential::{Credential, CredentialResolver, CredentialSource};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use types::*;
