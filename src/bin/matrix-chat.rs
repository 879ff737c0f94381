//! Matrix-themed chat page backed by an OpenAI-compatible completion API.
//!
//! # Usage
//!
//! ```bash
//! # Key from the environment, page on http://127.0.0.1:8501/
//! OPENAI_API_KEY=sk-... matrix-chat
//!
//! # Key from a secrets file, listening on all interfaces
//! matrix-chat --secrets /etc/matrix-chat/secrets.toml --bind 0.0.0.0:8501
//!
//! # A local OpenAI-compatible server with a short timeout
//! matrix-chat --base-url http://localhost:11434/v1/ --timeout-secs 20
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `matrix_chat=info`).

use std::sync::Arc;

use arrrg::CommandLine;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use matrix_chat::chat::{AppState, ChatArgs, ChatConfig, serve};
use matrix_chat::{CredentialResolver, OpenAiConnector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "matrix_chat=info".into()),
        )
        .init();

    let (args, free) = ChatArgs::from_command_line_relaxed("matrix-chat [OPTIONS]");
    if !free.is_empty() {
        return Err(format!("unexpected arguments: {}", free.join(" ")).into());
    }
    let config = ChatConfig::try_from(args)?;

    let resolver = CredentialResolver::standard(&config.secrets_path);
    if resolver.resolve().is_none() {
        tracing::warn!(
            secrets = %config.secrets_path.display(),
            "no API key found; the page will show setup instructions"
        );
    }

    let connector = Arc::new(OpenAiConnector::new(config.clone()));
    let state = AppState::new(&config, resolver, connector);
    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(
        url = %format!("http://{}/", config.bind),
        model = %config.model,
        "matrix-chat ready"
    );
    serve(listener, state).await?;
    Ok(())
}
