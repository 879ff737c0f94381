//! Configuration types for the chat server.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! [`ChatConfig`] used by the server, the sessions and the completion client.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_API_URL, DEFAULT_TIMEOUT};
use crate::credential::DEFAULT_SECRETS_PATH;
use crate::types::Model;

/// Address the server listens on unless told otherwise.
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";

/// Instruction sent ahead of every user message.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant in the Matrix. Keep responses under 100 words. Be concise and helpful.";

/// Ceiling on generated tokens per response.
pub const MAX_TOKENS: u32 = 150;

/// Sampling temperature for every request.
pub const TEMPERATURE: f32 = 0.7;

/// Idle time after which a session is discarded.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Command-line arguments for the matrix-chat server.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Address to listen on.
    #[arrrg(optional, "Address to listen on (default: 127.0.0.1:8501)", "ADDR")]
    pub bind: Option<String>,

    /// Secrets file consulted before the environment.
    #[arrrg(optional, "TOML secrets file (default: .matrix-chat/secrets.toml)", "PATH")]
    pub secrets: Option<String>,

    /// Base URL of the completion API.
    #[arrrg(optional, "Completion API base URL (default: https://api.openai.com/v1/)", "URL")]
    pub base_url: Option<String>,

    /// Transport timeout for completion requests.
    #[arrrg(optional, "Completion request timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Idle session lifetime.
    #[arrrg(optional, "Discard sessions idle this long, in seconds (default: 3600)", "SECS")]
    pub session_ttl_secs: Option<u64>,
}

/// Error returned when command-line values cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatArgsError {
    message: String,
}

impl std::fmt::Display for ChatArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ChatArgsError {}

/// Configuration for the chat server.
///
/// The model, system prompt, token ceiling and temperature default to the
/// fixed values every deployment uses; the builder methods exist for tests
/// and embedding.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Address the HTTP server binds.
    pub bind: SocketAddr,

    /// TOML secrets file consulted before the environment.
    pub secrets_path: PathBuf,

    /// Base URL of the completion API.
    pub base_url: String,

    /// Transport timeout for completion requests.
    pub timeout: Duration,

    /// Idle time after which a session is discarded.
    pub session_ttl: Duration,

    /// The model to use for generating responses.
    pub model: Model,

    /// Instruction placed before every user message.
    pub system_prompt: String,

    /// Maximum tokens per response.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
            secrets_path: PathBuf::from(DEFAULT_SECRETS_PATH),
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            session_ttl: DEFAULT_SESSION_TTL,
            model: Model::default(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }

    /// Sets the listen address.
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Sets the secrets file path.
    pub fn with_secrets_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets_path = path.into();
        self
    }

    /// Sets the completion API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the completion request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the idle session lifetime.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = ChatArgsError;

    fn try_from(args: ChatArgs) -> Result<Self, Self::Error> {
        let mut config = ChatConfig::new();
        if let Some(bind) = args.bind {
            config.bind = bind.parse().map_err(|err| ChatArgsError {
                message: format!("invalid --bind address {bind:?}: {err}"),
            })?;
        }
        if let Some(secrets) = args.secrets {
            config.secrets_path = PathBuf::from(secrets);
        }
        if let Some(base_url) = args.base_url {
            config.base_url = base_url;
        }
        match args.timeout_secs {
            Some(0) => {
                return Err(ChatArgsError {
                    message: "--timeout-secs must be at least 1".to_string(),
                });
            }
            Some(secs) => config.timeout = Duration::from_secs(secs),
            None => {}
        }
        if let Some(secs) = args.session_ttl_secs {
            config.session_ttl = Duration::from_secs(secs);
        }
        if config.session_ttl.is_zero() || config.session_ttl < config.timeout {
            return Err(ChatArgsError {
                message: format!(
                    "--session-ttl-secs ({}) must be at least the request timeout ({})",
                    config.session_ttl.as_secs(),
                    config.timeout.as_secs()
                ),
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.secrets_path, PathBuf::from(DEFAULT_SECRETS_PATH));
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.model, Model::Known(KnownModel::Gpt35Turbo));
        assert_eq!(config.max_tokens, 150);
        assert_eq!(config.temperature, 0.7);
        assert!(config.system_prompt.contains("under 100 words"));
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            bind: Some("0.0.0.0:9000".to_string()),
            secrets: Some("/etc/matrix-chat/secrets.toml".to_string()),
            base_url: Some("http://localhost:11434/v1/".to_string()),
            timeout_secs: Some(5),
            session_ttl_secs: Some(120),
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.bind.to_string(), "0.0.0.0:9000");
        assert_eq!(
            config.secrets_path,
            PathBuf::from("/etc/matrix-chat/secrets.toml")
        );
        assert_eq!(config.base_url, "http://localhost:11434/v1/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.session_ttl, Duration::from_secs(120));
    }

    #[test]
    fn config_from_args_rejects_bad_values() {
        let args = ChatArgs {
            bind: Some("not-an-address".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).is_err());

        let args = ChatArgs {
            timeout_secs: Some(0),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).is_err());
    }

    #[test]
    fn session_ttl_must_outlast_a_request() {
        let args = ChatArgs {
            session_ttl_secs: Some(0),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).is_err());

        let args = ChatArgs {
            timeout_secs: Some(30),
            session_ttl_secs: Some(10),
            ..ChatArgs::default()
        };
        let err = ChatConfig::try_from(args).unwrap_err();
        assert!(err.to_string().contains("--session-ttl-secs"), "{err}");

        let args = ChatArgs {
            timeout_secs: Some(30),
            session_ttl_secs: Some(30),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).is_ok());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_bind(SocketAddr::from(([0, 0, 0, 0], 80)))
            .with_secrets_path("s.toml")
            .with_base_url("http://example.test/v1/")
            .with_timeout(Duration::from_secs(3))
            .with_session_ttl(Duration::from_secs(9))
            .with_model(Model::from("gpt-4o-mini"))
            .with_max_tokens(64);
        assert_eq!(config.bind.port(), 80);
        assert_eq!(config.secrets_path, PathBuf::from("s.toml"));
        assert_eq!(config.base_url, "http://example.test/v1/");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.session_ttl, Duration::from_secs(9));
        assert_eq!(config.model, Model::from("gpt-4o-mini"));
        assert_eq!(config.max_tokens, 64);
    }
}
