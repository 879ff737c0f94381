//! Per-session chat state.
//!
//! A [`ChatSession`] is the whole context of one person's page: whether a
//! credential was found, the completion handle built from it, and the
//! transcript.  Every operation takes the session explicitly; the server keeps
//! one per browser session behind its own lock so rounds never interleave.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::chat::transcript::Transcript;
use crate::completion::{Completer, Connector};
use crate::credential::Credential;
use crate::observability::{SESSION_IGNORED, SESSION_ROUND_DURATION, SESSION_SUBMISSIONS};
use crate::types::{ChatTurn, Role};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "detail", rename_all = "snake_case")]
pub enum Phase {
    /// No credential was found; the page shows setup instructions.
    Unconfigured,
    /// A credential was found but the completion client is not built yet.
    Configuring,
    /// Waiting for input.
    Ready,
    /// A submission is being answered.
    AwaitingResponse,
    /// The completion client could not be built; terminal for the session.
    Failed(String),
}

/// What happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A user turn and an assistant turn were appended.
    Answered,
    /// The text was empty or whitespace; nothing changed.
    Ignored,
    /// The session cannot accept input in its current phase.
    NotReady,
}

/// Read-only snapshot of a session for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    /// Current phase.
    #[serde(flatten)]
    pub phase: Phase,
    /// Whether an API credential was found.
    pub credential_present: bool,
    /// Number of turns in the transcript.
    pub message_count: usize,
    /// The transcript, oldest first.
    pub turns: Vec<ChatTurn>,
}

/// The state of one interactive chat session.
pub struct ChatSession {
    phase: Phase,
    credential: Option<Credential>,
    completer: Option<Arc<dyn Completer>>,
    transcript: Transcript,
}

impl ChatSession {
    /// Start a session with whatever credential resolution produced.
    pub fn new(credential: Option<Credential>) -> Self {
        let phase = if credential.is_some() {
            Phase::Configuring
        } else {
            Phase::Unconfigured
        };
        Self {
            phase,
            credential,
            completer: None,
            transcript: Transcript::new(),
        }
    }

    /// Build the completion handle.
    ///
    /// Moves `Configuring` to `Ready` or `Failed`; does nothing in any other
    /// phase, so the handle is built at most once per session.
    pub fn configure(&mut self, connector: &dyn Connector) {
        if self.phase != Phase::Configuring {
            return;
        }
        let Some(credential) = self.credential.as_ref() else {
            self.phase = Phase::Unconfigured;
            return;
        };
        match connector.connect(credential) {
            Ok(completer) => {
                self.completer = Some(completer);
                self.phase = Phase::Ready;
            }
            Err(err) => {
                self.phase = Phase::Failed(err.to_string());
            }
        }
    }

    /// Submit user text and wait for the reply.
    ///
    /// Both turns are appended together once the completer returns, so the
    /// transcript never shows an unanswered user turn.
    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        if self.phase != Phase::Ready {
            return SubmitOutcome::NotReady;
        }
        let Some(completer) = self.completer.clone() else {
            return SubmitOutcome::NotReady;
        };
        if text.trim().is_empty() {
            SESSION_IGNORED.click();
            return SubmitOutcome::Ignored;
        }

        SESSION_SUBMISSIONS.click();
        let start = Instant::now();
        self.phase = Phase::AwaitingResponse;
        let reply = completer.complete(text).await;
        self.transcript.append(Role::User, text);
        self.transcript.append(Role::Assistant, reply);
        self.phase = Phase::Ready;
        SESSION_ROUND_DURATION.add(start.elapsed().as_secs_f64());
        SubmitOutcome::Answered
    }

    /// Discard the transcript.  The phase is left alone.
    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// The current phase.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Whether a credential was found when the session started.
    pub fn credential_present(&self) -> bool {
        self.credential.is_some()
    }

    /// The transcript.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Number of turns in the transcript.
    pub fn message_count(&self) -> usize {
        self.transcript.len()
    }

    /// Snapshot the session for rendering.
    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase.clone(),
            credential_present: self.credential_present(),
            message_count: self.transcript.len(),
            turns: self.transcript.all().to_vec(),
        }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("phase", &self.phase)
            .field("credential_present", &self.credential_present())
            .field("message_count", &self.transcript.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::completion::ERROR_PREFIX;
    use crate::error::{Error, Result};

    #[derive(Default)]
    struct Echo {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Completer for Echo {
        async fn complete(&self, user_text: &str) -> String {
            self.calls.lock().unwrap().push(user_text.to_string());
            format!("echo: {user_text}")
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl Completer for Failing {
        async fn complete(&self, _: &str) -> String {
            format!("{ERROR_PREFIX}quota exceeded")
        }
    }

    struct FixedConnector {
        completer: Arc<dyn Completer>,
        connects: AtomicUsize,
    }

    impl FixedConnector {
        fn new(completer: Arc<dyn Completer>) -> Self {
            Self {
                completer,
                connects: AtomicUsize::new(0),
            }
        }
    }

    impl Connector for FixedConnector {
        fn connect(&self, _: &Credential) -> Result<Arc<dyn Completer>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&self.completer))
        }
    }

    struct RefusingConnector;

    impl Connector for RefusingConnector {
        fn connect(&self, _: &Credential) -> Result<Arc<dyn Completer>> {
            Err(Error::authentication("invalid key format"))
        }
    }

    fn ready_session(completer: Arc<dyn Completer>) -> ChatSession {
        let mut session = ChatSession::new(Some(Credential::new("sk-test")));
        session.configure(&FixedConnector::new(completer));
        assert_eq!(session.phase(), &Phase::Ready);
        session
    }

    #[test]
    fn absent_credential_is_unconfigured() {
        let mut session = ChatSession::new(None);
        assert_eq!(session.phase(), &Phase::Unconfigured);
        let connector = FixedConnector::new(Arc::new(Echo::default()));
        session.configure(&connector);
        assert_eq!(session.phase(), &Phase::Unconfigured);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
        assert!(!session.credential_present());
    }

    #[tokio::test]
    async fn unconfigured_session_makes_no_calls() {
        let echo = Arc::new(Echo::default());
        let mut session = ChatSession::new(None);
        session.configure(&FixedConnector::new(echo.clone()));
        assert_eq!(session.submit("hello").await, SubmitOutcome::NotReady);
        assert_eq!(session.message_count(), 0);
        assert!(echo.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn configure_builds_handle_once() {
        let connector = FixedConnector::new(Arc::new(Echo::default()));
        let mut session = ChatSession::new(Some(Credential::new("sk-test")));
        assert_eq!(session.phase(), &Phase::Configuring);
        session.configure(&connector);
        session.configure(&connector);
        assert_eq!(session.phase(), &Phase::Ready);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn construction_failure_is_terminal() {
        let mut session = ChatSession::new(Some(Credential::new("sk-test")));
        session.configure(&RefusingConnector);
        assert_eq!(
            session.phase(),
            &Phase::Failed("Authentication error: invalid key format".to_string())
        );
        session.configure(&FixedConnector::new(Arc::new(Echo::default())));
        assert!(matches!(session.phase(), Phase::Failed(_)));
        assert_eq!(session.submit("hello").await, SubmitOutcome::NotReady);
    }

    #[tokio::test]
    async fn hello_round() {
        let mut session = ready_session(Arc::new(Echo::default()));
        assert_eq!(session.submit("hello").await, SubmitOutcome::Answered);
        assert_eq!(
            session.transcript().all(),
            &[ChatTurn::user("hello"), ChatTurn::assistant("echo: hello")]
        );
        assert_eq!(session.phase(), &Phase::Ready);
    }

    #[tokio::test]
    async fn n_submissions_alternate() {
        let mut session = ready_session(Arc::new(Echo::default()));
        let inputs = ["one", "two", "  three  ", "four"];
        for input in inputs {
            assert_eq!(session.submit(input).await, SubmitOutcome::Answered);
        }
        let turns = session.transcript().all();
        assert_eq!(turns.len(), 2 * inputs.len());
        for (i, turn) in turns.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role(), expected);
        }
        assert_eq!(turns[4].text(), "  three  ");
    }

    #[tokio::test]
    async fn blank_submissions_are_ignored() {
        let echo = Arc::new(Echo::default());
        let mut session = ready_session(echo.clone());
        session.submit("first").await;
        let before = session.transcript().clone();
        for blank in ["", " ", "\t\n", "   \r\n  "] {
            assert_eq!(session.submit(blank).await, SubmitOutcome::Ignored);
        }
        assert_eq!(session.transcript(), &before);
        assert_eq!(echo.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failures_become_assistant_turns() {
        let mut session = ready_session(Arc::new(Failing));
        assert_eq!(session.submit("hello").await, SubmitOutcome::Answered);
        let turns = session.transcript().all();
        assert_eq!(turns[1].role(), Role::Assistant);
        assert!(turns[1].text().starts_with("Error: "));
        assert_eq!(session.submit("again").await, SubmitOutcome::Answered);
        assert_eq!(session.message_count(), 4);
    }

    #[tokio::test]
    async fn clear_keeps_session_ready() {
        let mut session = ready_session(Arc::new(Echo::default()));
        session.submit("one").await;
        session.submit("two").await;
        session.clear();
        assert_eq!(session.message_count(), 0);
        assert_eq!(session.phase(), &Phase::Ready);
        assert_eq!(session.submit("three").await, SubmitOutcome::Answered);
        assert_eq!(session.message_count(), 2);
    }

    #[tokio::test]
    async fn view_snapshot() {
        let mut session = ready_session(Arc::new(Echo::default()));
        session.submit("hi").await;
        let view = session.view();
        assert_eq!(view.phase, Phase::Ready);
        assert!(view.credential_present);
        assert_eq!(view.message_count, 2);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["phase"], "ready");
        assert_eq!(json["turns"][0]["role"], "user");
        assert_eq!(json["message_count"], 2);
    }
}
