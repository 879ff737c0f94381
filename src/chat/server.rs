//! HTTP surface for the chat page.
//!
//! Each browser gets its own [`ChatSession`], found through a session cookie.
//! A session sits behind its own async mutex; a request that finds it locked
//! is answered with the busy page instead of queueing behind the round in
//! flight.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Form, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::chat::config::ChatConfig;
use crate::chat::render::{render, render_busy};
use crate::chat::session::{ChatSession, SubmitOutcome};
use crate::completion::Connector;
use crate::credential::CredentialResolver;
use crate::error::{Error, Result};
use crate::observability::{SESSION_BUSY, SESSION_CREATED, SESSION_EVICTED};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "matrix_chat_session";

type SharedSession = Arc<Mutex<ChatSession>>;

struct SessionSlot {
    session: SharedSession,
    last_seen: Instant,
}

struct Inner {
    resolver: CredentialResolver,
    connector: Arc<dyn Connector>,
    session_ttl: Duration,
    sessions: Mutex<HashMap<Uuid, SessionSlot>>,
}

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl AppState {
    /// Create the state for a server.
    pub fn new(
        config: &ChatConfig,
        resolver: CredentialResolver,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                connector,
                session_ttl: config.session_ttl,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Find the caller's session, or start a new one.
    ///
    /// Returns the session id, the session, and whether it was just created.
    /// The registry lock is not held while a new session resolves its
    /// credential and builds its client.
    async fn session_for(
        &self,
        headers: &HeaderMap,
    ) -> std::result::Result<(Uuid, SharedSession, bool), Response> {
        let requested = session_id(headers);
        {
            let now = Instant::now();
            let mut sessions = self.inner.sessions.lock().await;
            self.inner.sweep(&mut sessions, now);
            if let Some(id) = requested
                && let Some(slot) = sessions.get_mut(&id)
            {
                slot.last_seen = now;
                return Ok((id, Arc::clone(&slot.session), false));
            }
        }

        let inner = Arc::clone(&self.inner);
        let session = match tokio::task::spawn_blocking(move || inner.start_session()).await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(error = %err, "starting a session failed");
                return Err(
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response(),
                );
            }
        };

        let id = Uuid::new_v4();
        tracing::info!(session = %id, phase = ?session.phase(), "started session");
        SESSION_CREATED.click();
        let session = Arc::new(Mutex::new(session));
        self.inner.sessions.lock().await.insert(
            id,
            SessionSlot {
                session: Arc::clone(&session),
                last_seen: Instant::now(),
            },
        );
        Ok((id, session, true))
    }

    /// Mark a session as active now.
    async fn touch(&self, id: Uuid) {
        if let Some(slot) = self.inner.sessions.lock().await.get_mut(&id) {
            slot.last_seen = Instant::now();
        }
    }
}

impl Inner {
    /// Drop sessions idle longer than the TTL. A session with a round in
    /// flight is never idle.
    fn sweep(&self, sessions: &mut HashMap<Uuid, SessionSlot>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, slot| {
            slot.session.try_lock().is_err()
                || now.duration_since(slot.last_seen) <= self.session_ttl
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            for _ in 0..evicted {
                SESSION_EVICTED.click();
            }
            tracing::info!(evicted, "evicted idle sessions");
        }
    }

    /// Resolve the credential and configure a fresh session. Reads the
    /// secrets file and builds an HTTP client, so it runs on a blocking thread.
    fn start_session(&self) -> ChatSession {
        let mut session = ChatSession::new(self.resolver.resolve());
        session.configure(self.connector.as_ref());
        session
    }
}

/// Build the router serving the chat page.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/send", post(handle_send))
        .route("/clear", post(handle_clear))
        .route("/api/session", get(handle_api_session))
        .route("/healthz", get(handle_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the chat page on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(?addr, "serving chat page");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| Error::io("server failed", err))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[derive(Debug, Deserialize)]
struct SendForm {
    #[serde(default)]
    message: String,
}

async fn handle_index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, session, created) = match state.session_for(&headers).await {
        Ok(found) => found,
        Err(response) => return response,
    };
    let response = match session.try_lock() {
        Ok(session) => Html(render(&session.view())).into_response(),
        Err(_) => {
            SESSION_BUSY.click();
            Html(render_busy()).into_response()
        }
    };
    with_session_cookie(response, id, created)
}

async fn handle_send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SendForm>,
) -> Response {
    let (id, session, created) = match state.session_for(&headers).await {
        Ok(found) => found,
        Err(response) => return response,
    };
    let Some(mut guard) = lock_or_busy(session) else {
        return with_session_cookie(busy_response(), id, created);
    };

    // A dropped connection must not abandon a round halfway.
    let registry = state.clone();
    let round = tokio::spawn(async move {
        let outcome = guard.submit(&form.message).await;
        // Still holding the session, so a sweep cannot slip in before this.
        registry.touch(id).await;
        outcome
    });
    let response = match round.await {
        Ok(outcome) => {
            if outcome == SubmitOutcome::NotReady {
                tracing::debug!(session = %id, "submission while not ready");
            }
            Redirect::to("/").into_response()
        }
        Err(err) => {
            tracing::error!(session = %id, error = %err, "chat round panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    };
    with_session_cookie(response, id, created)
}

async fn handle_clear(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, session, created) = match state.session_for(&headers).await {
        Ok(found) => found,
        Err(response) => return response,
    };
    let response = match lock_or_busy(session) {
        Some(mut guard) => {
            guard.clear();
            Redirect::to("/").into_response()
        }
        None => busy_response(),
    };
    with_session_cookie(response, id, created)
}

async fn handle_api_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, session, created) = match state.session_for(&headers).await {
        Ok(found) => found,
        Err(response) => return response,
    };
    let response = match session.try_lock() {
        Ok(session) => Json(session.view()).into_response(),
        Err(_) => {
            SESSION_BUSY.click();
            (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "error": "session is busy" })),
            )
                .into_response()
        }
    };
    with_session_cookie(response, id, created)
}

async fn handle_health() -> &'static str {
    "ok"
}

fn lock_or_busy(session: SharedSession) -> Option<OwnedMutexGuard<ChatSession>> {
    match session.try_lock_owned() {
        Ok(guard) => Some(guard),
        Err(_) => {
            SESSION_BUSY.click();
            None
        }
    }
}

fn busy_response() -> Response {
    (StatusCode::CONFLICT, Html(render_busy())).into_response()
}

fn with_session_cookie(mut response: Response, id: Uuid, created: bool) -> Response {
    if created {
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Extract the session id from the request's cookies.
fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}
