//! The chat page: sessions, rendering and the HTTP server.
//!
//! This module turns the completion client into a single-page chat interface.
//! It supports:
//!
//! - One transcript per browser session, kept in memory
//! - A pure render step from session snapshot to HTML
//! - A busy page while a session's request is in flight
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`transcript`]: the ordered record of turns
//! - [`session`]: the per-session state machine
//! - [`render`]: HTML rendering
//! - [`server`]: routes and the session registry

pub mod config;
mod render;
mod server;
mod session;
mod transcript;

pub use config::{ChatArgs, ChatArgsError, ChatConfig};
pub use render::{escape_html, render, render_busy};
pub use server::{AppState, SESSION_COOKIE, router, serve};
pub use session::{ChatSession, Phase, SessionView, SubmitOutcome};
pub use transcript::Transcript;
