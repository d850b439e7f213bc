//! Core session library for the Praxis EPD front-end.
//!
//! Praxis is a multi-role practice management system (electronic patient
//! dossier) serving administrators, therapists, clients, bookkeepers, and
//! assistants. This crate owns the client-side authentication lifecycle the
//! UI shells build on:
//!
//! - [`SessionStore`]: the login / two-factor / refresh / logout state machine
//! - [`RouteGuard`]: decides whether a navigation target may render
//! - [`AuthMonitor`]: background watcher for cross-context logout
//! - [`AuthError`]: closed classification of Auth API failures
//!
//! The remote Auth REST API is an external collaborator reached through the
//! [`AuthApi`] trait; [`HttpAuthClient`] is its reqwest implementation.
//!
//! # Wiring
//!
//! ```no_run
//! use std::sync::Arc;
//! use praxis_core::{
//!     Config, FileSessionStorage, HttpAuthClient, SessionStore,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let api = Arc::new(HttpAuthClient::new(config.api_base_url.clone())?);
//! let storage = Arc::new(FileSessionStorage::new(config.state_dir()?)?);
//! let store = Arc::new(SessionStore::new(api, storage));
//! // On startup, resolve any persisted token:
//! // store.refresh_auth().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;

pub use api::{AuthApi, AuthError, HttpAuthClient, LoginResponse, UserMessage};
pub use auth::{
    AuthMonitor, AuthPhase, AuthSnapshot, FileSessionStorage, LoginOutcome, MemorySessionStorage,
    MonitorHandle, Navigator, RefreshOutcome, SessionRecord, SessionStorage, SessionStore,
    VerifyOutcome,
};
pub use config::Config;
pub use guard::{is_auth_route, RouteDecision, RouteGuard, LOGIN_PATH, TWO_FACTOR_PATH};
pub use models::{Role, User};
