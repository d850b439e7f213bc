//! Authentication module: session lifecycle, persistence, and liveness.
//!
//! This module provides:
//! - `SessionStore`: the authentication state machine (login, two-factor,
//!   silent refresh, logout)
//! - `SessionStorage`: durable session persistence shared across contexts
//! - `AuthMonitor`: background watcher that reacts to a disappearing token
//!
//! Sessions are persisted as a single JSON record; pending login credentials
//! never leave memory.

pub mod monitor;
pub mod storage;
pub mod store;

pub use monitor::{AuthMonitor, MonitorHandle, Navigator, LIVENESS_INTERVAL};
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionRecord, SessionStorage};
pub use store::{
    AuthPhase, AuthSnapshot, LoginOutcome, RefreshOutcome, SessionStore, VerifyOutcome,
};
