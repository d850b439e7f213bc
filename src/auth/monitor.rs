//! Background session liveness monitor.
//!
//! Periodically re-checks that the persisted token still exists, and reacts
//! immediately when another browsing context removes it (cross-context
//! logout). When the token is gone while the user sits on a protected route,
//! the monitor performs exactly one logout and redirects to the login page.
//!
//! The monitor runs as an explicit, cancellable tokio task: stopping or
//! dropping its handle ends the timer, so no loop outlives its host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::guard::{is_auth_route, LOGIN_PATH};

use super::store::{AuthPhase, SessionStore};

/// Liveness check interval.
/// 5 seconds notices a cross-context logout quickly without hammering storage.
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(5);

/// Navigation surface the monitor acts through. The UI shell implements this
/// over its router; tests use a recording fake.
pub trait Navigator: Send + Sync {
    /// The route currently being displayed.
    fn current_path(&self) -> String;

    /// Navigate to the given route.
    fn redirect(&self, path: &str);
}

/// Watches session liveness for a [`SessionStore`].
pub struct AuthMonitor {
    store: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
    interval: Duration,
    logging_out: AtomicBool,
}

impl AuthMonitor {
    pub fn new(store: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self::with_interval(store, navigator, LIVENESS_INTERVAL)
    }

    /// Override the check interval (tests use short intervals).
    pub fn with_interval(
        store: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            navigator,
            interval,
            logging_out: AtomicBool::new(false),
        }
    }

    /// Start the monitor task. The returned handle stops it.
    pub fn spawn(self) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let monitor = Arc::new(self);

        let task = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            async move {
                let mut removals = monitor.store.removal_events();
                let mut ticker = tokio::time::interval(monitor.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick of a tokio interval fires immediately;
                // consume it so checks start one interval after mount.
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = ticker.tick() => monitor.check("tick").await,
                        changed = removals.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            monitor.check("external removal").await;
                        }
                    }
                }
                debug!("Session monitor stopped");
            }
        });

        MonitorHandle { shutdown_tx, task }
    }

    /// One liveness decision: skipped on auth routes and during two-factor
    /// verification; otherwise a missing token on a protected route triggers
    /// a single logout + redirect.
    async fn check(&self, trigger: &str) {
        let path = self.navigator.current_path();
        if is_auth_route(&path) {
            return;
        }

        let snapshot = self.store.snapshot();
        if snapshot.phase == AuthPhase::TwoFactorVerification {
            return;
        }
        if snapshot.token_present {
            return;
        }

        // One logout at a time; overlapping triggers are dropped.
        if self.logging_out.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(trigger, path = %path, "Session token gone; logging out");
        self.store.logout().await;
        self.navigator.redirect(LOGIN_PATH);

        self.logging_out.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running [`AuthMonitor`]. Stopping (or dropping) it cancels the
/// timer task.
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Ask the monitor to stop after its current check.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
