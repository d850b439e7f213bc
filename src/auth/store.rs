//! Session state machine for the Praxis front-end.
//!
//! `SessionStore` owns every authentication transition: login, two-factor
//! verification, silent refresh from a persisted token, and logout. All
//! operations return discriminated outcomes - expected failures never
//! propagate as raw errors past this surface.
//!
//! Overlapping asynchronous operations are resolved with a generation stamp:
//! each state-mutating operation bumps the generation when it starts, and a
//! completion only applies if no later operation has started in the meantime.
//! Stale completions resolve to `Superseded` and mutate nothing.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{AuthApi, AuthError, LoginResponse};
use crate::models::{Role, User};

use super::storage::{SessionRecord, SessionStorage};

// ============================================================================
// Phases and snapshots
// ============================================================================

/// Authentication phase (closed enumeration).
///
/// `Idle` is both the initial and the post-logout state; `Authenticated` is
/// stable until logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Idle,
    Authenticating,
    TwoFactorSetup,
    TwoFactorVerification,
    Authenticated,
    Failed,
}

/// Immutable view of the session handed to the UI layer and the route guard.
///
/// `token_present` is read fresh from storage at snapshot time - another
/// browsing context may remove the token at any moment, so it is never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub phase: AuthPhase,
    pub user: Option<User>,
    pub token_present: bool,
}

impl AuthSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.phase == AuthPhase::Authenticating
    }

    /// Whether the account still has to complete two-factor setup. Derived
    /// from the phase as well as the user flags so the guard can decide even
    /// when only one of the two is available.
    pub fn needs_two_factor_setup(&self) -> bool {
        self.phase == AuthPhase::TwoFactorSetup
            || self
                .user
                .as_ref()
                .is_some_and(User::needs_two_factor_setup)
    }
}

// ============================================================================
// Operation outcomes
// ============================================================================

/// Outcome of [`SessionStore::login`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Fully authenticated; the user and token are stored.
    Complete(User),
    /// First factor accepted; a two-factor code is required to continue.
    TwoFactorRequired,
    /// Credentials accepted, but the account must finish two-factor setup
    /// before it gets full access.
    SetupRequired(User),
    Failed(AuthError),
    /// A newer login started before this one finished; nothing was changed.
    Superseded,
}

/// Outcome of [`SessionStore::verify_two_factor`].
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    Complete(User),
    SetupRequired(User),
    Failed(AuthError),
    Superseded,
}

/// Outcome of [`SessionStore::refresh_auth`].
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The persisted token resolved to a user.
    Restored(User),
    /// No persisted token; nothing to do.
    NoSession,
    /// The server rejected the token; the persisted session was cleared.
    Invalid,
    /// Transport failure; the persisted token is kept for a later retry.
    Failed(AuthError),
    Superseded,
}

/// Credentials retained between first-factor success and two-factor
/// completion. Held in memory only; never written to durable storage.
#[derive(Clone)]
struct PendingCredentials {
    email: String,
    password: String,
}

struct SessionState {
    phase: AuthPhase,
    user: Option<User>,
    pending: Option<PendingCredentials>,
    /// Bumped by every state-mutating operation; completions compare against
    /// it to detect that they have been superseded.
    generation: u64,
}

type RefreshFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

// ============================================================================
// SessionStore
// ============================================================================

/// Process-wide authentication state container.
///
/// Explicitly owned and injectable: the host creates one at startup (wrapped
/// in an `Arc`), hands it to the UI and the liveness monitor, and resets it
/// through [`logout`](Self::logout). The store is the single writer of the
/// persisted session record besides logout in another context.
pub struct SessionStore {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn SessionStorage>,
    state: Arc<Mutex<SessionState>>,
    refresh_flight: tokio::sync::Mutex<Option<RefreshFlight>>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            api,
            storage,
            state: Arc::new(Mutex::new(SessionState {
                phase: AuthPhase::Idle,
                user: None,
                pending: None,
                generation: 0,
            })),
            refresh_flight: tokio::sync::Mutex::new(None),
        }
    }

    /// Current session view with a fresh token-presence read.
    pub fn snapshot(&self) -> AuthSnapshot {
        let token_present = self.storage.token().is_some();
        let state = lock_state(&self.state);
        AuthSnapshot {
            phase: state.phase,
            user: state.user.clone(),
            token_present,
        }
    }

    /// Canonical landing route for a role. Pure; unknown roles map to a safe
    /// default instead of erroring.
    pub fn dashboard_path(role: Role) -> &'static str {
        role.dashboard_path()
    }

    /// Watch for the token being removed by another browsing context.
    pub fn removal_events(&self) -> watch::Receiver<u64> {
        self.storage.removal_events()
    }

    /// Authenticate with email and password.
    ///
    /// Empty credentials fail locally without a network call; an unreachable
    /// server resolves to a classified `Network` failure.
    pub async fn login(&self, email: &str, password: &str) -> LoginOutcome {
        if email.trim().is_empty() || password.is_empty() {
            return LoginOutcome::Failed(AuthError::Validation {
                field: None,
                message: "Email and password are required".to_string(),
            });
        }

        let my_gen = {
            let mut state = lock_state(&self.state);
            state.generation += 1;
            state.phase = AuthPhase::Authenticating;
            state.user = None;
            state.pending = Some(PendingCredentials {
                email: email.to_string(),
                password: password.to_string(),
            });
            state.generation
        };

        let result = self.api.login(email, password, None).await;

        let mut state = lock_state(&self.state);
        if state.generation != my_gen {
            debug!("Discarding superseded login completion");
            return LoginOutcome::Superseded;
        }

        match result {
            Ok(response) if response.requires_two_factor => {
                // Keep the pending credentials for verify_two_factor.
                state.phase = AuthPhase::TwoFactorVerification;
                LoginOutcome::TwoFactorRequired
            }
            Ok(response) => match self.apply_login_success(&mut state, response) {
                Ok(applied) => applied,
                Err(err) => self.fail_login(&mut state, err),
            },
            Err(err) => self.fail_login(&mut state, err),
        }
    }

    /// Resolve a pending two-factor challenge.
    ///
    /// Only valid from the verification phase with pending credentials set;
    /// anything else is a client-state error and never reaches the network.
    /// A wrong or expired code keeps the verification phase so the user can
    /// retry.
    pub async fn verify_two_factor(&self, code: &str) -> VerifyOutcome {
        let (credentials, my_gen) = {
            let mut state = lock_state(&self.state);
            if state.phase != AuthPhase::TwoFactorVerification {
                return VerifyOutcome::Failed(AuthError::InvalidState(
                    "no two-factor verification in progress",
                ));
            }
            let Some(credentials) = state.pending.clone() else {
                return VerifyOutcome::Failed(AuthError::InvalidState(
                    "no pending login credentials",
                ));
            };
            // Rejecting an empty code locally must not supersede a
            // completion that is already in flight.
            if code.trim().is_empty() {
                return VerifyOutcome::Failed(AuthError::InvalidTwoFactor);
            }
            state.generation += 1;
            (credentials, state.generation)
        };

        let result = self
            .api
            .login(&credentials.email, &credentials.password, Some(code))
            .await;

        let mut state = lock_state(&self.state);
        if state.generation != my_gen {
            debug!("Discarding superseded two-factor completion");
            return VerifyOutcome::Superseded;
        }

        match result {
            Ok(response) => match self.apply_login_success(&mut state, response) {
                Ok(LoginOutcome::Complete(user)) => VerifyOutcome::Complete(user),
                Ok(LoginOutcome::SetupRequired(user)) => VerifyOutcome::SetupRequired(user),
                Ok(_) => {
                    state.phase = AuthPhase::TwoFactorVerification;
                    VerifyOutcome::Failed(AuthError::Server(
                        "Incomplete login response".to_string(),
                    ))
                }
                Err(err) => {
                    // Stay in the verification phase on anything short of a
                    // full success so the user can retry.
                    state.phase = AuthPhase::TwoFactorVerification;
                    VerifyOutcome::Failed(err)
                }
            },
            Err(err) => {
                state.phase = AuthPhase::TwoFactorVerification;
                debug!(error = %err, "Two-factor verification rejected");
                VerifyOutcome::Failed(err)
            }
        }
    }

    /// Resolve the user from a persisted token without credentials, as done
    /// on application start. Concurrent callers share a single in-flight
    /// verification request and receive the same outcome.
    pub async fn refresh_auth(&self) -> RefreshOutcome {
        // Already resolved and the token is still there: nothing to verify.
        if self.storage.token().is_some() {
            let state = lock_state(&self.state);
            if state.phase == AuthPhase::Authenticated {
                if let Some(user) = state.user.clone() {
                    return RefreshOutcome::Restored(user);
                }
            }
        }

        let flight = {
            let mut slot = self.refresh_flight.lock().await;
            if let Some(flight) = slot.as_ref() {
                flight.clone()
            } else {
                let api = Arc::clone(&self.api);
                let storage = Arc::clone(&self.storage);
                let state = Arc::clone(&self.state);
                let flight: RefreshFlight =
                    run_refresh(api, storage, state).boxed().shared();
                *slot = Some(flight.clone());
                flight
            }
        };

        let outcome = flight.clone().await;

        // Only the flight this caller awaited may be removed; a newer flight
        // installed meanwhile stays in place until its own awaiters finish.
        let mut slot = self.refresh_flight.lock().await;
        if slot.as_ref().is_some_and(|f| f.ptr_eq(&flight)) {
            *slot = None;
        }
        outcome
    }

    /// End the session. Local cleanup is guaranteed; the remote invalidation
    /// call is best-effort and its failure is only logged.
    pub async fn logout(&self) {
        let token = self.storage.token();

        {
            let mut state = lock_state(&self.state);
            state.generation += 1;
            state.phase = AuthPhase::Idle;
            state.user = None;
            state.pending = None;
        }
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "Failed to clear persisted session");
        }
        info!("Session ended locally");

        if let Some(token) = token {
            if let Err(err) = self.api.logout(&token).await {
                warn!(error = %err, "Remote logout failed; local session already cleared");
            }
        }
    }

    /// Ask the backend to send a fresh verification email.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        self.api.resend_verification(email).await
    }

    /// Apply a successful `POST /auth/login` response: route the account to
    /// full access or two-factor setup, persist the session, clear pending
    /// credentials. Returns `Err` when the response is missing its token or
    /// user despite claiming success.
    fn apply_login_success(
        &self,
        state: &mut SessionState,
        response: LoginResponse,
    ) -> Result<LoginOutcome, AuthError> {
        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "Login was rejected".to_string());
            return Err(AuthError::Unclassified(message));
        }
        let (Some(token), Some(user)) = (response.access_token, response.user) else {
            return Err(AuthError::Server(
                "Login response missing token or user".to_string(),
            ));
        };

        state.pending = None;
        state.user = Some(user.clone());

        // The setup check runs after first-factor success, before granting
        // full access.
        state.phase = if user.needs_two_factor_setup() {
            AuthPhase::TwoFactorSetup
        } else {
            AuthPhase::Authenticated
        };

        let record = SessionRecord::new(token, Some(user.clone()));
        if let Err(err) = self.storage.store(&record) {
            warn!(error = %err, "Failed to persist session; continuing in memory");
        }

        info!(role = user.role.display_name(), "Login complete");
        if state.phase == AuthPhase::TwoFactorSetup {
            Ok(LoginOutcome::SetupRequired(user))
        } else {
            Ok(LoginOutcome::Complete(user))
        }
    }

    fn fail_login(&self, state: &mut SessionState, err: AuthError) -> LoginOutcome {
        state.phase = AuthPhase::Failed;
        state.user = None;
        state.pending = None;
        // Terminal failure clears any leftover persisted session as well.
        if let Err(storage_err) = self.storage.clear() {
            warn!(error = %storage_err, "Failed to clear persisted session after login failure");
        }
        debug!(error = %err, "Login failed");
        LoginOutcome::Failed(err)
    }
}

/// The actual token verification behind [`SessionStore::refresh_auth`],
/// detached from `&self` so it can run as a shared future.
async fn run_refresh(
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn SessionStorage>,
    state: Arc<Mutex<SessionState>>,
) -> RefreshOutcome {
    let record = match storage.load() {
        Ok(Some(record)) => record,
        Ok(None) => return RefreshOutcome::NoSession,
        Err(err) => {
            warn!(error = %err, "Failed to read persisted session");
            return RefreshOutcome::NoSession;
        }
    };

    let my_gen = {
        let mut s = lock_state(&state);
        s.generation += 1;
        s.phase = AuthPhase::Authenticating;
        s.generation
    };

    match api.me(&record.access_token).await {
        Ok(user) => {
            let mut s = lock_state(&state);
            if s.generation != my_gen {
                debug!("Discarding superseded refresh completion");
                return RefreshOutcome::Superseded;
            }
            s.user = Some(user.clone());
            s.phase = if user.needs_two_factor_setup() {
                AuthPhase::TwoFactorSetup
            } else {
                AuthPhase::Authenticated
            };
            // Refresh the persisted user snapshot alongside the token.
            let updated = SessionRecord {
                user: Some(user.clone()),
                ..record
            };
            if let Err(err) = storage.store(&updated) {
                warn!(error = %err, "Failed to update persisted session");
            }
            debug!("Silent verification restored session");
            RefreshOutcome::Restored(user)
        }
        Err(err) if err.is_network() => {
            let mut s = lock_state(&state);
            if s.generation != my_gen {
                return RefreshOutcome::Superseded;
            }
            // Keep the token: an offline start should not destroy a session
            // the server never rejected.
            s.phase = AuthPhase::Idle;
            warn!(error = %err, "Silent verification unreachable; keeping persisted token");
            RefreshOutcome::Failed(err)
        }
        Err(err) => {
            let mut s = lock_state(&state);
            if s.generation != my_gen {
                return RefreshOutcome::Superseded;
            }
            s.phase = AuthPhase::Idle;
            s.user = None;
            if let Err(storage_err) = storage.clear() {
                warn!(error = %storage_err, "Failed to clear rejected session");
            }
            info!(error = %err, "Persisted token rejected; session cleared");
            RefreshOutcome::Invalid
        }
    }
}

/// Lock the session state, recovering from a poisoned mutex rather than
/// panicking inside the UI event loop.
fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Tests
// ============================================================================
