//! Route protection decisions.
//!
//! [`RouteGuard::decide`] is a pure function of the session snapshot, the
//! target route's required roles, and the current path. The decision order is
//! a contract - reordering the rules changes observable redirect behavior:
//!
//! 1. No token → redirect to login.
//! 2. Authenticating → show a loading placeholder (suspend the decision).
//! 3. Two-factor verification in progress and not on the two-factor route →
//!    render; the two-factor flow owns navigation, and redirecting here races
//!    against it.
//! 4. Otherwise not authenticated (and not mid-setup) → redirect to login.
//! 5. Role not in the route's required set → redirect to the user's own
//!    dashboard. A role mismatch is not an authentication failure, so never
//!    to login.
//! 6. Two-factor setup still required and not on the two-factor route →
//!    redirect to the two-factor route.
//! 7. Render.
//!
//! Missing information always resolves to the most restrictive redirect
//! (login); the guard itself never errors.

use crate::auth::{AuthPhase, AuthSnapshot};
use crate::models::Role;

/// Login form route.
pub const LOGIN_PATH: &str = "/auth/login";

/// Two-factor verification and setup route.
pub const TWO_FACTOR_PATH: &str = "/auth/two-factor";

/// Whether a path belongs to the authentication flow (login, two-factor,
/// password reset). These routes are exempt from liveness checks.
pub fn is_auth_route(path: &str) -> bool {
    path == "/auth" || path.starts_with("/auth/")
}

/// What the navigation layer should do with the target route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Render the route's content.
    Render,
    /// Keep a loading placeholder up; authentication is still resolving.
    Loading,
    /// Navigate elsewhere instead of rendering.
    Redirect(String),
}

pub struct RouteGuard;

impl RouteGuard {
    /// Decide whether the target route may render. Pure: the same inputs
    /// always produce the same decision.
    ///
    /// `required_roles` empty means the route only requires authentication.
    pub fn decide(
        snapshot: &AuthSnapshot,
        required_roles: &[Role],
        current_path: &str,
    ) -> RouteDecision {
        // 1. No candidate session at all.
        if !snapshot.token_present {
            return RouteDecision::Redirect(LOGIN_PATH.to_string());
        }

        // 2. Credential check still in flight (e.g. silent refresh on reload).
        if snapshot.phase == AuthPhase::Authenticating {
            return RouteDecision::Loading;
        }

        // 3. The two-factor flow navigates on its own; stay out of its way.
        if snapshot.phase == AuthPhase::TwoFactorVerification && current_path != TWO_FACTOR_PATH {
            return RouteDecision::Render;
        }

        // 4. Anything else short of (near-)complete authentication.
        if snapshot.phase != AuthPhase::Authenticated
            && snapshot.phase != AuthPhase::TwoFactorSetup
        {
            return RouteDecision::Redirect(LOGIN_PATH.to_string());
        }

        // 5. Wrong role goes to its own dashboard, never to login.
        if !required_roles.is_empty() {
            match &snapshot.user {
                Some(user) if required_roles.contains(&user.role) => {}
                Some(user) => {
                    return RouteDecision::Redirect(user.role.dashboard_path().to_string());
                }
                None => return RouteDecision::Redirect(LOGIN_PATH.to_string()),
            }
        }

        // 6. Setup debt blocks everything except the two-factor route itself.
        if snapshot.needs_two_factor_setup() && current_path != TWO_FACTOR_PATH {
            return RouteDecision::Redirect(TWO_FACTOR_PATH.to_string());
        }

        // 7.
        RouteDecision::Render
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn user(role: Role) -> User {
        User {
            id: "u-1".into(),
            email: "person@praktijk.nl".into(),
            role,
            two_factor_enabled: false,
            two_factor_setup_completed: false,
        }
    }

    fn snapshot(phase: AuthPhase, user: Option<User>, token_present: bool) -> AuthSnapshot {
        AuthSnapshot {
            phase,
            user,
            token_present,
        }
    }

    fn redirect(path: &str) -> RouteDecision {
        RouteDecision::Redirect(path.to_string())
    }

    #[test]
    fn test_no_token_redirects_to_login() {
        let snap = snapshot(AuthPhase::Idle, None, false);
        assert_eq!(
            RouteGuard::decide(&snap, &[], "/client/dashboard"),
            redirect(LOGIN_PATH)
        );
        // Even a mismatched role question resolves to login without a token.
        assert_eq!(
            RouteGuard::decide(&snap, &[Role::Admin], "/admin/dashboard"),
            redirect(LOGIN_PATH)
        );
    }

    #[test]
    fn test_authenticating_shows_loading() {
        let snap = snapshot(AuthPhase::Authenticating, None, true);
        assert_eq!(
            RouteGuard::decide(&snap, &[Role::Admin], "/admin/dashboard"),
            RouteDecision::Loading
        );
    }

    #[test]
    fn test_two_factor_verification_owns_navigation() {
        let snap = snapshot(AuthPhase::TwoFactorVerification, None, true);
        // Off the two-factor route the guard stays out of the way.
        assert_eq!(
            RouteGuard::decide(&snap, &[], "/client/dashboard"),
            RouteDecision::Render
        );
    }

    #[test]
    fn test_unauthenticated_phases_redirect_to_login() {
        for phase in [AuthPhase::Idle, AuthPhase::Failed] {
            let snap = snapshot(phase, None, true);
            assert_eq!(
                RouteGuard::decide(&snap, &[], "/client/dashboard"),
                redirect(LOGIN_PATH),
                "phase {phase:?}"
            );
        }
    }

    #[test]
    fn test_role_mismatch_redirects_to_own_dashboard() {
        let snap = snapshot(AuthPhase::Authenticated, Some(user(Role::Client)), true);
        assert_eq!(
            RouteGuard::decide(&snap, &[Role::Admin], "/admin/users"),
            redirect("/client/dashboard")
        );
    }

    #[test]
    fn test_matching_role_renders() {
        let snap = snapshot(AuthPhase::Authenticated, Some(user(Role::Therapist)), true);
        assert_eq!(
            RouteGuard::decide(
                &snap,
                &[Role::Therapist, Role::Substitute],
                "/therapist/agenda"
            ),
            RouteDecision::Render
        );
    }

    #[test]
    fn test_authenticated_without_role_requirement_renders() {
        let snap = snapshot(AuthPhase::Authenticated, Some(user(Role::Bookkeeper)), true);
        assert_eq!(
            RouteGuard::decide(&snap, &[], "/invoices"),
            RouteDecision::Render
        );
    }

    #[test]
    fn test_missing_user_with_role_requirement_is_restrictive() {
        // Authenticated phase but no user record: fall back to login.
        let snap = snapshot(AuthPhase::Authenticated, None, true);
        assert_eq!(
            RouteGuard::decide(&snap, &[Role::Admin], "/admin/users"),
            redirect(LOGIN_PATH)
        );
    }

    #[test]
    fn test_setup_debt_redirects_to_two_factor_route() {
        let mut u = user(Role::Therapist);
        u.two_factor_enabled = true;
        u.two_factor_setup_completed = false;
        let snap = snapshot(AuthPhase::TwoFactorSetup, Some(u), true);

        assert_eq!(
            RouteGuard::decide(&snap, &[], "/therapist/agenda"),
            redirect(TWO_FACTOR_PATH)
        );
        // On the two-factor route itself, render.
        assert_eq!(
            RouteGuard::decide(&snap, &[], TWO_FACTOR_PATH),
            RouteDecision::Render
        );
    }

    #[test]
    fn test_role_check_precedes_setup_check() {
        // A client with setup debt visiting an admin route lands on its own
        // dashboard first; the guard there will forward it to setup.
        let mut u = user(Role::Client);
        u.two_factor_enabled = true;
        let snap = snapshot(AuthPhase::TwoFactorSetup, Some(u), true);
        assert_eq!(
            RouteGuard::decide(&snap, &[Role::Admin], "/admin/users"),
            redirect("/client/dashboard")
        );
    }

    #[test]
    fn test_decision_is_idempotent() {
        let snap = snapshot(AuthPhase::Authenticated, Some(user(Role::Admin)), true);
        let first = RouteGuard::decide(&snap, &[Role::Admin], "/admin/users");
        let second = RouteGuard::decide(&snap, &[Role::Admin], "/admin/users");
        assert_eq!(first, second);
        assert_eq!(first, RouteDecision::Render);
    }

    #[test]
    fn test_is_auth_route() {
        assert!(is_auth_route("/auth/login"));
        assert!(is_auth_route("/auth/two-factor"));
        assert!(is_auth_route("/auth"));
        assert!(!is_auth_route("/client/dashboard"));
        assert!(!is_auth_route("/authoring"));
    }
}
