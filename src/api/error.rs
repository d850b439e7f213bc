//! Classification of Auth API failures into a closed error taxonomy.
//!
//! The backend does not return machine-readable error codes, so classification
//! is by HTTP status first, then substring inspection of the server message
//! for sub-cases within a status. Ambiguous messages fall through to
//! `Unclassified` carrying the raw server text.

use serde::Deserialize;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// A failure from the authentication layer, already classified.
///
/// `Clone + PartialEq` so outcomes can flow through shared futures and be
/// asserted on directly in tests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address not verified")]
    EmailNotVerified,

    #[error("Account locked")]
    AccountLocked,

    #[error("Account suspended")]
    AccountSuspended,

    #[error("Two-factor code required")]
    TwoFactorRequired,

    #[error("Invalid two-factor code")]
    InvalidTwoFactor,

    #[error("Email address already registered")]
    EmailAlreadyExists,

    #[error("Password does not meet requirements")]
    WeakPassword,

    #[error("Invalid email address format")]
    InvalidEmailFormat,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Validation failed: {message}")]
    Validation {
        /// Form field the message applies to, when it can be attributed.
        field: Option<String>,
        message: String,
    },

    /// Server message that matched none of the known sub-cases.
    #[error("{0}")]
    Unclassified(String),

    /// Client-side misuse of the session API (e.g. verifying a two-factor
    /// code with no pending login). Never produced by classification.
    #[error("Invalid client state: {0}")]
    InvalidState(&'static str),
}

/// Human-readable rendering of an [`AuthError`] for form banners.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub title: &'static str,
    pub description: String,
    pub suggestions: &'static [&'static str],
}

/// Error payload shape the API uses for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Pull the `message` field out of a JSON error body, falling back to the
    /// raw body text when the response is not the expected shape.
    fn extract_message(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody { message: Some(m) }) if !m.is_empty() => m,
            _ => body.trim().to_string(),
        }
    }

    /// Classify an HTTP failure by status code, then by message content.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body);
        let lower = message.to_lowercase();

        match status.as_u16() {
            400 | 422 => Self::classify_validation(&message, &lower),
            401 => {
                if lower.contains("two-factor")
                    || lower.contains("two factor")
                    || lower.contains("2fa")
                    || lower.contains("verification code")
                {
                    AuthError::InvalidTwoFactor
                } else {
                    AuthError::InvalidCredentials
                }
            }
            403 => {
                if lower.contains("not verified") || lower.contains("verify your email") {
                    AuthError::EmailNotVerified
                } else if lower.contains("suspend") {
                    AuthError::AccountSuspended
                } else if lower.contains("locked") {
                    AuthError::AccountLocked
                } else {
                    AuthError::AccessDenied(Self::truncate_body(&message))
                }
            }
            409 => {
                if lower.contains("exists") || lower.contains("already") {
                    AuthError::EmailAlreadyExists
                } else {
                    AuthError::Unclassified(Self::truncate_body(&message))
                }
            }
            423 => AuthError::AccountLocked,
            428 => AuthError::TwoFactorRequired,
            429 => AuthError::RateLimited,
            500..=599 => AuthError::Server(Self::truncate_body(&message)),
            _ => AuthError::Unclassified(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(&message)
            )),
        }
    }

    /// Sub-classify 400-level validation messages into field-scoped kinds.
    fn classify_validation(message: &str, lower: &str) -> Self {
        let mentions_password = lower.contains("password");
        let mentions_email = lower.contains("email");

        if mentions_password
            && (lower.contains("weak")
                || lower.contains("at least")
                || lower.contains("too short")
                || lower.contains("requirement"))
        {
            AuthError::WeakPassword
        } else if mentions_email && (lower.contains("format") || lower.contains("valid")) {
            AuthError::InvalidEmailFormat
        } else {
            let field = if mentions_password {
                Some("password".to_string())
            } else if mentions_email {
                Some("email".to_string())
            } else {
                None
            };
            AuthError::Validation {
                field,
                message: Self::truncate_body(message),
            }
        }
    }

    /// Classify a transport-level failure (connection refused, DNS, timeout).
    pub fn from_transport(err: &reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }

    /// Whether this failure came from the transport rather than the server.
    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }

    /// Resolve to a title/description pair with optional remediation
    /// suggestions for banner and field-level messaging. Unclassified errors
    /// get a generic message, never a raw error chain.
    pub fn user_message(&self) -> UserMessage {
        match self {
            AuthError::InvalidCredentials => UserMessage {
                title: "Sign-in failed",
                description: "The email address or password is incorrect.".into(),
                suggestions: &["Check that Caps Lock is off", "Passwords are case-sensitive"],
            },
            AuthError::EmailNotVerified => UserMessage {
                title: "Email not verified",
                description: "Verify your email address before signing in.".into(),
                suggestions: &[
                    "Check your spam folder for the verification email",
                    "Request a new verification email from the sign-in page",
                ],
            },
            AuthError::AccountLocked => UserMessage {
                title: "Account locked",
                description: "This account is temporarily locked after too many failed attempts."
                    .into(),
                suggestions: &["Wait a few minutes before trying again"],
            },
            AuthError::AccountSuspended => UserMessage {
                title: "Account suspended",
                description:
                    "This account has been suspended. Contact your practice administrator.".into(),
                suggestions: &[],
            },
            AuthError::TwoFactorRequired => UserMessage {
                title: "Two-factor code required",
                description: "Enter the code from your authenticator app to continue.".into(),
                suggestions: &[],
            },
            AuthError::InvalidTwoFactor => UserMessage {
                title: "Invalid code",
                description: "The two-factor code is wrong or has expired.".into(),
                suggestions: &["Codes rotate every 30 seconds; enter the current one"],
            },
            AuthError::EmailAlreadyExists => UserMessage {
                title: "Email already registered",
                description: "An account with this email address already exists.".into(),
                suggestions: &["Sign in instead, or use the password reset flow"],
            },
            AuthError::WeakPassword => UserMessage {
                title: "Password too weak",
                description: "Choose a longer password with a mix of character types.".into(),
                suggestions: &[],
            },
            AuthError::InvalidEmailFormat => UserMessage {
                title: "Invalid email address",
                description: "Enter a valid email address, like name@example.com.".into(),
                suggestions: &[],
            },
            AuthError::Network(_) => UserMessage {
                title: "Connection problem",
                description: "Could not reach the server.".into(),
                suggestions: &["Check your internet connection", "Try again in a moment"],
            },
            AuthError::Server(_) => UserMessage {
                title: "Server error",
                description: "The server had a problem handling the request. Try again shortly."
                    .into(),
                suggestions: &[],
            },
            AuthError::RateLimited => UserMessage {
                title: "Too many attempts",
                description: "Slow down and try again in a moment.".into(),
                suggestions: &[],
            },
            AuthError::AccessDenied(_) => UserMessage {
                title: "Access denied",
                description: "You do not have permission to do that.".into(),
                suggestions: &[],
            },
            AuthError::Validation { message, .. } => UserMessage {
                title: "Check your input",
                description: message.clone(),
                suggestions: &[],
            },
            AuthError::Unclassified(_) | AuthError::InvalidState(_) => UserMessage {
                title: "Something went wrong",
                description:
                    "An unexpected error occurred. Try again, or contact support if it keeps happening."
                        .into(),
                suggestions: &[],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_401_is_invalid_credentials() {
        let err = AuthError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid credentials"}"#,
        );
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[test]
    fn test_401_with_two_factor_message() {
        let err = AuthError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid two-factor code"}"#,
        );
        assert_eq!(err, AuthError::InvalidTwoFactor);
    }

    #[test]
    fn test_403_sub_cases() {
        let not_verified = AuthError::from_status(
            StatusCode::FORBIDDEN,
            r#"{"message":"Email address not verified"}"#,
        );
        assert_eq!(not_verified, AuthError::EmailNotVerified);

        let suspended = AuthError::from_status(
            StatusCode::FORBIDDEN,
            r#"{"message":"Account suspended by administrator"}"#,
        );
        assert_eq!(suspended, AuthError::AccountSuspended);

        let locked =
            AuthError::from_status(StatusCode::FORBIDDEN, r#"{"message":"Account locked"}"#);
        assert_eq!(locked, AuthError::AccountLocked);

        let generic =
            AuthError::from_status(StatusCode::FORBIDDEN, r#"{"message":"No access to unit"}"#);
        assert_eq!(generic, AuthError::AccessDenied("No access to unit".into()));
    }

    #[test]
    fn test_400_weak_password() {
        let err = AuthError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"message":"Password must be at least 12 characters"}"#,
        );
        assert_eq!(err, AuthError::WeakPassword);
    }

    #[test]
    fn test_400_email_format() {
        let err = AuthError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"message":"Email address is not a valid format"}"#,
        );
        assert_eq!(err, AuthError::InvalidEmailFormat);
    }

    #[test]
    fn test_400_field_scoped_validation() {
        let err = AuthError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"message":"Password confirmation does not match"}"#,
        );
        assert_eq!(
            err,
            AuthError::Validation {
                field: Some("password".into()),
                message: "Password confirmation does not match".into(),
            }
        );
    }

    #[test]
    fn test_429_and_5xx() {
        assert_eq!(
            AuthError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            AuthError::RateLimited
        );
        assert_eq!(
            AuthError::from_status(StatusCode::BAD_GATEWAY, "upstream down"),
            AuthError::Server("upstream down".into())
        );
    }

    #[test]
    fn test_non_json_body_used_verbatim() {
        let err = AuthError::from_status(StatusCode::FORBIDDEN, "account suspended");
        assert_eq!(err, AuthError::AccountSuspended);
    }

    #[test]
    fn test_unknown_status_falls_through() {
        let err =
            AuthError::from_status(StatusCode::IM_A_TEAPOT, r#"{"message":"short and stout"}"#);
        assert!(matches!(err, AuthError::Unclassified(_)));
    }

    #[test]
    fn test_truncates_long_bodies() {
        let body = "x".repeat(2000);
        let err = AuthError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        match err {
            AuthError::Server(msg) => {
                assert!(msg.len() < 600);
                assert!(msg.contains("truncated"));
            }
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[test]
    fn test_unclassified_renders_generic_message() {
        let msg = AuthError::Unclassified("stack trace gore".into()).user_message();
        assert_eq!(msg.title, "Something went wrong");
        assert!(!msg.description.contains("stack trace"));
    }

    #[test]
    fn test_invalid_credentials_suggests_caps_lock() {
        let msg = AuthError::InvalidCredentials.user_message();
        assert!(msg.suggestions.iter().any(|s| s.contains("Caps Lock")));
    }
}
