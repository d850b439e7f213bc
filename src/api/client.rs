//! HTTP client for the Praxis Auth API.
//!
//! The session layer talks to the backend through the [`AuthApi`] trait so it
//! can be exercised against in-memory fakes; [`HttpAuthClient`] is the real
//! reqwest-backed implementation. Transport failures and non-2xx statuses are
//! classified into [`AuthError`] at this boundary - nothing above it sees a
//! raw `reqwest::Error`.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::User;

use super::AuthError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Response shape of `POST /auth/login`, with and without a two-factor code.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    pub access_token: Option<String>,
    pub user: Option<User>,
    #[serde(default)]
    pub requires_two_factor: bool,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    user: User,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    two_factor_code: Option<&'a str>,
}

#[derive(Serialize)]
struct ResendVerificationRequest<'a> {
    email: &'a str,
}

/// Remote authentication service contract.
///
/// Object-safe so the session store can hold `Arc<dyn AuthApi>` and tests can
/// substitute scripted fakes.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/login`. With `two_factor_code` set this resolves a pending
    /// two-factor verification instead of starting a fresh first factor.
    async fn login(
        &self,
        email: &str,
        password: &str,
        two_factor_code: Option<&str>,
    ) -> Result<LoginResponse, AuthError>;

    /// `GET /auth/me` - silent verification of a persisted token.
    async fn me(&self, token: &str) -> Result<User, AuthError>;

    /// `POST /auth/logout` - best-effort remote session invalidation.
    async fn logout(&self, token: &str) -> Result<(), AuthError>;

    /// `POST /auth/resend-verification`.
    async fn resend_verification(&self, email: &str) -> Result<(), AuthError>;
}

/// Auth API client over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpAuthClient {
    client: Client,
    base_url: String,
}

impl HttpAuthClient {
    /// Create a client for the given API base URL (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read a successful response body as `T`, downgrading malformed payloads
    /// to a server-level error instead of propagating a parse error chain.
    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AuthError> {
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::from_transport(&e))?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, "Malformed response body from auth API");
            AuthError::Server("Unexpected response from server".to_string())
        })
    }

    /// Classify non-2xx responses; pass 2xx through.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthClient {
    async fn login(
        &self,
        email: &str,
        password: &str,
        two_factor_code: Option<&str>,
    ) -> Result<LoginResponse, AuthError> {
        let body = LoginRequest {
            email,
            password,
            two_factor_code,
        };

        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::from_transport(&e))?;

        let response = Self::check_response(response).await?;
        let parsed: LoginResponse = Self::read_json(response).await?;
        debug!(
            success = parsed.success,
            requires_two_factor = parsed.requires_two_factor,
            "Login response received"
        );
        Ok(parsed)
    }

    async fn me(&self, token: &str) -> Result<User, AuthError> {
        let response = self
            .client
            .get(self.url("/auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::from_transport(&e))?;

        let response = Self::check_response(response).await?;
        let parsed: MeResponse = Self::read_json(response).await?;
        Ok(parsed.user)
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::from_transport(&e))?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url("/auth/resend-verification"))
            .json(&ResendVerificationRequest { email })
            .send()
            .await
            .map_err(|e| AuthError::from_transport(&e))?;

        Self::check_response(response).await?;
        Ok(())
    }
}
