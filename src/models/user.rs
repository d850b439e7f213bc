//! User identity and role models.

use serde::{Deserialize, Serialize};

/// Coarse authorization category determining accessible routes and dashboards.
///
/// The API serializes roles as lowercase strings. Values this client does not
/// know yet deserialize as `Unknown` rather than failing the whole response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Therapist,
    Client,
    Bookkeeper,
    Assistant,
    Substitute,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Canonical landing route for this role after login.
    /// Unknown roles get a safe generic dashboard, never an error.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Therapist => "/therapist/dashboard",
            Role::Client => "/client/dashboard",
            Role::Bookkeeper => "/bookkeeper/dashboard",
            Role::Assistant => "/assistant/dashboard",
            Role::Substitute => "/substitute/dashboard",
            Role::Unknown => "/dashboard",
        }
    }

    /// Get the display name for this role.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Therapist => "Therapist",
            Role::Client => "Client",
            Role::Bookkeeper => "Bookkeeper",
            Role::Assistant => "Assistant",
            Role::Substitute => "Substitute",
            Role::Unknown => "User",
        }
    }
}

/// Authenticated identity as returned by the Auth API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "twoFactorEnabled", default)]
    pub two_factor_enabled: bool,
    #[serde(rename = "twoFactorSetupCompleted", default)]
    pub two_factor_setup_completed: bool,
}

impl User {
    /// Whether this account still has to complete two-factor setup before
    /// it may be granted full access.
    pub fn needs_two_factor_setup(&self) -> bool {
        self.two_factor_enabled && !self.two_factor_setup_completed
    }
}
