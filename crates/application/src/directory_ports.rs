//! Ports onto the identity directories consulted by the expiry evaluator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use opswarden_core::AppResult;

/// Account facts returned by the cloud directory.
#[derive(Debug, Clone)]
pub struct CloudDirectoryUser {
    /// User principal name; doubles as the account's email address.
    pub principal_name: String,
    /// Human-readable account name.
    pub display_name: String,
    /// When the password was last changed, if the directory reports it.
    pub last_password_change: Option<DateTime<Utc>>,
    /// Whether the account's password-policy flags disable expiration.
    pub password_never_expires: bool,
}

/// Directory role as enumerated from the cloud directory.
#[derive(Debug, Clone)]
pub struct DirectoryRole {
    /// Opaque role identifier used for member lookups.
    pub id: String,
    /// Role display name, matched against the "admin" substring.
    pub display_name: String,
}

/// Role membership entry. The principal name is optional because some member
/// objects (groups, service principals) carry none.
#[derive(Debug, Clone)]
pub struct RoleMember {
    /// Opaque member object identifier.
    pub id: String,
    /// User principal name, when the member is a user.
    pub principal_name: Option<String>,
}

/// Query port for the hosted identity directory.
#[async_trait]
pub trait CloudDirectory: Send + Sync {
    /// Resolves a principal to its account facts, or `None` when unknown.
    async fn find_user(&self, principal: &str) -> AppResult<Option<CloudDirectoryUser>>;

    /// Enumerates every directory role.
    async fn list_roles(&self) -> AppResult<Vec<DirectoryRole>>;

    /// Lists the members of one directory role.
    async fn list_role_members(&self, role_id: &str) -> AppResult<Vec<RoleMember>>;
}

/// Account facts returned by the on-prem directory gateway.
#[derive(Debug, Clone)]
pub struct OnPremAccount {
    /// User principal name; doubles as the account's email address.
    pub principal_name: String,
    /// Human-readable account name.
    pub display_name: String,
    /// When the password was last set, if the directory reports it.
    pub password_last_set: Option<DateTime<Utc>>,
    /// The account-level "password never expires" flag.
    pub password_never_expires: bool,
}

/// Default domain password policy.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Maximum password age in whole days.
    pub max_password_age_days: i64,
}

/// Query port for the on-premises directory.
#[async_trait]
pub trait OnPremDirectory: Send + Sync {
    /// Resolves a principal to its account facts, or `None` when unknown.
    async fn find_account(&self, principal: &str) -> AppResult<Option<OnPremAccount>>;

    /// Fetches the default domain password policy.
    async fn default_password_policy(&self) -> AppResult<PasswordPolicy>;
}
