//! Password-expiration records and classification rules.
//!
//! The expiry state is a tagged enum rather than a `-1` day sentinel, so
//! "never expires" and "expired yesterday" can never be confused by a
//! numeric comparison.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EmailAddress;

/// Passwords expiring within this many days are classified as a warning.
pub const WARNING_THRESHOLD_DAYS: i64 = 14;

/// Identity source an expiry record was evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirySource {
    /// Hosted identity directory (admin-role and user lookup).
    CloudDirectory,
    /// On-premises directory queried through the gateway.
    OnPremDirectory,
}

impl ExpirySource {
    /// Returns the short label used in logs and reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudDirectory => "cloud",
            Self::OnPremDirectory => "on-prem",
        }
    }
}

impl std::fmt::Display for ExpirySource {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Expiry state of one account's password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordExpiry {
    /// No expiry policy applies to this account.
    NeverExpires,
    /// The password expires after the given signed number of whole days.
    /// Zero or negative means the password has already expired.
    ExpiresIn {
        /// Whole days until expiry; negative once expired.
        days_remaining: i64,
    },
}

impl PasswordExpiry {
    /// Returns the remaining days, or `None` when no expiry policy applies.
    #[must_use]
    pub fn days_remaining(&self) -> Option<i64> {
        match self {
            Self::NeverExpires => None,
            Self::ExpiresIn { days_remaining } => Some(*days_remaining),
        }
    }
}

/// Derived classification of an expiry record. Never stored independently of
/// the underlying [`PasswordExpiry`]; always recomputed via
/// [`classify_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    /// No expiry policy applies.
    NeverExpires,
    /// The password has already expired.
    Expired,
    /// The password expires within [`WARNING_THRESHOLD_DAYS`] days.
    Warning,
    /// No action required.
    Ok,
}

impl ExpiryStatus {
    /// Returns the label used in overview tables and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeverExpires => "NEVER EXPIRES",
            Self::Expired => "EXPIRED",
            Self::Warning => "WARNING",
            Self::Ok => "OK",
        }
    }
}

impl std::fmt::Display for ExpiryStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Classifies an expiry state. The single source of truth for status
/// derivation; callers must not pair a status with a record by hand.
#[must_use]
pub fn classify_status(expiry: PasswordExpiry) -> ExpiryStatus {
    match expiry {
        PasswordExpiry::NeverExpires => ExpiryStatus::NeverExpires,
        PasswordExpiry::ExpiresIn { days_remaining } if days_remaining <= 0 => ExpiryStatus::Expired,
        PasswordExpiry::ExpiresIn { days_remaining }
            if days_remaining <= WARNING_THRESHOLD_DAYS =>
        {
            ExpiryStatus::Warning
        }
        PasswordExpiry::ExpiresIn { .. } => ExpiryStatus::Ok,
    }
}

/// Password-expiration status of one account from one source.
///
/// Created once per (account, source) pair per run and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryRecord {
    /// Account email address; unique key within a run.
    pub email: EmailAddress,
    /// Human-readable account name.
    pub display_name: String,
    /// When the password was last changed, if the source reports it.
    pub last_password_change: Option<DateTime<Utc>>,
    /// Expiry state computed by the evaluator.
    pub expiry: PasswordExpiry,
    /// Which source this record was evaluated against.
    pub source: ExpirySource,
}

impl ExpiryRecord {
    /// Returns the derived status for this record.
    #[must_use]
    pub fn status(&self) -> ExpiryStatus {
        classify_status(self.expiry)
    }

    /// Sort key for overview listings: expiring records ascend by remaining
    /// days, never-expiring records always sort last.
    #[must_use]
    pub fn sort_key(&self) -> i64 {
        match self.expiry {
            PasswordExpiry::NeverExpires => i64::MAX,
            PasswordExpiry::ExpiresIn { days_remaining } => days_remaining,
        }
    }
}

/// Orders records for the overview listing: soonest expiry first,
/// never-expiring accounts last. Stable, so equal keys keep evaluation order.
pub fn sort_for_overview(records: &mut [ExpiryRecord]) {
    records.sort_by_key(ExpiryRecord::sort_key);
}
