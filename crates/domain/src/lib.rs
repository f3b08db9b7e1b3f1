//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod backup;
mod email;
mod expiry;

pub use backup::{BackupRecord, CoverageSummary, unprotected};
pub use email::EmailAddress;
pub use expiry::{
    ExpiryRecord, ExpirySource, ExpiryStatus, PasswordExpiry, WARNING_THRESHOLD_DAYS,
    classify_status, sort_for_overview,
};
