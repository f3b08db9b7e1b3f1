//! Shared primitives for all Rust crates in opswarden.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across opswarden crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
///
/// The variants mirror how a batch run is allowed to degrade: `Setup` aborts
/// the run, `NotFound` and `Query` skip a single entity or source, and
/// `Notification` skips a single outbound message.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication or configuration failure before the batch started.
    /// Fatal: the run aborts and the operator is notified.
    #[error("setup failure: {0}")]
    Setup(String),

    /// Requested entity does not exist in the queried source.
    #[error("not found: {0}")]
    NotFound(String),

    /// A source query failed for one entity; other sources are unaffected.
    #[error("query error: {0}")]
    Query(String),

    /// A single outbound notification failed; the batch continues.
    #[error("notification error: {0}")]
    Notification(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
