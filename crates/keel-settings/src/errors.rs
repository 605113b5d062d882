//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why `settings.json` could not become a [`crate::KeelSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The settings file is not JSON.
    #[error("{} is not valid JSON: {source}", path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },
    /// The merged document has a value of the wrong type.
    #[error("settings do not match the expected schema: {0}")]
    Schema(#[from] serde_json::Error),
    /// The session warning would fire before the session even starts.
    #[error(
        "session.warningMinutes ({warning_minutes}) must be below session.timeoutMinutes ({timeout_minutes})"
    )]
    WarningLead {
        /// Configured warning lead.
        warning_minutes: u64,
        /// Configured session length.
        timeout_minutes: u64,
    },
    /// A list that drives a retry or failover loop is empty.
    #[error("{field} must not be empty")]
    EmptyList {
        /// camelCase settings path.
        field: &'static str,
    },
    /// A count is below what the component needs to run.
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        /// camelCase settings path.
        field: &'static str,
        /// Smallest accepted value.
        min: u64,
        /// Configured value.
        value: u64,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
