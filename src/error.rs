use thiserror::Error;

use crate::orchestrator::bus::BusError;

/// Result type for the release-gating core
pub type Result<T> = std::result::Result<T, ReleasabilityError>;

/// Errors raised by version validation, check registration and the orchestrator
#[derive(Error, Debug)]
pub enum ReleasabilityError {
    /// The build tag does not follow `[prefix-]MAJOR.MINOR.PATCH[-Mx]<sep>BUILD`
    #[error("The provided version {version} does not match the standardized format: {reason}")]
    InvalidVersionFormat { version: String, reason: String },

    /// Two checks registered under the same name
    #[error("Check {0} is already registered")]
    DuplicateCheck(String),

    /// Trigger message could not be published
    #[error("Could not publish releasability trigger: {0}")]
    Publish(#[source] BusError),

    /// Not every dispatched check reported before the timeout
    #[error(
        "Could not retrieve results: received {received}/{expected} check result(s) within allowed time \
         ({timeout_secs} seconds) (no results received for check(s): {})",
        .missing.join(",")
    )]
    ResultsUnavailable {
        received: usize,
        expected: usize,
        timeout_secs: f64,
        missing: Vec<String>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleasabilityError {
    /// Check names that never reported, if this is a timeout
    pub fn missing_checks(&self) -> &[String] {
        match self {
            ReleasabilityError::ResultsUnavailable { missing, .. } => missing,
            _ => &[],
        }
    }
}
