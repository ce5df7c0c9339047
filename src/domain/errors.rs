//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing or malformed input, detected before any store call.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A store call failed or timed out. Wraps the underlying cause as text.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The entity is no longer in the state the operation requires
    /// (e.g. a request that was already accepted by someone else).
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    /// Short machine-readable kind, used by the HTTP adapter and the CLI.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Persistence(_) => "persistence",
            Self::Auth(_) => "auth",
            Self::Conflict(_) => "conflict",
        }
    }
}

/// Required-field check: blank (empty or whitespace) counts as missing.
pub(crate) fn require_field(name: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{} is required", name)));
    }
    Ok(())
}
