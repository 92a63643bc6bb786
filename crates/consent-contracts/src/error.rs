//! Error types for the consent ledger and its collaborators.
//!
//! Every fallible operation returns `ConsentResult<T>`.  Integrity failures
//! found while replaying the chain are NOT errors; they are the `false`
//! result of verification.  The variants here cover what a caller must
//! react to: bad input, storage trouble, and blocked requests.

use std::path::PathBuf;

use thiserror::Error;

/// The unified error type for the consent ledger workspace.
#[derive(Debug, Error)]
pub enum ConsentError {
    /// A required argument was empty or had the wrong shape.
    ///
    /// Raised before any I/O, so nothing is written.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A payload or event could not be turned into JSON.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The backing file could not be opened, read, or written.
    #[error("ledger I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The last line of the ledger is a partial write and the configured
    /// tail policy forbids appending past it.
    #[error("ledger '{}' ends in a torn write at line {line}", path.display())]
    TornTail { path: PathBuf, line: usize },

    /// The ledger contents cannot be linked to, even after discarding a torn tail.
    #[error("ledger corrupted: {reason}")]
    LedgerCorrupted { reason: String },

    /// The ledger's internal lock was poisoned by a panicking writer.
    #[error("ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    /// A data access request was blocked for lack of consent.
    ///
    /// The violation has already been recorded in the ledger when this is returned.
    #[error(
        "consent violation: attempt to {action} on {target} for {purpose} without consent \
         (potential harm: {potential_harm})"
    )]
    ConsentViolation {
        action: String,
        target: String,
        purpose: String,
        potential_harm: String,
    },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl ConsentError {
    /// Build an `Io` variant for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for ConsentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the consent crates.
pub type ConsentResult<T> = Result<T, ConsentError>;
