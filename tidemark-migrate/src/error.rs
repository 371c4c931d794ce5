//! Error types for the diff engine.

use thiserror::Error;
use tidemark_schema::{Dialect, SchemaError};

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that abort a diff.
///
/// Ambiguity is never an error (it becomes drop + create) and data-loss risk
/// is reported through hints, so everything here is structural.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A snapshot failed validation.
    #[error("Invalid {side} snapshot: {source}")]
    InvalidSnapshot {
        /// `before` or `after`.
        side: &'static str,
        /// The validation failure.
        #[source]
        source: SchemaError,
    },

    /// The two snapshots target different dialects.
    #[error("Cannot diff a {before} snapshot against a {after} snapshot")]
    DialectMismatch {
        /// Dialect of the previous snapshot.
        before: Dialect,
        /// Dialect of the desired snapshot.
        after: Dialect,
    },

    /// A resolver returned a decision that does not partition its input.
    #[error("Inconsistent {kind} resolution: {message}")]
    InconsistentResolution {
        /// Entity kind being resolved.
        kind: String,
        /// What was wrong.
        message: String,
    },

    /// A rename hint could not be parsed.
    #[error("Invalid rename hint '{0}': expected 'old->new'")]
    InvalidHint(String),

    /// Schema-level error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No changes to migrate.
    #[error("No schema changes detected")]
    NoChanges,

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

impl MigrationError {
    /// Create an inconsistent resolution error.
    pub fn inconsistent(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InconsistentResolution {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an invalid hint error.
    pub fn invalid_hint(hint: impl Into<String>) -> Self {
        Self::InvalidHint(hint.into())
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this is a recoverable error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoChanges)
    }
}
