//! Error types for snapshot conversion, validation and configuration.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::dialect::Dialect;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while building or validating a DDL snapshot.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(tidemark::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Duplicate definition.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(tidemark::schema::duplicate))]
    Duplicate { kind: String, name: String },

    /// Invalid column definition.
    #[error("invalid column `{table}.{column}`: {message}")]
    #[diagnostic(code(tidemark::schema::invalid_column))]
    InvalidColumn {
        table: String,
        column: String,
        message: String,
    },

    /// A table declares more than one primary key.
    #[error("table `{table}` declares more than one primary key")]
    #[diagnostic(
        code(tidemark::schema::multiple_primary_keys),
        help("use a single composite primary key instead of several inline ones")
    )]
    MultiplePrimaryKeys { table: String },

    /// A constraint or index names a column the table does not have.
    #[error("{kind} `{name}` on `{table}` references unknown column `{column}`")]
    #[diagnostic(code(tidemark::schema::unknown_column))]
    UnknownColumn {
        kind: String,
        name: String,
        table: String,
        column: String,
    },

    /// A declaration references an entity that does not exist.
    #[error("{kind} `{name}` references unknown {target_kind} `{target}`")]
    #[diagnostic(code(tidemark::schema::unknown_reference))]
    UnknownReference {
        kind: String,
        name: String,
        target_kind: String,
        target: String,
    },

    /// An entity kind the dialect cannot express.
    #[error("{feature} is not supported by {dialect}")]
    #[diagnostic(code(tidemark::schema::unsupported))]
    Unsupported { dialect: Dialect, feature: String },

    /// Invalid index definition.
    #[error("invalid index `{name}`: {message}")]
    #[diagnostic(code(tidemark::schema::invalid_index))]
    InvalidIndex { name: String, message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(tidemark::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(tidemark::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// Snapshot JSON error.
    #[error("failed to read snapshot JSON")]
    #[diagnostic(code(tidemark::schema::json_error))]
    JsonError {
        #[source]
        source: serde_json::Error,
    },

    /// Validation error with multiple issues.
    #[error("snapshot validation failed with {count} error(s)")]
    #[diagnostic(code(tidemark::schema::validation_failed))]
    ValidationFailed {
        count: usize,
        #[related]
        errors: Vec<SchemaError>,
    },
}

impl SchemaError {
    /// Create a duplicate definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an invalid column error.
    pub fn invalid_column(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidColumn {
            table: table.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an unknown column error.
    pub fn unknown_column(
        kind: impl Into<String>,
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self::UnknownColumn {
            kind: kind.into(),
            name: name.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    /// Create an unknown reference error.
    pub fn unknown_reference(
        kind: impl Into<String>,
        name: impl Into<String>,
        target_kind: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::UnknownReference {
            kind: kind.into(),
            name: name.into(),
            target_kind: target_kind.into(),
            target: target.into(),
        }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(dialect: Dialect, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
        }
    }

    /// Create an invalid index error.
    pub fn invalid_index(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidIndex {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Collapse a list of errors into a single result.
    pub fn from_many(mut errors: Vec<SchemaError>) -> SchemaResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            count => Err(Self::ValidationFailed { count, errors }),
        }
    }
}
