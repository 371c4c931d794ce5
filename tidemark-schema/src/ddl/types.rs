//! Schemas, enums and sequences.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::QualifiedName;

/// A named namespace (Postgres only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSchema {
    /// Schema name.
    pub name: SmolStr,
}

impl DbSchema {
    /// Create a new schema.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self { name: name.into() }
    }
}

/// A user-defined enum type with ordered labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enum {
    /// Owning schema.
    pub schema: SmolStr,
    /// Type name.
    pub name: SmolStr,
    /// Labels in declaration order.
    pub values: Vec<SmolStr>,
}

impl Enum {
    /// Create a new enum.
    pub fn new(
        schema: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
        values: impl IntoIterator<Item = impl Into<SmolStr>>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Identity key.
    pub fn key(&self) -> QualifiedName {
        QualifiedName::new(self.schema.clone(), self.name.clone())
    }
}

/// Sequence generator options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOptions {
    /// `INCREMENT BY`.
    pub increment: i64,
    /// `MINVALUE`.
    pub min_value: i64,
    /// `MAXVALUE`.
    pub max_value: i64,
    /// `START WITH`.
    pub start_with: i64,
    /// `CACHE`.
    pub cache: i64,
    /// `CYCLE`.
    pub cycle: bool,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self::for_type("bigint")
    }
}

impl SequenceOptions {
    /// Postgres defaults for a sequence backing a column of `sql_type`.
    pub fn for_type(sql_type: &str) -> Self {
        let max_value = match sql_type {
            "smallint" | "int2" | "smallserial" => i16::MAX as i64,
            "integer" | "int" | "int4" | "serial" => i32::MAX as i64,
            _ => i64::MAX,
        };
        Self {
            increment: 1,
            min_value: 1,
            max_value,
            start_with: 1,
            cache: 1,
            cycle: false,
        }
    }

    /// Set the increment.
    pub fn with_increment(mut self, increment: i64) -> Self {
        self.increment = increment;
        self
    }

    /// Set the minimum value.
    pub fn with_min_value(mut self, min_value: i64) -> Self {
        self.min_value = min_value;
        self
    }

    /// Set the maximum value.
    pub fn with_max_value(mut self, max_value: i64) -> Self {
        self.max_value = max_value;
        self
    }

    /// Set the start value.
    pub fn with_start_with(mut self, start_with: i64) -> Self {
        self.start_with = start_with;
        self
    }

    /// Set the cache size.
    pub fn with_cache(mut self, cache: i64) -> Self {
        self.cache = cache;
        self
    }

    /// Set whether the sequence wraps around.
    pub fn with_cycle(mut self, cycle: bool) -> Self {
        self.cycle = cycle;
        self
    }
}

/// A standalone sequence (Postgres only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    /// Owning schema.
    pub schema: SmolStr,
    /// Sequence name.
    pub name: SmolStr,
    /// Generator options.
    pub options: SequenceOptions,
}

impl Sequence {
    /// Create a new sequence with default options.
    pub fn new(schema: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            options: SequenceOptions::default(),
        }
    }

    /// Set the generator options.
    pub fn with_options(mut self, options: SequenceOptions) -> Self {
        self.options = options;
        self
    }

    /// Identity key.
    pub fn key(&self) -> QualifiedName {
        QualifiedName::new(self.schema.clone(), self.name.clone())
    }
}
