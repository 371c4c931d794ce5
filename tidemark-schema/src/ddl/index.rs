//! Indexes and their canonical column entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::normalize::normalize_expression;

/// An operator class attached to an index column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpClass {
    /// Operator class name.
    pub name: SmolStr,
    /// Whether this is the type's default operator class.
    pub default: bool,
}

/// One entry of an index: a column reference or an SQL expression.
///
/// Column entries hold the raw column name; quoting happens at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name or expression text.
    pub value: String,
    /// Whether `value` is an expression.
    pub is_expression: bool,
    /// Ascending sort order.
    pub asc: bool,
    /// `NULLS FIRST`.
    pub nulls_first: bool,
    /// Operator class.
    #[serde(default)]
    pub opclass: Option<OpClass>,
}

impl IndexColumn {
    /// An ascending, nulls-last column reference.
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            value: name.into(),
            is_expression: false,
            asc: true,
            nulls_first: false,
            opclass: None,
        }
    }

    /// An ascending, nulls-last expression.
    pub fn expression(expr: impl Into<String>) -> Self {
        Self {
            value: normalize_expression(&expr.into()),
            is_expression: true,
            asc: true,
            nulls_first: false,
            opclass: None,
        }
    }

    /// Sort descending.
    pub fn desc(mut self) -> Self {
        self.asc = false;
        self
    }

    /// Sort nulls first.
    pub fn nulls_first(mut self) -> Self {
        self.nulls_first = true;
        self
    }

    /// Attach an operator class.
    pub fn with_opclass(mut self, name: impl Into<SmolStr>, default: bool) -> Self {
        self.opclass = Some(OpClass {
            name: name.into(),
            default,
        });
        self
    }

    /// The explicit, non-default operator class name, if any.
    pub fn explicit_opclass(&self) -> Option<&str> {
        self.opclass
            .as_ref()
            .filter(|op| !op.default)
            .map(|op| op.name.as_str())
    }

    /// Semantic equality: expression text normalized, default opclasses ignored.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        let values_match = if self.is_expression {
            normalize_expression(&self.value) == normalize_expression(&other.value)
        } else {
            self.value == other.value
        };
        values_match
            && self.is_expression == other.is_expression
            && self.asc == other.asc
            && self.nulls_first == other.nulls_first
            && self.explicit_opclass() == other.explicit_opclass()
    }
}

/// An index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name, unique per schema.
    pub name: SmolStr,
    /// Entries in order.
    pub columns: Vec<IndexColumn>,
    /// `UNIQUE`.
    #[serde(default)]
    pub unique: bool,
    /// Access method.
    #[serde(default = "default_method")]
    pub method: SmolStr,
    /// `WITH (...)` storage parameters.
    #[serde(default)]
    pub with: BTreeMap<String, String>,
    /// Partial index predicate.
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    /// Build with `CONCURRENTLY`; not part of index identity.
    #[serde(default)]
    pub concurrently: bool,
}

fn default_method() -> SmolStr {
    SmolStr::new_static("btree")
}

impl Index {
    /// Create a non-unique btree index.
    pub fn new(name: impl Into<SmolStr>, columns: Vec<IndexColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
            method: default_method(),
            with: BTreeMap::new(),
            where_clause: None,
            concurrently: false,
        }
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the access method.
    pub fn using(mut self, method: impl Into<SmolStr>) -> Self {
        self.method = method.into();
        self
    }

    /// Add a storage parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    /// Set the partial index predicate.
    pub fn with_where(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    /// Whether two indexes would be physically identical, ignoring names.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        let where_match = match (&self.where_clause, &other.where_clause) {
            (Some(a), Some(b)) => normalize_expression(a) == normalize_expression(b),
            (None, None) => true,
            _ => false,
        };
        self.unique == other.unique
            && self.method.eq_ignore_ascii_case(&other.method)
            && self.with == other.with
            && where_match
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.is_equivalent(b))
    }
}
