//! Named table constraints.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::QualifiedName;

/// A primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Constraint name.
    pub name: SmolStr,
    /// Whether the name was declared rather than derived.
    #[serde(default)]
    pub name_explicit: bool,
    /// Key columns in order.
    pub columns: Vec<SmolStr>,
}

impl PrimaryKey {
    /// Create a primary key with a derived name.
    pub fn new(
        name: impl Into<SmolStr>,
        columns: impl IntoIterator<Item = impl Into<SmolStr>>,
    ) -> Self {
        Self {
            name: name.into(),
            name_explicit: false,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Mark the name as explicitly declared.
    pub fn explicit_name(mut self) -> Self {
        self.name_explicit = true;
        self
    }

    /// Same columns in the same order.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.name == other.name && self.columns == other.columns
    }
}

/// A unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Constraint name.
    pub name: SmolStr,
    /// Whether the name was declared rather than derived.
    #[serde(default)]
    pub name_explicit: bool,
    /// Constrained columns in order.
    pub columns: Vec<SmolStr>,
    /// `NULLS NOT DISTINCT` (Postgres 15+).
    #[serde(default)]
    pub nulls_not_distinct: bool,
}

impl UniqueConstraint {
    /// Create a unique constraint with a derived name.
    pub fn new(
        name: impl Into<SmolStr>,
        columns: impl IntoIterator<Item = impl Into<SmolStr>>,
    ) -> Self {
        Self {
            name: name.into(),
            name_explicit: false,
            columns: columns.into_iter().map(Into::into).collect(),
            nulls_not_distinct: false,
        }
    }

    /// Mark the name as explicitly declared.
    pub fn explicit_name(mut self) -> Self {
        self.name_explicit = true;
        self
    }
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: SmolStr,
    /// Boolean SQL expression.
    pub value: String,
}

impl CheckConstraint {
    /// Create a check constraint.
    pub fn new(name: impl Into<SmolStr>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Foreign key action on update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    /// NO ACTION (the default).
    #[default]
    NoAction,
    /// RESTRICT.
    Restrict,
    /// CASCADE.
    Cascade,
    /// SET NULL.
    SetNull,
    /// SET DEFAULT.
    SetDefault,
}

impl ReferentialAction {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "no action",
            Self::Restrict => "restrict",
            Self::Cascade => "cascade",
            Self::SetNull => "set null",
            Self::SetDefault => "set default",
        }
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: SmolStr,
    /// Whether the name was declared rather than derived.
    #[serde(default)]
    pub name_explicit: bool,
    /// Referencing columns.
    pub columns: Vec<SmolStr>,
    /// Referenced table schema.
    pub schema_to: SmolStr,
    /// Referenced table.
    pub table_to: SmolStr,
    /// Referenced columns.
    pub columns_to: Vec<SmolStr>,
    /// `ON UPDATE` action.
    #[serde(default)]
    pub on_update: ReferentialAction,
    /// `ON DELETE` action.
    #[serde(default)]
    pub on_delete: ReferentialAction,
}

impl ForeignKey {
    /// Referenced table key.
    pub fn target(&self) -> QualifiedName {
        QualifiedName::new(self.schema_to.clone(), self.table_to.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_equivalence() {
        let a = PrimaryKey::new("users_pkey", ["id"]);
        let b = PrimaryKey::new("users_pkey", ["id"]).explicit_name();
        let c = PrimaryKey::new("users_pkey", ["id", "tenant"]);
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&c));
    }

    #[test]
    fn test_referential_action_sql() {
        assert_eq!(ReferentialAction::default().as_sql(), "no action");
        assert_eq!(ReferentialAction::SetNull.as_sql(), "set null");
    }
}
