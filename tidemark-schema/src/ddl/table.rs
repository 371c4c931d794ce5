//! Tables and columns.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{
    CheckConstraint, ForeignKey, Index, Policy, PrimaryKey, QualifiedName, SequenceOptions,
    UniqueConstraint,
};
use crate::dialect::Dialect;

/// A table and everything scoped to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Owning schema.
    pub schema: SmolStr,
    /// Table name.
    pub name: SmolStr,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Primary key, if any.
    #[serde(default)]
    pub primary_key: Option<PrimaryKey>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<Index>,
    /// Unique constraints.
    #[serde(default)]
    pub uniques: Vec<UniqueConstraint>,
    /// Check constraints.
    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
    /// Outgoing foreign keys.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    /// Row-level security policies.
    #[serde(default)]
    pub policies: Vec<Policy>,
    /// Whether RLS was explicitly enabled.
    #[serde(default)]
    pub rls_enabled: bool,
}

impl Table {
    /// Create an empty table.
    pub fn new(schema: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: vec![],
            primary_key: None,
            indexes: vec![],
            uniques: vec![],
            checks: vec![],
            foreign_keys: vec![],
            policies: vec![],
            rls_enabled: false,
        }
    }

    /// Identity key.
    pub fn key(&self) -> QualifiedName {
        QualifiedName::new(self.schema.clone(), self.name.clone())
    }

    /// Add a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Find a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find an index by name.
    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// RLS is on when enabled explicitly or when any policy exists.
    pub fn effective_rls(&self) -> bool {
        self.rls_enabled || !self.policies.is_empty()
    }

    /// Whether the column takes part in a key, unique constraint, foreign
    /// key or index.
    pub fn is_column_constrained(&self, column: &str) -> bool {
        let in_pk = self
            .primary_key
            .as_ref()
            .is_some_and(|pk| pk.columns.iter().any(|c| c == column));
        let in_unique = self
            .uniques
            .iter()
            .any(|u| u.columns.iter().any(|c| c == column));
        let in_fk = self
            .foreign_keys
            .iter()
            .any(|fk| fk.columns.iter().any(|c| c == column));
        let in_index = self.indexes.iter().any(|i| {
            i.columns
                .iter()
                .any(|ic| !ic.is_expression && ic.value == column)
        });
        in_pk || in_unique || in_fk || in_index
    }

    /// The single-column primary key, when it can be written inline.
    pub fn inline_primary_key(&self) -> Option<&str> {
        self.primary_key
            .as_ref()
            .filter(|pk| !pk.name_explicit && pk.columns.len() == 1)
            .map(|pk| pk.columns[0].as_str())
    }

    /// The single-column unique constraint for `column`, when it can be
    /// written inline.
    pub fn inline_unique(&self, column: &str) -> Option<&UniqueConstraint> {
        self.uniques
            .iter()
            .find(|u| !u.name_explicit && u.columns.len() == 1 && u.columns[0] == column)
    }
}

/// How a generated column is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedMode {
    /// Computed on write and stored.
    Stored,
    /// Computed on read.
    Virtual,
}

impl GeneratedMode {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Stored => "STORED",
            Self::Virtual => "VIRTUAL",
        }
    }
}

/// `GENERATED ALWAYS AS (expression)` column spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedColumn {
    /// Generation expression.
    pub expression: String,
    /// Storage mode.
    pub mode: GeneratedMode,
}

/// Identity column flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityKind {
    /// `GENERATED ALWAYS AS IDENTITY`.
    Always,
    /// `GENERATED BY DEFAULT AS IDENTITY`.
    ByDefault,
}

impl IdentityKind {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Always => "ALWAYS",
            Self::ByDefault => "BY DEFAULT",
        }
    }
}

/// Identity column spec (Postgres).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityColumn {
    /// Identity flavor.
    pub kind: IdentityKind,
    /// Backing sequence name.
    pub sequence_name: SmolStr,
    /// Backing sequence options.
    pub options: SequenceOptions,
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: SmolStr,
    /// Normalized SQL type (for enum columns, the enum name).
    pub sql_type: String,
    /// Schema of a user-defined type.
    #[serde(default)]
    pub type_schema: Option<SmolStr>,
    /// Array dimensions (Postgres).
    #[serde(default)]
    pub dimensions: u8,
    /// Declared NOT NULL.
    #[serde(default)]
    pub not_null: bool,
    /// Canonical default text, as the dialect echoes it back.
    #[serde(default)]
    pub default: Option<String>,
    /// Generated column spec.
    #[serde(default)]
    pub generated: Option<GeneratedColumn>,
    /// Identity spec.
    #[serde(default)]
    pub identity: Option<IdentityColumn>,
    /// `AUTO_INCREMENT` / `AUTOINCREMENT`.
    #[serde(default)]
    pub autoincrement: bool,
    /// `ON UPDATE CURRENT_TIMESTAMP` (MySQL, SingleStore).
    #[serde(default)]
    pub on_update_now: bool,
}

impl Column {
    /// Create a nullable column.
    pub fn new(name: impl Into<SmolStr>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            type_schema: None,
            dimensions: 0,
            not_null: false,
            default: None,
            generated: None,
            identity: None,
            autoincrement: false,
            on_update_now: false,
        }
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Set the canonical default text.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Whether the column type is a user-defined type.
    pub fn is_user_type(&self) -> bool {
        self.type_schema.is_some()
    }

    /// Whether the column references the given enum.
    pub fn uses_enum(&self, schema: &str, name: &str) -> bool {
        self.type_schema.as_deref() == Some(schema) && self.sql_type == name
    }

    /// Render the column type for `dialect`.
    pub fn type_sql(&self, dialect: Dialect) -> String {
        let base = match &self.type_schema {
            Some(schema) => dialect.qualified(schema, &self.sql_type),
            None => self.sql_type.clone(),
        };
        let mut out = base;
        for _ in 0..self.dimensions {
            out.push_str("[]");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::IndexColumn;

    fn users() -> Table {
        let mut table = Table::new("public", "users")
            .column(Column::new("id", "integer").not_null())
            .column(Column::new("email", "text"))
            .column(Column::new("bio", "text"));
        table.primary_key = Some(PrimaryKey::new("users_pkey", ["id"]));
        table.indexes.push(Index::new("users_email_index", vec![IndexColumn::column("email")]));
        table
    }

    #[test]
    fn test_constrained_columns() {
        let table = users();
        assert!(table.is_column_constrained("id"));
        assert!(table.is_column_constrained("email"));
        assert!(!table.is_column_constrained("bio"));
    }

    #[test]
    fn test_inline_primary_key() {
        let mut table = users();
        assert_eq!(table.inline_primary_key(), Some("id"));

        table.primary_key = Some(PrimaryKey::new("pk", ["id"]).explicit_name());
        assert_eq!(table.inline_primary_key(), None);
    }

    #[test]
    fn test_effective_rls() {
        let mut table = users();
        assert!(!table.effective_rls());
        table.policies.push(Policy::new("p"));
        assert!(table.effective_rls());
    }

    #[test]
    fn test_type_sql_for_enum_and_arrays() {
        let mut col = Column::new("mood", "mood");
        col.type_schema = Some("public".into());
        assert_eq!(col.type_sql(Dialect::Postgresql), "\"mood\"");

        col.type_schema = Some("app".into());
        col.dimensions = 1;
        assert_eq!(col.type_sql(Dialect::Postgresql), "\"app\".\"mood\"[]");

        let plain = Column::new("id", "integer");
        assert_eq!(plain.type_sql(Dialect::Postgresql), "integer");
    }
}
