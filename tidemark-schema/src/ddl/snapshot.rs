//! A complete, dialect-tagged description of a database schema.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

use super::{DbSchema, Enum, QualifiedName, Role, Sequence, Table, View};
use crate::dialect::Dialect;
use crate::error::{SchemaError, SchemaResult};

/// An immutable input to the diff engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdlSnapshot {
    /// Target dialect.
    pub dialect: Dialect,
    /// Non-default schemas.
    #[serde(default)]
    pub schemas: Vec<DbSchema>,
    /// Enum types.
    #[serde(default)]
    pub enums: Vec<Enum>,
    /// Standalone sequences.
    #[serde(default)]
    pub sequences: Vec<Sequence>,
    /// Roles.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Tables.
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Views.
    #[serde(default)]
    pub views: Vec<View>,
}

impl DdlSnapshot {
    /// Create an empty snapshot.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            schemas: vec![],
            enums: vec![],
            sequences: vec![],
            roles: vec![],
            tables: vec![],
            views: vec![],
        }
    }

    /// Whether the snapshot describes nothing at all.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.enums.is_empty()
            && self.sequences.is_empty()
            && self.roles.is_empty()
            && self.tables.is_empty()
            && self.views.is_empty()
    }

    /// Find a table by key.
    pub fn table(&self, key: &QualifiedName) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.schema == key.schema && t.name == key.name)
    }

    /// Find an enum by key.
    pub fn get_enum(&self, key: &QualifiedName) -> Option<&Enum> {
        self.enums
            .iter()
            .find(|e| e.schema == key.schema && e.name == key.name)
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(content: &str) -> SchemaResult<Self> {
        serde_json::from_str(content).map_err(|e| SchemaError::JsonError { source: e })
    }

    /// Load a snapshot from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> SchemaResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SchemaError::JsonError { source: e })
    }

    /// Report structural problems.
    ///
    /// An empty result means the snapshot is safe to diff.
    pub fn validate(&self) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        let dialect = self.dialect;

        let mut seen = HashSet::new();
        for schema in &self.schemas {
            if !dialect.supports_schemas() {
                errors.push(SchemaError::unsupported(dialect, "schemas"));
            }
            if !seen.insert(schema.name.to_string()) {
                errors.push(SchemaError::duplicate("schema", schema.name.as_str()));
            }
        }

        check_unique(&mut errors, "enum", self.enums.iter().map(|e| e.key()));
        check_unique(&mut errors, "sequence", self.sequences.iter().map(|s| s.key()));
        check_unique(&mut errors, "table", self.tables.iter().map(|t| t.key()));
        check_unique(&mut errors, "view", self.views.iter().map(|v| v.key()));
        check_unique(
            &mut errors,
            "role",
            self.roles.iter().map(|r| QualifiedName::new("", r.name.clone())),
        );

        if !dialect.supports_pg_objects() {
            if !self.enums.is_empty() {
                errors.push(SchemaError::unsupported(dialect, "enums"));
            }
            if !self.sequences.is_empty() {
                errors.push(SchemaError::unsupported(dialect, "sequences"));
            }
            if !self.roles.is_empty() {
                errors.push(SchemaError::unsupported(dialect, "roles"));
            }
        }

        for e in &self.enums {
            let mut labels = HashSet::new();
            for value in &e.values {
                if !labels.insert(value.as_str()) {
                    errors.push(SchemaError::duplicate(
                        "enum value",
                        format!("{}.{}", e.key(), value),
                    ));
                }
            }
        }

        let mut index_names = HashSet::new();
        for table in &self.tables {
            self.validate_table(table, &mut index_names, &mut errors);
        }

        if !errors.is_empty() {
            debug!(count = errors.len(), dialect = %dialect, "Snapshot validation found errors");
        }
        errors
    }

    fn validate_table(
        &self,
        table: &Table,
        index_names: &mut HashSet<(String, String)>,
        errors: &mut Vec<SchemaError>,
    ) {
        let dialect = self.dialect;
        let table_name = table.key().to_string();

        let mut columns = HashSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.as_str()) {
                errors.push(SchemaError::duplicate(
                    "column",
                    format!("{}.{}", table_name, column.name),
                ));
            }
            if column.generated.is_some() && column.identity.is_some() {
                errors.push(SchemaError::invalid_column(
                    &table_name,
                    column.name.as_str(),
                    "a column cannot be both generated and an identity",
                ));
            }
            if column.identity.is_some() && dialect != Dialect::Postgresql {
                errors.push(SchemaError::unsupported(dialect, "identity columns"));
            }
            if let Some(type_schema) = &column.type_schema {
                let key = QualifiedName::new(type_schema.clone(), column.sql_type.as_str());
                if self.get_enum(&key).is_none() {
                    errors.push(SchemaError::unknown_reference(
                        "column",
                        format!("{}.{}", table_name, column.name),
                        "enum",
                        key.to_string(),
                    ));
                }
            }
        }

        let mut constraint_names = HashSet::new();
        let check_columns = |errors: &mut Vec<SchemaError>, kind: &str, name: &str, cols: &[SmolStr]| {
            for col in cols {
                if !columns.contains(col.as_str()) {
                    errors.push(SchemaError::unknown_column(
                        kind,
                        name,
                        &table_name,
                        col.as_str(),
                    ));
                }
            }
        };

        if let Some(pk) = &table.primary_key {
            check_columns(errors, "primary key", &pk.name, &pk.columns);
            constraint_names.insert(pk.name.to_string());
        }
        for unique in &table.uniques {
            check_columns(errors, "unique constraint", &unique.name, &unique.columns);
            if !constraint_names.insert(unique.name.to_string()) {
                errors.push(SchemaError::duplicate("constraint", unique.name.as_str()));
            }
        }
        for fk in &table.foreign_keys {
            check_columns(errors, "foreign key", &fk.name, &fk.columns);
            if !constraint_names.insert(fk.name.to_string()) {
                errors.push(SchemaError::duplicate("constraint", fk.name.as_str()));
            }
        }
        for index in &table.indexes {
            let plain: Vec<SmolStr> = index
                .columns
                .iter()
                .filter(|c| !c.is_expression)
                .map(|c| SmolStr::new(&c.value))
                .collect();
            check_columns(errors, "index", &index.name, &plain);
        }

        for check in &table.checks {
            if !dialect.supports_checks() {
                errors.push(SchemaError::unsupported(dialect, "check constraints"));
            }
            if !constraint_names.insert(check.name.to_string()) {
                errors.push(SchemaError::duplicate("constraint", check.name.as_str()));
            }
        }

        // MySQL and SingleStore scope index names to their table.
        let index_scope = match dialect {
            Dialect::Mysql | Dialect::Singlestore => table_name.clone(),
            Dialect::Postgresql | Dialect::Sqlite => table.schema.to_string(),
        };
        for index in &table.indexes {
            if !index_names.insert((index_scope.clone(), index.name.to_string())) {
                errors.push(SchemaError::duplicate("index", index.name.as_str()));
            }
        }

        for fk in &table.foreign_keys {
            if !dialect.supports_foreign_keys() {
                errors.push(SchemaError::unsupported(dialect, "foreign keys"));
                continue;
            }
            match self.table(&fk.target()) {
                Some(target) => {
                    for col in &fk.columns_to {
                        if target.get_column(col).is_none() {
                            errors.push(SchemaError::unknown_column(
                                "foreign key",
                                fk.name.as_str(),
                                target.key().to_string(),
                                col.as_str(),
                            ));
                        }
                    }
                }
                None => errors.push(SchemaError::unknown_reference(
                    "foreign key",
                    fk.name.as_str(),
                    "table",
                    fk.target().to_string(),
                )),
            }
            if fk.columns.len() != fk.columns_to.len() {
                errors.push(SchemaError::invalid_column(
                    &table_name,
                    fk.name.as_str(),
                    "foreign key column counts differ",
                ));
            }
        }

        if !table.policies.is_empty() && !dialect.supports_pg_objects() {
            errors.push(SchemaError::unsupported(dialect, "row-level security policies"));
        }
        let mut policy_names = HashSet::new();
        for policy in &table.policies {
            if !policy_names.insert(policy.name.as_str()) {
                errors.push(SchemaError::duplicate(
                    "policy",
                    format!("{}.{}", table_name, policy.name),
                ));
            }
        }
    }
}

fn check_unique(
    errors: &mut Vec<SchemaError>,
    kind: &str,
    keys: impl Iterator<Item = QualifiedName>,
) {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key.clone()) {
            errors.push(SchemaError::duplicate(kind, key.to_string()));
        }
    }
}
