//! Interim declaration to DDL snapshot conversion.
//!
//! Conversion never stops at the first problem: every structural error is
//! collected and the snapshot contains whatever could be converted.

use smol_str::SmolStr;
use tracing::debug;

use crate::ddl::{
    CheckConstraint, Column, DbSchema, DdlSnapshot, Enum, ForeignKey, IdentityColumn, Index,
    PrimaryKey, QualifiedName, Sequence, SequenceOptions, Table, UniqueConstraint, View,
};
use crate::dialect::Dialect;
use crate::error::SchemaError;
use crate::interim::{DefaultValue, InterimSchema, PrimaryKeyDecl, TableDecl};
use crate::normalize::{normalize_expression, normalize_type};

/// Convert a declaration into a snapshot for `dialect`.
///
/// Returns the snapshot together with every structural error found.
pub fn to_ddl(schema: &InterimSchema, dialect: Dialect) -> (DdlSnapshot, Vec<SchemaError>) {
    let converter = Converter {
        dialect,
        errors: Vec::new(),
    };
    converter.convert(schema)
}

/// Render a typed default as the text `dialect` echoes back on introspection.
pub fn render_default(value: &DefaultValue, dialect: Dialect) -> String {
    match value {
        DefaultValue::Null => "NULL".to_string(),
        DefaultValue::Bool(b) => match dialect {
            Dialect::Mysql | Dialect::Singlestore => (if *b { "1" } else { "0" }).to_string(),
            _ => b.to_string(),
        },
        DefaultValue::Int(i) => i.to_string(),
        DefaultValue::Float(f) => f.to_string(),
        DefaultValue::Text(s) => quote_literal(s),
        DefaultValue::Json(json) => {
            let text = quote_literal(&json.to_string());
            match dialect {
                Dialect::Mysql | Dialect::Singlestore => format!("({})", text),
                _ => text,
            }
        }
        DefaultValue::Array(items) => match dialect {
            Dialect::Postgresql => quote_literal(&pg_array_literal(items)),
            Dialect::Mysql | Dialect::Singlestore => {
                format!("({})", quote_literal(&json_array(items).to_string()))
            }
            Dialect::Sqlite => quote_literal(&json_array(items).to_string()),
        },
        DefaultValue::Sql(expr) => {
            let expr = expr.trim();
            match dialect {
                Dialect::Postgresql => expr.to_string(),
                _ if is_wrapped(expr) => expr.to_string(),
                _ => format!("({})", expr),
            }
        }
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn is_wrapped(expr: &str) -> bool {
    expr.starts_with('(') && normalize_expression(expr).len() < expr.len()
}

fn pg_array_literal(items: &[DefaultValue]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item {
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::Bool(b) => b.to_string(),
            DefaultValue::Int(i) => i.to_string(),
            DefaultValue::Float(f) => f.to_string(),
            DefaultValue::Text(s) | DefaultValue::Sql(s) => {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            DefaultValue::Json(json) => {
                let text = json.to_string();
                format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
            }
            DefaultValue::Array(inner) => pg_array_literal(inner),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn json_array(items: &[DefaultValue]) -> serde_json::Value {
    serde_json::Value::Array(
        items
            .iter()
            .map(|item| match item {
                DefaultValue::Null => serde_json::Value::Null,
                DefaultValue::Bool(b) => serde_json::Value::Bool(*b),
                DefaultValue::Int(i) => serde_json::Value::from(*i),
                DefaultValue::Float(f) => serde_json::Value::from(*f),
                DefaultValue::Text(s) | DefaultValue::Sql(s) => serde_json::Value::from(s.as_str()),
                DefaultValue::Json(json) => json.clone(),
                DefaultValue::Array(inner) => json_array(inner),
            })
            .collect(),
    )
}

struct Converter {
    dialect: Dialect,
    errors: Vec<SchemaError>,
}

impl Converter {
    fn convert(mut self, schema: &InterimSchema) -> (DdlSnapshot, Vec<SchemaError>) {
        let dialect = self.dialect;
        let mut snapshot = DdlSnapshot::new(dialect);

        for name in &schema.schemas {
            if name.as_str() == dialect.default_schema() {
                continue;
            }
            snapshot.schemas.push(DbSchema::new(name.clone()));
        }

        for decl in &schema.enums {
            if !dialect.supports_pg_objects() {
                self.errors.push(SchemaError::unsupported(dialect, "enums"));
                continue;
            }
            let schema_name = self.schema_of(decl.schema.as_ref(), "enum");
            snapshot
                .enums
                .push(Enum::new(schema_name, decl.name.clone(), decl.values.clone()));
        }

        for decl in &schema.sequences {
            if !dialect.supports_pg_objects() {
                self.errors.push(SchemaError::unsupported(dialect, "sequences"));
                continue;
            }
            let schema_name = self.schema_of(decl.schema.as_ref(), "sequence");
            snapshot
                .sequences
                .push(Sequence::new(schema_name, decl.name.clone()).with_options(decl.options));
        }

        for role in &schema.roles {
            if !dialect.supports_pg_objects() {
                self.errors.push(SchemaError::unsupported(dialect, "roles"));
                continue;
            }
            snapshot.roles.push(role.clone());
        }

        for decl in &schema.tables {
            let table = self.convert_table(decl);
            snapshot.tables.push(table);
        }

        for link in &schema.policy_links {
            if !dialect.supports_pg_objects() {
                self.errors
                    .push(SchemaError::unsupported(dialect, "row-level security policies"));
                continue;
            }
            let key = QualifiedName::new(
                self.schema_of(link.schema.as_ref(), "policy"),
                link.table.clone(),
            );
            match snapshot
                .tables
                .iter_mut()
                .find(|t| t.schema == key.schema && t.name == key.name)
            {
                Some(table) => table.policies.push(normalize_policy(&link.policy)),
                None => self.errors.push(SchemaError::unknown_reference(
                    "policy",
                    link.policy.name.as_str(),
                    "table",
                    key.to_string(),
                )),
            }
        }

        for decl in &schema.views {
            let schema_name = self.schema_of(decl.schema.as_ref(), "view");
            snapshot.views.push(View {
                schema: schema_name,
                name: decl.name.clone(),
                definition: decl.definition.as_deref().map(normalize_expression),
                materialized: decl.materialized,
                with: decl.with.clone(),
                with_no_data: decl.with_no_data,
                using: decl.using.clone(),
                existing: decl.existing,
            });
        }

        let mut errors = self.errors;
        errors.extend(snapshot.validate());

        debug!(
            dialect = %dialect,
            tables = snapshot.tables.len(),
            enums = snapshot.enums.len(),
            views = snapshot.views.len(),
            errors = errors.len(),
            "Converted interim schema"
        );

        (snapshot, errors)
    }

    fn schema_of(&mut self, declared: Option<&SmolStr>, what: &str) -> SmolStr {
        let default = SmolStr::new_static(self.dialect.default_schema());
        match declared {
            Some(schema) if schema.is_empty() => default,
            Some(schema) if !self.dialect.supports_schemas() => {
                self.errors.push(SchemaError::unsupported(
                    self.dialect,
                    format!("schema-qualified {} `{}`", what, schema),
                ));
                default
            }
            Some(schema) => schema.clone(),
            None => default,
        }
    }

    fn convert_table(&mut self, decl: &TableDecl) -> Table {
        let dialect = self.dialect;
        let schema = self.schema_of(decl.schema.as_ref(), "table");
        let mut table = Table::new(schema.clone(), decl.name.clone());
        let table_name = decl.name.as_str();

        for col in &decl.columns {
            let mut column = match &col.enum_schema {
                Some(enum_schema) => {
                    let mut c = Column::new(col.name.clone(), col.sql_type.trim());
                    c.type_schema = Some(self.schema_of(enum_schema.as_ref(), "enum"));
                    c
                }
                None => Column::new(col.name.clone(), normalize_type(&col.sql_type, dialect)),
            };
            column.dimensions = col.dimensions;
            column.not_null = col.not_null || col.primary_key;
            column.default = col.default.as_ref().map(|d| render_default(d, dialect));
            column.generated = col.generated.clone().map(|mut g| {
                g.expression = normalize_expression(&g.expression);
                g
            });
            column.identity = col.identity.as_ref().map(|identity| IdentityColumn {
                kind: identity.kind,
                sequence_name: identity
                    .sequence_name
                    .clone()
                    .unwrap_or_else(|| format!("{}_{}_seq", table_name, col.name).into()),
                options: identity
                    .options
                    .unwrap_or_else(|| SequenceOptions::for_type(&column.sql_type)),
            });
            column.autoincrement = col.autoincrement;
            column.on_update_now = col.on_update_now;
            table.columns.push(column);
        }

        // primary key
        let inline_pk: Vec<SmolStr> = decl
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        if inline_pk.len() > 1 || (!inline_pk.is_empty() && decl.primary_key.is_some()) {
            self.errors.push(SchemaError::MultiplePrimaryKeys {
                table: table.key().to_string(),
            });
        }
        let pk_decl = decl
            .primary_key
            .clone()
            .or_else(|| inline_pk.first().map(|c| PrimaryKeyDecl::new([c.clone()])));
        if let Some(pk) = pk_decl {
            let pk_columns_joined = join(&pk.columns);
            table.primary_key = Some(match pk.name {
                Some(name) => PrimaryKey::new(name, pk.columns).explicit_name(),
                None => {
                    let name = match dialect {
                        Dialect::Postgresql => format!("{}_pkey", table_name),
                        _ => format!("{}_{}_pk", table_name, pk_columns_joined),
                    };
                    PrimaryKey::new(name, pk.columns)
                }
            });
            if decl.primary_key.is_some() {
                for col in &mut table.columns {
                    if table
                        .primary_key
                        .as_ref()
                        .is_some_and(|pk| pk.columns.contains(&col.name))
                    {
                        col.not_null = true;
                    }
                }
            }
        }

        // unique constraints
        for col in &decl.columns {
            if let Some(shorthand) = &col.unique {
                let unique = match &shorthand.name {
                    Some(name) => UniqueConstraint::new(name.clone(), [col.name.clone()]).explicit_name(),
                    None => UniqueConstraint::new(
                        format!("{}_{}_unique", table_name, col.name),
                        [col.name.clone()],
                    ),
                };
                table.uniques.push(UniqueConstraint {
                    nulls_not_distinct: shorthand.nulls_not_distinct,
                    ..unique
                });
            }
        }
        for unique in &decl.uniques {
            let constraint = match &unique.name {
                Some(name) => UniqueConstraint::new(name.clone(), unique.columns.clone()).explicit_name(),
                None => UniqueConstraint::new(
                    format!("{}_{}_unique", table_name, join(&unique.columns)),
                    unique.columns.clone(),
                ),
            };
            table.uniques.push(UniqueConstraint {
                nulls_not_distinct: unique.nulls_not_distinct,
                ..constraint
            });
        }

        // checks
        for (name, expression) in &decl.checks {
            if !dialect.supports_checks() {
                self.errors
                    .push(SchemaError::unsupported(dialect, "check constraints"));
                continue;
            }
            table
                .checks
                .push(CheckConstraint::new(name.clone(), normalize_expression(expression)));
        }

        // foreign keys
        let inline_refs = decl.columns.iter().filter_map(|col| {
            col.references.as_ref().map(|r| {
                (
                    r.name.clone(),
                    vec![col.name.clone()],
                    r.schema.clone(),
                    r.table.clone(),
                    vec![r.column.clone()],
                    r.on_update,
                    r.on_delete,
                )
            })
        });
        let table_refs = decl.foreign_keys.iter().map(|fk| {
            (
                fk.name.clone(),
                fk.columns.clone(),
                fk.schema_to.clone(),
                fk.table_to.clone(),
                fk.columns_to.clone(),
                fk.on_update,
                fk.on_delete,
            )
        });
        let refs: Vec<_> = inline_refs.chain(table_refs).collect();
        for (name, columns, schema_to, table_to, columns_to, on_update, on_delete) in refs {
            if !dialect.supports_foreign_keys() {
                self.errors.push(SchemaError::unsupported(dialect, "foreign keys"));
                continue;
            }
            let schema_to = self.schema_of(schema_to.as_ref(), "foreign key target");
            let (name, name_explicit) = match name {
                Some(name) => (name, true),
                None => (
                    format!(
                        "{}_{}_{}_{}_fk",
                        table_name,
                        join(&columns),
                        table_to,
                        join(&columns_to)
                    )
                    .into(),
                    false,
                ),
            };
            table.foreign_keys.push(ForeignKey {
                name,
                name_explicit,
                columns,
                schema_to,
                table_to,
                columns_to,
                on_update,
                on_delete,
            });
        }

        // indexes
        for index in &decl.indexes {
            let has_expression = index.columns.iter().any(|c| c.is_expression);
            let name: SmolStr = match (&index.name, has_expression) {
                (Some(name), _) => name.clone(),
                (None, true) => {
                    self.errors.push(SchemaError::invalid_index(
                        format!("{}_<expression>_index", table_name),
                        "indexes over expressions must be named explicitly",
                    ));
                    continue;
                }
                (None, false) => {
                    let cols: Vec<&str> = index.columns.iter().map(|c| c.value.as_str()).collect();
                    format!("{}_{}_index", table_name, cols.join("_")).into()
                }
            };
            let mut converted = Index::new(name, index.columns.clone());
            for col in &mut converted.columns {
                if col.is_expression {
                    col.value = normalize_expression(&col.value);
                }
            }
            converted.unique = index.unique;
            if let Some(method) = &index.method {
                converted.method = method.to_lowercase().into();
            }
            converted.with = index.with.clone();
            converted.where_clause = index.where_clause.as_deref().map(normalize_expression);
            converted.concurrently = index.concurrently;
            table.indexes.push(converted);
        }

        // policies
        if !decl.policies.is_empty() && !dialect.supports_pg_objects() {
            self.errors
                .push(SchemaError::unsupported(dialect, "row-level security policies"));
        } else {
            table.policies = decl.policies.iter().map(normalize_policy).collect();
        }
        table.rls_enabled = decl.rls_enabled;

        table
    }
}

fn normalize_policy(policy: &crate::ddl::Policy) -> crate::ddl::Policy {
    let mut policy = policy.clone();
    policy.roles.sort();
    policy.using_expr = policy.using_expr.as_deref().map(normalize_expression);
    policy.check_expr = policy.check_expr.as_deref().map(normalize_expression);
    policy
}

fn join(columns: &[SmolStr]) -> String {
    columns
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{IdentityKind, IndexColumn, Policy};
    use crate::interim::{ColumnDecl, EnumDecl, ForeignKeyDecl, IndexDecl};
    use pretty_assertions::assert_eq;

    fn users() -> TableDecl {
        TableDecl::new("users")
            .column(ColumnDecl::new("id", "serial").primary_key())
            .column(ColumnDecl::new("name", "text"))
    }

    // ==================== Default Literal Tests ====================

    #[test]
    fn test_render_default_postgres() {
        let pg = Dialect::Postgresql;
        assert_eq!(render_default(&DefaultValue::Text("it's".into()), pg), "'it''s'");
        assert_eq!(render_default(&DefaultValue::Bool(true), pg), "true");
        assert_eq!(render_default(&DefaultValue::Int(42), pg), "42");
        assert_eq!(render_default(&DefaultValue::Sql("now()".into()), pg), "now()");
        assert_eq!(
            render_default(
                &DefaultValue::Array(vec![
                    DefaultValue::Int(1),
                    DefaultValue::Int(2),
                    DefaultValue::Int(3)
                ]),
                pg
            ),
            "'{1,2,3}'"
        );
        assert_eq!(render_default(&DefaultValue::Array(vec![]), pg), "'{}'");
        assert_eq!(
            render_default(
                &DefaultValue::Array(vec![
                    DefaultValue::Text("a".into()),
                    DefaultValue::Text("b".into())
                ]),
                pg
            ),
            "'{\"a\",\"b\"}'"
        );
        assert_eq!(
            render_default(&DefaultValue::Json(serde_json::json!({"a": 1})), pg),
            "'{\"a\":1}'"
        );
    }

    #[test]
    fn test_render_default_mysql_and_sqlite() {
        assert_eq!(render_default(&DefaultValue::Bool(true), Dialect::Mysql), "1");
        assert_eq!(render_default(&DefaultValue::Bool(false), Dialect::Singlestore), "0");
        assert_eq!(
            render_default(&DefaultValue::Sql("now()".into()), Dialect::Mysql),
            "(now())"
        );
        assert_eq!(
            render_default(&DefaultValue::Sql("(now())".into()), Dialect::Mysql),
            "(now())"
        );
        assert_eq!(
            render_default(&DefaultValue::Sql("CURRENT_TIMESTAMP".into()), Dialect::Sqlite),
            "(CURRENT_TIMESTAMP)"
        );
        assert_eq!(render_default(&DefaultValue::Bool(true), Dialect::Sqlite), "true");
    }

    // ==================== Conversion Tests ====================

    #[test]
    fn test_default_names_and_schema() {
        let decl = InterimSchema::new().table(
            users()
                .column(ColumnDecl::new("email", "text").unique())
                .index(IndexDecl::on(vec![IndexColumn::column("name")])),
        );
        let (snapshot, errors) = to_ddl(&decl, Dialect::Postgresql);
        assert!(errors.is_empty(), "{:?}", errors);

        let table = &snapshot.tables[0];
        assert_eq!(table.schema, "public");
        assert_eq!(table.primary_key.as_ref().unwrap().name, "users_pkey");
        assert_eq!(table.uniques[0].name, "users_email_unique");
        assert_eq!(table.indexes[0].name, "users_name_index");
        assert_eq!(table.indexes[0].method, "btree");
        assert!(table.columns[0].not_null);
    }

    #[test]
    fn test_identity_defaults() {
        let decl = InterimSchema::new().table(
            TableDecl::new("users").column(ColumnDecl::new("id", "integer").identity_always()),
        );
        let (snapshot, errors) = to_ddl(&decl, Dialect::Postgresql);
        assert!(errors.is_empty());

        let identity = snapshot.tables[0].columns[0].identity.as_ref().unwrap();
        assert_eq!(identity.kind, IdentityKind::Always);
        assert_eq!(identity.sequence_name, "users_id_seq");
        assert_eq!(identity.options.max_value, 2147483647);
    }

    #[test]
    fn test_foreign_key_default_name() {
        let decl = InterimSchema::new().table(users()).table(
            TableDecl::new("posts")
                .column(ColumnDecl::new("id", "serial").primary_key())
                .column(ColumnDecl::new("author_id", "integer").references("users", "id")),
        );
        let (snapshot, errors) = to_ddl(&decl, Dialect::Postgresql);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            snapshot.tables[1].foreign_keys[0].name,
            "posts_author_id_users_id_fk"
        );
        assert_eq!(snapshot.tables[1].foreign_keys[0].schema_to, "public");
    }

    #[test]
    fn test_errors_do_not_abort() {
        let decl = InterimSchema::new()
            .table(
                TableDecl::new("broken")
                    .column(ColumnDecl::new("a", "integer").primary_key())
                    .column(ColumnDecl::new("b", "integer").primary_key()),
            )
            .table(users());
        let (snapshot, errors) = to_ddl(&decl, Dialect::Postgresql);
        assert_eq!(snapshot.tables.len(), 2);
        assert!(errors
            .iter()
            .any(|e| matches!(e, SchemaError::MultiplePrimaryKeys { .. })));
    }

    #[test]
    fn test_composite_primary_key_with_inline_conflict() {
        let decl = InterimSchema::new().table(
            users().primary_key(PrimaryKeyDecl::new(["id", "name"])),
        );
        let (_, errors) = to_ddl(&decl, Dialect::Postgresql);
        assert!(errors
            .iter()
            .any(|e| matches!(e, SchemaError::MultiplePrimaryKeys { .. })));
    }

    #[test]
    fn test_expression_index_requires_name() {
        let decl = InterimSchema::new().table(
            users().index(IndexDecl::on(vec![IndexColumn::expression("lower(name)")])),
        );
        let (snapshot, errors) = to_ddl(&decl, Dialect::Postgresql);
        assert!(snapshot.tables[0].indexes.is_empty());
        assert!(matches!(errors[0], SchemaError::InvalidIndex { .. }));
    }

    #[test]
    fn test_unknown_enum_reference() {
        let decl = InterimSchema::new()
            .enum_type(EnumDecl::new("mood", ["happy", "sad"]))
            .table(users().column(ColumnDecl::enum_column("feeling", "feelings")));
        let (_, errors) = to_ddl(&decl, Dialect::Postgresql);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SchemaError::UnknownReference { .. }));
    }

    #[test]
    fn test_pg_objects_rejected_on_sqlite() {
        let decl = InterimSchema::new()
            .enum_type(EnumDecl::new("mood", ["happy"]))
            .table(users().policy(Policy::new("p")));
        let (snapshot, errors) = to_ddl(&decl, Dialect::Sqlite);
        assert!(snapshot.enums.is_empty());
        assert!(snapshot.tables[0].policies.is_empty());
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, SchemaError::Unsupported { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_foreign_keys_rejected_on_singlestore() {
        let decl = InterimSchema::new().table(users()).table(
            TableDecl::new("posts")
                .column(ColumnDecl::new("user_id", "int"))
                .foreign_key(ForeignKeyDecl::new(["user_id"], "users", ["id"])),
        );
        let (snapshot, errors) = to_ddl(&decl, Dialect::Singlestore);
        assert!(snapshot.tables[1].foreign_keys.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_policy_link_unknown_table() {
        let decl = InterimSchema::new()
            .table(users())
            .link_policy("accounts", Policy::new("p"));
        let (_, errors) = to_ddl(&decl, Dialect::Postgresql);
        assert!(matches!(errors[0], SchemaError::UnknownReference { .. }));
    }

    #[test]
    fn test_policy_link_attaches() {
        let decl = InterimSchema::new()
            .table(users())
            .link_policy("users", Policy::new("p").with_roles(["b", "a"]));
        let (snapshot, errors) = to_ddl(&decl, Dialect::Postgresql);
        assert!(errors.is_empty());
        let policy = &snapshot.tables[0].policies[0];
        assert_eq!(policy.roles, vec![SmolStr::new("a"), SmolStr::new("b")]);
    }

    #[test]
    fn test_mysql_has_no_schema() {
        let decl = InterimSchema::new().table(users().in_schema("app"));
        let (snapshot, errors) = to_ddl(&decl, Dialect::Mysql);
        assert_eq!(snapshot.tables[0].schema, "");
        assert_eq!(
            snapshot.tables[0].primary_key.as_ref().unwrap().name,
            "users_id_pk"
        );
        assert!(matches!(errors[0], SchemaError::Unsupported { .. }));
    }
}
