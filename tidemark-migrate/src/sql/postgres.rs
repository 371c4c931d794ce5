//! PostgreSQL statements.

use std::collections::BTreeMap;

use tidemark_schema::QualifiedName;
use tidemark_schema::ddl::{
    CheckConstraint, Column, Enum, ForeignKey, IdentityColumn, Index, IndexColumn, Policy,
    PrimaryKey, Role, Sequence, SequenceOptions, Table, UniqueConstraint, View,
};
use tidemark_schema::Dialect;

use super::{SqlGenerator, literal, quote_list, unsupported};
use crate::statement::{EnumColumnRef, Statement};

const DIALECT: Dialect = Dialect::Postgresql;

/// Role names that are keywords in a policy's `TO` list.
const ROLE_KEYWORDS: [&str; 4] = ["public", "current_role", "current_user", "session_user"];

/// SQL generator for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresSqlGenerator;

impl SqlGenerator for PostgresSqlGenerator {
    fn dialect(&self) -> Dialect {
        DIALECT
    }

    fn to_sql(&self, statement: &Statement) -> Vec<String> {
        match statement {
            Statement::CreateSchema { name } => {
                vec![format!("CREATE SCHEMA {};", q(name))]
            }
            Statement::DropSchema { name } => vec![format!("DROP SCHEMA {};", q(name))],
            Statement::RenameSchema { from, to } => {
                vec![format!("ALTER SCHEMA {} RENAME TO {};", q(from), q(to))]
            }

            Statement::CreateEnum { enum_type } => vec![self.create_enum(enum_type)],
            Statement::DropEnum { enum_type } => {
                vec![format!("DROP TYPE {};", name(&enum_type.schema, &enum_type.name))]
            }
            Statement::RenameEnum { schema, from, to } => vec![format!(
                "ALTER TYPE {} RENAME TO {};",
                name(schema, from),
                q(to)
            )],
            Statement::MoveEnum {
                name: type_name,
                from_schema,
                to_schema,
            } => vec![format!(
                "ALTER TYPE {} SET SCHEMA {};",
                name(from_schema, type_name),
                q(to_schema)
            )],
            Statement::AlterEnumAddValue {
                enum_type,
                value,
                before,
            } => {
                let before = before
                    .as_ref()
                    .map(|b| format!(" BEFORE {}", literal(b)))
                    .unwrap_or_default();
                vec![format!(
                    "ALTER TYPE {} ADD VALUE {}{};",
                    name(&enum_type.schema, &enum_type.name),
                    literal(value),
                    before
                )]
            }
            Statement::RecreateEnum { enum_type, columns } => {
                self.recreate_enum(enum_type, columns)
            }

            Statement::CreateSequence { sequence } => vec![self.create_sequence(sequence)],
            Statement::DropSequence { sequence } => vec![format!(
                "DROP SEQUENCE {};",
                name(&sequence.schema, &sequence.name)
            )],
            Statement::RenameSequence { schema, from, to } => vec![format!(
                "ALTER SEQUENCE {} RENAME TO {};",
                name(schema, from),
                q(to)
            )],
            Statement::MoveSequence {
                name: sequence_name,
                from_schema,
                to_schema,
            } => vec![format!(
                "ALTER SEQUENCE {} SET SCHEMA {};",
                name(from_schema, sequence_name),
                q(to_schema)
            )],
            Statement::AlterSequence { sequence, changes } => {
                let clauses: Vec<String> = changes.iter().map(|c| c.clause()).collect();
                vec![format!(
                    "ALTER SEQUENCE {} {};",
                    name(&sequence.schema, &sequence.name),
                    clauses.join(" ")
                )]
            }

            Statement::CreateRole { role } => vec![self.create_role(role)],
            Statement::DropRole { role } => vec![format!("DROP ROLE {};", q(&role.name))],
            Statement::RenameRole { from, to } => {
                vec![format!("ALTER ROLE {} RENAME TO {};", q(from), q(to))]
            }
            Statement::AlterRole { role } => vec![self.alter_role(role)],

            Statement::CreateTable { table } => vec![self.create_table(table)],
            Statement::DropTable { table } => {
                vec![format!("DROP TABLE {} CASCADE;", name(&table.schema, &table.name))]
            }
            Statement::RenameTable { schema, from, to } => vec![format!(
                "ALTER TABLE {} RENAME TO {};",
                name(schema, from),
                q(to)
            )],
            Statement::MoveTable {
                name: table_name,
                from_schema,
                to_schema,
            } => vec![format!(
                "ALTER TABLE {} SET SCHEMA {};",
                name(from_schema, table_name),
                q(to_schema)
            )],
            Statement::TruncateTable { table } => {
                vec![format!("TRUNCATE TABLE {} CASCADE;", qn(table))]
            }

            Statement::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {};",
                qn(table),
                self.column_definition(table, column, false)
            )],
            Statement::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {};",
                qn(table),
                q(&column.name)
            )],
            Statement::RenameColumn { table, from, to } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                qn(table),
                q(from),
                q(to)
            )],
            Statement::RecreateColumn { table, from, to } => vec![
                format!("ALTER TABLE {} DROP COLUMN {};", qn(table), q(&from.name)),
                format!(
                    "ALTER TABLE {} ADD COLUMN {};",
                    qn(table),
                    self.column_definition(table, to, false)
                ),
            ],
            Statement::AlterColumnType { table, to, .. } => {
                let sql_type = to.type_sql(DIALECT);
                let using = if to.is_user_type() {
                    format!(" USING {}::{}", q(&to.name), sql_type)
                } else {
                    String::new()
                };
                vec![format!(
                    "{} SET DATA TYPE {}{};",
                    alter_column(table, &to.name),
                    sql_type,
                    using
                )]
            }
            Statement::AlterColumnSetDefault {
                table,
                column,
                default,
            } => vec![format!(
                "{} SET DEFAULT {};",
                alter_column(table, column),
                default
            )],
            Statement::AlterColumnDropDefault { table, column } => {
                vec![format!("{} DROP DEFAULT;", alter_column(table, column))]
            }
            Statement::AlterColumnSetNotNull { table, column } => {
                vec![format!("{} SET NOT NULL;", alter_column(table, column))]
            }
            Statement::AlterColumnDropNotNull { table, column } => {
                vec![format!("{} DROP NOT NULL;", alter_column(table, column))]
            }
            Statement::AlterColumnDropGenerated { table, column } => {
                vec![format!("{} DROP EXPRESSION;", alter_column(table, column))]
            }
            Statement::AlterColumnAddIdentity {
                table,
                column,
                identity,
            } => vec![format!(
                "{} ADD{};",
                alter_column(table, column),
                identity_clause(&table.schema, identity)
            )],
            Statement::AlterColumnDropIdentity { table, column } => {
                vec![format!("{} DROP IDENTITY;", alter_column(table, column))]
            }
            Statement::AlterColumnSetIdentityKind {
                table,
                column,
                kind,
            } => vec![format!(
                "{} SET GENERATED {};",
                alter_column(table, column),
                kind.as_sql()
            )],
            Statement::AlterColumnSetIdentityOption {
                table,
                column,
                option,
            } => vec![format!(
                "{} SET {};",
                alter_column(table, column),
                option.clause()
            )],

            Statement::CreateIndex { table, index } => vec![self.create_index(table, index)],
            Statement::DropIndex { table, index } => {
                vec![format!("DROP INDEX {};", name(&table.schema, &index.name))]
            }
            Statement::RenameIndex { table, from, to } => vec![format!(
                "ALTER INDEX {} RENAME TO {};",
                name(&table.schema, from),
                q(to)
            )],

            Statement::AddPrimaryKey { table, primary_key } => vec![format!(
                "ALTER TABLE {} ADD {};",
                qn(table),
                primary_key_constraint(primary_key)
            )],
            Statement::DropPrimaryKey { table, primary_key } => {
                vec![drop_constraint(table, &primary_key.name)]
            }
            Statement::AddUnique { table, unique } => vec![format!(
                "ALTER TABLE {} ADD {};",
                qn(table),
                unique_constraint(unique)
            )],
            Statement::DropUnique { table, unique } => vec![drop_constraint(table, &unique.name)],
            Statement::AddCheck { table, check } => vec![format!(
                "ALTER TABLE {} ADD {};",
                qn(table),
                check_constraint(check)
            )],
            Statement::DropCheck { table, check } => vec![drop_constraint(table, &check.name)],
            Statement::CreateForeignKey { table, foreign_key } => {
                vec![self.create_foreign_key(table, foreign_key)]
            }
            Statement::DropForeignKey { table, foreign_key } => {
                vec![drop_constraint(table, &foreign_key.name)]
            }

            Statement::EnableRls { table } => vec![format!(
                "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;",
                qn(table)
            )],
            Statement::DisableRls { table } => vec![format!(
                "ALTER TABLE {} DISABLE ROW LEVEL SECURITY;",
                qn(table)
            )],
            Statement::CreatePolicy { table, policy } => vec![self.create_policy(table, policy)],
            Statement::DropPolicy { table, policy } => vec![format!(
                "DROP POLICY {} ON {} CASCADE;",
                q(&policy.name),
                qn(table)
            )],
            Statement::RenamePolicy { table, from, to } => vec![format!(
                "ALTER POLICY {} ON {} RENAME TO {};",
                q(from),
                qn(table),
                q(to)
            )],
            Statement::AlterPolicy { table, to, .. } => vec![self.alter_policy(table, to)],

            Statement::CreateView { view, replace } => vec![self.create_view(view, *replace)],
            Statement::DropView { view } => vec![format!(
                "DROP {}VIEW {};",
                materialized(view.materialized),
                name(&view.schema, &view.name)
            )],
            Statement::RenameView {
                schema,
                from,
                to,
                materialized: is_materialized,
            } => vec![format!(
                "ALTER {}VIEW {} RENAME TO {};",
                materialized(*is_materialized),
                name(schema, from),
                q(to)
            )],
            Statement::MoveView {
                name: view_name,
                from_schema,
                to_schema,
                materialized: is_materialized,
            } => vec![format!(
                "ALTER {}VIEW {} SET SCHEMA {};",
                materialized(*is_materialized),
                name(from_schema, view_name),
                q(to_schema)
            )],
            Statement::AlterViewOptions { view, set, reset } => {
                self.alter_view_options(view, set, reset)
            }

            Statement::RecreateTable { .. } | Statement::ModifyColumn { .. } => {
                unsupported(DIALECT, statement)
            }
        }
    }
}

fn q(ident: &str) -> String {
    DIALECT.quote(ident)
}

fn name(schema: &str, name: &str) -> String {
    DIALECT.qualified(schema, name)
}

fn qn(name: &QualifiedName) -> String {
    DIALECT.qualified(&name.schema, &name.name)
}

fn materialized(is_materialized: bool) -> &'static str {
    if is_materialized { "MATERIALIZED " } else { "" }
}

fn alter_column(table: &QualifiedName, column: &str) -> String {
    format!("ALTER TABLE {} ALTER COLUMN {}", qn(table), q(column))
}

fn drop_constraint(table: &QualifiedName, constraint: &str) -> String {
    format!("ALTER TABLE {} DROP CONSTRAINT {};", qn(table), q(constraint))
}

fn primary_key_constraint(pk: &PrimaryKey) -> String {
    format!(
        "CONSTRAINT {} PRIMARY KEY({})",
        q(&pk.name),
        quote_list(DIALECT, &pk.columns, ",")
    )
}

fn unique_constraint(unique: &UniqueConstraint) -> String {
    let nulls = if unique.nulls_not_distinct {
        " NULLS NOT DISTINCT"
    } else {
        ""
    };
    format!(
        "CONSTRAINT {} UNIQUE{}({})",
        q(&unique.name),
        nulls,
        quote_list(DIALECT, &unique.columns, ",")
    )
}

fn check_constraint(check: &CheckConstraint) -> String {
    format!("CONSTRAINT {} CHECK ({})", q(&check.name), check.value)
}

fn sequence_clauses(options: &SequenceOptions) -> String {
    let mut out = format!(
        "INCREMENT BY {} MINVALUE {} MAXVALUE {} START WITH {} CACHE {}",
        options.increment, options.min_value, options.max_value, options.start_with, options.cache
    );
    if options.cycle {
        out.push_str(" CYCLE");
    }
    out
}

/// ` GENERATED ... AS IDENTITY (...)`, with a leading space.
fn identity_clause(schema: &str, identity: &IdentityColumn) -> String {
    format!(
        " GENERATED {} AS IDENTITY (sequence name {} {})",
        identity.kind.as_sql(),
        name(schema, &identity.sequence_name),
        sequence_clauses(&identity.options)
    )
}

/// One index column: opclass before direction, nulls order only when
/// it differs from the direction's default.
fn index_column(column: &IndexColumn) -> String {
    let mut out = if column.is_expression {
        column.value.clone()
    } else {
        q(&column.value)
    };
    if let Some(opclass) = column.explicit_opclass() {
        out.push(' ');
        out.push_str(opclass);
    }
    match (column.asc, column.nulls_first) {
        (true, false) => {}
        (true, true) => out.push_str(" NULLS FIRST"),
        (false, false) => out.push_str(" DESC NULLS LAST"),
        (false, true) => out.push_str(" DESC"),
    }
    out
}

fn role_list(roles: &[&str]) -> String {
    roles
        .iter()
        .map(|r| {
            if ROLE_KEYWORDS.contains(r) {
                r.to_string()
            } else {
                q(r)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn policy_clauses(policy: &Policy) -> String {
    let mut out = String::new();
    if let Some(using) = &policy.using_expr {
        out.push_str(&format!(" USING ({})", using));
    }
    if let Some(check) = &policy.check_expr {
        out.push_str(&format!(" WITH CHECK ({})", check));
    }
    out
}

fn with_options(options: &BTreeMap<String, String>) -> String {
    options
        .iter()
        .map(|(k, v)| format!("{} = {}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PostgresSqlGenerator {
    /// Generate CREATE TYPE for an enum.
    fn create_enum(&self, enum_type: &Enum) -> String {
        let values: Vec<String> = enum_type.values.iter().map(|v| literal(v)).collect();
        format!(
            "CREATE TYPE {} AS ENUM({});",
            name(&enum_type.schema, &enum_type.name),
            values.join(", ")
        )
    }

    /// Drop and recreate an enum, casting dependents through text.
    fn recreate_enum(&self, enum_type: &Enum, columns: &[EnumColumnRef]) -> Vec<String> {
        let type_name = name(&enum_type.schema, &enum_type.name);
        let arrays = |dimensions: u8| "[]".repeat(dimensions as usize);
        let mut stmts = Vec::new();

        for column in columns {
            if column.default.is_some() {
                stmts.push(format!(
                    "{} DROP DEFAULT;",
                    alter_column(&column.table, &column.column)
                ));
            }
            stmts.push(format!(
                "{} SET DATA TYPE text{};",
                alter_column(&column.table, &column.column),
                arrays(column.dimensions)
            ));
        }

        stmts.push(format!("DROP TYPE {};", type_name));
        stmts.push(self.create_enum(enum_type));

        for column in columns.iter().filter(|c| c.restore) {
            let sql_type = format!("{}{}", type_name, arrays(column.dimensions));
            stmts.push(format!(
                "{} SET DATA TYPE {} USING {}::{};",
                alter_column(&column.table, &column.column),
                sql_type,
                q(&column.column),
                sql_type
            ));
            if let Some(default) = &column.default {
                stmts.push(format!(
                    "{} SET DEFAULT {};",
                    alter_column(&column.table, &column.column),
                    default
                ));
            }
        }
        stmts
    }

    /// Generate CREATE SEQUENCE.
    fn create_sequence(&self, sequence: &Sequence) -> String {
        format!(
            "CREATE SEQUENCE {} {};",
            name(&sequence.schema, &sequence.name),
            sequence_clauses(&sequence.options)
        )
    }

    /// Generate CREATE ROLE with non-default flags only.
    fn create_role(&self, role: &Role) -> String {
        if !role.has_non_default_flags() {
            return format!("CREATE ROLE {};", q(&role.name));
        }
        let mut flags = Vec::new();
        if role.create_db {
            flags.push("CREATEDB");
        }
        if role.create_role {
            flags.push("CREATEROLE");
        }
        if !role.inherit {
            flags.push("NOINHERIT");
        }
        format!("CREATE ROLE {} WITH {};", q(&role.name), flags.join(" "))
    }

    fn alter_role(&self, role: &Role) -> String {
        format!(
            "ALTER ROLE {} WITH {} {} {};",
            q(&role.name),
            if role.create_db { "CREATEDB" } else { "NOCREATEDB" },
            if role.create_role { "CREATEROLE" } else { "NOCREATEROLE" },
            if role.inherit { "INHERIT" } else { "NOINHERIT" }
        )
    }

    /// Generate CREATE TABLE statement.
    fn create_table(&self, table: &Table) -> String {
        let key = table.key();
        let inline_pk = table.inline_primary_key();
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(&key, c, inline_pk == Some(c.name.as_str())))
            .collect();

        if let Some(pk) = &table.primary_key
            && inline_pk.is_none()
        {
            lines.push(primary_key_constraint(pk));
        }
        for unique in &table.uniques {
            lines.push(unique_constraint(unique));
        }
        for check in &table.checks {
            lines.push(check_constraint(check));
        }

        format!(
            "CREATE TABLE {} (\n\t{}\n);\n",
            qn(&key),
            lines.join(",\n\t")
        )
    }

    /// Generate column definition.
    fn column_definition(&self, table: &QualifiedName, column: &Column, primary_key: bool) -> String {
        let mut sql = format!("{} {}", q(&column.name), column.type_sql(DIALECT));
        if primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if let Some(default) = &column.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(generated) = &column.generated {
            sql.push_str(&format!(
                " GENERATED ALWAYS AS ({}) STORED",
                generated.expression
            ));
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(identity) = &column.identity {
            sql.push_str(&identity_clause(&table.schema, identity));
        }
        sql
    }

    /// Generate CREATE INDEX statement.
    fn create_index(&self, table: &QualifiedName, index: &Index) -> String {
        let columns: Vec<String> = index.columns.iter().map(index_column).collect();
        let mut sql = format!(
            "CREATE {}INDEX {}{} ON {} USING {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            if index.concurrently { "CONCURRENTLY " } else { "" },
            q(&index.name),
            qn(table),
            index.method,
            columns.join(",")
        );
        if !index.with.is_empty() {
            let params: Vec<String> = index
                .with
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            sql.push_str(&format!(" WITH ({})", params.join(",")));
        }
        if let Some(predicate) = &index.where_clause {
            sql.push_str(&format!(" WHERE {}", predicate));
        }
        sql.push(';');
        sql
    }

    fn create_foreign_key(&self, table: &QualifiedName, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {} ON UPDATE {};",
            qn(table),
            q(&fk.name),
            quote_list(DIALECT, &fk.columns, ","),
            name(&fk.schema_to, &fk.table_to),
            quote_list(DIALECT, &fk.columns_to, ","),
            fk.on_delete.as_sql(),
            fk.on_update.as_sql()
        )
    }

    fn create_policy(&self, table: &QualifiedName, policy: &Policy) -> String {
        format!(
            "CREATE POLICY {} ON {} AS {} FOR {} TO {}{};",
            q(&policy.name),
            qn(table),
            policy.policy_type.as_sql(),
            policy.command.as_sql(),
            role_list(&policy.effective_roles()),
            policy_clauses(policy)
        )
    }

    fn alter_policy(&self, table: &QualifiedName, policy: &Policy) -> String {
        format!(
            "ALTER POLICY {} ON {} TO {}{};",
            q(&policy.name),
            qn(table),
            role_list(&policy.effective_roles()),
            policy_clauses(policy)
        )
    }

    /// Generate CREATE VIEW statement.
    fn create_view(&self, view: &View, replace: bool) -> String {
        let mut sql = format!(
            "CREATE {}{}VIEW {}",
            if replace { "OR REPLACE " } else { "" },
            materialized(view.materialized),
            name(&view.schema, &view.name)
        );
        if let Some(using) = &view.using {
            sql.push_str(&format!(" USING {}", using));
        }
        if !view.with.is_empty() {
            sql.push_str(&format!(" WITH ({})", with_options(&view.with)));
        }
        sql.push_str(&format!(
            " AS ({})",
            view.definition.as_deref().unwrap_or_default()
        ));
        if view.materialized && view.with_no_data {
            sql.push_str(" WITH NO DATA");
        }
        sql.push(';');
        sql
    }

    fn alter_view_options(
        &self,
        view: &View,
        set: &BTreeMap<String, String>,
        reset: &[String],
    ) -> Vec<String> {
        let target = format!(
            "ALTER {}VIEW {}",
            materialized(view.materialized),
            name(&view.schema, &view.name)
        );
        let mut stmts = Vec::new();
        if !set.is_empty() {
            stmts.push(format!("{} SET ({});", target, with_options(set)));
        }
        if !reset.is_empty() {
            stmts.push(format!("{} RESET ({});", target, reset.join(", ")));
        }
        stmts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::SequenceOption;
    use pretty_assertions::assert_eq;
    use tidemark_schema::ddl::{IdentityKind, PolicyType, ReferentialAction};

    fn users() -> QualifiedName {
        QualifiedName::new("public", "users")
    }

    fn sql(statement: Statement) -> Vec<String> {
        PostgresSqlGenerator.to_sql(&statement)
    }

    // ==================== Table Tests ====================

    #[test]
    fn test_create_table() {
        let mut table = Table::new("public", "users")
            .column(Column::new("id", "serial").not_null())
            .column(Column::new("email", "text").not_null())
            .column(Column::new("active", "boolean").with_default("true"));
        table.primary_key = Some(PrimaryKey::new("users_pkey", ["id"]));
        table
            .uniques
            .push(UniqueConstraint::new("users_email_unique", ["email"]));

        assert_eq!(
            sql(Statement::CreateTable { table }),
            vec![
                "CREATE TABLE \"users\" (\n\t\"id\" serial PRIMARY KEY NOT NULL,\n\t\"email\" text NOT NULL,\n\t\"active\" boolean DEFAULT true,\n\tCONSTRAINT \"users_email_unique\" UNIQUE(\"email\")\n);\n"
            ]
        );
    }

    #[test]
    fn test_create_table_in_schema_with_composite_key() {
        let mut table = Table::new("app", "members")
            .column(Column::new("org", "integer").not_null())
            .column(Column::new("user", "integer").not_null());
        table.primary_key = Some(PrimaryKey::new("members_pkey", ["org", "user"]));

        assert_eq!(
            sql(Statement::CreateTable { table }),
            vec![
                "CREATE TABLE \"app\".\"members\" (\n\t\"org\" integer NOT NULL,\n\t\"user\" integer NOT NULL,\n\tCONSTRAINT \"members_pkey\" PRIMARY KEY(\"org\",\"user\")\n);\n"
            ]
        );
    }

    #[test]
    fn test_identity_column_definition() {
        let mut column = Column::new("id", "integer").not_null();
        column.identity = Some(IdentityColumn {
            kind: IdentityKind::ByDefault,
            sequence_name: "users_id_seq".into(),
            options: SequenceOptions::for_type("integer"),
        });
        assert_eq!(
            sql(Statement::AddColumn {
                table: users(),
                column
            }),
            vec![
                "ALTER TABLE \"users\" ADD COLUMN \"id\" integer NOT NULL GENERATED BY DEFAULT AS IDENTITY (sequence name \"users_id_seq\" INCREMENT BY 1 MINVALUE 1 MAXVALUE 2147483647 START WITH 1 CACHE 1);"
            ]
        );
    }

    #[test]
    fn test_truncate_cascades() {
        assert_eq!(
            sql(Statement::TruncateTable { table: users() }),
            vec!["TRUNCATE TABLE \"users\" CASCADE;"]
        );
    }

    // ==================== Column Tests ====================

    #[test]
    fn test_alter_column_type_to_enum_casts() {
        let from = Column::new("mood", "text");
        let mut to = Column::new("mood", "mood");
        to.type_schema = Some("public".into());
        assert_eq!(
            sql(Statement::AlterColumnType {
                table: users(),
                from,
                to
            }),
            vec!["ALTER TABLE \"users\" ALTER COLUMN \"mood\" SET DATA TYPE \"mood\" USING \"mood\"::\"mood\";"]
        );
    }

    #[test]
    fn test_identity_option_change() {
        assert_eq!(
            sql(Statement::AlterColumnSetIdentityOption {
                table: users(),
                column: "id".into(),
                option: SequenceOption::Cycle(false),
            }),
            vec!["ALTER TABLE \"users\" ALTER COLUMN \"id\" SET NO CYCLE;"]
        );
    }

    // ==================== Index Tests ====================

    #[test]
    fn test_create_index_directions_and_params() {
        let index = Index::new(
            "idx",
            vec![
                IndexColumn::column("name").desc(),
                IndexColumn::column("id"),
            ],
        )
        .with_param("fillfactor", "70");
        assert_eq!(
            sql(Statement::CreateIndex {
                table: users(),
                index
            }),
            vec!["CREATE INDEX \"idx\" ON \"users\" USING btree (\"name\" DESC NULLS LAST,\"id\") WITH (fillfactor=70);"]
        );
    }

    #[test]
    fn test_create_partial_expression_index() {
        let index = Index::new("users_lower_email", vec![IndexColumn::expression("lower(email)")])
            .unique()
            .with_where("deleted_at IS NULL");
        assert_eq!(
            sql(Statement::CreateIndex {
                table: users(),
                index
            }),
            vec!["CREATE UNIQUE INDEX \"users_lower_email\" ON \"users\" USING btree (lower(email)) WHERE deleted_at IS NULL;"]
        );
    }

    // ==================== Constraint Tests ====================

    #[test]
    fn test_foreign_key() {
        let foreign_key = ForeignKey {
            name: "posts_author_fk".into(),
            name_explicit: false,
            columns: vec!["author_id".into()],
            schema_to: "public".into(),
            table_to: "users".into(),
            columns_to: vec!["id".into()],
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::Cascade,
        };
        assert_eq!(
            sql(Statement::CreateForeignKey {
                table: QualifiedName::new("public", "posts"),
                foreign_key
            }),
            vec!["ALTER TABLE \"posts\" ADD CONSTRAINT \"posts_author_fk\" FOREIGN KEY (\"author_id\") REFERENCES \"users\"(\"id\") ON DELETE cascade ON UPDATE no action;"]
        );
    }

    // ==================== Enum Tests ====================

    #[test]
    fn test_enum_add_value_before() {
        let enum_type = Enum::new("public", "mood", ["sad", "happy"]);
        assert_eq!(
            sql(Statement::AlterEnumAddValue {
                enum_type,
                value: "ok".into(),
                before: Some("happy".into()),
            }),
            vec!["ALTER TYPE \"mood\" ADD VALUE 'ok' BEFORE 'happy';"]
        );
    }

    #[test]
    fn test_recreate_enum_round_trips_dependents() {
        let enum_type = Enum::new("public", "mood", ["happy", "sad"]);
        let columns = vec![EnumColumnRef {
            table: users(),
            column: "mood".into(),
            dimensions: 0,
            default: Some("'happy'::\"mood\"".into()),
            restore: true,
        }];
        assert_eq!(
            sql(Statement::RecreateEnum { enum_type, columns }),
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"mood\" DROP DEFAULT;",
                "ALTER TABLE \"users\" ALTER COLUMN \"mood\" SET DATA TYPE text;",
                "DROP TYPE \"mood\";",
                "CREATE TYPE \"mood\" AS ENUM('happy', 'sad');",
                "ALTER TABLE \"users\" ALTER COLUMN \"mood\" SET DATA TYPE \"mood\" USING \"mood\"::\"mood\";",
                "ALTER TABLE \"users\" ALTER COLUMN \"mood\" SET DEFAULT 'happy'::\"mood\";",
            ]
        );
    }

    // ==================== Role & Policy Tests ====================

    #[test]
    fn test_create_role_flags() {
        let role = Role::new("admin").with_create_db(true).with_inherit(false);
        assert_eq!(
            sql(Statement::CreateRole { role }),
            vec!["CREATE ROLE \"admin\" WITH CREATEDB NOINHERIT;"]
        );
        assert_eq!(
            sql(Statement::CreateRole {
                role: Role::new("reader")
            }),
            vec!["CREATE ROLE \"reader\";"]
        );
    }

    #[test]
    fn test_alter_role_lists_every_flag() {
        let role = Role::new("admin").with_create_role(true);
        assert_eq!(
            sql(Statement::AlterRole { role }),
            vec!["ALTER ROLE \"admin\" WITH NOCREATEDB CREATEROLE INHERIT;"]
        );
    }

    #[test]
    fn test_create_policy() {
        let policy = Policy::new("own_rows")
            .with_type(PolicyType::Restrictive)
            .with_roles(["current_user", "admin"])
            .with_using("user_id = 1");
        assert_eq!(
            sql(Statement::CreatePolicy {
                table: users(),
                policy
            }),
            vec!["CREATE POLICY \"own_rows\" ON \"users\" AS RESTRICTIVE FOR ALL TO \"admin\", current_user USING (user_id = 1);"]
        );
    }

    // ==================== View Tests ====================

    #[test]
    fn test_create_materialized_view_with_no_data() {
        let mut view = View::new("public", "stats", "select count(*) from users").materialized();
        view.with_no_data = true;
        assert_eq!(
            sql(Statement::CreateView {
                view,
                replace: false
            }),
            vec!["CREATE MATERIALIZED VIEW \"stats\" AS (select count(*) from users) WITH NO DATA;"]
        );
    }

    #[test]
    fn test_sequence_lifecycle() {
        let sequence = Sequence::new("public", "ids")
            .with_options(SequenceOptions::for_type("bigint").with_increment(5).with_cycle(true));
        assert_eq!(
            sql(Statement::CreateSequence { sequence }),
            vec!["CREATE SEQUENCE \"ids\" INCREMENT BY 5 MINVALUE 1 MAXVALUE 9223372036854775807 START WITH 1 CACHE 1 CYCLE;"]
        );
    }
}
