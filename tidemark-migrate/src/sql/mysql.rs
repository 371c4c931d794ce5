//! MySQL and SingleStore statements.

use tidemark_schema::Dialect;
use tidemark_schema::QualifiedName;
use tidemark_schema::ddl::{
    CheckConstraint, Column, ForeignKey, Index, IndexColumn, PrimaryKey, Table, UniqueConstraint,
    View,
};

use super::{SqlGenerator, quote_list, rebuild_table, unsupported};
use crate::statement::Statement;

const DIALECT: Dialect = Dialect::Mysql;

/// SQL generator for MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGenerator;

impl SqlGenerator for MySqlGenerator {
    fn dialect(&self) -> Dialect {
        DIALECT
    }

    fn to_sql(&self, statement: &Statement) -> Vec<String> {
        match statement {
            Statement::CreateTable { table } => vec![self.create_table(table)],
            Statement::DropTable { table } => {
                vec![format!("DROP TABLE {};", name(&table.schema, &table.name))]
            }
            Statement::RenameTable { schema, from, to } => vec![format!(
                "RENAME TABLE {} TO {};",
                name(schema, from),
                name(schema, to)
            )],
            Statement::MoveTable {
                name: table_name,
                from_schema,
                to_schema,
            } => vec![format!(
                "RENAME TABLE {} TO {};",
                name(from_schema, table_name),
                name(to_schema, table_name)
            )],
            Statement::TruncateTable { table } => vec![format!("TRUNCATE TABLE {};", qn(table))],

            Statement::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD {};",
                qn(table),
                self.column_definition(column, false)
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
                    "ALTER TABLE {} ADD {};",
                    qn(table),
                    self.column_definition(to, false)
                ),
            ],
            Statement::ModifyColumn { table, to, .. } => vec![format!(
                "ALTER TABLE {} MODIFY COLUMN {};",
                qn(table),
                self.column_definition(to, false)
            )],

            Statement::CreateIndex { table, index } => vec![self.create_index(table, index)],
            Statement::DropIndex { table, index } => vec![format!(
                "DROP INDEX {} ON {};",
                q(&index.name),
                qn(table)
            )],
            Statement::RenameIndex { table, from, to } => vec![format!(
                "ALTER TABLE {} RENAME INDEX {} TO {};",
                qn(table),
                q(from),
                q(to)
            )],

            Statement::AddPrimaryKey { table, primary_key } => vec![format!(
                "ALTER TABLE {} ADD PRIMARY KEY({});",
                qn(table),
                quote_list(DIALECT, &primary_key.columns, ",")
            )],
            Statement::DropPrimaryKey { table, .. } => {
                vec![format!("ALTER TABLE {} DROP PRIMARY KEY;", qn(table))]
            }
            Statement::AddUnique { table, unique } => vec![format!(
                "ALTER TABLE {} ADD {};",
                qn(table),
                unique_constraint(unique)
            )],
            Statement::DropUnique { table, unique } => vec![format!(
                "DROP INDEX {} ON {};",
                q(&unique.name),
                qn(table)
            )],
            Statement::AddCheck { table, check } => vec![format!(
                "ALTER TABLE {} ADD {};",
                qn(table),
                check_constraint(check)
            )],
            Statement::DropCheck { table, check } => vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                qn(table),
                q(&check.name)
            )],
            Statement::CreateForeignKey { table, foreign_key } => {
                vec![self.create_foreign_key(table, foreign_key)]
            }
            Statement::DropForeignKey { table, foreign_key } => vec![format!(
                "ALTER TABLE {} DROP FOREIGN KEY {};",
                qn(table),
                q(&foreign_key.name)
            )],

            Statement::CreateView { view, replace } => vec![self.create_view(view, *replace)],
            Statement::DropView { view } => {
                vec![format!("DROP VIEW {};", name(&view.schema, &view.name))]
            }
            Statement::RenameView { schema, from, to, .. } => vec![format!(
                "RENAME TABLE {} TO {};",
                name(schema, from),
                name(schema, to)
            )],

            _ => unsupported(DIALECT, statement),
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

fn primary_key_constraint(pk: &PrimaryKey) -> String {
    format!(
        "CONSTRAINT {} PRIMARY KEY({})",
        q(&pk.name),
        quote_list(DIALECT, &pk.columns, ",")
    )
}

fn unique_constraint(unique: &UniqueConstraint) -> String {
    format!(
        "CONSTRAINT {} UNIQUE({})",
        q(&unique.name),
        quote_list(DIALECT, &unique.columns, ",")
    )
}

fn check_constraint(check: &CheckConstraint) -> String {
    format!("CONSTRAINT {} CHECK({})", q(&check.name), check.value)
}

/// Expressions are key parts in their own parentheses.
fn index_column(column: &IndexColumn) -> String {
    let mut out = if column.is_expression {
        format!("({})", column.value)
    } else {
        q(&column.value)
    };
    if !column.asc {
        out.push_str(" DESC");
    }
    out
}

impl MySqlGenerator {
    /// Generate CREATE TABLE statement.
    fn create_table(&self, table: &Table) -> String {
        let inline_pk = table.inline_primary_key();
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c, inline_pk == Some(c.name.as_str())))
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
            name(&table.schema, &table.name),
            lines.join(",\n\t")
        )
    }

    /// Generate column definition.
    fn column_definition(&self, column: &Column, primary_key: bool) -> String {
        let mut sql = format!("{} {}", q(&column.name), column.sql_type);
        if primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if column.autoincrement {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(default) = &column.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(generated) = &column.generated {
            sql.push_str(&format!(
                " GENERATED ALWAYS AS ({}) {}",
                generated.expression,
                generated.mode.as_sql()
            ));
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if column.on_update_now {
            sql.push_str(" ON UPDATE CURRENT_TIMESTAMP");
        }
        sql
    }

    /// Generate CREATE INDEX statement.
    fn create_index(&self, table: &QualifiedName, index: &Index) -> String {
        let columns: Vec<String> = index.columns.iter().map(index_column).collect();
        let using = if index.method == "btree" {
            String::new()
        } else {
            format!(" USING {}", index.method)
        };
        format!(
            "CREATE {}INDEX {} ON {} ({}){};",
            if index.unique { "UNIQUE " } else { "" },
            q(&index.name),
            qn(table),
            columns.join(","),
            using
        )
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

    /// Generate CREATE VIEW statement.
    fn create_view(&self, view: &View, replace: bool) -> String {
        format!(
            "CREATE {}VIEW {} AS ({});",
            if replace { "OR REPLACE " } else { "" },
            name(&view.schema, &view.name),
            view.definition.as_deref().unwrap_or_default()
        )
    }
}

/// SQL generator for SingleStore.
///
/// SingleStore speaks MySQL, but has no foreign keys or check constraints
/// and rebuilds a table for most structural changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleStoreGenerator;

impl SqlGenerator for SingleStoreGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Singlestore
    }

    fn to_sql(&self, statement: &Statement) -> Vec<String> {
        match statement {
            Statement::RecreateTable { from, to } => rebuild_table(
                Dialect::Singlestore,
                from,
                to,
                false,
                |table| MySqlGenerator.create_table(table),
                |table, index| MySqlGenerator.create_index(&table.key(), index),
            ),
            Statement::AddCheck { .. }
            | Statement::DropCheck { .. }
            | Statement::CreateForeignKey { .. }
            | Statement::DropForeignKey { .. } => unsupported(Dialect::Singlestore, statement),
            _ => MySqlGenerator.to_sql(statement),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tidemark_schema::ddl::{GeneratedColumn, GeneratedMode, ReferentialAction};

    fn users() -> QualifiedName {
        QualifiedName::new("", "users")
    }

    fn sql(statement: Statement) -> Vec<String> {
        MySqlGenerator.to_sql(&statement)
    }

    // ==================== Table Tests ====================

    #[test]
    fn test_create_table() {
        let mut id = Column::new("id", "int").not_null();
        id.autoincrement = true;
        let mut updated = Column::new("updated_at", "timestamp").with_default("(now())");
        updated.on_update_now = true;
        let mut table = Table::new("", "users")
            .column(id)
            .column(Column::new("email", "varchar(255)").not_null())
            .column(updated);
        table.primary_key = Some(PrimaryKey::new("users_id", ["id"]));
        table
            .uniques
            .push(UniqueConstraint::new("users_email_unique", ["email"]));

        assert_eq!(
            sql(Statement::CreateTable { table }),
            vec![
                "CREATE TABLE `users` (\n\t`id` int PRIMARY KEY AUTO_INCREMENT NOT NULL,\n\t`email` varchar(255) NOT NULL,\n\t`updated_at` timestamp DEFAULT (now()) ON UPDATE CURRENT_TIMESTAMP,\n\tCONSTRAINT `users_email_unique` UNIQUE(`email`)\n);\n"
            ]
        );
    }

    #[test]
    fn test_rename_table() {
        assert_eq!(
            sql(Statement::RenameTable {
                schema: "".into(),
                from: "users".into(),
                to: "accounts".into(),
            }),
            vec!["RENAME TABLE `users` TO `accounts`;"]
        );
    }

    // ==================== Column Tests ====================

    #[test]
    fn test_modify_column() {
        assert_eq!(
            sql(Statement::ModifyColumn {
                table: users(),
                from: Column::new("name", "varchar(100)"),
                to: Column::new("name", "varchar(255)").not_null(),
            }),
            vec!["ALTER TABLE `users` MODIFY COLUMN `name` varchar(255) NOT NULL;"]
        );
    }

    #[test]
    fn test_virtual_generated_column() {
        let mut column = Column::new("full_name", "varchar(255)");
        column.generated = Some(GeneratedColumn {
            expression: "concat(first, ' ', last)".into(),
            mode: GeneratedMode::Virtual,
        });
        assert_eq!(
            sql(Statement::AddColumn {
                table: users(),
                column
            }),
            vec!["ALTER TABLE `users` ADD `full_name` varchar(255) GENERATED ALWAYS AS (concat(first, ' ', last)) VIRTUAL;"]
        );
    }

    // ==================== Index & Constraint Tests ====================

    #[test]
    fn test_create_index() {
        let index = Index::new(
            "users_name_idx",
            vec![IndexColumn::column("name").desc(), IndexColumn::expression("lower(email)")],
        );
        assert_eq!(
            sql(Statement::CreateIndex {
                table: users(),
                index
            }),
            vec!["CREATE INDEX `users_name_idx` ON `users` (`name` DESC,(lower(email)));"]
        );
    }

    #[test]
    fn test_rename_index() {
        assert_eq!(
            sql(Statement::RenameIndex {
                table: users(),
                from: "a".into(),
                to: "b".into(),
            }),
            vec!["ALTER TABLE `users` RENAME INDEX `a` TO `b`;"]
        );
    }

    #[test]
    fn test_drop_constraints() {
        assert_eq!(
            sql(Statement::DropUnique {
                table: users(),
                unique: UniqueConstraint::new("users_email_unique", ["email"]),
            }),
            vec!["DROP INDEX `users_email_unique` ON `users`;"]
        );
        assert_eq!(
            sql(Statement::DropPrimaryKey {
                table: users(),
                primary_key: PrimaryKey::new("users_id", ["id"]),
            }),
            vec!["ALTER TABLE `users` DROP PRIMARY KEY;"]
        );
    }

    #[test]
    fn test_foreign_key_lifecycle() {
        let foreign_key = ForeignKey {
            name: "posts_author_fk".into(),
            name_explicit: false,
            columns: vec!["author_id".into()],
            schema_to: "".into(),
            table_to: "users".into(),
            columns_to: vec!["id".into()],
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::SetNull,
        };
        let posts = QualifiedName::new("", "posts");
        assert_eq!(
            sql(Statement::CreateForeignKey {
                table: posts.clone(),
                foreign_key: foreign_key.clone(),
            }),
            vec!["ALTER TABLE `posts` ADD CONSTRAINT `posts_author_fk` FOREIGN KEY (`author_id`) REFERENCES `users`(`id`) ON DELETE set null ON UPDATE no action;"]
        );
        assert_eq!(
            sql(Statement::DropForeignKey {
                table: posts,
                foreign_key
            }),
            vec!["ALTER TABLE `posts` DROP FOREIGN KEY `posts_author_fk`;"]
        );
    }

    #[test]
    fn test_pg_only_statements_render_nothing() {
        assert!(sql(Statement::EnableRls { table: users() }).is_empty());
        assert!(sql(Statement::CreateSchema { name: "s".into() }).is_empty());
    }

    // ==================== SingleStore Tests ====================

    #[test]
    fn test_singlestore_rebuild() {
        let from = Table::new("", "users")
            .column(Column::new("id", "int").not_null())
            .column(Column::new("name", "text"));
        let mut to = Table::new("", "users")
            .column(Column::new("id", "int").not_null())
            .column(Column::new("name", "varchar(255)"));
        to.indexes
            .push(Index::new("users_name_idx", vec![IndexColumn::column("name")]));

        assert_eq!(
            SingleStoreGenerator.to_sql(&Statement::RecreateTable { from, to }),
            vec![
                "CREATE TABLE `__new_users` (\n\t`id` int NOT NULL,\n\t`name` varchar(255)\n);\n",
                "INSERT INTO `__new_users`(`id`, `name`) SELECT `id`, `name` FROM `users`;",
                "DROP TABLE `users`;",
                "ALTER TABLE `__new_users` RENAME TO `users`;",
                "CREATE INDEX `users_name_idx` ON `users` (`name`);",
            ]
        );
    }

    #[test]
    fn test_singlestore_skips_checks() {
        let statement = Statement::AddCheck {
            table: users(),
            check: CheckConstraint::new("age_check", "age > 0"),
        };
        assert!(SingleStoreGenerator.to_sql(&statement).is_empty());
        assert_eq!(MySqlGenerator.to_sql(&statement).len(), 1);
    }
}
