//! SQLite statements.

use tidemark_schema::Dialect;
use tidemark_schema::QualifiedName;
use tidemark_schema::ddl::{Column, Index, Table};

use super::{SqlGenerator, quote_list, rebuild_table, unsupported};
use crate::statement::Statement;

const DIALECT: Dialect = Dialect::Sqlite;

/// SQL generator for SQLite.
///
/// Anything SQLite cannot alter in place arrives as a table rebuild.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGenerator;

impl SqlGenerator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        DIALECT
    }

    fn to_sql(&self, statement: &Statement) -> Vec<String> {
        match statement {
            Statement::CreateTable { table } => vec![self.create_table(table)],
            Statement::DropTable { table } => vec![format!("DROP TABLE {};", q(&table.name))],
            Statement::RenameTable { from, to, .. } => {
                vec![format!("ALTER TABLE {} RENAME TO {};", q(from), q(to))]
            }
            Statement::RecreateTable { from, to } => rebuild_table(
                DIALECT,
                from,
                to,
                true,
                |table| self.create_table(table),
                |table, index| self.create_index(&table.key(), index),
            ),
            Statement::TruncateTable { table } => vec![format!("DELETE FROM {};", qn(table))],

            Statement::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD {};",
                qn(table),
                self.column_definition(column, false, false)
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

            Statement::CreateIndex { table, index } => vec![self.create_index(table, index)],
            Statement::DropIndex { index, .. } => vec![format!("DROP INDEX {};", q(&index.name))],

            Statement::CreateView { view, .. } => vec![format!(
                "CREATE VIEW {} AS {};",
                q(&view.name),
                view.definition.as_deref().unwrap_or_default()
            )],
            Statement::DropView { view } => vec![format!("DROP VIEW {};", q(&view.name))],

            _ => unsupported(DIALECT, statement),
        }
    }
}

fn q(ident: &str) -> String {
    DIALECT.quote(ident)
}

fn qn(name: &QualifiedName) -> String {
    q(&name.name)
}

impl SqliteGenerator {
    /// Generate CREATE TABLE statement.
    fn create_table(&self, table: &Table) -> String {
        let inline_pk = table.inline_primary_key();
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                self.column_definition(
                    c,
                    inline_pk == Some(c.name.as_str()),
                    table.inline_unique(&c.name).is_some(),
                )
            })
            .collect();

        if let Some(pk) = &table.primary_key
            && inline_pk.is_none()
        {
            lines.push(format!(
                "CONSTRAINT {} PRIMARY KEY({})",
                q(&pk.name),
                quote_list(DIALECT, &pk.columns, ", ")
            ));
        }
        for unique in &table.uniques {
            if unique.columns.len() == 1 && table.inline_unique(&unique.columns[0]).is_some() {
                continue;
            }
            lines.push(format!(
                "CONSTRAINT {} UNIQUE({})",
                q(&unique.name),
                quote_list(DIALECT, &unique.columns, ", ")
            ));
        }
        for fk in &table.foreign_keys {
            lines.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({}) ON UPDATE {} ON DELETE {}",
                quote_list(DIALECT, &fk.columns, ", "),
                q(&fk.table_to),
                quote_list(DIALECT, &fk.columns_to, ", "),
                fk.on_update.as_sql(),
                fk.on_delete.as_sql()
            ));
        }
        for check in &table.checks {
            lines.push(format!("CONSTRAINT {} CHECK({})", q(&check.name), check.value));
        }

        format!(
            "CREATE TABLE {} (\n\t{}\n);\n",
            q(&table.name),
            lines.join(",\n\t")
        )
    }

    /// Generate column definition.
    fn column_definition(&self, column: &Column, primary_key: bool, unique: bool) -> String {
        let mut sql = format!("{} {}", q(&column.name), column.sql_type);
        if primary_key {
            sql.push_str(" PRIMARY KEY");
            if column.autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
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
        if unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }

    /// Generate CREATE INDEX statement.
    fn create_index(&self, table: &QualifiedName, index: &Index) -> String {
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| {
                let value = if c.is_expression {
                    c.value.clone()
                } else {
                    q(&c.value)
                };
                if c.asc { value } else { format!("{} DESC", value) }
            })
            .collect();
        let predicate = index
            .where_clause
            .as_ref()
            .map(|w| format!(" WHERE {}", w))
            .unwrap_or_default();
        format!(
            "CREATE {}INDEX {} ON {} ({}){};",
            if index.unique { "UNIQUE " } else { "" },
            q(&index.name),
            qn(table),
            columns.join(","),
            predicate
        )
    }
}
