//! Human-readable summaries of risky statements.

use serde::Serialize;
use tidemark_schema::{Dialect, QualifiedName};

use crate::statement::Statement;

/// A statement paired with the SQL it renders to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedStatement {
    /// The abstract statement.
    pub statement: Statement,
    /// Its SQL, in execution order.
    pub sql: Vec<String>,
}

impl GroupedStatement {
    /// Pair a statement with its SQL.
    pub fn new(statement: Statement, sql: Vec<String>) -> Self {
        Self { statement, sql }
    }
}

fn name(dialect: Dialect, table: &QualifiedName) -> String {
    dialect.qualified(&table.schema, &table.name)
}

/// One-line description of a statement worth calling out.
fn title(dialect: Dialect, statement: &Statement) -> Option<String> {
    let title = match statement {
        Statement::RecreateTable { to, .. } => {
            format!("table {} is rebuilt through a copy", name(dialect, &to.key()))
        }
        Statement::RecreateEnum { enum_type, .. } => format!(
            "enum {} is dropped and recreated",
            name(dialect, &enum_type.key())
        ),
        Statement::RecreateColumn { table, from, .. } => format!(
            "column {} of {} is dropped and re-added",
            dialect.quote(&from.name),
            name(dialect, table)
        ),
        Statement::DropTable { table } => {
            format!("table {} is dropped", name(dialect, &table.key()))
        }
        Statement::DropColumn { table, column } => format!(
            "column {} of {} is dropped",
            dialect.quote(&column.name),
            name(dialect, table)
        ),
        Statement::TruncateTable { table } => {
            format!("every row of {} is deleted", name(dialect, table))
        }
        Statement::DropSchema { name: schema } => {
            format!("schema {} is dropped", dialect.quote(schema))
        }
        Statement::DropView { view } if view.materialized => format!(
            "materialized view {} is dropped",
            name(dialect, &view.key())
        ),
        _ => return None,
    };
    Some(title)
}

/// Explain the statements that rebuild, recreate, drop or empty something.
///
/// `apply` selects wording for a push about to run rather than a migration
/// being written. `extra` lines (usually push hints) follow the blocks.
/// Returns `None` when there is nothing to call out.
pub fn explain(
    dialect: Dialect,
    grouped: &[GroupedStatement],
    apply: bool,
    extra: &[String],
) -> Option<String> {
    let blocks: Vec<String> = grouped
        .iter()
        .filter_map(|group| {
            let title = title(dialect, &group.statement)?;
            let mut block = format!("- {}:", title);
            for sql in &group.sql {
                for line in sql.trim_end().lines() {
                    block.push_str("\n    ");
                    block.push_str(line);
                }
            }
            Some(block)
        })
        .collect();

    if blocks.is_empty() && extra.is_empty() {
        return None;
    }

    let mut out = String::new();
    if !blocks.is_empty() {
        out.push_str(if apply {
            "Applying these changes will:\n"
        } else {
            "This migration will:\n"
        });
        out.push_str(&blocks.join("\n"));
        out.push('\n');
    }
    if !extra.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        for line in extra {
            out.push_str("· ");
            out.push_str(line);
            out.push('\n');
        }
    }
    Some(out)
}
