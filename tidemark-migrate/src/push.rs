//! Push-mode data checks.
//!
//! When statements are applied directly to a live database, the caller
//! gathers row and value counts beforehand and hands them over as a
//! [`DataProbe`]. The engine then annotates risky statements with hints and,
//! where a statement cannot succeed against the existing rows, empties the
//! table first.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use smol_str::SmolStr;
use tidemark_schema::QualifiedName;
use tidemark_schema::ddl::Column;
use tracing::debug;

use crate::statement::Statement;

/// Live data counts for the database being pushed to.
///
/// Names are those of the database as it currently exists, before any
/// rename in the diff is applied.
pub trait DataProbe {
    /// Number of rows in a table.
    fn table_rows(&self, table: &QualifiedName) -> u64;

    /// Number of non-null values in a column.
    fn non_null_values(&self, table: &QualifiedName, column: &str) -> u64;

    /// Number of NULLs in a column.
    fn null_values(&self, table: &QualifiedName, column: &str) -> u64 {
        self.table_rows(table)
            .saturating_sub(self.non_null_values(table, column))
    }

    /// Number of rows in a materialized view.
    fn view_rows(&self, view: &QualifiedName) -> u64;
}

#[derive(Debug, Clone, Default)]
struct TableCounts {
    rows: u64,
    non_null: IndexMap<SmolStr, u64>,
}

/// In-memory [`DataProbe`].
///
/// Columns without an explicit count are assumed fully populated.
#[derive(Debug, Clone, Default)]
pub struct TableStats {
    tables: IndexMap<QualifiedName, TableCounts>,
    views: IndexMap<QualifiedName, u64>,
}

impl TableStats {
    /// Empty stats: every table and view is empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a table's row count.
    pub fn with_table(mut self, table: QualifiedName, rows: u64) -> Self {
        self.tables.entry(table).or_default().rows = rows;
        self
    }

    /// Record how many non-null values a column holds.
    pub fn with_column(
        mut self,
        table: QualifiedName,
        column: impl Into<SmolStr>,
        non_null: u64,
    ) -> Self {
        self.tables
            .entry(table)
            .or_default()
            .non_null
            .insert(column.into(), non_null);
        self
    }

    /// Record a materialized view's row count.
    pub fn with_view(mut self, view: QualifiedName, rows: u64) -> Self {
        self.views.insert(view, rows);
        self
    }
}

impl DataProbe for TableStats {
    fn table_rows(&self, table: &QualifiedName) -> u64 {
        self.tables.get(table).map_or(0, |t| t.rows)
    }

    fn non_null_values(&self, table: &QualifiedName, column: &str) -> u64 {
        self.tables
            .get(table)
            .map_or(0, |t| t.non_null.get(column).copied().unwrap_or(t.rows))
    }

    fn view_rows(&self, view: &QualifiedName) -> u64 {
        self.views.get(view).copied().unwrap_or(0)
    }
}

/// Maps post-rename names back to the names the probe knows.
#[derive(Debug, Clone, Default)]
pub(crate) struct LiveNames {
    tables: HashMap<QualifiedName, QualifiedName>,
    columns: HashMap<(QualifiedName, SmolStr), SmolStr>,
}

impl LiveNames {
    pub(crate) fn rename_table(&mut self, before: QualifiedName, after: QualifiedName) {
        self.tables.insert(after, before);
    }

    pub(crate) fn rename_column(&mut self, table: QualifiedName, before: SmolStr, after: SmolStr) {
        self.columns.insert((table, after), before);
    }

    pub(crate) fn original_table(&self, table: &QualifiedName) -> QualifiedName {
        self.tables.get(table).cloned().unwrap_or_else(|| table.clone())
    }

    pub(crate) fn original_column(&self, table: &QualifiedName, column: &str) -> SmolStr {
        self.columns
            .get(&(table.clone(), SmolStr::new(column)))
            .cloned()
            .unwrap_or_else(|| SmolStr::new(column))
    }
}

/// Adding this column to a non-empty table fails without a backfill.
fn needs_backfill(column: &Column) -> bool {
    let serial = column.sql_type.ends_with("serial");
    column.not_null
        && column.default.is_none()
        && column.generated.is_none()
        && column.identity.is_none()
        && !column.autoincrement
        && !serial
}

fn same_type(a: &Column, b: &Column) -> bool {
    a.sql_type == b.sql_type && a.type_schema == b.type_schema && a.dimensions == b.dimensions
}

struct Checker<'a> {
    probe: &'a dyn DataProbe,
    names: &'a LiveNames,
    truncated: HashSet<QualifiedName>,
}

impl Checker<'_> {
    fn rows(&self, table: &QualifiedName) -> u64 {
        if self.truncated.contains(table) {
            return 0;
        }
        self.probe.table_rows(&self.names.original_table(table))
    }

    fn non_null(&self, table: &QualifiedName, column: &str) -> u64 {
        if self.truncated.contains(table) {
            return 0;
        }
        let live = self.names.original_table(table);
        self.probe
            .non_null_values(&live, &self.names.original_column(table, column))
    }

    fn nulls(&self, table: &QualifiedName, column: &str) -> u64 {
        if self.truncated.contains(table) {
            return 0;
        }
        let live = self.names.original_table(table);
        self.probe.null_values(&live, &self.names.original_column(table, column))
    }

    /// Returns the table to truncate before `statement`, if any, and
    /// pushes hints.
    fn check(&mut self, statement: &Statement, hints: &mut Vec<String>) -> Option<QualifiedName> {
        match statement {
            Statement::AddColumn { table, column } if needs_backfill(column) => {
                let rows = self.rows(table);
                if rows > 0 {
                    hints.push(format!(
                        "You're about to add not-null `{}` column without default value to `{}`, which contains {} items",
                        column.name, table, rows
                    ));
                    return Some(table.clone());
                }
            }
            Statement::AlterColumnSetNotNull { table, column } => {
                let nulls = self.nulls(table, column);
                if nulls > 0 {
                    hints.push(format!(
                        "You're about to set not-null constraint on `{}` column of `{}`, which contains {} null values",
                        column, table, nulls
                    ));
                    return Some(table.clone());
                }
            }
            Statement::ModifyColumn { table, from, to } => {
                if !from.not_null && to.not_null {
                    let nulls = self.nulls(table, &to.name);
                    if nulls > 0 {
                        hints.push(format!(
                            "You're about to set not-null constraint on `{}` column of `{}`, which contains {} null values",
                            to.name, table, nulls
                        ));
                        return Some(table.clone());
                    }
                }
                if !same_type(from, to) {
                    let values = self.non_null(table, &to.name);
                    if values > 0 {
                        hints.push(format!(
                            "You're about to change `{}` column type from {} to {} in `{}`, which contains {} values",
                            to.name, from.sql_type, to.sql_type, table, values
                        ));
                    }
                }
            }
            Statement::AlterColumnType { table, from, to } => {
                let values = self.non_null(table, &to.name);
                if values > 0 {
                    hints.push(format!(
                        "You're about to change `{}` column type from {} to {} in `{}`, which contains {} values",
                        to.name, from.sql_type, to.sql_type, table, values
                    ));
                }
            }
            Statement::RecreateTable { from, to } => {
                let table = to.key();
                let rows = self.rows(&table);
                if rows == 0 {
                    return None;
                }
                let lossy = to.columns.iter().any(|column| match from.get_column(&column.name) {
                    Some(old) => {
                        (!same_type(old, column) && self.non_null(&table, &column.name) > 0)
                            || (!old.not_null
                                && column.not_null
                                && self.nulls(&table, &column.name) > 0)
                    }
                    None => needs_backfill(column),
                });
                if lossy {
                    hints.push(format!(
                        "`{}` table will be recreated and its {} rows will be deleted",
                        table, rows
                    ));
                    return Some(table);
                }
            }
            Statement::RecreateColumn { table, from, .. } => {
                let values = self.non_null(table, &from.name);
                if values > 0 {
                    hints.push(format!(
                        "You're about to recreate `{}` column in `{}`, losing its {} values",
                        from.name, table, values
                    ));
                }
            }
            Statement::DropColumn { table, column } => {
                let values = self.non_null(table, &column.name);
                if values > 0 {
                    hints.push(format!(
                        "You're about to delete `{}` column in `{}` table with {} items",
                        column.name, table, values
                    ));
                }
            }
            Statement::DropTable { table } => {
                let rows = self.rows(&table.key());
                if rows > 0 {
                    hints.push(format!(
                        "You're about to delete `{}` table with {} items",
                        table.key(),
                        rows
                    ));
                }
            }
            Statement::DropView { view } if view.materialized => {
                let rows = self.probe.view_rows(&view.key());
                if rows > 0 {
                    hints.push(format!(
                        "You're about to delete non-empty `{}` materialized view with {} items",
                        view.key(),
                        rows
                    ));
                }
            }
            Statement::AddUnique { table, unique } => {
                let rows = self.rows(table);
                if rows > 0 {
                    hints.push(format!(
                        "You're about to add `{}` unique constraint to `{}`, which contains {} items; existing duplicates will make it fail",
                        unique.name, table, rows
                    ));
                }
            }
            _ => {}
        }
        None
    }
}

/// Insert truncations and collect hints for push mode.
pub(crate) fn remediate(
    statements: Vec<Statement>,
    probe: &dyn DataProbe,
    names: &LiveNames,
) -> (Vec<Statement>, Vec<String>) {
    let mut checker = Checker {
        probe,
        names,
        truncated: HashSet::new(),
    };
    let mut hints = Vec::new();
    let mut out = Vec::with_capacity(statements.len());

    for statement in statements {
        if let Some(table) = checker.check(&statement, &mut hints) {
            debug!(table = %table, "truncating before lossy statement");
            checker.truncated.insert(table.clone());
            out.push(Statement::TruncateTable { table });
        }
        out.push(statement);
    }

    (out, hints)
}
