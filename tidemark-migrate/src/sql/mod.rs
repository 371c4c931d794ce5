//! SQL generation for migration statements.
//!
//! Each dialect has a [`SqlGenerator`] that renders one [`Statement`] into
//! zero or more SQL strings. A statement the dialect has no syntax for
//! renders to nothing and logs a warning; the diff engine never emits one
//! for a well-formed snapshot.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::{MySqlGenerator, SingleStoreGenerator};
pub use postgres::PostgresSqlGenerator;
pub use sqlite::SqliteGenerator;

use tidemark_schema::Dialect;
use tidemark_schema::ddl::{Index, Table};
use tracing::warn;

use crate::statement::Statement;

/// Separator placed between statements in a migration file.
pub const BREAKPOINT: &str = "--> statement-breakpoint";

/// Renders statements for one dialect.
pub trait SqlGenerator {
    /// The dialect this generator targets.
    fn dialect(&self) -> Dialect;

    /// SQL for one statement, in execution order.
    fn to_sql(&self, statement: &Statement) -> Vec<String>;

    /// SQL for a list of statements, flattened.
    fn generate(&self, statements: &[Statement]) -> Vec<String> {
        statements.iter().flat_map(|s| self.to_sql(s)).collect()
    }
}

/// The generator for a dialect.
pub fn generator_for(dialect: Dialect) -> Box<dyn SqlGenerator> {
    match dialect {
        Dialect::Postgresql => Box::new(PostgresSqlGenerator),
        Dialect::Mysql => Box::new(MySqlGenerator),
        Dialect::Singlestore => Box::new(SingleStoreGenerator),
        Dialect::Sqlite => Box::new(SqliteGenerator),
    }
}

pub(crate) fn unsupported(dialect: Dialect, statement: &Statement) -> Vec<String> {
    warn!(
        %dialect,
        statement = statement.type_name(),
        "statement has no SQL form in this dialect"
    );
    Vec::new()
}

/// Quote a string literal.
pub(crate) fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn quote_list(dialect: Dialect, names: &[impl AsRef<str>], separator: &str) -> String {
    names
        .iter()
        .map(|n| dialect.quote(n.as_ref()))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Copy a table through a shadow table.
///
/// Only non-generated columns present on both sides are copied.
pub(crate) fn rebuild_table(
    dialect: Dialect,
    from: &Table,
    to: &Table,
    foreign_key_pragmas: bool,
    create_table: impl Fn(&Table) -> String,
    create_index: impl Fn(&Table, &Index) -> String,
) -> Vec<String> {
    let shadow_name = format!("__new_{}", to.name);
    let mut shadow = to.clone();
    shadow.name = shadow_name.as_str().into();

    let copied: Vec<&str> = to
        .columns
        .iter()
        .filter(|c| c.generated.is_none())
        .filter(|c| {
            from.get_column(&c.name)
                .is_some_and(|old| old.generated.is_none())
        })
        .map(|c| c.name.as_str())
        .collect();

    let mut stmts = Vec::new();
    if foreign_key_pragmas {
        stmts.push("PRAGMA foreign_keys=OFF;".to_string());
    }
    stmts.push(create_table(&shadow));
    if !copied.is_empty() {
        let columns = quote_list(dialect, &copied, ", ");
        stmts.push(format!(
            "INSERT INTO {}({}) SELECT {} FROM {};",
            dialect.quote(&shadow_name),
            columns,
            columns,
            dialect.quote(&from.name)
        ));
    }
    stmts.push(format!("DROP TABLE {};", dialect.quote(&from.name)));
    stmts.push(format!(
        "ALTER TABLE {} RENAME TO {};",
        dialect.quote(&shadow_name),
        dialect.quote(&to.name)
    ));
    if foreign_key_pragmas {
        stmts.push("PRAGMA foreign_keys=ON;".to_string());
    }
    for index in &to.indexes {
        stmts.push(create_index(to, index));
    }
    stmts
}
