//! SQL dialects understood by the DDL model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A target database dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL.
    #[serde(alias = "postgres")]
    Postgresql,
    /// MySQL / MariaDB.
    Mysql,
    /// SingleStore (MySQL wire compatible, distinct DDL rules).
    Singlestore,
    /// SQLite.
    #[serde(alias = "sqlite3")]
    Sqlite,
}

impl Dialect {
    /// Get the dialect name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Singlestore => "singlestore",
            Self::Sqlite => "sqlite",
        }
    }

    /// The schema an entity lands in when its declaration omits one.
    ///
    /// Only Postgres has namespaces; every other dialect uses the empty schema.
    pub fn default_schema(&self) -> &'static str {
        match self {
            Self::Postgresql => "public",
            _ => "",
        }
    }

    /// Whether the dialect supports named schemas.
    pub fn supports_schemas(&self) -> bool {
        matches!(self, Self::Postgresql)
    }

    /// Whether the dialect supports enums, sequences, roles and policies.
    pub fn supports_pg_objects(&self) -> bool {
        matches!(self, Self::Postgresql)
    }

    /// Whether foreign keys can be declared.
    pub fn supports_foreign_keys(&self) -> bool {
        !matches!(self, Self::Singlestore)
    }

    /// Whether check constraints can be declared.
    pub fn supports_checks(&self) -> bool {
        !matches!(self, Self::Singlestore)
    }

    /// The identifier quote character.
    pub fn quote_char(&self) -> char {
        match self {
            Self::Postgresql => '"',
            _ => '`',
        }
    }

    /// Quote an identifier, doubling any embedded quote characters.
    pub fn quote(&self, ident: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for ch in ident.chars() {
            if ch == q {
                out.push(q);
            }
            out.push(ch);
        }
        out.push(q);
        out
    }

    /// Quote a possibly schema-qualified name.
    ///
    /// The default schema is never printed.
    pub fn qualified(&self, schema: &str, name: &str) -> String {
        if schema.is_empty() || schema == self.default_schema() {
            self.quote(name)
        } else {
            format!("{}.{}", self.quote(schema), self.quote(name))
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_per_dialect() {
        assert_eq!(Dialect::Postgresql.quote("users"), "\"users\"");
        assert_eq!(Dialect::Mysql.quote("users"), "`users`");
        assert_eq!(Dialect::Singlestore.quote("users"), "`users`");
        assert_eq!(Dialect::Sqlite.quote("users"), "`users`");
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(Dialect::Postgresql.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Dialect::Mysql.quote("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_qualified_omits_default_schema() {
        assert_eq!(Dialect::Postgresql.qualified("public", "users"), "\"users\"");
        assert_eq!(
            Dialect::Postgresql.qualified("auth", "users"),
            "\"auth\".\"users\""
        );
        assert_eq!(Dialect::Sqlite.qualified("", "users"), "`users`");
    }

    #[test]
    fn test_dialect_serde_aliases() {
        let d: Dialect = serde_json::from_str("\"postgres\"").unwrap();
        assert_eq!(d, Dialect::Postgresql);
        let d: Dialect = serde_json::from_str("\"singlestore\"").unwrap();
        assert_eq!(d, Dialect::Singlestore);
    }
}
