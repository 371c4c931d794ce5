//! Snapshot filters: restrict a snapshot to the schemas, tables and roles a
//! project manages.
//!
//! Patterns are globs (`*` matches any run, `?` one character). A leading `!`
//! negates a pattern. An entity is kept when it matches at least one positive
//! pattern (or there are none) and no negative pattern.

use regex_lite::Regex;
use smol_str::SmolStr;

use crate::ddl::DdlSnapshot;
use crate::error::{SchemaError, SchemaResult};

#[derive(Debug, Clone)]
struct Pattern {
    regex: Regex,
    negated: bool,
}

impl Pattern {
    fn parse(glob: &str) -> SchemaResult<Self> {
        let (negated, body) = match glob.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, glob),
        };
        let mut source = String::from("^");
        for ch in body.chars() {
            match ch {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                c if c.is_alphanumeric() || c == '_' => source.push(c),
                c => {
                    source.push('\\');
                    source.push(c);
                }
            }
        }
        source.push('$');
        let regex = Regex::new(&source).map_err(|e| SchemaError::ConfigError {
            message: format!("invalid pattern `{}`: {}", glob, e),
        })?;
        Ok(Self { regex, negated })
    }
}

#[derive(Debug, Clone, Default)]
struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    fn parse(globs: &[String]) -> SchemaResult<Self> {
        let patterns = globs
            .iter()
            .map(|g| Pattern::parse(g))
            .collect::<SchemaResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    fn matches(&self, candidates: &[&str]) -> bool {
        let hit = |p: &Pattern| candidates.iter().any(|c| p.regex.is_match(c));
        let mut positives = self.patterns.iter().filter(|p| !p.negated).peekable();
        let included = positives.peek().is_none() || positives.any(|p| hit(p));
        included && !self.patterns.iter().filter(|p| p.negated).any(|p| hit(p))
    }
}

/// Restricts a snapshot to managed entities.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    schemas: PatternSet,
    tables: PatternSet,
    include_roles: Vec<SmolStr>,
    exclude_roles: Vec<SmolStr>,
}

impl SnapshotFilter {
    /// A filter that keeps everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to schemas matching the globs.
    pub fn with_schemas(mut self, globs: &[String]) -> SchemaResult<Self> {
        self.schemas = PatternSet::parse(globs)?;
        Ok(self)
    }

    /// Restrict to tables (and views) matching the globs.
    ///
    /// Globs are matched against both `name` and `schema.name`.
    pub fn with_tables(mut self, globs: &[String]) -> SchemaResult<Self> {
        self.tables = PatternSet::parse(globs)?;
        Ok(self)
    }

    /// Manage only the listed roles; all others are treated as existing.
    pub fn with_included_roles(mut self, roles: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.include_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Treat the listed roles as existing.
    pub fn with_excluded_roles(mut self, roles: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.exclude_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a schema is managed.
    pub fn keeps_schema(&self, schema: &str) -> bool {
        self.schemas.matches(&[schema])
    }

    /// Whether a table or view is managed.
    pub fn keeps_table(&self, schema: &str, name: &str) -> bool {
        let qualified = format!("{}.{}", schema, name);
        self.keeps_schema(schema) && self.tables.matches(&[name, qualified.as_str()])
    }

    /// Whether a role is managed.
    pub fn keeps_role(&self, role: &str) -> bool {
        let included = self.include_roles.is_empty() || self.include_roles.iter().any(|r| r == role);
        included && !self.exclude_roles.iter().any(|r| r == role)
    }

    /// Produce the filtered snapshot.
    pub fn apply(&self, snapshot: &DdlSnapshot) -> DdlSnapshot {
        let mut out = snapshot.clone();
        out.schemas.retain(|s| self.keeps_schema(&s.name));
        out.enums.retain(|e| self.keeps_schema(&e.schema));
        out.sequences.retain(|s| self.keeps_schema(&s.schema));
        out.tables.retain(|t| self.keeps_table(&t.schema, &t.name));
        out.views.retain(|v| self.keeps_table(&v.schema, &v.name));
        for role in &mut out.roles {
            if !self.keeps_role(&role.name) {
                role.existing = true;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Role, Table};
    use crate::dialect::Dialect;

    fn globs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = SnapshotFilter::new();
        assert!(filter.keeps_table("public", "users"));
        assert!(filter.keeps_role("admin"));
    }

    #[test]
    fn test_table_globs_with_negation() {
        let filter = SnapshotFilter::new()
            .with_tables(&globs(&["*", "!_migrations"]))
            .unwrap();
        assert!(filter.keeps_table("public", "users"));
        assert!(!filter.keeps_table("public", "_migrations"));
    }

    #[test]
    fn test_qualified_table_glob() {
        let filter = SnapshotFilter::new()
            .with_tables(&globs(&["auth.*"]))
            .unwrap();
        assert!(filter.keeps_table("auth", "sessions"));
        assert!(!filter.keeps_table("public", "users"));
    }

    #[test]
    fn test_apply_marks_roles_existing() {
        let mut snapshot = DdlSnapshot::new(Dialect::Postgresql);
        snapshot.roles.push(Role::new("postgres"));
        snapshot.roles.push(Role::new("app"));
        snapshot.tables.push(Table::new("public", "users"));
        snapshot.tables.push(Table::new("audit", "events"));

        let filter = SnapshotFilter::new()
            .with_schemas(&globs(&["public"]))
            .unwrap()
            .with_excluded_roles(["postgres"]);
        let filtered = filter.apply(&snapshot);

        assert_eq!(filtered.tables.len(), 1);
        assert!(filtered.roles[0].existing);
        assert!(!filtered.roles[1].existing);
    }
}
