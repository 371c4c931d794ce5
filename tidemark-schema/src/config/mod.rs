//! Configuration file parsing for `tidemark.toml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{SchemaError, SchemaResult};
use crate::filter::SnapshotFilter;

/// Main configuration structure for `tidemark.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TidemarkConfig {
    /// Target dialect.
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,

    /// Diff settings.
    #[serde(default)]
    pub diff: DiffConfig,

    /// Which entities are managed.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Role management.
    #[serde(default)]
    pub roles: RolesConfig,
}

impl Default for TidemarkConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            diff: DiffConfig::default(),
            filter: FilterConfig::default(),
            roles: RolesConfig::default(),
        }
    }
}

impl TidemarkConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content);
        let config: Self =
            toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> SchemaResult<()> {
        for hint in &self.diff.renames {
            let valid = hint
                .split_once("->")
                .is_some_and(|(from, to)| !from.trim().is_empty() && !to.trim().is_empty());
            if !valid {
                return Err(SchemaError::ConfigError {
                    message: format!("rename hint `{}` must look like `old->new`", hint),
                });
            }
        }
        if !self.dialect.supports_schemas() && !self.filter.schemas.is_empty() {
            return Err(SchemaError::ConfigError {
                message: format!("{} has no schemas to filter", self.dialect),
            });
        }
        Ok(())
    }

    /// Build the snapshot filter described by `[filter]` and `[roles]`.
    pub fn snapshot_filter(&self) -> SchemaResult<SnapshotFilter> {
        Ok(SnapshotFilter::new()
            .with_schemas(&self.filter.schemas)?
            .with_tables(&self.filter.tables)?
            .with_included_roles(self.roles.include.iter().map(String::as_str))
            .with_excluded_roles(self.roles.exclude.iter().map(String::as_str)))
    }
}

fn default_dialect() -> Dialect {
    Dialect::Postgresql
}

/// How the diff will be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    /// Statements are written to a migration file.
    #[default]
    Default,
    /// Statements are applied directly against a live database.
    Push,
}

/// `[diff]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiffConfig {
    /// Diff mode.
    #[serde(default)]
    pub mode: DiffMode,

    /// Rename hints, `old->new`.
    #[serde(default)]
    pub renames: Vec<String>,

    /// Separate statements with `--> statement-breakpoint` in migration files.
    #[serde(default = "default_true")]
    pub breakpoints: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            mode: DiffMode::default(),
            renames: Vec::new(),
            breakpoints: true,
        }
    }
}

/// `[filter]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Schema globs.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Table globs.
    #[serde(default)]
    pub tables: Vec<String>,
}

/// `[roles]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RolesConfig {
    /// Roles to manage; empty means all.
    #[serde(default)]
    pub include: Vec<String>,

    /// Roles to leave alone.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Replace `${VAR}` with the environment value, leaving unknown variables as-is.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return result;
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let full_match = &cap[0];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TidemarkConfig::default();
        assert_eq!(config.dialect, Dialect::Postgresql);
        assert_eq!(config.diff.mode, DiffMode::Default);
        assert!(config.diff.renames.is_empty());
        assert!(config.diff.breakpoints);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            dialect = "sqlite"

            [diff]
            mode = "push"
            renames = ["users->accounts"]
            breakpoints = false

            [filter]
            tables = ["*", "!_migrations"]
        "#;

        let config = TidemarkConfig::from_str(toml).unwrap();
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert_eq!(config.diff.mode, DiffMode::Push);
        assert_eq!(config.diff.renames, vec!["users->accounts".to_string()]);
        assert!(!config.diff.breakpoints);

        let filter = config.snapshot_filter().unwrap();
        assert!(filter.keeps_table("", "users"));
        assert!(!filter.keeps_table("", "_migrations"));
    }

    #[test]
    fn test_breakpoints_default_on() {
        let config = TidemarkConfig::from_str("[diff]\nmode = \"default\"\n").unwrap();
        assert!(config.diff.breakpoints);

        let config = TidemarkConfig::from_str("dialect = \"mysql\"\n").unwrap();
        assert!(config.diff.breakpoints);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = TidemarkConfig::from_str("colour = \"blue\"");
        assert!(matches!(result, Err(SchemaError::TomlError { .. })));
    }

    #[test]
    fn test_invalid_rename_hint() {
        let toml = r#"
            [diff]
            renames = ["users"]
        "#;
        let result = TidemarkConfig::from_str(toml);
        assert!(matches!(result, Err(SchemaError::ConfigError { .. })));
    }

    #[test]
    fn test_schema_filter_rejected_for_mysql() {
        let toml = r#"
            dialect = "mysql"
            [filter]
            schemas = ["public"]
        "#;
        assert!(TidemarkConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: This test runs single-threaded and we clean up after
        unsafe {
            std::env::set_var("TIDEMARK_TEST_DIALECT", "mysql");
        }
        let expanded = expand_env_vars("dialect = \"${TIDEMARK_TEST_DIALECT}\"");
        assert_eq!(expanded, "dialect = \"mysql\"");
        unsafe {
            std::env::remove_var("TIDEMARK_TEST_DIALECT");
        }
    }
}
