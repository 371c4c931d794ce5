//! Row-level security policies and database roles.
//!
//! Policies are evaluated for each row a statement touches and decide whether
//! it is visible (`USING`) or may be written (`WITH CHECK`). Only Postgres
//! models them; roles live alongside because policies target roles by name.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A row-level security policy attached to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy name (unique per table).
    pub name: SmolStr,
    /// PERMISSIVE (default) or RESTRICTIVE.
    #[serde(rename = "as")]
    pub policy_type: PolicyType,
    /// The command the policy applies to.
    #[serde(rename = "for")]
    pub command: PolicyCommand,
    /// Target roles, sorted; empty means `public`.
    pub roles: Vec<SmolStr>,
    /// `USING` expression, evaluated for existing rows.
    pub using_expr: Option<String>,
    /// `WITH CHECK` expression, evaluated for new rows.
    pub check_expr: Option<String>,
}

impl Policy {
    /// Create a new permissive policy for all commands.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            policy_type: PolicyType::Permissive,
            command: PolicyCommand::All,
            roles: vec![],
            using_expr: None,
            check_expr: None,
        }
    }

    /// Set the policy type.
    pub fn with_type(mut self, policy_type: PolicyType) -> Self {
        self.policy_type = policy_type;
        self
    }

    /// Set the command.
    pub fn with_command(mut self, command: PolicyCommand) -> Self {
        self.command = command;
        self
    }

    /// Set the target roles.
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self.roles.sort();
        self
    }

    /// Set the USING expression.
    pub fn with_using(mut self, expr: impl Into<String>) -> Self {
        self.using_expr = Some(expr.into());
        self
    }

    /// Set the WITH CHECK expression.
    pub fn with_check(mut self, expr: impl Into<String>) -> Self {
        self.check_expr = Some(expr.into());
        self
    }

    /// Check if this policy is restrictive.
    pub fn is_restrictive(&self) -> bool {
        self.policy_type == PolicyType::Restrictive
    }

    /// Get the effective roles (`public` if none specified).
    pub fn effective_roles(&self) -> Vec<&str> {
        if self.roles.is_empty() {
            vec!["public"]
        } else {
            self.roles.iter().map(|r| r.as_str()).collect()
        }
    }
}

/// Whether a policy widens (permissive) or narrows (restrictive) access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyType {
    /// Policies are OR-ed together.
    #[default]
    Permissive,
    /// Policies are AND-ed with permissive ones.
    Restrictive,
}

impl PolicyType {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Permissive => "PERMISSIVE",
            Self::Restrictive => "RESTRICTIVE",
        }
    }
}

/// The command a policy governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyCommand {
    /// Every command.
    #[default]
    All,
    /// SELECT.
    Select,
    /// INSERT.
    Insert,
    /// UPDATE.
    Update,
    /// DELETE.
    Delete,
}

impl PolicyCommand {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for PolicyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A database role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name.
    pub name: SmolStr,
    /// `CREATEDB`.
    pub create_db: bool,
    /// `CREATEROLE`.
    pub create_role: bool,
    /// `INHERIT` (Postgres default is true).
    pub inherit: bool,
    /// Managed outside tidemark; never created, altered or dropped.
    pub existing: bool,
}

impl Role {
    /// Create a new role with Postgres defaults.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            create_db: false,
            create_role: false,
            inherit: true,
            existing: false,
        }
    }

    /// Set `CREATEDB`.
    pub fn with_create_db(mut self, create_db: bool) -> Self {
        self.create_db = create_db;
        self
    }

    /// Set `CREATEROLE`.
    pub fn with_create_role(mut self, create_role: bool) -> Self {
        self.create_role = create_role;
        self
    }

    /// Set `INHERIT`.
    pub fn with_inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    /// Mark the role as managed elsewhere.
    pub fn existing(mut self) -> Self {
        self.existing = true;
        self
    }

    /// Whether any flag differs from the role defaults.
    pub fn has_non_default_flags(&self) -> bool {
        self.create_db || self.create_role || !self.inherit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = Policy::new("read_own");
        assert_eq!(policy.policy_type, PolicyType::Permissive);
        assert_eq!(policy.command, PolicyCommand::All);
        assert_eq!(policy.effective_roles(), vec!["public"]);
        assert!(!policy.is_restrictive());
    }

    #[test]
    fn test_policy_roles_sorted() {
        let policy = Policy::new("p").with_roles(["manager", "admin"]);
        assert_eq!(policy.roles, vec![SmolStr::new("admin"), SmolStr::new("manager")]);
    }

    #[test]
    fn test_policy_serde_field_names() {
        let policy = Policy::new("p").with_type(PolicyType::Restrictive);
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["as"], "restrictive");
        assert_eq!(json["for"], "all");
    }

    #[test]
    fn test_role_flags() {
        assert!(!Role::new("reader").has_non_default_flags());
        assert!(Role::new("admin").with_create_db(true).has_non_default_flags());
        assert!(Role::new("solo").with_inherit(false).has_non_default_flags());
    }
}
