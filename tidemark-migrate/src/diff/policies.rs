//! Row-level security and policies (Postgres).

use tidemark_schema::ObjectKey;
use tidemark_schema::ddl::{Policy, Table};
use tidemark_schema::normalize::normalize_expression;

use super::{Differ, Phase};
use crate::error::MigrateResult;
use crate::resolver::EntityKind;
use crate::statement::Statement;

fn same_expression(a: &Option<String>, b: &Option<String>) -> bool {
    a.as_deref().map(normalize_expression) == b.as_deref().map(normalize_expression)
}

/// `ALTER POLICY` cannot change `AS`/`FOR`, nor remove a clause.
fn needs_recreate(from: &Policy, to: &Policy) -> bool {
    from.policy_type != to.policy_type
        || from.command != to.command
        || (from.using_expr.is_some() && to.using_expr.is_none())
        || (from.check_expr.is_some() && to.check_expr.is_none())
}

fn needs_alter(from: &Policy, to: &Policy) -> bool {
    let mut from_roles = from.effective_roles();
    let mut to_roles = to.effective_roles();
    from_roles.sort_unstable();
    to_roles.sort_unstable();
    from_roles != to_roles
        || !same_expression(&from.using_expr, &to.using_expr)
        || !same_expression(&from.check_expr, &to.check_expr)
}

impl Differ<'_> {
    pub(super) fn diff_policies(&mut self, from: &Table, to: &Table) -> MigrateResult<()> {
        let key = to.key();
        let origin = self.origin_of(&key);
        let policy_key = |policy: &Policy| {
            ObjectKey::scoped(key.schema.clone(), key.name.clone(), policy.name.clone())
        };
        let before_keys: Vec<ObjectKey> = from.policies.iter().map(policy_key).collect();
        let after_keys: Vec<ObjectKey> = to.policies.iter().map(policy_key).collect();
        let resolution = self.resolve(EntityKind::Policy, &before_keys, &after_keys)?;

        let find = |policies: &[Policy], name: &str| -> Option<Policy> {
            policies.iter().find(|p| p.name == name).cloned()
        };

        let mut pairs: Vec<(Policy, Policy, bool)> = Vec::new();
        for rename in &resolution.renamed {
            if let (Some(old), Some(new)) = (
                find(&from.policies, &rename.from.name),
                find(&to.policies, &rename.to.name),
            ) {
                pairs.push((old, new, true));
            }
        }
        for new in &to.policies {
            if let Some(old) = find(&from.policies, &new.name) {
                pairs.push((old, new.clone(), false));
            }
        }

        let mut drops = Vec::new();
        let mut renames = Vec::new();
        let mut changes = Vec::new();
        for (old, new, renamed) in pairs {
            if needs_recreate(&old, &new) {
                // Dropped under its old name, before any table rename.
                drops.push(Statement::DropPolicy {
                    table: origin.clone(),
                    policy: old,
                });
                changes.push(Statement::CreatePolicy {
                    table: key.clone(),
                    policy: new,
                });
                continue;
            }
            if renamed {
                renames.push(Statement::RenamePolicy {
                    table: key.clone(),
                    from: old.name.clone(),
                    to: new.name.clone(),
                });
            }
            if needs_alter(&old, &new) {
                changes.push(Statement::AlterPolicy {
                    table: key.clone(),
                    from: old,
                    to: new,
                });
            }
        }
        for added in &resolution.created {
            if let Some(policy) = find(&to.policies, &added.name) {
                changes.push(Statement::CreatePolicy {
                    table: key.clone(),
                    policy,
                });
            }
        }
        for removed in &resolution.deleted {
            if let Some(policy) = find(&from.policies, &removed.name) {
                drops.push(Statement::DropPolicy {
                    table: origin.clone(),
                    policy,
                });
            }
        }

        for statement in drops {
            self.emit(Phase::DropPolicies, statement);
        }
        let (rls_before, rls_after) = (from.effective_rls(), to.effective_rls());
        if !rls_before && rls_after {
            self.emit(Phase::Policies, Statement::EnableRls { table: key.clone() });
        }
        for statement in renames.into_iter().chain(changes) {
            self.emit(Phase::Policies, statement);
        }
        if rls_before && !rls_after {
            self.emit(Phase::Policies, Statement::DisableRls { table: key });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::diff::SchemaDiffer;
    use crate::resolver::HintResolver;
    use crate::statement::Statement;
    use pretty_assertions::assert_eq;
    use tidemark_schema::ddl::{Column, DdlSnapshot, Policy, PolicyType, Table};
    use tidemark_schema::Dialect;

    fn snapshot(policies: Vec<Policy>, rls: bool) -> DdlSnapshot {
        let mut table = Table::new("public", "users").column(Column::new("id", "integer"));
        table.policies = policies;
        table.rls_enabled = rls;
        let mut snapshot = DdlSnapshot::new(Dialect::Postgresql);
        snapshot.tables.push(table);
        snapshot
    }

    fn types(before: &DdlSnapshot, after: &DdlSnapshot) -> Vec<&'static str> {
        SchemaDiffer::new(before, after)
            .diff()
            .unwrap()
            .statements
            .iter()
            .map(Statement::type_name)
            .collect()
    }

    #[test]
    fn test_first_policy_enables_rls() {
        let before = snapshot(vec![], false);
        let after = snapshot(vec![Policy::new("read")], false);
        assert_eq!(types(&before, &after), vec!["enable_rls", "create_policy"]);
    }

    #[test]
    fn test_last_policy_disables_rls() {
        let before = snapshot(vec![Policy::new("read")], false);
        let after = snapshot(vec![], false);
        assert_eq!(types(&before, &after), vec!["drop_policy", "disable_rls"]);
    }

    #[test]
    fn test_explicit_rls_survives_last_policy() {
        let before = snapshot(vec![Policy::new("read")], true);
        let after = snapshot(vec![], true);
        assert_eq!(types(&before, &after), vec!["drop_policy"]);
    }

    #[test]
    fn test_role_and_using_edits_alter() {
        let before = snapshot(vec![Policy::new("read").with_using("true")], false);
        let after = snapshot(
            vec![
                Policy::new("read")
                    .with_roles(["admin"])
                    .with_using("id = 1"),
            ],
            false,
        );
        assert_eq!(types(&before, &after), vec!["alter_policy"]);
    }

    #[test]
    fn test_as_change_recreates() {
        let before = snapshot(vec![Policy::new("read")], false);
        let after = snapshot(
            vec![Policy::new("read").with_type(PolicyType::Restrictive)],
            false,
        );
        assert_eq!(types(&before, &after), vec!["drop_policy", "create_policy"]);
    }

    #[test]
    fn test_removed_using_recreates() {
        let before = snapshot(vec![Policy::new("read").with_using("true")], false);
        let after = snapshot(vec![Policy::new("read")], false);
        assert_eq!(types(&before, &after), vec!["drop_policy", "create_policy"]);
    }

    #[test]
    fn test_policy_rename() {
        let before = snapshot(vec![Policy::new("read")], false);
        let after = snapshot(vec![Policy::new("read_all")], false);
        let hints = HintResolver::parse(["public.users.read->public.users.read_all"]).unwrap();
        let result = SchemaDiffer::new(&before, &after)
            .with_resolver(&hints)
            .diff()
            .unwrap();
        assert_eq!(
            result.sql_statements,
            vec![r#"ALTER POLICY "read" ON "users" RENAME TO "read_all";"#]
        );
    }
}
