//! Views and materialized views.

use std::collections::BTreeMap;

use tidemark_schema::ddl::View;
use tidemark_schema::normalize::normalize_expression;
use tidemark_schema::{Dialect, ObjectKey};

use super::{Differ, Phase, move_and_rename};
use crate::error::MigrateResult;
use crate::resolver::EntityKind;
use crate::statement::Statement;

/// Views whose name is `existing` on either side are left alone.
fn managed_keys(views: &[View], existing: &[ObjectKey]) -> Vec<ObjectKey> {
    views
        .iter()
        .map(|v| v.key().to_key())
        .filter(|k| !existing.contains(k))
        .collect()
}

fn definition_changed(from: &View, to: &View) -> bool {
    from.definition.as_deref().map(normalize_expression)
        != to.definition.as_deref().map(normalize_expression)
}

impl Differ<'_> {
    pub(super) fn diff_views(&mut self) -> MigrateResult<()> {
        let after = self.after;
        let existing: Vec<ObjectKey> = self
            .before
            .views
            .iter()
            .chain(after.views.iter())
            .filter(|v| v.existing)
            .map(|v| v.key().to_key())
            .collect();
        let before_keys = managed_keys(&self.before.views, &existing);
        let after_keys = managed_keys(&after.views, &existing);
        let resolution = self.resolve(EntityKind::View, &before_keys, &after_keys)?;

        let find_before = |differ: &Self, key: &ObjectKey| -> Option<View> {
            differ
                .before
                .views
                .iter()
                .find(|v| v.key() == key.qualified())
                .cloned()
        };

        for key in &resolution.deleted {
            if let Some(view) = find_before(self, key) {
                self.emit(Phase::DropViews, Statement::DropView { view });
            }
        }

        for rename in &resolution.renamed {
            let (Some(old), Some(new)) = (
                find_before(self, &rename.from),
                after.views.iter().find(|v| v.key() == rename.to.qualified()),
            ) else {
                continue;
            };
            if self.dialect == Dialect::Sqlite {
                self.emit(Phase::DropViews, Statement::DropView { view: old });
                self.emit(
                    Phase::CreateViews,
                    Statement::CreateView {
                        view: new.clone(),
                        replace: false,
                    },
                );
                continue;
            }

            let (from, to) = (old.key(), new.key());
            let materialized = old.materialized;
            for statement in move_and_rename(
                &from,
                &to,
                |name, from_schema, to_schema| Statement::MoveView {
                    name,
                    from_schema,
                    to_schema,
                    materialized,
                },
                |schema, from, to| Statement::RenameView {
                    schema,
                    from,
                    to,
                    materialized,
                },
            ) {
                self.emit(Phase::DropViews, statement);
            }
            for view in &mut self.before.views {
                if view.key() == from {
                    view.schema = to.schema.clone();
                    view.name = to.name.clone();
                }
            }
        }

        for key in &resolution.created {
            if let Some(view) = after.views.iter().find(|v| v.key() == key.qualified()) {
                self.emit(
                    Phase::CreateViews,
                    Statement::CreateView {
                        view: view.clone(),
                        replace: false,
                    },
                );
            }
        }

        for to in after.views.iter().filter(|v| !v.existing) {
            let Some(from) = self
                .before
                .views
                .iter()
                .find(|v| !v.existing && v.key() == to.key())
                .cloned()
            else {
                continue;
            };
            self.diff_view(from, to);
        }
        Ok(())
    }

    fn diff_view(&mut self, from: View, to: &View) {
        let body_changed = definition_changed(&from, to);
        let recreate = from.materialized != to.materialized
            || (to.materialized
                && (body_changed || from.with_no_data != to.with_no_data || from.using != to.using))
            || (self.dialect == Dialect::Sqlite && body_changed);

        if recreate {
            self.emit(Phase::DropViews, Statement::DropView { view: from });
            self.emit(
                Phase::CreateViews,
                Statement::CreateView {
                    view: to.clone(),
                    replace: false,
                },
            );
            return;
        }

        if body_changed {
            self.emit(
                Phase::CreateViews,
                Statement::CreateView {
                    view: to.clone(),
                    replace: true,
                },
            );
        }

        if self.dialect == Dialect::Postgresql && from.with != to.with {
            let set: BTreeMap<String, String> = to
                .with
                .iter()
                .filter(|(k, v)| from.with.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let reset: Vec<String> = from
                .with
                .keys()
                .filter(|k| !to.with.contains_key(*k))
                .cloned()
                .collect();
            self.emit(
                Phase::CreateViews,
                Statement::AlterViewOptions {
                    view: to.clone(),
                    set,
                    reset,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::diff::SchemaDiffer;
    use crate::resolver::HintResolver;
    use crate::statement::Statement;
    use pretty_assertions::assert_eq;
    use tidemark_schema::Dialect;
    use tidemark_schema::ddl::{DdlSnapshot, View};

    fn snapshot(dialect: Dialect, views: Vec<View>) -> DdlSnapshot {
        let mut snapshot = DdlSnapshot::new(dialect);
        snapshot.views = views;
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
    fn test_ordinary_body_change_replaces() {
        let before = snapshot(Dialect::Postgresql, vec![View::new("public", "v", "select 1")]);
        let after = snapshot(Dialect::Postgresql, vec![View::new("public", "v", "select 2")]);
        let result = SchemaDiffer::new(&before, &after).diff().unwrap();
        assert_eq!(
            result.sql_statements,
            vec![r#"CREATE OR REPLACE VIEW "v" AS (select 2);"#]
        );
    }

    #[test]
    fn test_sqlite_body_change_recreates() {
        let before = snapshot(Dialect::Sqlite, vec![View::new("", "v", "select 1")]);
        let after = snapshot(Dialect::Sqlite, vec![View::new("", "v", "select 2")]);
        assert_eq!(types(&before, &after), vec!["drop_view", "create_view"]);
    }

    #[test]
    fn test_materialized_body_change_recreates() {
        let before = snapshot(
            Dialect::Postgresql,
            vec![View::new("public", "v", "select 1").materialized()],
        );
        let after = snapshot(
            Dialect::Postgresql,
            vec![View::new("public", "v", "select 2").materialized()],
        );
        assert_eq!(types(&before, &after), vec!["drop_view", "create_view"]);
    }

    #[test]
    fn test_whitespace_only_body_change_is_invisible() {
        let before = snapshot(Dialect::Postgresql, vec![View::new("public", "v", "select  1")]);
        let after = snapshot(Dialect::Postgresql, vec![View::new("public", "v", "select 1")]);
        assert!(types(&before, &after).is_empty());
    }

    #[test]
    fn test_with_options_set_and_reset() {
        let before = snapshot(
            Dialect::Postgresql,
            vec![View::new("public", "v", "select 1").with_option("check_option", "local")],
        );
        let after = snapshot(
            Dialect::Postgresql,
            vec![View::new("public", "v", "select 1").with_option("security_barrier", "true")],
        );
        let result = SchemaDiffer::new(&before, &after).diff().unwrap();
        assert_eq!(
            result.sql_statements,
            vec![
                r#"ALTER VIEW "v" SET (security_barrier = true);"#,
                r#"ALTER VIEW "v" RESET (check_option);"#,
            ]
        );
    }

    #[test]
    fn test_existing_views_ignored() {
        let mut existing = View::new("public", "legacy", "select 1");
        existing.existing = true;
        let before = snapshot(Dialect::Postgresql, vec![existing]);
        let after = snapshot(Dialect::Postgresql, vec![]);
        assert!(types(&before, &after).is_empty());
    }

    #[test]
    fn test_view_rename() {
        let before = snapshot(Dialect::Postgresql, vec![View::new("public", "v", "select 1")]);
        let after = snapshot(Dialect::Postgresql, vec![View::new("public", "w", "select 1")]);
        let hints = HintResolver::parse(["public.v->public.w"]).unwrap();
        let result = SchemaDiffer::new(&before, &after)
            .with_resolver(&hints)
            .diff()
            .unwrap();
        assert_eq!(
            result.sql_statements,
            vec![r#"ALTER VIEW "v" RENAME TO "w";"#]
        );
    }
}
