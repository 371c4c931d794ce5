//! Tables, columns, constraints and indexes.

use smol_str::SmolStr;
use tidemark_schema::ddl::{Column, GeneratedMode, Index, Table};
use tidemark_schema::normalize::{normalize_expression, normalize_type};
use tidemark_schema::{Dialect, ObjectKey, QualifiedName};
use tracing::debug;

use super::{Differ, Phase, move_and_rename};
use crate::error::MigrateResult;
use crate::resolver::EntityKind;
use crate::statement::{SequenceOption, Statement};

/// How a column's generation expression changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeneratedChange {
    Unchanged,
    Added,
    Removed,
    Redefined { expression_only: bool },
}

fn generated_change(from: &Column, to: &Column) -> GeneratedChange {
    match (&from.generated, &to.generated) {
        (None, None) => GeneratedChange::Unchanged,
        (None, Some(_)) => GeneratedChange::Added,
        (Some(_), None) => GeneratedChange::Removed,
        (Some(a), Some(b)) => {
            let same_expression =
                normalize_expression(&a.expression) == normalize_expression(&b.expression);
            if same_expression && a.mode == b.mode {
                GeneratedChange::Unchanged
            } else {
                GeneratedChange::Redefined {
                    expression_only: a.mode == b.mode,
                }
            }
        }
    }
}

/// Which attributes of a surviving column differ.
#[derive(Debug, Clone, Copy)]
struct ColumnDelta {
    type_changed: bool,
    default_changed: bool,
    not_null_changed: bool,
    generated: GeneratedChange,
    autoincrement_changed: bool,
    on_update_changed: bool,
}

impl ColumnDelta {
    fn new(from: &Column, to: &Column, dialect: Dialect, push: bool) -> Self {
        let mut generated = generated_change(from, to);
        // Push mode never rewrites a column over its expression alone.
        if push && generated == (GeneratedChange::Redefined { expression_only: true }) {
            generated = GeneratedChange::Unchanged;
        }
        let default = |c: &Column| c.default.as_deref().map(normalize_expression);
        Self {
            type_changed: normalize_type(&from.sql_type, dialect)
                != normalize_type(&to.sql_type, dialect)
                || from.type_schema != to.type_schema
                || from.dimensions != to.dimensions,
            default_changed: default(from) != default(to),
            not_null_changed: from.not_null != to.not_null,
            generated,
            autoincrement_changed: from.autoincrement != to.autoincrement,
            on_update_changed: from.on_update_now != to.on_update_now,
        }
    }

    fn any(&self) -> bool {
        self.type_changed
            || self.default_changed
            || self.not_null_changed
            || self.generated != GeneratedChange::Unchanged
            || self.autoincrement_changed
            || self.on_update_changed
    }
}

/// Whether SQLite can `ADD COLUMN` in place.
fn sqlite_can_add(table: &Table, column: &Column) -> bool {
    let required = column.not_null && column.default.is_none() && column.generated.is_none();
    let stored = column
        .generated
        .as_ref()
        .is_some_and(|g| g.mode == GeneratedMode::Stored);
    let keyed = table
        .primary_key
        .as_ref()
        .is_some_and(|pk| pk.columns.contains(&column.name))
        || table.uniques.iter().any(|u| u.columns.contains(&column.name));
    !(required || stored || keyed)
}

fn references(table: &Table, other: &Table) -> bool {
    let target = other.key();
    table.foreign_keys.iter().any(|fk| fk.target() == target)
}

/// Order tables so that each comes after every table it depends on.
///
/// Ties keep input order; members of a cycle are appended as found.
fn dependency_order<'t>(
    tables: &[&'t Table],
    depends_on: impl Fn(&Table, &Table) -> bool,
) -> Vec<&'t Table> {
    let mut placed = vec![false; tables.len()];
    let mut ordered = Vec::with_capacity(tables.len());
    loop {
        let mut progressed = false;
        for i in 0..tables.len() {
            if placed[i] {
                continue;
            }
            let ready = (0..tables.len())
                .all(|j| j == i || placed[j] || !depends_on(tables[i], tables[j]));
            if ready {
                placed[i] = true;
                ordered.push(tables[i]);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    for (i, table) in tables.iter().enumerate() {
        if !placed[i] {
            debug!(table = %table.key(), "circular foreign keys");
            ordered.push(*table);
        }
    }
    ordered
}

/// Statements collected for one surviving table before it is known whether
/// the table has to be rebuilt.
#[derive(Debug, Default)]
struct TableChanges {
    /// Constraint and index drops, emitted with the column renames.
    early_drops: Vec<Statement>,
    drop_foreign_keys: Vec<Statement>,
    adds: Vec<Statement>,
    alters: Vec<Statement>,
    drops: Vec<Statement>,
    constraints: Vec<Statement>,
    create_foreign_keys: Vec<Statement>,
    rebuild: bool,
}

impl TableChanges {
    fn touches_constraints(&self) -> bool {
        !self.early_drops.is_empty()
            || !self.constraints.is_empty()
            || !self.drop_foreign_keys.is_empty()
            || !self.create_foreign_keys.is_empty()
    }
}

impl Differ<'_> {
    pub(super) fn diff_tables(&mut self) -> MigrateResult<()> {
        let after = self.after;
        let before_keys: Vec<ObjectKey> = self
            .before
            .tables
            .iter()
            .map(|t| t.key().to_key())
            .collect();
        let after_keys: Vec<ObjectKey> = after.tables.iter().map(|t| t.key().to_key()).collect();

        let resolution = self.resolve(EntityKind::Table, &before_keys, &after_keys)?;
        for rename in &resolution.renamed {
            let (from, to) = (rename.from.qualified(), rename.to.qualified());
            for statement in move_and_rename(
                &from,
                &to,
                |name, from_schema, to_schema| Statement::MoveTable {
                    name,
                    from_schema,
                    to_schema,
                },
                |schema, from, to| Statement::RenameTable { schema, from, to },
            ) {
                self.emit(Phase::RenameTables, statement);
            }
            self.rename_table(&from, &to);
        }

        let created: Vec<&Table> = resolution
            .created
            .iter()
            .filter_map(|key| after.table(&key.qualified()))
            .collect();
        for table in dependency_order(&created, references) {
            self.create_table(table);
        }

        let deleted: Vec<Table> = resolution
            .deleted
            .iter()
            .filter_map(|key| self.before.table(&key.qualified()).cloned())
            .collect();
        let deleted_refs: Vec<&Table> = deleted.iter().collect();
        for table in dependency_order(&deleted_refs, |a, b| references(b, a)) {
            self.drop_table(table);
        }

        let surviving: Vec<QualifiedName> = after
            .tables
            .iter()
            .map(Table::key)
            .filter(|key| self.before.table(key).is_some())
            .collect();
        for key in &surviving {
            self.resolve_columns(key)?;
        }

        let created_keys: Vec<QualifiedName> = created.iter().map(|t| t.key()).collect();
        self.emit_enum_recreates(&created_keys);

        for key in &surviving {
            let (Some(from), Some(to)) = (self.before.table(key).cloned(), after.table(key)) else {
                continue;
            };
            self.diff_table(&from, to)?;
        }

        debug!(
            renamed = resolution.renamed.len(),
            created = created.len(),
            deleted = deleted.len(),
            surviving = surviving.len(),
            "tables diffed"
        );
        Ok(())
    }

    fn create_table(&mut self, table: &Table) {
        let key = table.key();
        self.emit(
            Phase::CreateTables,
            Statement::CreateTable {
                table: table.clone(),
            },
        );
        // SQLite declares foreign keys inline.
        if matches!(self.dialect, Dialect::Postgresql | Dialect::Mysql) {
            for foreign_key in &table.foreign_keys {
                self.emit(
                    Phase::CreateForeignKeys,
                    Statement::CreateForeignKey {
                        table: key.clone(),
                        foreign_key: foreign_key.clone(),
                    },
                );
            }
        }
        for index in &table.indexes {
            self.emit(
                Phase::AddConstraints,
                Statement::CreateIndex {
                    table: key.clone(),
                    index: index.clone(),
                },
            );
        }
        if self.dialect.supports_pg_objects() {
            if table.effective_rls() {
                self.emit(Phase::Policies, Statement::EnableRls { table: key.clone() });
            }
            for policy in &table.policies {
                self.emit(
                    Phase::Policies,
                    Statement::CreatePolicy {
                        table: key.clone(),
                        policy: policy.clone(),
                    },
                );
            }
        }
    }

    fn drop_table(&mut self, table: &Table) {
        let key = table.key();
        // Postgres and SQLite index names are unique per schema, so a reused
        // name has to be freed before the new index is created.
        if matches!(self.dialect, Dialect::Postgresql | Dialect::Sqlite) {
            for index in &table.indexes {
                if self.index_name_reused(&table.schema, &index.name) {
                    self.emit(
                        Phase::DropIndexes,
                        Statement::DropIndex {
                            table: key.clone(),
                            index: index.clone(),
                        },
                    );
                }
            }
        }
        for policy in &table.policies {
            self.emit(
                Phase::DropPolicies,
                Statement::DropPolicy {
                    table: key.clone(),
                    policy: policy.clone(),
                },
            );
        }
        self.emit(
            Phase::DropTables,
            Statement::DropTable {
                table: table.clone(),
            },
        );
    }

    fn index_name_reused(&self, schema: &str, name: &str) -> bool {
        self.after
            .tables
            .iter()
            .filter(|t| t.schema == schema)
            .any(|t| {
                t.indexes.iter().any(|i| i.name == name)
                    || t.uniques.iter().any(|u| u.name == name)
            })
    }

    fn resolve_columns(&mut self, key: &QualifiedName) -> MigrateResult<()> {
        let after = self.after;
        let (Some(from), Some(to)) = (self.before.table(key), after.table(key)) else {
            return Ok(());
        };
        let column_key =
            |name: &SmolStr| ObjectKey::scoped(key.schema.clone(), key.name.clone(), name.clone());
        let before_keys: Vec<ObjectKey> = from.columns.iter().map(|c| column_key(&c.name)).collect();
        let after_keys: Vec<ObjectKey> = to.columns.iter().map(|c| column_key(&c.name)).collect();

        let resolution = self.resolve(EntityKind::Column, &before_keys, &after_keys)?;
        for rename in &resolution.renamed {
            self.emit(
                Phase::ColumnRenames,
                Statement::RenameColumn {
                    table: key.clone(),
                    from: rename.from.name.clone(),
                    to: rename.to.name.clone(),
                },
            );
            self.rename_column(key, &rename.from.name, &rename.to.name);
        }
        Ok(())
    }

    /// Compare a surviving table. `from` already carries every rename.
    fn diff_table(&mut self, from: &Table, to: &Table) -> MigrateResult<()> {
        let key = to.key();
        let dialect = self.dialect;
        let mut changes = TableChanges::default();

        for column in &to.columns {
            match from.get_column(&column.name) {
                Some(old) => {
                    if self.diff_column(&key, old, column, &mut changes.alters) {
                        changes.rebuild = true;
                    }
                }
                None => {
                    if dialect == Dialect::Sqlite && !sqlite_can_add(to, column) {
                        changes.rebuild = true;
                    }
                    changes.adds.push(Statement::AddColumn {
                        table: key.clone(),
                        column: column.clone(),
                    });
                }
            }
        }
        for column in &from.columns {
            if to.get_column(&column.name).is_none() {
                if dialect == Dialect::Sqlite && from.is_column_constrained(&column.name) {
                    changes.rebuild = true;
                }
                changes.drops.push(Statement::DropColumn {
                    table: key.clone(),
                    column: column.clone(),
                });
            }
        }

        self.diff_constraints(&key, from, to, &mut changes);
        if matches!(dialect, Dialect::Sqlite | Dialect::Singlestore) && changes.touches_constraints()
        {
            changes.rebuild = true;
        }

        if !changes.rebuild {
            self.diff_indexes(&key, from, to, &mut changes)?;
        }

        if changes.rebuild {
            debug!(table = %key, "table rebuild");
            self.emit(
                Phase::Columns,
                Statement::RecreateTable {
                    from: from.clone(),
                    to: to.clone(),
                },
            );
        } else {
            let TableChanges {
                early_drops,
                drop_foreign_keys,
                adds,
                alters,
                drops,
                constraints,
                create_foreign_keys,
                ..
            } = changes;
            for statement in early_drops {
                self.emit(Phase::ColumnRenames, statement);
            }
            for statement in drop_foreign_keys {
                self.emit(Phase::DropForeignKeys, statement);
            }
            for statement in adds.into_iter().chain(alters).chain(drops) {
                self.emit(Phase::Columns, statement);
            }
            for statement in constraints {
                self.emit(Phase::AddConstraints, statement);
            }
            for statement in create_foreign_keys {
                self.emit(Phase::CreateForeignKeys, statement);
            }
        }

        if dialect.supports_pg_objects() {
            self.diff_policies(from, to)?;
        }
        Ok(())
    }

    /// Returns true when the change needs a table rebuild.
    fn diff_column(
        &self,
        table: &QualifiedName,
        from: &Column,
        to: &Column,
        out: &mut Vec<Statement>,
    ) -> bool {
        let delta = ColumnDelta::new(from, to, self.dialect, self.is_push());
        match self.dialect {
            Dialect::Postgresql => {
                pg_column_changes(table, from, to, &delta, out);
                false
            }
            Dialect::Mysql => {
                mysql_column_changes(table, from, to, &delta, out);
                false
            }
            Dialect::Singlestore => {
                if delta.type_changed
                    || delta.not_null_changed
                    || delta.generated != GeneratedChange::Unchanged
                    || delta.autoincrement_changed
                {
                    return true;
                }
                if delta.default_changed || delta.on_update_changed {
                    out.push(Statement::ModifyColumn {
                        table: table.clone(),
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
                false
            }
            Dialect::Sqlite => delta.any(),
        }
    }

    fn diff_constraints(
        &self,
        key: &QualifiedName,
        from: &Table,
        to: &Table,
        changes: &mut TableChanges,
    ) {
        let pk_changed = match (&from.primary_key, &to.primary_key) {
            (None, None) => false,
            (Some(a), Some(b)) if self.dialect == Dialect::Postgresql => !a.is_equivalent(b),
            (Some(a), Some(b)) => a.columns != b.columns,
            _ => true,
        };
        if pk_changed {
            if let Some(primary_key) = &from.primary_key {
                changes.early_drops.push(Statement::DropPrimaryKey {
                    table: key.clone(),
                    primary_key: primary_key.clone(),
                });
            }
            if let Some(primary_key) = &to.primary_key {
                changes.constraints.push(Statement::AddPrimaryKey {
                    table: key.clone(),
                    primary_key: primary_key.clone(),
                });
            }
        }

        for unique in &to.uniques {
            match from.uniques.iter().find(|u| u.name == unique.name) {
                Some(old)
                    if old.columns == unique.columns
                        && old.nulls_not_distinct == unique.nulls_not_distinct => {}
                Some(old) => {
                    changes.early_drops.push(Statement::DropUnique {
                        table: key.clone(),
                        unique: old.clone(),
                    });
                    changes.constraints.push(Statement::AddUnique {
                        table: key.clone(),
                        unique: unique.clone(),
                    });
                }
                None => changes.constraints.push(Statement::AddUnique {
                    table: key.clone(),
                    unique: unique.clone(),
                }),
            }
        }
        for old in &from.uniques {
            if !to.uniques.iter().any(|u| u.name == old.name) {
                changes.early_drops.push(Statement::DropUnique {
                    table: key.clone(),
                    unique: old.clone(),
                });
            }
        }

        for check in &to.checks {
            match from.checks.iter().find(|c| c.name == check.name) {
                // Push mode keeps a check whose body changed.
                Some(old)
                    if self.is_push()
                        || normalize_expression(&old.value) == normalize_expression(&check.value) => {}
                Some(old) => {
                    changes.early_drops.push(Statement::DropCheck {
                        table: key.clone(),
                        check: old.clone(),
                    });
                    changes.constraints.push(Statement::AddCheck {
                        table: key.clone(),
                        check: check.clone(),
                    });
                }
                None => changes.constraints.push(Statement::AddCheck {
                    table: key.clone(),
                    check: check.clone(),
                }),
            }
        }
        for old in &from.checks {
            if !to.checks.iter().any(|c| c.name == old.name) {
                changes.early_drops.push(Statement::DropCheck {
                    table: key.clone(),
                    check: old.clone(),
                });
            }
        }

        // Foreign keys are dropped before the table is renamed.
        let origin = self.origin_of(key);
        for foreign_key in &to.foreign_keys {
            match from.foreign_keys.iter().find(|f| f.name == foreign_key.name) {
                Some(old) if old == foreign_key => {}
                Some(old) => {
                    changes.drop_foreign_keys.push(Statement::DropForeignKey {
                        table: origin.clone(),
                        foreign_key: old.clone(),
                    });
                    changes.create_foreign_keys.push(Statement::CreateForeignKey {
                        table: key.clone(),
                        foreign_key: foreign_key.clone(),
                    });
                }
                None => changes.create_foreign_keys.push(Statement::CreateForeignKey {
                    table: key.clone(),
                    foreign_key: foreign_key.clone(),
                }),
            }
        }
        for old in &from.foreign_keys {
            if !to.foreign_keys.iter().any(|f| f.name == old.name) {
                changes.drop_foreign_keys.push(Statement::DropForeignKey {
                    table: origin.clone(),
                    foreign_key: old.clone(),
                });
            }
        }
    }

    fn diff_indexes(
        &self,
        key: &QualifiedName,
        from: &Table,
        to: &Table,
        changes: &mut TableChanges,
    ) -> MigrateResult<()> {
        let index_key =
            |name: &SmolStr| ObjectKey::scoped(key.schema.clone(), key.name.clone(), name.clone());
        let before_keys: Vec<ObjectKey> = from.indexes.iter().map(|i| index_key(&i.name)).collect();
        let after_keys: Vec<ObjectKey> = to.indexes.iter().map(|i| index_key(&i.name)).collect();
        let resolution = self.resolve(EntityKind::Index, &before_keys, &after_keys)?;

        let drop_index = |index: &Index| Statement::DropIndex {
            table: key.clone(),
            index: index.clone(),
        };
        let create_index = |index: &Index| Statement::CreateIndex {
            table: key.clone(),
            index: index.clone(),
        };

        for rename in &resolution.renamed {
            let (Some(old), Some(new)) = (
                from.get_index(&rename.from.name),
                to.get_index(&rename.to.name),
            ) else {
                continue;
            };
            if old.is_equivalent(new) && self.dialect != Dialect::Sqlite {
                changes.early_drops.push(Statement::RenameIndex {
                    table: key.clone(),
                    from: old.name.clone(),
                    to: new.name.clone(),
                });
            } else {
                changes.early_drops.push(drop_index(old));
                changes.constraints.push(create_index(new));
            }
        }

        for new in &to.indexes {
            if let Some(old) = from.get_index(&new.name)
                && !old.is_equivalent(new)
            {
                changes.early_drops.push(drop_index(old));
                changes.constraints.push(create_index(new));
            }
        }
        for added in &resolution.created {
            if let Some(index) = to.get_index(&added.name) {
                changes.constraints.push(create_index(index));
            }
        }
        for removed in &resolution.deleted {
            if let Some(index) = from.get_index(&removed.name) {
                changes.early_drops.push(drop_index(index));
            }
        }
        Ok(())
    }
}

fn pg_column_changes(
    table: &QualifiedName,
    from: &Column,
    to: &Column,
    delta: &ColumnDelta,
    out: &mut Vec<Statement>,
) {
    let column = || to.name.clone();
    match delta.generated {
        GeneratedChange::Added | GeneratedChange::Redefined { .. } => {
            out.push(Statement::RecreateColumn {
                table: table.clone(),
                from: from.clone(),
                to: to.clone(),
            });
            return;
        }
        GeneratedChange::Removed => out.push(Statement::AlterColumnDropGenerated {
            table: table.clone(),
            column: column(),
        }),
        GeneratedChange::Unchanged => {}
    }

    if delta.type_changed {
        if from.default.is_some() {
            out.push(Statement::AlterColumnDropDefault {
                table: table.clone(),
                column: column(),
            });
        }
        out.push(Statement::AlterColumnType {
            table: table.clone(),
            from: from.clone(),
            to: to.clone(),
        });
        if let Some(default) = &to.default {
            out.push(Statement::AlterColumnSetDefault {
                table: table.clone(),
                column: column(),
                default: default.clone(),
            });
        }
    } else if delta.default_changed {
        out.push(match &to.default {
            Some(default) => Statement::AlterColumnSetDefault {
                table: table.clone(),
                column: column(),
                default: default.clone(),
            },
            None => Statement::AlterColumnDropDefault {
                table: table.clone(),
                column: column(),
            },
        });
    }

    if delta.not_null_changed {
        out.push(if to.not_null {
            Statement::AlterColumnSetNotNull {
                table: table.clone(),
                column: column(),
            }
        } else {
            Statement::AlterColumnDropNotNull {
                table: table.clone(),
                column: column(),
            }
        });
    }

    match (&from.identity, &to.identity) {
        (None, Some(identity)) => out.push(Statement::AlterColumnAddIdentity {
            table: table.clone(),
            column: column(),
            identity: identity.clone(),
        }),
        (Some(_), None) => out.push(Statement::AlterColumnDropIdentity {
            table: table.clone(),
            column: column(),
        }),
        (Some(old), Some(new)) => {
            if old.kind != new.kind {
                out.push(Statement::AlterColumnSetIdentityKind {
                    table: table.clone(),
                    column: column(),
                    kind: new.kind,
                });
            }
            for option in SequenceOption::changed(&old.options, &new.options) {
                out.push(Statement::AlterColumnSetIdentityOption {
                    table: table.clone(),
                    column: column(),
                    option,
                });
            }
        }
        (None, None) => {}
    }
}

fn mysql_column_changes(
    table: &QualifiedName,
    from: &Column,
    to: &Column,
    delta: &ColumnDelta,
    out: &mut Vec<Statement>,
) {
    let is_virtual = |c: &Column| {
        c.generated
            .as_ref()
            .is_some_and(|g| g.mode == GeneratedMode::Virtual)
    };
    let recreate = match delta.generated {
        GeneratedChange::Added => is_virtual(to),
        GeneratedChange::Removed => is_virtual(from),
        GeneratedChange::Redefined { .. } => true,
        GeneratedChange::Unchanged => false,
    };
    if recreate {
        out.push(Statement::RecreateColumn {
            table: table.clone(),
            from: from.clone(),
            to: to.clone(),
        });
    } else if delta.any() {
        out.push(Statement::ModifyColumn {
            table: table.clone(),
            from: from.clone(),
            to: to.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffOptions, SchemaDiffer};
    use crate::resolver::HintResolver;
    use pretty_assertions::assert_eq;
    use tidemark_schema::DdlSnapshot;
    use tidemark_schema::ddl::{
        ForeignKey, GeneratedColumn, IdentityColumn, IdentityKind, IndexColumn, Policy,
        PrimaryKey, ReferentialAction, SequenceOptions, UniqueConstraint,
    };

    fn snapshot(dialect: Dialect, tables: Vec<Table>) -> DdlSnapshot {
        let mut snapshot = DdlSnapshot::new(dialect);
        snapshot.tables = tables;
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

    fn fk(name: &str, column: &str, target: &str) -> ForeignKey {
        ForeignKey {
            name: name.into(),
            name_explicit: false,
            columns: vec![column.into()],
            schema_to: "public".into(),
            table_to: target.into(),
            columns_to: vec!["id".into()],
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::Cascade,
        }
    }

    fn users() -> Table {
        Table::new("public", "users")
            .column(Column::new("id", "integer").not_null())
            .column(Column::new("name", "text"))
    }

    // ==================== Ordering Tests ====================

    #[test]
    fn test_created_tables_follow_their_references() {
        let mut posts = Table::new("public", "posts")
            .column(Column::new("id", "integer"))
            .column(Column::new("user_id", "integer"));
        posts.foreign_keys.push(fk("posts_user_fk", "user_id", "users"));

        let before = snapshot(Dialect::Postgresql, vec![]);
        let after = snapshot(Dialect::Postgresql, vec![posts, users()]);
        let result = SchemaDiffer::new(&before, &after).diff().unwrap();
        let created: Vec<String> = result
            .statements
            .iter()
            .filter_map(|s| match s {
                Statement::CreateTable { table } => Some(table.name.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec!["users", "posts"]);
        assert_eq!(
            result.statements.last().map(Statement::type_name),
            Some("create_foreign_key")
        );
    }

    #[test]
    fn test_dropped_tables_referencing_first() {
        let mut posts = Table::new("public", "posts")
            .column(Column::new("id", "integer"))
            .column(Column::new("user_id", "integer"));
        posts.foreign_keys.push(fk("posts_user_fk", "user_id", "users"));

        let before = snapshot(Dialect::Postgresql, vec![users(), posts]);
        let after = snapshot(Dialect::Postgresql, vec![]);
        let result = SchemaDiffer::new(&before, &after).diff().unwrap();
        let dropped: Vec<String> = result
            .statements
            .iter()
            .filter_map(|s| match s {
                Statement::DropTable { table } => Some(table.name.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(dropped, vec!["posts", "users"]);
    }

    #[test]
    fn test_circular_references_still_ordered() {
        let mut a = Table::new("public", "a")
            .column(Column::new("id", "integer"))
            .column(Column::new("b_id", "integer"));
        a.foreign_keys.push(fk("a_b_fk", "b_id", "b"));
        let mut b = Table::new("public", "b")
            .column(Column::new("id", "integer"))
            .column(Column::new("a_id", "integer"));
        b.foreign_keys.push(fk("b_a_fk", "a_id", "a"));

        let ordered = dependency_order(&[&a, &b], references);
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].name, "a");
    }

    #[test]
    fn test_drop_policy_precedes_drop_table() {
        let mut table = users();
        table.policies.push(Policy::new("read_own"));
        let before = snapshot(Dialect::Postgresql, vec![table]);
        let after = snapshot(Dialect::Postgresql, vec![]);
        assert_eq!(types(&before, &after), vec!["drop_policy", "drop_table"]);
    }

    // ==================== Column Tests ====================

    #[test]
    fn test_column_rename_is_single_statement() {
        let before = snapshot(Dialect::Postgresql, vec![users()]);
        let mut renamed = users();
        renamed.columns[1].name = "full_name".into();
        let after = snapshot(Dialect::Postgresql, vec![renamed]);

        let hints = HintResolver::parse(["public.users.name->public.users.full_name"]).unwrap();
        let result = SchemaDiffer::new(&before, &after)
            .with_resolver(&hints)
            .diff()
            .unwrap();
        assert_eq!(
            result.sql_statements,
            vec![r#"ALTER TABLE "users" RENAME COLUMN "name" TO "full_name";"#]
        );
    }

    #[test]
    fn test_pg_type_change_drops_default_first() {
        let mut from = users();
        from.columns[1] = Column::new("name", "text").with_default("'anon'");
        let mut to = users();
        to.columns[1] = Column::new("name", "varchar(64)").with_default("'anon'");
        let before = snapshot(Dialect::Postgresql, vec![from]);
        let after = snapshot(Dialect::Postgresql, vec![to]);
        assert_eq!(
            types(&before, &after),
            vec![
                "alter_table_alter_column_drop_default",
                "alter_table_alter_column_set_type",
                "alter_table_alter_column_set_default",
            ]
        );
    }

    #[test]
    fn test_mysql_folds_column_changes() {
        let from = Table::new("", "users").column(Column::new("name", "text"));
        let to = Table::new("", "users").column(
            Column::new("name", "varchar(64)")
                .not_null()
                .with_default("'x'"),
        );
        let before = snapshot(Dialect::Mysql, vec![from]);
        let after = snapshot(Dialect::Mysql, vec![to]);
        assert_eq!(types(&before, &after), vec!["alter_table_modify_column"]);
    }

    #[test]
    fn test_generated_expression_edit_ignored_in_push() {
        let generated = |expr: &str| {
            let mut column = Column::new("total", "integer");
            column.generated = Some(GeneratedColumn {
                expression: expr.to_string(),
                mode: GeneratedMode::Stored,
            });
            users().column(column)
        };
        let before = snapshot(Dialect::Postgresql, vec![generated("a + b")]);
        let after = snapshot(Dialect::Postgresql, vec![generated("a * b")]);

        assert_eq!(types(&before, &after), vec!["recreate_column"]);
        let pushed = SchemaDiffer::new(&before, &after)
            .with_options(DiffOptions::push())
            .diff()
            .unwrap();
        assert!(pushed.is_empty());
    }

    #[test]
    fn test_identity_lifecycle() {
        let identity = |kind: IdentityKind, increment: i64| IdentityColumn {
            kind,
            sequence_name: "users_id_seq".into(),
            options: SequenceOptions::for_type("integer").with_increment(increment),
        };
        let with_identity = |identity: Option<IdentityColumn>| {
            let mut table = users();
            table.columns[0].identity = identity;
            table
        };

        let plain = snapshot(Dialect::Postgresql, vec![with_identity(None)]);
        let always = snapshot(
            Dialect::Postgresql,
            vec![with_identity(Some(identity(IdentityKind::Always, 1)))],
        );
        let by_default = snapshot(
            Dialect::Postgresql,
            vec![with_identity(Some(identity(IdentityKind::ByDefault, 5)))],
        );

        assert_eq!(types(&plain, &always), vec!["alter_table_alter_column_set_identity"]);
        assert_eq!(types(&always, &plain), vec!["alter_table_alter_column_drop_identity"]);
        assert_eq!(
            types(&always, &by_default),
            vec![
                "alter_table_alter_column_set_generated",
                "alter_table_alter_column_set_identity_option",
            ]
        );
    }

    // ==================== Rebuild Tests ====================

    #[test]
    fn test_sqlite_type_change_rebuilds() {
        let from = Table::new("", "users").column(Column::new("age", "integer"));
        let to = Table::new("", "users").column(Column::new("age", "text"));
        let before = snapshot(Dialect::Sqlite, vec![from]);
        let after = snapshot(Dialect::Sqlite, vec![to]);
        assert_eq!(types(&before, &after), vec!["recreate_table"]);
    }

    #[test]
    fn test_sqlite_nullable_column_added_in_place() {
        let from = Table::new("", "users").column(Column::new("id", "integer"));
        let to = from.clone().column(Column::new("bio", "text"));
        let before = snapshot(Dialect::Sqlite, vec![from]);
        let after = snapshot(Dialect::Sqlite, vec![to]);
        assert_eq!(types(&before, &after), vec!["alter_table_add_column"]);
    }

    #[test]
    fn test_sqlite_required_column_rebuilds() {
        let from = Table::new("", "users").column(Column::new("id", "integer"));
        let to = from.clone().column(Column::new("bio", "text").not_null());
        let before = snapshot(Dialect::Sqlite, vec![from]);
        let after = snapshot(Dialect::Sqlite, vec![to]);
        assert_eq!(types(&before, &after), vec!["recreate_table"]);
    }

    #[test]
    fn test_singlestore_default_change_modifies() {
        let from = Table::new("", "users").column(Column::new("role", "text"));
        let to = Table::new("", "users").column(Column::new("role", "text").with_default("'user'"));
        let before = snapshot(Dialect::Singlestore, vec![from]);
        let after = snapshot(Dialect::Singlestore, vec![to]);
        assert_eq!(types(&before, &after), vec!["alter_table_modify_column"]);
    }

    #[test]
    fn test_singlestore_unique_change_rebuilds() {
        let from = Table::new("", "users").column(Column::new("email", "text"));
        let mut to = from.clone();
        to.uniques
            .push(UniqueConstraint::new("users_email_unique", ["email"]));
        let before = snapshot(Dialect::Singlestore, vec![from]);
        let after = snapshot(Dialect::Singlestore, vec![to]);
        assert_eq!(types(&before, &after), vec!["recreate_table"]);
    }

    // ==================== Constraint Tests ====================

    #[test]
    fn test_primary_key_change_drops_then_adds() {
        let mut from = users();
        from.primary_key = Some(PrimaryKey::new("users_pkey", ["id"]));
        let mut to = users();
        to.primary_key = Some(PrimaryKey::new("users_pkey", ["id", "name"]));
        let before = snapshot(Dialect::Postgresql, vec![from]);
        let after = snapshot(Dialect::Postgresql, vec![to]);
        assert_eq!(
            types(&before, &after),
            vec!["drop_primary_key", "add_primary_key"]
        );
    }

    #[test]
    fn test_check_body_change_ignored_in_push() {
        use tidemark_schema::ddl::CheckConstraint;
        let mut from = users();
        from.checks.push(CheckConstraint::new("id_positive", "id > 0"));
        let mut to = users();
        to.checks.push(CheckConstraint::new("id_positive", "id >= 0"));
        let before = snapshot(Dialect::Postgresql, vec![from]);
        let after = snapshot(Dialect::Postgresql, vec![to]);

        assert_eq!(types(&before, &after), vec!["drop_check", "add_check"]);
        let pushed = SchemaDiffer::new(&before, &after)
            .with_options(DiffOptions::push())
            .diff()
            .unwrap();
        assert!(pushed.is_empty());
    }

    #[test]
    fn test_foreign_key_remapped_through_table_rename() {
        let mut posts = Table::new("public", "posts")
            .column(Column::new("id", "integer"))
            .column(Column::new("user_id", "integer"));
        posts.foreign_keys.push(fk("posts_user_fk", "user_id", "users"));
        let before = snapshot(Dialect::Postgresql, vec![users(), posts.clone()]);

        let mut accounts = users();
        accounts.name = "accounts".into();
        posts.foreign_keys[0].table_to = "accounts".into();
        let after = snapshot(Dialect::Postgresql, vec![accounts, posts]);

        let hints = HintResolver::parse(["public.users->public.accounts"]).unwrap();
        let result = SchemaDiffer::new(&before, &after)
            .with_resolver(&hints)
            .diff()
            .unwrap();
        let names: Vec<&str> = result.statements.iter().map(Statement::type_name).collect();
        assert_eq!(names, vec!["rename_table"]);
    }

    // ==================== Index Tests ====================

    #[test]
    fn test_index_pure_rename() {
        let mut from = users();
        from.indexes
            .push(Index::new("users_name_index", vec![IndexColumn::column("name")]));
        let mut to = users();
        to.indexes
            .push(Index::new("users_name_idx", vec![IndexColumn::column("name")]));
        let before = snapshot(Dialect::Postgresql, vec![from]);
        let after = snapshot(Dialect::Postgresql, vec![to]);

        let hints =
            HintResolver::parse(["public.users.users_name_index->public.users.users_name_idx"])
                .unwrap();
        let result = SchemaDiffer::new(&before, &after)
            .with_resolver(&hints)
            .diff()
            .unwrap();
        assert_eq!(
            result.sql_statements,
            vec![r#"ALTER INDEX "users_name_index" RENAME TO "users_name_idx";"#]
        );
    }

    #[test]
    fn test_index_concurrently_flag_is_invisible() {
        let mut from = users();
        from.indexes
            .push(Index::new("users_name_index", vec![IndexColumn::column("name")]));
        let mut to = from.clone();
        to.indexes[0].concurrently = true;
        let before = snapshot(Dialect::Postgresql, vec![from]);
        let after = snapshot(Dialect::Postgresql, vec![to]);
        assert!(types(&before, &after).is_empty());
    }
}
