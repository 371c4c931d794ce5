//! Schemas, enums, sequences and roles.

use tidemark_schema::{ObjectKey, QualifiedName};
use tidemark_schema::ddl::Role;
use tracing::debug;

use super::{Differ, Phase, move_and_rename};
use crate::error::MigrateResult;
use crate::resolver::EntityKind;
use crate::statement::{EnumColumnRef, SequenceOption, Statement};

/// How an enum's labels changed.
#[derive(Debug, PartialEq, Eq)]
enum EnumChange {
    Unchanged,
    /// New labels, each with the existing label it goes before.
    Append(Vec<(usize, Option<usize>)>),
    Recreate,
}

/// Classify a label change. Additions that keep the old labels as an
/// ordered subsequence can be expressed with `ADD VALUE`.
fn classify_enum_change(from: &[impl AsRef<str>], to: &[impl AsRef<str>]) -> EnumChange {
    let from: Vec<&str> = from.iter().map(AsRef::as_ref).collect();
    let to: Vec<&str> = to.iter().map(AsRef::as_ref).collect();
    if from == to {
        return EnumChange::Unchanged;
    }

    let mut cursor = 0;
    for label in &to {
        if cursor < from.len() && from[cursor] == *label {
            cursor += 1;
        }
    }
    if cursor != from.len() {
        return EnumChange::Recreate;
    }

    let mut additions = Vec::new();
    for (i, label) in to.iter().enumerate() {
        if from.contains(label) {
            continue;
        }
        let before = to[i + 1..]
            .iter()
            .position(|l| from.contains(l))
            .map(|offset| i + 1 + offset);
        additions.push((i, before));
    }
    EnumChange::Append(additions)
}

impl Differ<'_> {
    pub(super) fn diff_schemas(&mut self) -> MigrateResult<()> {
        if !self.dialect.supports_schemas() {
            return Ok(());
        }
        let default = self.dialect.default_schema();
        let before: Vec<ObjectKey> = self
            .before
            .schemas
            .iter()
            .filter(|s| s.name != default)
            .map(|s| ObjectKey::bare(s.name.clone()))
            .collect();
        let after: Vec<ObjectKey> = self
            .after
            .schemas
            .iter()
            .filter(|s| s.name != default)
            .map(|s| ObjectKey::bare(s.name.clone()))
            .collect();

        let resolution = self.resolve(EntityKind::Schema, &before, &after)?;
        for rename in &resolution.renamed {
            self.emit(
                Phase::Schemas,
                Statement::RenameSchema {
                    from: rename.from.name.clone(),
                    to: rename.to.name.clone(),
                },
            );
            self.rename_schema(&rename.from.name, &rename.to.name);
        }
        for key in resolution.created {
            self.emit(Phase::Schemas, Statement::CreateSchema { name: key.name });
        }
        for key in resolution.deleted {
            self.emit(Phase::DropSchemas, Statement::DropSchema { name: key.name });
        }
        Ok(())
    }

    pub(super) fn diff_enums(&mut self) -> MigrateResult<()> {
        let before: Vec<ObjectKey> = self.before.enums.iter().map(|e| e.key().to_key()).collect();
        let after: Vec<ObjectKey> = self.after.enums.iter().map(|e| e.key().to_key()).collect();

        let resolution = self.resolve(EntityKind::Enum, &before, &after)?;
        for rename in &resolution.renamed {
            let (from, to) = (rename.from.qualified(), rename.to.qualified());
            for statement in move_and_rename(
                &from,
                &to,
                |name, from_schema, to_schema| Statement::MoveEnum {
                    name,
                    from_schema,
                    to_schema,
                },
                |schema, from, to| Statement::RenameEnum { schema, from, to },
            ) {
                self.emit(Phase::Enums, statement);
            }
            self.rename_enum(&from, &to);
        }

        let after_enums = self.after;
        for key in &resolution.created {
            if let Some(e) = after_enums.get_enum(&key.qualified()) {
                self.emit(
                    Phase::Enums,
                    Statement::CreateEnum {
                        enum_type: e.clone(),
                    },
                );
            }
        }

        for to in &after_enums.enums {
            let Some(from) = self.before.get_enum(&to.key()) else {
                continue;
            };
            match classify_enum_change(&from.values, &to.values) {
                EnumChange::Unchanged => {}
                EnumChange::Append(additions) => {
                    for (index, before) in additions {
                        self.emit(
                            Phase::Enums,
                            Statement::AlterEnumAddValue {
                                enum_type: to.clone(),
                                value: to.values[index].clone(),
                                before: before.map(|i| to.values[i].clone()),
                            },
                        );
                    }
                }
                EnumChange::Recreate => {
                    debug!(enum_type = %to.key(), "labels removed or reordered, recreating");
                    self.recreate_enums.push(to.clone());
                }
            }
        }

        for key in resolution.deleted {
            if let Some(e) = self.before.get_enum(&key.qualified()) {
                let enum_type = e.clone();
                self.emit(Phase::DropTypes, Statement::DropEnum { enum_type });
            }
        }
        Ok(())
    }

    /// Emit enum recreations once column renames are known.
    ///
    /// Every column still typed by the enum is cast to text around the
    /// drop/create; columns that keep the type get it back afterwards.
    /// Tables in `created` already exist by then and keep the type.
    pub(super) fn emit_enum_recreates(&mut self, created: &[QualifiedName]) {
        let recreates = std::mem::take(&mut self.recreate_enums);
        let after = self.after;
        for enum_type in recreates {
            let mut columns = Vec::new();
            for table in &mut self.before.tables {
                let table_key = table.key();
                let after_table = after.table(&table_key);
                for column in &mut table.columns {
                    if !column.uses_enum(&enum_type.schema, &enum_type.name) {
                        continue;
                    }
                    let restore = after_table
                        .and_then(|t| t.get_column(&column.name))
                        .is_some_and(|c| c.uses_enum(&enum_type.schema, &enum_type.name));
                    columns.push(EnumColumnRef {
                        table: table_key.clone(),
                        column: column.name.clone(),
                        dimensions: column.dimensions,
                        default: column.default.clone(),
                        restore,
                    });
                    if !restore {
                        column.sql_type = "text".to_string();
                        column.type_schema = None;
                        column.default = None;
                    }
                }
            }
            for table in created.iter().filter_map(|key| after.table(key)) {
                for column in &table.columns {
                    if column.uses_enum(&enum_type.schema, &enum_type.name) {
                        columns.push(EnumColumnRef {
                            table: table.key(),
                            column: column.name.clone(),
                            dimensions: column.dimensions,
                            default: column.default.clone(),
                            restore: true,
                        });
                    }
                }
            }
            self.emit(
                Phase::RecreateEnums,
                Statement::RecreateEnum { enum_type, columns },
            );
        }
    }

    pub(super) fn diff_sequences(&mut self) -> MigrateResult<()> {
        let before: Vec<ObjectKey> = self
            .before
            .sequences
            .iter()
            .map(|s| s.key().to_key())
            .collect();
        let after: Vec<ObjectKey> = self
            .after
            .sequences
            .iter()
            .map(|s| s.key().to_key())
            .collect();

        let resolution = self.resolve(EntityKind::Sequence, &before, &after)?;
        for rename in &resolution.renamed {
            let (from, to) = (rename.from.qualified(), rename.to.qualified());
            for statement in move_and_rename(
                &from,
                &to,
                |name, from_schema, to_schema| Statement::MoveSequence {
                    name,
                    from_schema,
                    to_schema,
                },
                |schema, from, to| Statement::RenameSequence { schema, from, to },
            ) {
                self.emit(Phase::Sequences, statement);
            }
            for sequence in &mut self.before.sequences {
                if sequence.key() == from {
                    sequence.schema = to.schema.clone();
                    sequence.name = to.name.clone();
                }
            }
        }

        let after = self.after;
        for key in &resolution.created {
            if let Some(sequence) = after.sequences.iter().find(|s| s.key() == key.qualified()) {
                self.emit(
                    Phase::Sequences,
                    Statement::CreateSequence {
                        sequence: sequence.clone(),
                    },
                );
            }
        }

        for to in &after.sequences {
            let Some(from) = self.before.sequences.iter().find(|s| s.key() == to.key()) else {
                continue;
            };
            let changes = SequenceOption::changed(&from.options, &to.options);
            if !changes.is_empty() {
                self.emit(
                    Phase::Sequences,
                    Statement::AlterSequence {
                        sequence: to.clone(),
                        changes,
                    },
                );
            }
        }

        for key in resolution.deleted {
            if let Some(sequence) = self
                .before
                .sequences
                .iter()
                .find(|s| s.key() == key.qualified())
            {
                let sequence = sequence.clone();
                self.emit(Phase::DropTypes, Statement::DropSequence { sequence });
            }
        }
        Ok(())
    }

    pub(super) fn diff_roles(&mut self) -> MigrateResult<()> {
        let managed = |roles: &[Role]| -> Vec<ObjectKey> {
            roles
                .iter()
                .filter(|r| !r.existing)
                .map(|r| ObjectKey::bare(r.name.clone()))
                .collect()
        };
        // A role marked existing on either side is never touched.
        let existing: Vec<&str> = self
            .before
            .roles
            .iter()
            .chain(self.after.roles.iter())
            .filter(|r| r.existing)
            .map(|r| r.name.as_str())
            .collect();
        let before: Vec<ObjectKey> = managed(&self.before.roles)
            .into_iter()
            .filter(|k| !existing.contains(&k.name.as_str()))
            .collect();
        let after: Vec<ObjectKey> = managed(&self.after.roles)
            .into_iter()
            .filter(|k| !existing.contains(&k.name.as_str()))
            .collect();

        let resolution = self.resolve(EntityKind::Role, &before, &after)?;
        for rename in &resolution.renamed {
            self.emit(
                Phase::Roles,
                Statement::RenameRole {
                    from: rename.from.name.clone(),
                    to: rename.to.name.clone(),
                },
            );
            self.rename_role(&rename.from.name, &rename.to.name);
        }

        let snapshot = self.after;
        for key in &resolution.created {
            if let Some(role) = snapshot.roles.iter().find(|r| r.name == key.name) {
                self.emit(Phase::Roles, Statement::CreateRole { role: role.clone() });
            }
        }

        for key in &after {
            let Some(to) = snapshot.roles.iter().find(|r| r.name == key.name) else {
                continue;
            };
            let Some(from) = self.before.roles.iter().find(|r| r.name == key.name) else {
                continue;
            };
            if from.create_db != to.create_db
                || from.create_role != to.create_role
                || from.inherit != to.inherit
            {
                self.emit(Phase::Roles, Statement::AlterRole { role: to.clone() });
            }
        }

        for key in resolution.deleted {
            if let Some(role) = self.before.roles.iter().find(|r| r.name == key.name) {
                let role = role.clone();
                self.emit(Phase::DropRoles, Statement::DropRole { role });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_unchanged() {
        assert_eq!(classify_enum_change(&["a", "b"], &["a", "b"]), EnumChange::Unchanged);
    }

    #[test]
    fn test_classify_append_and_insert() {
        assert_eq!(
            classify_enum_change(&["a", "c"], &["a", "b", "c", "d"]),
            EnumChange::Append(vec![(1, Some(2)), (3, None)])
        );
    }

    #[test]
    fn test_classify_consecutive_inserts_share_anchor() {
        assert_eq!(
            classify_enum_change(&["c"], &["a", "b", "c"]),
            EnumChange::Append(vec![(0, Some(2)), (1, Some(2))])
        );
    }

    #[test]
    fn test_classify_removal_and_reorder() {
        assert_eq!(classify_enum_change(&["a", "b"], &["a"]), EnumChange::Recreate);
        assert_eq!(classify_enum_change(&["a", "b"], &["b", "a"]), EnumChange::Recreate);
    }
}
