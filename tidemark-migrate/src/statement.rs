//! Abstract migration statements.
//!
//! The diff engine emits a closed set of statement kinds; each SQL generator
//! turns every kind into zero or more SQL strings. Statements serialize with
//! a `type` discriminator so callers can persist or inspect them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tidemark_schema::QualifiedName;
use tidemark_schema::ddl::{
    CheckConstraint, Column, Enum, ForeignKey, IdentityColumn, IdentityKind, Index, Policy,
    PrimaryKey, Role, Sequence, SequenceOptions, Table, UniqueConstraint, View,
};

/// A single sequence option change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "option", content = "value", rename_all = "snake_case")]
pub enum SequenceOption {
    /// `INCREMENT BY`.
    Increment(i64),
    /// `MINVALUE`.
    MinValue(i64),
    /// `MAXVALUE`.
    MaxValue(i64),
    /// `START WITH`.
    StartWith(i64),
    /// `CACHE`.
    Cache(i64),
    /// `CYCLE` / `NO CYCLE`.
    Cycle(bool),
}

impl SequenceOption {
    /// Options whose values differ between `from` and `to`, in a fixed order.
    pub fn changed(from: &SequenceOptions, to: &SequenceOptions) -> Vec<SequenceOption> {
        let mut out = Vec::new();
        if from.increment != to.increment {
            out.push(Self::Increment(to.increment));
        }
        if from.min_value != to.min_value {
            out.push(Self::MinValue(to.min_value));
        }
        if from.max_value != to.max_value {
            out.push(Self::MaxValue(to.max_value));
        }
        if from.start_with != to.start_with {
            out.push(Self::StartWith(to.start_with));
        }
        if from.cache != to.cache {
            out.push(Self::Cache(to.cache));
        }
        if from.cycle != to.cycle {
            out.push(Self::Cycle(to.cycle));
        }
        out
    }

    /// The SQL clause, e.g. `INCREMENT BY 2`.
    pub fn clause(&self) -> String {
        match self {
            Self::Increment(v) => format!("INCREMENT BY {}", v),
            Self::MinValue(v) => format!("MINVALUE {}", v),
            Self::MaxValue(v) => format!("MAXVALUE {}", v),
            Self::StartWith(v) => format!("START WITH {}", v),
            Self::Cache(v) => format!("CACHE {}", v),
            Self::Cycle(true) => "CYCLE".to_string(),
            Self::Cycle(false) => "NO CYCLE".to_string(),
        }
    }
}

/// A column that depends on an enum being recreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumColumnRef {
    /// Owning table.
    pub table: QualifiedName,
    /// Column name.
    pub column: SmolStr,
    /// Array dimensions.
    pub dimensions: u8,
    /// Default to drop before and restore after the recreate.
    pub default: Option<String>,
    /// Whether the column is typed by the enum again afterwards.
    pub restore: bool,
}

/// An abstract DDL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    /// Create a schema.
    CreateSchema {
        /// Schema name.
        name: SmolStr,
    },
    /// Drop a schema.
    DropSchema {
        /// Schema name.
        name: SmolStr,
    },
    /// Rename a schema.
    RenameSchema {
        /// Old name.
        from: SmolStr,
        /// New name.
        to: SmolStr,
    },

    /// Create an enum type.
    CreateEnum {
        /// The enum.
        enum_type: Enum,
    },
    /// Drop an enum type.
    DropEnum {
        /// The enum.
        enum_type: Enum,
    },
    /// Rename an enum type within its schema.
    RenameEnum {
        /// Schema.
        schema: SmolStr,
        /// Old name.
        from: SmolStr,
        /// New name.
        to: SmolStr,
    },
    /// Move an enum type to another schema.
    MoveEnum {
        /// Type name.
        name: SmolStr,
        /// Old schema.
        from_schema: SmolStr,
        /// New schema.
        to_schema: SmolStr,
    },
    /// Add one label to an enum.
    AlterEnumAddValue {
        /// The enum after the change.
        enum_type: Enum,
        /// New label.
        value: SmolStr,
        /// Existing label the new one goes before; `None` appends.
        before: Option<SmolStr>,
    },
    /// Drop and recreate an enum, retyping dependent columns around it.
    RecreateEnum {
        /// The enum after the change.
        enum_type: Enum,
        /// Dependent columns.
        columns: Vec<EnumColumnRef>,
    },

    /// Create a sequence.
    CreateSequence {
        /// The sequence.
        sequence: Sequence,
    },
    /// Drop a sequence.
    DropSequence {
        /// The sequence.
        sequence: Sequence,
    },
    /// Rename a sequence within its schema.
    RenameSequence {
        /// Schema.
        schema: SmolStr,
        /// Old name.
        from: SmolStr,
        /// New name.
        to: SmolStr,
    },
    /// Move a sequence to another schema.
    MoveSequence {
        /// Sequence name.
        name: SmolStr,
        /// Old schema.
        from_schema: SmolStr,
        /// New schema.
        to_schema: SmolStr,
    },
    /// Change sequence options.
    AlterSequence {
        /// The sequence after the change.
        sequence: Sequence,
        /// Options that changed.
        changes: Vec<SequenceOption>,
    },

    /// Create a role.
    CreateRole {
        /// The role.
        role: Role,
    },
    /// Drop a role.
    DropRole {
        /// The role.
        role: Role,
    },
    /// Rename a role.
    RenameRole {
        /// Old name.
        from: SmolStr,
        /// New name.
        to: SmolStr,
    },
    /// Change role flags.
    AlterRole {
        /// The role after the change.
        role: Role,
    },

    /// Create a table.
    CreateTable {
        /// The table.
        table: Table,
    },
    /// Drop a table.
    DropTable {
        /// The table.
        table: Table,
    },
    /// Rename a table within its schema.
    RenameTable {
        /// Schema.
        schema: SmolStr,
        /// Old name.
        from: SmolStr,
        /// New name.
        to: SmolStr,
    },
    /// Move a table to another schema.
    MoveTable {
        /// Table name.
        name: SmolStr,
        /// Old schema.
        from_schema: SmolStr,
        /// New schema.
        to_schema: SmolStr,
    },
    /// Rebuild a table through a shadow copy.
    RecreateTable {
        /// The table as it exists (renames already applied).
        from: Table,
        /// The desired table.
        to: Table,
    },
    /// Remove every row of a table.
    TruncateTable {
        /// The table.
        table: QualifiedName,
    },

    /// Add a column.
    #[serde(rename = "alter_table_add_column")]
    AddColumn {
        /// Owning table.
        table: QualifiedName,
        /// The column.
        column: Column,
    },
    /// Drop a column.
    #[serde(rename = "alter_table_drop_column")]
    DropColumn {
        /// Owning table.
        table: QualifiedName,
        /// The column.
        column: Column,
    },
    /// Rename a column.
    #[serde(rename = "alter_table_rename_column")]
    RenameColumn {
        /// Owning table.
        table: QualifiedName,
        /// Old name.
        from: SmolStr,
        /// New name.
        to: SmolStr,
    },
    /// Drop and re-add a column.
    RecreateColumn {
        /// Owning table.
        table: QualifiedName,
        /// Column as it exists.
        from: Column,
        /// Desired column.
        to: Column,
    },
    /// Redefine a column in place (MySQL, SingleStore).
    #[serde(rename = "alter_table_modify_column")]
    ModifyColumn {
        /// Owning table.
        table: QualifiedName,
        /// Column as it exists.
        from: Column,
        /// Desired column.
        to: Column,
    },
    /// Change a column type.
    #[serde(rename = "alter_table_alter_column_set_type")]
    AlterColumnType {
        /// Owning table.
        table: QualifiedName,
        /// Column as it exists.
        from: Column,
        /// Desired column.
        to: Column,
    },
    /// Set a column default.
    #[serde(rename = "alter_table_alter_column_set_default")]
    AlterColumnSetDefault {
        /// Owning table.
        table: QualifiedName,
        /// Column name.
        column: SmolStr,
        /// Default text.
        default: String,
    },
    /// Drop a column default.
    #[serde(rename = "alter_table_alter_column_drop_default")]
    AlterColumnDropDefault {
        /// Owning table.
        table: QualifiedName,
        /// Column name.
        column: SmolStr,
    },
    /// Add NOT NULL.
    #[serde(rename = "alter_table_alter_column_set_notnull")]
    AlterColumnSetNotNull {
        /// Owning table.
        table: QualifiedName,
        /// Column name.
        column: SmolStr,
    },
    /// Remove NOT NULL.
    #[serde(rename = "alter_table_alter_column_drop_notnull")]
    AlterColumnDropNotNull {
        /// Owning table.
        table: QualifiedName,
        /// Column name.
        column: SmolStr,
    },
    /// Turn a generated column into a plain one.
    #[serde(rename = "alter_table_alter_column_drop_generated")]
    AlterColumnDropGenerated {
        /// Owning table.
        table: QualifiedName,
        /// Column name.
        column: SmolStr,
    },
    /// Make a column an identity.
    #[serde(rename = "alter_table_alter_column_set_identity")]
    AlterColumnAddIdentity {
        /// Owning table.
        table: QualifiedName,
        /// Column name.
        column: SmolStr,
        /// Identity spec.
        identity: IdentityColumn,
    },
    /// Stop a column being an identity.
    #[serde(rename = "alter_table_alter_column_drop_identity")]
    AlterColumnDropIdentity {
        /// Owning table.
        table: QualifiedName,
        /// Column name.
        column: SmolStr,
    },
    /// Switch between `ALWAYS` and `BY DEFAULT`.
    #[serde(rename = "alter_table_alter_column_set_generated")]
    AlterColumnSetIdentityKind {
        /// Owning table.
        table: QualifiedName,
        /// Column name.
        column: SmolStr,
        /// New flavor.
        kind: IdentityKind,
    },
    /// Change one option of an identity's backing sequence.
    #[serde(rename = "alter_table_alter_column_set_identity_option")]
    AlterColumnSetIdentityOption {
        /// Owning table.
        table: QualifiedName,
        /// Column name.
        column: SmolStr,
        /// The option.
        option: SequenceOption,
    },

    /// Create an index.
    CreateIndex {
        /// Owning table.
        table: QualifiedName,
        /// The index.
        index: Index,
    },
    /// Drop an index.
    DropIndex {
        /// Owning table.
        table: QualifiedName,
        /// The index.
        index: Index,
    },
    /// Rename an index.
    RenameIndex {
        /// Owning table.
        table: QualifiedName,
        /// Old name.
        from: SmolStr,
        /// New name.
        to: SmolStr,
    },

    /// Add a primary key.
    AddPrimaryKey {
        /// Owning table.
        table: QualifiedName,
        /// The key.
        primary_key: PrimaryKey,
    },
    /// Drop a primary key.
    DropPrimaryKey {
        /// Owning table.
        table: QualifiedName,
        /// The key.
        primary_key: PrimaryKey,
    },
    /// Add a unique constraint.
    AddUnique {
        /// Owning table.
        table: QualifiedName,
        /// The constraint.
        unique: UniqueConstraint,
    },
    /// Drop a unique constraint.
    DropUnique {
        /// Owning table.
        table: QualifiedName,
        /// The constraint.
        unique: UniqueConstraint,
    },
    /// Add a check constraint.
    AddCheck {
        /// Owning table.
        table: QualifiedName,
        /// The constraint.
        check: CheckConstraint,
    },
    /// Drop a check constraint.
    DropCheck {
        /// Owning table.
        table: QualifiedName,
        /// The constraint.
        check: CheckConstraint,
    },
    /// Add a foreign key.
    CreateForeignKey {
        /// Owning table.
        table: QualifiedName,
        /// The constraint.
        foreign_key: ForeignKey,
    },
    /// Drop a foreign key.
    DropForeignKey {
        /// Owning table.
        table: QualifiedName,
        /// The constraint.
        foreign_key: ForeignKey,
    },

    /// Turn on row-level security.
    EnableRls {
        /// The table.
        table: QualifiedName,
    },
    /// Turn off row-level security.
    DisableRls {
        /// The table.
        table: QualifiedName,
    },
    /// Create a policy.
    CreatePolicy {
        /// Owning table.
        table: QualifiedName,
        /// The policy.
        policy: Policy,
    },
    /// Drop a policy.
    DropPolicy {
        /// Owning table.
        table: QualifiedName,
        /// The policy.
        policy: Policy,
    },
    /// Rename a policy.
    RenamePolicy {
        /// Owning table.
        table: QualifiedName,
        /// Old name.
        from: SmolStr,
        /// New name.
        to: SmolStr,
    },
    /// Change policy roles or expressions.
    AlterPolicy {
        /// Owning table.
        table: QualifiedName,
        /// Policy as it exists.
        from: Policy,
        /// Desired policy.
        to: Policy,
    },

    /// Create a view.
    CreateView {
        /// The view.
        view: View,
        /// `CREATE OR REPLACE`.
        replace: bool,
    },
    /// Drop a view.
    DropView {
        /// The view.
        view: View,
    },
    /// Rename a view within its schema.
    RenameView {
        /// Schema.
        schema: SmolStr,
        /// Old name.
        from: SmolStr,
        /// New name.
        to: SmolStr,
        /// Materialized view.
        materialized: bool,
    },
    /// Move a view to another schema.
    MoveView {
        /// View name.
        name: SmolStr,
        /// Old schema.
        from_schema: SmolStr,
        /// New schema.
        to_schema: SmolStr,
        /// Materialized view.
        materialized: bool,
    },
    /// Set or reset view storage options.
    AlterViewOptions {
        /// The view after the change.
        view: View,
        /// Options to set.
        set: BTreeMap<String, String>,
        /// Options to reset.
        reset: Vec<String>,
    },
}

impl Statement {
    /// The serialized discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CreateSchema { .. } => "create_schema",
            Self::DropSchema { .. } => "drop_schema",
            Self::RenameSchema { .. } => "rename_schema",
            Self::CreateEnum { .. } => "create_enum",
            Self::DropEnum { .. } => "drop_enum",
            Self::RenameEnum { .. } => "rename_enum",
            Self::MoveEnum { .. } => "move_enum",
            Self::AlterEnumAddValue { .. } => "alter_enum_add_value",
            Self::RecreateEnum { .. } => "recreate_enum",
            Self::CreateSequence { .. } => "create_sequence",
            Self::DropSequence { .. } => "drop_sequence",
            Self::RenameSequence { .. } => "rename_sequence",
            Self::MoveSequence { .. } => "move_sequence",
            Self::AlterSequence { .. } => "alter_sequence",
            Self::CreateRole { .. } => "create_role",
            Self::DropRole { .. } => "drop_role",
            Self::RenameRole { .. } => "rename_role",
            Self::AlterRole { .. } => "alter_role",
            Self::CreateTable { .. } => "create_table",
            Self::DropTable { .. } => "drop_table",
            Self::RenameTable { .. } => "rename_table",
            Self::MoveTable { .. } => "move_table",
            Self::RecreateTable { .. } => "recreate_table",
            Self::TruncateTable { .. } => "truncate_table",
            Self::AddColumn { .. } => "alter_table_add_column",
            Self::DropColumn { .. } => "alter_table_drop_column",
            Self::RenameColumn { .. } => "alter_table_rename_column",
            Self::RecreateColumn { .. } => "recreate_column",
            Self::ModifyColumn { .. } => "alter_table_modify_column",
            Self::AlterColumnType { .. } => "alter_table_alter_column_set_type",
            Self::AlterColumnSetDefault { .. } => "alter_table_alter_column_set_default",
            Self::AlterColumnDropDefault { .. } => "alter_table_alter_column_drop_default",
            Self::AlterColumnSetNotNull { .. } => "alter_table_alter_column_set_notnull",
            Self::AlterColumnDropNotNull { .. } => "alter_table_alter_column_drop_notnull",
            Self::AlterColumnDropGenerated { .. } => "alter_table_alter_column_drop_generated",
            Self::AlterColumnAddIdentity { .. } => "alter_table_alter_column_set_identity",
            Self::AlterColumnDropIdentity { .. } => "alter_table_alter_column_drop_identity",
            Self::AlterColumnSetIdentityKind { .. } => "alter_table_alter_column_set_generated",
            Self::AlterColumnSetIdentityOption { .. } => {
                "alter_table_alter_column_set_identity_option"
            }
            Self::CreateIndex { .. } => "create_index",
            Self::DropIndex { .. } => "drop_index",
            Self::RenameIndex { .. } => "rename_index",
            Self::AddPrimaryKey { .. } => "add_primary_key",
            Self::DropPrimaryKey { .. } => "drop_primary_key",
            Self::AddUnique { .. } => "add_unique",
            Self::DropUnique { .. } => "drop_unique",
            Self::AddCheck { .. } => "add_check",
            Self::DropCheck { .. } => "drop_check",
            Self::CreateForeignKey { .. } => "create_foreign_key",
            Self::DropForeignKey { .. } => "drop_foreign_key",
            Self::EnableRls { .. } => "enable_rls",
            Self::DisableRls { .. } => "disable_rls",
            Self::CreatePolicy { .. } => "create_policy",
            Self::DropPolicy { .. } => "drop_policy",
            Self::RenamePolicy { .. } => "rename_policy",
            Self::AlterPolicy { .. } => "alter_policy",
            Self::CreateView { .. } => "create_view",
            Self::DropView { .. } => "drop_view",
            Self::RenameView { .. } => "rename_view",
            Self::MoveView { .. } => "move_view",
            Self::AlterViewOptions { .. } => "alter_view_options",
        }
    }

    /// The table this statement touches, if it is table-scoped.
    pub fn table(&self) -> Option<QualifiedName> {
        match self {
            Self::CreateTable { table } | Self::DropTable { table } => Some(table.key()),
            Self::RecreateTable { to, .. } => Some(to.key()),
            Self::RenameTable { schema, to, .. } => Some(QualifiedName::new(schema.clone(), to.clone())),
            Self::MoveTable { name, to_schema, .. } => {
                Some(QualifiedName::new(to_schema.clone(), name.clone()))
            }
            Self::TruncateTable { table }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::RecreateColumn { table, .. }
            | Self::ModifyColumn { table, .. }
            | Self::AlterColumnType { table, .. }
            | Self::AlterColumnSetDefault { table, .. }
            | Self::AlterColumnDropDefault { table, .. }
            | Self::AlterColumnSetNotNull { table, .. }
            | Self::AlterColumnDropNotNull { table, .. }
            | Self::AlterColumnDropGenerated { table, .. }
            | Self::AlterColumnAddIdentity { table, .. }
            | Self::AlterColumnDropIdentity { table, .. }
            | Self::AlterColumnSetIdentityKind { table, .. }
            | Self::AlterColumnSetIdentityOption { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::RenameIndex { table, .. }
            | Self::AddPrimaryKey { table, .. }
            | Self::DropPrimaryKey { table, .. }
            | Self::AddUnique { table, .. }
            | Self::DropUnique { table, .. }
            | Self::AddCheck { table, .. }
            | Self::DropCheck { table, .. }
            | Self::CreateForeignKey { table, .. }
            | Self::DropForeignKey { table, .. }
            | Self::EnableRls { table }
            | Self::DisableRls { table }
            | Self::CreatePolicy { table, .. }
            | Self::DropPolicy { table, .. }
            | Self::RenamePolicy { table, .. }
            | Self::AlterPolicy { table, .. } => Some(table.clone()),
            _ => None,
        }
    }

    /// Whether the statement can destroy data.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DropSchema { .. }
                | Self::DropTable { .. }
                | Self::DropColumn { .. }
                | Self::RecreateColumn { .. }
                | Self::RecreateTable { .. }
                | Self::RecreateEnum { .. }
                | Self::TruncateTable { .. }
                | Self::AlterColumnType { .. }
                | Self::DropView { view: View { materialized: true, .. } }
        )
    }

    /// Whether the statement is a rename or move.
    pub fn is_rename(&self) -> bool {
        matches!(
            self,
            Self::RenameSchema { .. }
                | Self::RenameEnum { .. }
                | Self::MoveEnum { .. }
                | Self::RenameSequence { .. }
                | Self::MoveSequence { .. }
                | Self::RenameRole { .. }
                | Self::RenameTable { .. }
                | Self::MoveTable { .. }
                | Self::RenameColumn { .. }
                | Self::RenameIndex { .. }
                | Self::RenamePolicy { .. }
                | Self::RenameView { .. }
                | Self::MoveView { .. }
        )
    }
}
