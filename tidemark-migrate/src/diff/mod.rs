//! The diff engine.
//!
//! [`ddl_diff`] compares two validated snapshots of the same dialect and
//! produces an ordered list of [`Statement`]s, their SQL, and risk
//! annotations. Entity kinds are processed in dependency order; each kind
//! first resolves renames through the injected [`Resolver`], then the
//! engine's working copy of `before` is rewritten as if those renames had
//! already happened, so later comparisons are by key.
//!
//! Statements are collected into phases and concatenated at the end, which
//! is what guarantees that, for example, policies are dropped before their
//! table and foreign keys are added only once every table exists.

mod policies;
mod tables;
mod types;
mod views;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tidemark_schema::ddl::{DdlSnapshot, Enum};
use tidemark_schema::{Dialect, DiffMode, ObjectKey, QualifiedName, SchemaError, TidemarkConfig};
use tracing::{debug, trace};

use crate::error::{MigrateResult, MigrationError};
use crate::explain::GroupedStatement;
use crate::push::{DataProbe, LiveNames, remediate};
use crate::resolver::{EntityKind, HintResolver, Resolution, Resolver};
use crate::sql::{BREAKPOINT, generator_for};
use crate::statement::Statement;

/// Options for a diff run.
#[derive(Clone, Copy, Default)]
pub struct DiffOptions<'a> {
    /// Whether the statements go to a migration file or straight to a
    /// database.
    pub mode: DiffMode,
    /// Live data counts; consulted only in push mode.
    pub probe: Option<&'a dyn DataProbe>,
}

impl fmt::Debug for DiffOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffOptions")
            .field("mode", &self.mode)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

impl<'a> DiffOptions<'a> {
    /// Default-mode options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push-mode options without a probe.
    pub fn push() -> Self {
        Self {
            mode: DiffMode::Push,
            probe: None,
        }
    }

    /// Set the mode.
    pub fn with_mode(mut self, mode: DiffMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach live data counts.
    pub fn with_probe(mut self, probe: &'a dyn DataProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Options described by the `[diff]` section of a config.
    pub fn from_config(config: &TidemarkConfig) -> DiffOptions<'static> {
        DiffOptions {
            mode: config.diff.mode,
            probe: None,
        }
    }

    fn is_push(&self) -> bool {
        self.mode == DiffMode::Push
    }
}

/// What kind of data a statement can destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    /// A schema and everything left in it.
    DropSchema,
    /// A table and its rows.
    DropTable,
    /// A column and its values.
    DropColumn,
    /// A materialized view's cached rows.
    DropMaterializedView,
    /// A column dropped and added again.
    RecreateColumn,
    /// A table copied through a shadow table.
    RecreateTable,
    /// Enum-typed values cast through text.
    RecreateEnum,
    /// Values cast to a new type.
    TypeChange,
    /// Every row of a table.
    Truncate,
}

/// A risk annotation on one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loss {
    /// Index into [`DiffResult::statements`].
    pub statement: usize,
    /// What can be lost.
    pub kind: LossKind,
    /// The affected entity, e.g. `public.users.email`.
    pub target: String,
}

impl Loss {
    /// The loss annotation for a statement, if it is risky.
    pub fn of(index: usize, statement: &Statement) -> Option<Self> {
        let (kind, target) = match statement {
            Statement::DropSchema { name } => (LossKind::DropSchema, name.to_string()),
            Statement::DropTable { table } => (LossKind::DropTable, table.key().to_string()),
            Statement::DropColumn { table, column } => (
                LossKind::DropColumn,
                format!("{}.{}", table, column.name),
            ),
            Statement::DropView { view } if view.materialized => {
                (LossKind::DropMaterializedView, view.key().to_string())
            }
            Statement::RecreateColumn { table, to, .. } => {
                (LossKind::RecreateColumn, format!("{}.{}", table, to.name))
            }
            Statement::RecreateTable { to, .. } => (LossKind::RecreateTable, to.key().to_string()),
            Statement::RecreateEnum { enum_type, .. } => {
                (LossKind::RecreateEnum, enum_type.key().to_string())
            }
            Statement::AlterColumnType { table, to, .. } => {
                (LossKind::TypeChange, format!("{}.{}", table, to.name))
            }
            Statement::TruncateTable { table } => (LossKind::Truncate, table.to_string()),
            _ => return None,
        };
        Some(Self {
            statement: index,
            kind,
            target,
        })
    }
}

/// The output of a diff.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffResult {
    /// Ordered abstract statements.
    pub statements: Vec<Statement>,
    /// SQL for every statement, flattened in order.
    pub sql_statements: Vec<String>,
    /// Each statement paired with its SQL.
    pub grouped_statements: Vec<GroupedStatement>,
    /// Human-readable data-loss warnings (push mode).
    pub hints: Vec<String>,
    /// Risk annotations for destructive statements.
    pub losses: Vec<Loss>,
}

impl DiffResult {
    /// No statements were produced.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Render a migration file body.
    pub fn to_migration_sql(&self, breakpoints: bool) -> String {
        if breakpoints {
            self.sql_statements
                .join(&format!("\n{}\n", BREAKPOINT))
        } else {
            self.sql_statements.join("\n")
        }
    }

    /// Statements as pretty JSON.
    pub fn statements_json(&self) -> MigrateResult<String> {
        Ok(serde_json::to_string_pretty(&self.statements)?)
    }
}

/// Builder-style entry point to the diff engine.
///
/// ```rust
/// use tidemark_migrate::{HintResolver, SchemaDiffer};
/// use tidemark_schema::ddl::{Column, DdlSnapshot, Table};
/// use tidemark_schema::Dialect;
///
/// let mut before = DdlSnapshot::new(Dialect::Postgresql);
/// before.tables.push(Table::new("public", "users").column(Column::new("id", "integer")));
/// let mut after = DdlSnapshot::new(Dialect::Postgresql);
/// after.tables.push(Table::new("public", "accounts").column(Column::new("id", "integer")));
///
/// let hints = HintResolver::parse(["public.users->public.accounts"]).unwrap();
/// let result = SchemaDiffer::new(&before, &after)
///     .with_resolver(&hints)
///     .diff()
///     .unwrap();
/// assert_eq!(result.sql_statements, vec![r#"ALTER TABLE "users" RENAME TO "accounts";"#]);
/// ```
pub struct SchemaDiffer<'a> {
    before: &'a DdlSnapshot,
    after: &'a DdlSnapshot,
    resolver: &'a dyn Resolver,
    options: DiffOptions<'a>,
}

static NO_HINTS: HintResolver = HintResolver::new();

impl<'a> SchemaDiffer<'a> {
    /// Diff `before` into `after` with no rename hints.
    pub fn new(before: &'a DdlSnapshot, after: &'a DdlSnapshot) -> Self {
        Self {
            before,
            after,
            resolver: &NO_HINTS,
            options: DiffOptions::default(),
        }
    }

    /// Use a rename resolver.
    pub fn with_resolver(mut self, resolver: &'a dyn Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set diff options.
    pub fn with_options(mut self, options: DiffOptions<'a>) -> Self {
        self.options = options;
        self
    }

    /// Compute the diff.
    pub fn diff(&self) -> MigrateResult<DiffResult> {
        ddl_diff(self.before, self.after, self.resolver, self.options)
    }
}

/// Compare two snapshots.
///
/// Fails without partial output when either snapshot is invalid, the
/// dialects differ, or the resolver returns an inconsistent answer.
pub fn ddl_diff(
    before: &DdlSnapshot,
    after: &DdlSnapshot,
    resolver: &dyn Resolver,
    options: DiffOptions<'_>,
) -> MigrateResult<DiffResult> {
    validate(before, "before")?;
    validate(after, "after")?;
    if before.dialect != after.dialect {
        return Err(MigrationError::DialectMismatch {
            before: before.dialect,
            after: after.dialect,
        });
    }

    let mut differ = Differ::new(before, after, resolver, options.mode);
    differ.run()?;
    let (statements, live) = differ.finish();

    let (statements, hints) = match options.probe {
        Some(probe) if options.is_push() => remediate(statements, probe, &live),
        _ => (statements, Vec::new()),
    };

    let generator = generator_for(after.dialect);
    let grouped_statements: Vec<GroupedStatement> = statements
        .iter()
        .map(|statement| GroupedStatement::new(statement.clone(), generator.to_sql(statement)))
        .collect();
    let sql_statements = grouped_statements
        .iter()
        .flat_map(|g| g.sql.iter().cloned())
        .collect();
    let losses = statements
        .iter()
        .enumerate()
        .filter_map(|(i, s)| Loss::of(i, s))
        .collect();

    debug!(
        dialect = %after.dialect,
        statements = statements.len(),
        hints = hints.len(),
        "diff complete"
    );

    Ok(DiffResult {
        statements,
        sql_statements,
        grouped_statements,
        hints,
        losses,
    })
}

fn validate(snapshot: &DdlSnapshot, side: &'static str) -> MigrateResult<()> {
    SchemaError::from_many(snapshot.validate())
        .map_err(|source| MigrationError::InvalidSnapshot { side, source })
}

/// Statement phases, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Phase {
    Schemas,
    Enums,
    Sequences,
    Roles,
    DropPolicies,
    DropViews,
    DropForeignKeys,
    DropIndexes,
    RenameTables,
    CreateTables,
    ColumnRenames,
    RecreateEnums,
    Columns,
    AddConstraints,
    CreateForeignKeys,
    DropTables,
    Policies,
    CreateViews,
    DropTypes,
    DropRoles,
    DropSchemas,
}

const PHASE_COUNT: usize = Phase::DropSchemas as usize + 1;

#[derive(Debug, Default)]
struct Plan {
    buckets: [Vec<Statement>; PHASE_COUNT],
}

impl Plan {
    fn push(&mut self, phase: Phase, statement: Statement) {
        trace!(?phase, statement = statement.type_name(), "emit");
        self.buckets[phase as usize].push(statement);
    }

    fn into_statements(self) -> Vec<Statement> {
        self.buckets.into_iter().flatten().collect()
    }
}

/// Working state of one diff run.
pub(crate) struct Differ<'a> {
    dialect: Dialect,
    mode: DiffMode,
    resolver: &'a dyn Resolver,
    /// `before`, rewritten through every rename resolved so far.
    before: DdlSnapshot,
    after: &'a DdlSnapshot,
    plan: Plan,
    live: LiveNames,
    /// Name of each renamed table up to its rename statement.
    table_origin: HashMap<QualifiedName, QualifiedName>,
    /// Enums whose labels changed in a way `ADD VALUE` cannot express.
    recreate_enums: Vec<Enum>,
}

impl<'a> Differ<'a> {
    fn new(
        before: &DdlSnapshot,
        after: &'a DdlSnapshot,
        resolver: &'a dyn Resolver,
        mode: DiffMode,
    ) -> Self {
        Self {
            dialect: after.dialect,
            mode,
            resolver,
            before: before.clone(),
            after,
            plan: Plan::default(),
            live: LiveNames::default(),
            table_origin: HashMap::new(),
            recreate_enums: Vec::new(),
        }
    }

    fn run(&mut self) -> MigrateResult<()> {
        self.diff_schemas()?;
        self.diff_enums()?;
        self.diff_sequences()?;
        self.diff_roles()?;
        self.diff_tables()?;
        self.diff_views()?;
        Ok(())
    }

    fn finish(self) -> (Vec<Statement>, LiveNames) {
        (self.plan.into_statements(), self.live)
    }

    fn is_push(&self) -> bool {
        self.mode == DiffMode::Push
    }

    fn emit(&mut self, phase: Phase, statement: Statement) {
        self.plan.push(phase, statement);
    }

    /// Ask the resolver about keys present on only one side.
    fn resolve(
        &self,
        kind: EntityKind,
        before: &[ObjectKey],
        after: &[ObjectKey],
    ) -> MigrateResult<Resolution> {
        let before_set: HashSet<&ObjectKey> = before.iter().collect();
        let after_set: HashSet<&ObjectKey> = after.iter().collect();
        let removed: Vec<ObjectKey> = before
            .iter()
            .filter(|k| !after_set.contains(k))
            .cloned()
            .collect();
        let added: Vec<ObjectKey> = after
            .iter()
            .filter(|k| !before_set.contains(k))
            .cloned()
            .collect();

        if removed.is_empty() && added.is_empty() {
            return Ok(Resolution::default());
        }

        let resolution = if removed.is_empty() || added.is_empty() {
            Resolution::drop_create(&removed, &added)
        } else {
            self.resolver.resolve(kind, &removed, &added)?
        };
        resolution.validate(kind, &removed, &added)?;

        debug!(
            %kind,
            renamed = resolution.renamed.len(),
            created = resolution.created.len(),
            deleted = resolution.deleted.len(),
            "resolved"
        );
        Ok(resolution)
    }

    // ==================== Working-copy renames ====================

    fn rename_schema(&mut self, from: &str, to: &str) {
        let to = SmolStr::new(to);
        for schema in &mut self.before.schemas {
            if schema.name == from {
                schema.name = to.clone();
            }
        }
        for e in &mut self.before.enums {
            if e.schema == from {
                e.schema = to.clone();
            }
        }
        for s in &mut self.before.sequences {
            if s.schema == from {
                s.schema = to.clone();
            }
        }
        for v in &mut self.before.views {
            if v.schema == from {
                v.schema = to.clone();
            }
        }
        for table in &mut self.before.tables {
            if table.schema == from {
                let old = table.key();
                table.schema = to.clone();
                self.live.rename_table(old, table.key());
            }
            for column in &mut table.columns {
                if column.type_schema.as_deref() == Some(from) {
                    column.type_schema = Some(to.clone());
                }
            }
            for fk in &mut table.foreign_keys {
                if fk.schema_to == from {
                    fk.schema_to = to.clone();
                }
            }
        }
    }

    fn rename_enum(&mut self, from: &QualifiedName, to: &QualifiedName) {
        for e in &mut self.before.enums {
            if e.key() == *from {
                e.schema = to.schema.clone();
                e.name = to.name.clone();
            }
        }
        for table in &mut self.before.tables {
            for column in &mut table.columns {
                if column.uses_enum(&from.schema, &from.name) {
                    column.type_schema = Some(to.schema.clone());
                    column.sql_type = to.name.to_string();
                }
            }
        }
    }

    fn rename_table(&mut self, from: &QualifiedName, to: &QualifiedName) {
        for table in &mut self.before.tables {
            if table.key() == *from {
                table.schema = to.schema.clone();
                table.name = to.name.clone();
            }
            for fk in &mut table.foreign_keys {
                if fk.target() == *from {
                    fk.schema_to = to.schema.clone();
                    fk.table_to = to.name.clone();
                }
            }
        }
        let original = self.live.original_table(from);
        self.live.rename_table(original, to.clone());
        self.table_origin.insert(to.clone(), from.clone());
    }

    fn rename_column(&mut self, table_key: &QualifiedName, from: &str, to: &str) {
        let to = SmolStr::new(to);
        let rename = |name: &mut SmolStr| {
            if name.as_str() == from {
                *name = to.clone();
            }
        };
        for table in &mut self.before.tables {
            if table.key() == *table_key {
                for column in &mut table.columns {
                    rename(&mut column.name);
                }
                if let Some(pk) = &mut table.primary_key {
                    pk.columns.iter_mut().for_each(rename);
                }
                for unique in &mut table.uniques {
                    unique.columns.iter_mut().for_each(rename);
                }
                for fk in &mut table.foreign_keys {
                    fk.columns.iter_mut().for_each(rename);
                }
                for index in &mut table.indexes {
                    for column in &mut index.columns {
                        if !column.is_expression && column.value == from {
                            column.value = to.to_string();
                        }
                    }
                }
            }
            for fk in &mut table.foreign_keys {
                if fk.target() == *table_key {
                    fk.columns_to.iter_mut().for_each(rename);
                }
            }
        }
        self.live
            .rename_column(table_key.clone(), SmolStr::new(from), to.clone());
    }

    fn rename_role(&mut self, from: &str, to: &str) {
        for role in &mut self.before.roles {
            if role.name == from {
                role.name = SmolStr::new(to);
            }
        }
        for table in &mut self.before.tables {
            for policy in &mut table.policies {
                let mut touched = false;
                for role in &mut policy.roles {
                    if role.as_str() == from {
                        *role = SmolStr::new(to);
                        touched = true;
                    }
                }
                if touched {
                    policy.roles.sort();
                }
            }
        }
    }

    /// The name a surviving table has before the rename phase runs.
    fn origin_of(&self, key: &QualifiedName) -> QualifiedName {
        self.table_origin
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.clone())
    }
}

/// Emit the move and rename statements for a schema-scoped entity.
///
/// A changed schema is a move; a changed name afterwards is a rename in the
/// new schema.
fn move_and_rename(
    from: &QualifiedName,
    to: &QualifiedName,
    moved: impl FnOnce(SmolStr, SmolStr, SmolStr) -> Statement,
    renamed: impl FnOnce(SmolStr, SmolStr, SmolStr) -> Statement,
) -> Vec<Statement> {
    let mut out = Vec::new();
    if from.schema != to.schema {
        out.push(moved(
            from.name.clone(),
            from.schema.clone(),
            to.schema.clone(),
        ));
    }
    if from.name != to.name {
        out.push(renamed(to.schema.clone(), from.name.clone(), to.name.clone()));
    }
    out
}
