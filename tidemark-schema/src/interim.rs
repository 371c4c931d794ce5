//! Interim schema declarations.
//!
//! This is what a schema DSL or a database introspector hands over before
//! canonicalization. Names may be omitted (they are derived), schemas may be
//! omitted (the dialect default is used) and defaults are typed values rather
//! than dialect text. [`crate::convert::to_ddl`] turns a declaration into a
//! [`crate::ddl::DdlSnapshot`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::ddl::{
    GeneratedColumn, GeneratedMode, IdentityKind, IndexColumn, Policy, ReferentialAction, Role,
    SequenceOptions,
};

/// A typed column default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    /// SQL `NULL`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Floating point literal.
    Float(f64),
    /// String literal.
    Text(String),
    /// JSON document.
    Json(serde_json::Value),
    /// Array literal.
    Array(Vec<DefaultValue>),
    /// Raw SQL expression, such as `now()`.
    Sql(String),
}

/// A whole declared schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterimSchema {
    /// Declared non-default schemas.
    #[serde(default)]
    pub schemas: Vec<SmolStr>,
    /// Enum declarations.
    #[serde(default)]
    pub enums: Vec<EnumDecl>,
    /// Sequence declarations.
    #[serde(default)]
    pub sequences: Vec<SequenceDecl>,
    /// Role declarations.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Table declarations.
    #[serde(default)]
    pub tables: Vec<TableDecl>,
    /// Policies attached to tables after the fact.
    #[serde(default)]
    pub policy_links: Vec<PolicyLink>,
    /// View declarations.
    #[serde(default)]
    pub views: Vec<ViewDecl>,
}

impl InterimSchema {
    /// Create an empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a schema.
    pub fn schema(mut self, name: impl Into<SmolStr>) -> Self {
        self.schemas.push(name.into());
        self
    }

    /// Declare an enum.
    pub fn enum_type(mut self, decl: EnumDecl) -> Self {
        self.enums.push(decl);
        self
    }

    /// Declare a sequence.
    pub fn sequence(mut self, decl: SequenceDecl) -> Self {
        self.sequences.push(decl);
        self
    }

    /// Declare a role.
    pub fn role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Declare a table.
    pub fn table(mut self, decl: TableDecl) -> Self {
        self.tables.push(decl);
        self
    }

    /// Attach a policy to an already declared table.
    pub fn link_policy(mut self, table: impl Into<SmolStr>, policy: Policy) -> Self {
        self.policy_links.push(PolicyLink {
            schema: None,
            table: table.into(),
            policy,
        });
        self
    }

    /// Declare a view.
    pub fn view(mut self, decl: ViewDecl) -> Self {
        self.views.push(decl);
        self
    }
}

/// An enum declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    /// Schema, defaulted when omitted.
    pub schema: Option<SmolStr>,
    /// Type name.
    pub name: SmolStr,
    /// Ordered labels.
    pub values: Vec<SmolStr>,
}

impl EnumDecl {
    /// Declare an enum in the default schema.
    pub fn new(
        name: impl Into<SmolStr>,
        values: impl IntoIterator<Item = impl Into<SmolStr>>,
    ) -> Self {
        Self {
            schema: None,
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Place the enum in a schema.
    pub fn in_schema(mut self, schema: impl Into<SmolStr>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// A sequence declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDecl {
    /// Schema, defaulted when omitted.
    pub schema: Option<SmolStr>,
    /// Sequence name.
    pub name: SmolStr,
    /// Generator options.
    pub options: SequenceOptions,
}

impl SequenceDecl {
    /// Declare a bigint sequence with default options.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            options: SequenceOptions::default(),
        }
    }

    /// Place the sequence in a schema.
    pub fn in_schema(mut self, schema: impl Into<SmolStr>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the generator options.
    pub fn with_options(mut self, options: SequenceOptions) -> Self {
        self.options = options;
        self
    }
}

/// A policy attached to a table in a separate step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyLink {
    /// Table schema, defaulted when omitted.
    pub schema: Option<SmolStr>,
    /// Table name.
    pub table: SmolStr,
    /// The policy.
    pub policy: Policy,
}

/// A view declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDecl {
    /// Schema, defaulted when omitted.
    pub schema: Option<SmolStr>,
    /// View name.
    pub name: SmolStr,
    /// Query text; absent for existing views.
    pub definition: Option<String>,
    /// `MATERIALIZED`.
    #[serde(default)]
    pub materialized: bool,
    /// `WITH (...)` options.
    #[serde(default)]
    pub with: BTreeMap<String, String>,
    /// `WITH NO DATA`.
    #[serde(default)]
    pub with_no_data: bool,
    /// Access method for materialized views.
    #[serde(default)]
    pub using: Option<SmolStr>,
    /// Managed elsewhere.
    #[serde(default)]
    pub existing: bool,
}

impl ViewDecl {
    /// Declare an ordinary view.
    pub fn new(name: impl Into<SmolStr>, definition: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            definition: Some(definition.into()),
            materialized: false,
            with: BTreeMap::new(),
            with_no_data: false,
            using: None,
            existing: false,
        }
    }

    /// Declare a view managed outside tidemark.
    pub fn existing(name: impl Into<SmolStr>) -> Self {
        let mut decl = Self::new(name, String::new());
        decl.definition = None;
        decl.existing = true;
        decl
    }

    /// Place the view in a schema.
    pub fn in_schema(mut self, schema: impl Into<SmolStr>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Make the view materialized.
    pub fn materialized(mut self) -> Self {
        self.materialized = true;
        self
    }

    /// Add a `WITH` option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }
}

/// A table declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDecl {
    /// Schema, defaulted when omitted.
    pub schema: Option<SmolStr>,
    /// Table name.
    pub name: SmolStr,
    /// Columns in order.
    pub columns: Vec<ColumnDecl>,
    /// Composite primary key.
    #[serde(default)]
    pub primary_key: Option<PrimaryKeyDecl>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDecl>,
    /// Unique constraints.
    #[serde(default)]
    pub uniques: Vec<UniqueDecl>,
    /// Check constraints as `(name, expression)`.
    #[serde(default)]
    pub checks: Vec<(SmolStr, String)>,
    /// Table-level foreign keys.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDecl>,
    /// Inline policies.
    #[serde(default)]
    pub policies: Vec<Policy>,
    /// Explicit RLS switch.
    #[serde(default)]
    pub rls_enabled: bool,
}

impl TableDecl {
    /// Declare a table in the default schema.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            columns: vec![],
            primary_key: None,
            indexes: vec![],
            uniques: vec![],
            checks: vec![],
            foreign_keys: vec![],
            policies: vec![],
            rls_enabled: false,
        }
    }

    /// Place the table in a schema.
    pub fn in_schema(mut self, schema: impl Into<SmolStr>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a column.
    pub fn column(mut self, column: ColumnDecl) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare a composite primary key.
    pub fn primary_key(mut self, decl: PrimaryKeyDecl) -> Self {
        self.primary_key = Some(decl);
        self
    }

    /// Add an index.
    pub fn index(mut self, decl: IndexDecl) -> Self {
        self.indexes.push(decl);
        self
    }

    /// Add a unique constraint.
    pub fn unique(mut self, decl: UniqueDecl) -> Self {
        self.uniques.push(decl);
        self
    }

    /// Add a check constraint.
    pub fn check(mut self, name: impl Into<SmolStr>, expression: impl Into<String>) -> Self {
        self.checks.push((name.into(), expression.into()));
        self
    }

    /// Add a foreign key.
    pub fn foreign_key(mut self, decl: ForeignKeyDecl) -> Self {
        self.foreign_keys.push(decl);
        self
    }

    /// Add an inline policy.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Enable row-level security without any policy.
    pub fn enable_rls(mut self) -> Self {
        self.rls_enabled = true;
        self
    }
}

/// Identity declaration; unset options take type defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityDecl {
    /// Identity flavor.
    pub kind: IdentityKind,
    /// Backing sequence name, derived when omitted.
    pub sequence_name: Option<SmolStr>,
    /// Backing sequence options.
    pub options: Option<SequenceOptions>,
}

/// Inline `UNIQUE` on a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniqueShorthand {
    /// Explicit constraint name.
    pub name: Option<SmolStr>,
    /// `NULLS NOT DISTINCT`.
    pub nulls_not_distinct: bool,
}

/// Inline `REFERENCES` on a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDecl {
    /// Explicit constraint name.
    pub name: Option<SmolStr>,
    /// Target schema, defaulted when omitted.
    pub schema: Option<SmolStr>,
    /// Target table.
    pub table: SmolStr,
    /// Target column.
    pub column: SmolStr,
    /// `ON UPDATE`.
    pub on_update: ReferentialAction,
    /// `ON DELETE`.
    pub on_delete: ReferentialAction,
}

/// A column declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDecl {
    /// Column name.
    pub name: SmolStr,
    /// SQL type, or the enum name for enum columns.
    pub sql_type: String,
    /// Enum column: `Some(schema)` where `None` inside means the default schema.
    #[serde(default)]
    pub enum_schema: Option<Option<SmolStr>>,
    /// Array dimensions.
    #[serde(default)]
    pub dimensions: u8,
    /// NOT NULL.
    #[serde(default)]
    pub not_null: bool,
    /// Inline primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Inline unique.
    #[serde(default)]
    pub unique: Option<UniqueShorthand>,
    /// Default value.
    #[serde(default)]
    pub default: Option<DefaultValue>,
    /// Generated spec.
    #[serde(default)]
    pub generated: Option<GeneratedColumn>,
    /// Identity spec.
    #[serde(default)]
    pub identity: Option<IdentityDecl>,
    /// Auto increment.
    #[serde(default)]
    pub autoincrement: bool,
    /// `ON UPDATE CURRENT_TIMESTAMP`.
    #[serde(default)]
    pub on_update_now: bool,
    /// Inline foreign key.
    #[serde(default)]
    pub references: Option<ReferenceDecl>,
}

impl ColumnDecl {
    /// Declare a nullable column.
    pub fn new(name: impl Into<SmolStr>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            enum_schema: None,
            dimensions: 0,
            not_null: false,
            primary_key: false,
            unique: None,
            default: None,
            generated: None,
            identity: None,
            autoincrement: false,
            on_update_now: false,
            references: None,
        }
    }

    /// Declare a column typed by a user enum in the default schema.
    pub fn enum_column(name: impl Into<SmolStr>, enum_name: impl Into<String>) -> Self {
        let mut decl = Self::new(name, enum_name);
        decl.enum_schema = Some(None);
        decl
    }

    /// Set the schema of the enum type.
    pub fn enum_in_schema(mut self, schema: impl Into<SmolStr>) -> Self {
        self.enum_schema = Some(Some(schema.into()));
        self
    }

    /// Make the column an array.
    pub fn array(mut self, dimensions: u8) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Inline primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Inline unique with a derived name.
    pub fn unique(mut self) -> Self {
        self.unique = Some(UniqueShorthand::default());
        self
    }

    /// Inline unique with an explicit name.
    pub fn unique_named(mut self, name: impl Into<SmolStr>) -> Self {
        self.unique = Some(UniqueShorthand {
            name: Some(name.into()),
            nulls_not_distinct: false,
        });
        self
    }

    /// Typed default.
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Raw SQL default.
    pub fn default_sql(self, expr: impl Into<String>) -> Self {
        self.default(DefaultValue::Sql(expr.into()))
    }

    /// `GENERATED ALWAYS AS (expr) STORED`.
    pub fn generated_stored(mut self, expression: impl Into<String>) -> Self {
        self.generated = Some(GeneratedColumn {
            expression: expression.into(),
            mode: GeneratedMode::Stored,
        });
        self
    }

    /// `GENERATED ALWAYS AS (expr) VIRTUAL`.
    pub fn generated_virtual(mut self, expression: impl Into<String>) -> Self {
        self.generated = Some(GeneratedColumn {
            expression: expression.into(),
            mode: GeneratedMode::Virtual,
        });
        self
    }

    /// `GENERATED ALWAYS AS IDENTITY`.
    pub fn identity_always(mut self) -> Self {
        self.identity = Some(IdentityDecl {
            kind: IdentityKind::Always,
            sequence_name: None,
            options: None,
        });
        self
    }

    /// `GENERATED BY DEFAULT AS IDENTITY`.
    pub fn identity_by_default(mut self) -> Self {
        self.identity = Some(IdentityDecl {
            kind: IdentityKind::ByDefault,
            sequence_name: None,
            options: None,
        });
        self
    }

    /// Override identity sequence options.
    pub fn identity_options(mut self, options: SequenceOptions) -> Self {
        if let Some(identity) = &mut self.identity {
            identity.options = Some(options);
        }
        self
    }

    /// Auto increment.
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// `ON UPDATE CURRENT_TIMESTAMP`.
    pub fn on_update_now(mut self) -> Self {
        self.on_update_now = true;
        self
    }

    /// Inline foreign key to `table(column)`.
    pub fn references(mut self, table: impl Into<SmolStr>, column: impl Into<SmolStr>) -> Self {
        self.references = Some(ReferenceDecl {
            name: None,
            schema: None,
            table: table.into(),
            column: column.into(),
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::NoAction,
        });
        self
    }

    /// Set `ON DELETE` on the inline foreign key.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let Some(reference) = &mut self.references {
            reference.on_delete = action;
        }
        self
    }
}

/// A composite primary key declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeyDecl {
    /// Explicit name.
    pub name: Option<SmolStr>,
    /// Key columns.
    pub columns: Vec<SmolStr>,
}

impl PrimaryKeyDecl {
    /// Declare a primary key with a derived name.
    pub fn new(columns: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Name the constraint.
    pub fn named(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A unique constraint declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueDecl {
    /// Explicit name.
    pub name: Option<SmolStr>,
    /// Constrained columns.
    pub columns: Vec<SmolStr>,
    /// `NULLS NOT DISTINCT`.
    #[serde(default)]
    pub nulls_not_distinct: bool,
}

impl UniqueDecl {
    /// Declare a unique constraint with a derived name.
    pub fn new(columns: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            nulls_not_distinct: false,
        }
    }

    /// Name the constraint.
    pub fn named(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Treat NULLs as equal.
    pub fn nulls_not_distinct(mut self) -> Self {
        self.nulls_not_distinct = true;
        self
    }
}

/// A table-level foreign key declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDecl {
    /// Explicit name.
    pub name: Option<SmolStr>,
    /// Referencing columns.
    pub columns: Vec<SmolStr>,
    /// Target schema, defaulted when omitted.
    pub schema_to: Option<SmolStr>,
    /// Target table.
    pub table_to: SmolStr,
    /// Target columns.
    pub columns_to: Vec<SmolStr>,
    /// `ON UPDATE`.
    #[serde(default)]
    pub on_update: ReferentialAction,
    /// `ON DELETE`.
    #[serde(default)]
    pub on_delete: ReferentialAction,
}

impl ForeignKeyDecl {
    /// Declare `columns` referencing `table_to(columns_to)`.
    pub fn new(
        columns: impl IntoIterator<Item = impl Into<SmolStr>>,
        table_to: impl Into<SmolStr>,
        columns_to: impl IntoIterator<Item = impl Into<SmolStr>>,
    ) -> Self {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            schema_to: None,
            table_to: table_to.into(),
            columns_to: columns_to.into_iter().map(Into::into).collect(),
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::NoAction,
        }
    }

    /// Name the constraint.
    pub fn named(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the target schema.
    pub fn target_schema(mut self, schema: impl Into<SmolStr>) -> Self {
        self.schema_to = Some(schema.into());
        self
    }

    /// Set `ON DELETE`.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Set `ON UPDATE`.
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }
}

/// An index declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDecl {
    /// Explicit name; required for expression indexes.
    pub name: Option<SmolStr>,
    /// Entries in order.
    pub columns: Vec<IndexColumn>,
    /// `UNIQUE`.
    #[serde(default)]
    pub unique: bool,
    /// Access method; `btree` when omitted.
    #[serde(default)]
    pub method: Option<SmolStr>,
    /// `WITH (...)`.
    #[serde(default)]
    pub with: BTreeMap<String, String>,
    /// Partial predicate.
    #[serde(default)]
    pub where_clause: Option<String>,
    /// `CONCURRENTLY`.
    #[serde(default)]
    pub concurrently: bool,
}

impl IndexDecl {
    /// Declare an index over the given entries.
    pub fn on(columns: Vec<IndexColumn>) -> Self {
        Self {
            name: None,
            columns,
            unique: false,
            method: None,
            with: BTreeMap::new(),
            where_clause: None,
            concurrently: false,
        }
    }

    /// Name the index.
    pub fn named(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `UNIQUE`.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the access method.
    pub fn using(mut self, method: impl Into<SmolStr>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Add a storage parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    /// Partial index predicate.
    pub fn where_clause(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    /// Build with `CONCURRENTLY`.
    pub fn concurrently(mut self) -> Self {
        self.concurrently = true;
        self
    }
}
