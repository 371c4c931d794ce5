//! # tidemark-migrate
//!
//! Diff engine and SQL generation for tidemark.
//!
//! This crate provides functionality for:
//! - Comparing two [`DdlSnapshot`](tidemark_schema::DdlSnapshot)s of the same
//!   dialect into an ordered list of abstract [`Statement`]s
//! - Resolving renames through a pluggable [`Resolver`]
//! - Rendering statements as SQL for PostgreSQL, MySQL, SingleStore and SQLite
//! - Push-mode data checks against live row counts ([`DataProbe`])
//! - Explaining destructive statements to a human
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ DDL before   │────▶│                │     │             │
//! └──────────────┘     │  Diff engine   │────▶│ Statements  │
//! ┌──────────────┐     │  (+ resolver)  │     │             │
//! │ DDL after    │────▶│                │     └─────────────┘
//! └──────────────┘     └────────────────┘            │
//!                                                    ▼
//!                      ┌────────────────┐     ┌─────────────┐
//!                      │ Data probe     │────▶│ SQL gen     │
//!                      │ (push only)    │     │ per dialect │
//!                      └────────────────┘     └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use tidemark_migrate::{DiffOptions, HintResolver, SchemaDiffer};
//! use tidemark_schema::ddl::{Column, DdlSnapshot, Table};
//! use tidemark_schema::Dialect;
//!
//! let before = DdlSnapshot::new(Dialect::Postgresql);
//! let mut after = DdlSnapshot::new(Dialect::Postgresql);
//! after
//!     .tables
//!     .push(Table::new("public", "users").column(Column::new("id", "integer").not_null()));
//!
//! let result = SchemaDiffer::new(&before, &after)
//!     .with_resolver(&HintResolver::new())
//!     .with_options(DiffOptions::new())
//!     .diff()
//!     .unwrap();
//!
//! assert_eq!(
//!     result.sql_statements,
//!     vec!["CREATE TABLE \"users\" (\n\t\"id\" integer NOT NULL\n);\n"]
//! );
//! ```

pub mod diff;
pub mod error;
pub mod explain;
pub mod logging;
pub mod push;
pub mod resolver;
pub mod sql;
pub mod statement;

pub use diff::{DiffOptions, DiffResult, Loss, LossKind, SchemaDiffer, ddl_diff};
pub use error::{MigrateResult, MigrationError};
pub use explain::{GroupedStatement, explain};
pub use push::{DataProbe, TableStats};
pub use resolver::{EntityKind, HintResolver, Rename, Resolution, Resolver};
pub use sql::{BREAKPOINT, SqlGenerator, generator_for};
pub use statement::{EnumColumnRef, SequenceOption, Statement};
