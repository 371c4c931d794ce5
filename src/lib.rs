//! # Tidemark
//!
//! Schema diffing and migration SQL for PostgreSQL, MySQL, SingleStore and
//! SQLite.
//!
//! Tidemark provides:
//! - A flat, dialect-tagged DDL model and a converter from declared schemas
//! - A diff engine that turns two snapshots into ordered migration statements
//! - Interactive-ready rename resolution
//! - Per-dialect SQL generation, including SQLite's table rebuilds
//! - Push-mode data-loss checks
//!
//! ## Quick Start
//!
//! ```rust
//! use tidemark::prelude::*;
//! use tidemark::schema::interim::{ColumnDecl, InterimSchema, TableDecl};
//!
//! let before = to_ddl(
//!     &InterimSchema::new().table(
//!         TableDecl::new("users").column(ColumnDecl::new("id", "serial").primary_key()),
//!     ),
//!     Dialect::Postgresql,
//! )
//! .0;
//! let after = to_ddl(
//!     &InterimSchema::new().table(
//!         TableDecl::new("users")
//!             .column(ColumnDecl::new("id", "serial").primary_key())
//!             .column(ColumnDecl::new("name", "text")),
//!     ),
//!     Dialect::Postgresql,
//! )
//! .0;
//!
//! let result = SchemaDiffer::new(&before, &after).diff()?;
//! assert_eq!(
//!     result.sql_statements,
//!     vec![r#"ALTER TABLE "users" ADD COLUMN "name" text;"#]
//! );
//! # Ok::<(), MigrationError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The DDL model, converter and configuration.
pub mod schema {
    pub use tidemark_schema::*;
}

/// The diff engine and SQL generators.
pub mod migrate {
    pub use tidemark_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        DiffOptions, DiffResult, HintResolver, MigrationError, Resolver, SchemaDiffer, Statement,
        ddl_diff,
    };
    pub use crate::schema::{DdlSnapshot, Dialect, DiffMode, TidemarkConfig, to_ddl};
}

// Re-export key types at the crate root
pub use migrate::{MigrationError, SchemaDiffer};
pub use schema::{DdlSnapshot, Dialect, SchemaError};
