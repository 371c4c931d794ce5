//! # tidemark-schema
//!
//! The DDL model tidemark diffs, and everything needed to produce it.
//!
//! - [`ddl`]: dialect-tagged records (tables, columns, indexes, constraints,
//!   enums, sequences, roles, policies, views) collected in a [`DdlSnapshot`]
//! - [`interim`]: the declaration shape a schema DSL or an introspector hands
//!   over
//! - [`convert`]: canonicalization of declarations into snapshots
//! - [`config`]: `tidemark.toml`
//! - [`filter`]: restricting a snapshot to managed entities
//!
//! ## Example
//!
//! ```rust
//! use tidemark_schema::interim::{ColumnDecl, InterimSchema, TableDecl};
//! use tidemark_schema::{Dialect, to_ddl};
//!
//! let declared = InterimSchema::new().table(
//!     TableDecl::new("users")
//!         .column(ColumnDecl::new("id", "serial").primary_key())
//!         .column(ColumnDecl::new("email", "text").not_null().unique()),
//! );
//!
//! let (snapshot, errors) = to_ddl(&declared, Dialect::Postgresql);
//! assert!(errors.is_empty());
//! assert_eq!(snapshot.tables[0].uniques[0].name, "users_email_unique");
//! ```

pub mod config;
pub mod convert;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod interim;
pub mod normalize;

pub use config::{DiffMode, TidemarkConfig};
pub use convert::{render_default, to_ddl};
pub use ddl::{DdlSnapshot, ObjectKey, QualifiedName};
pub use dialect::Dialect;
pub use error::{SchemaError, SchemaResult};
pub use filter::SnapshotFilter;
