//! The DDL model: flat, dialect-tagged records describing a database schema.
//!
//! Every entity carries a stable identity key: `(schema, name)` for
//! schema-scoped objects and `(schema, table, name)` for table-scoped ones.
//! Snapshots are plain data; the diff engine never mutates them.

mod constraint;
mod index;
mod policy;
mod snapshot;
mod table;
mod types;
mod view;

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

pub use constraint::{CheckConstraint, ForeignKey, PrimaryKey, ReferentialAction, UniqueConstraint};
pub use index::{Index, IndexColumn, OpClass};
pub use policy::{Policy, PolicyCommand, PolicyType, Role};
pub use snapshot::DdlSnapshot;
pub use table::{Column, GeneratedColumn, GeneratedMode, IdentityColumn, IdentityKind, Table};
pub use types::{DbSchema, Enum, Sequence, SequenceOptions};
pub use view::View;

/// A schema-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Owning schema; empty for dialects without namespaces.
    pub schema: SmolStr,
    /// Object name.
    pub name: SmolStr,
}

impl QualifiedName {
    /// Create a new qualified name.
    pub fn new(schema: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Convert into a resolver key.
    pub fn to_key(&self) -> ObjectKey {
        ObjectKey::new(self.schema.clone(), self.name.clone())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.schema, self.name)
        }
    }
}

/// Identity of any DDL entity, as handed to rename resolvers.
///
/// Displays as the non-empty parts joined with `.`, which is also the
/// format rename hints are written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Owning schema; empty for roles, schemas and namespace-less dialects.
    pub schema: SmolStr,
    /// Owning table for table-scoped entities.
    pub table: Option<SmolStr>,
    /// Entity name.
    pub name: SmolStr,
}

impl ObjectKey {
    /// Key for a schema-scoped entity.
    pub fn new(schema: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            schema: schema.into(),
            table: None,
            name: name.into(),
        }
    }

    /// Key for a table-scoped entity.
    pub fn scoped(
        schema: impl Into<SmolStr>,
        table: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// Key for an entity outside any schema (roles, schemas themselves).
    pub fn bare(name: impl Into<SmolStr>) -> Self {
        Self::new(SmolStr::default(), name)
    }

    /// The schema-qualified part of the key, without the table.
    pub fn qualified(&self) -> QualifiedName {
        QualifiedName::new(self.schema.clone(), self.name.clone())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in [Some(&self.schema), self.table.as_ref(), Some(&self.name)]
            .into_iter()
            .flatten()
        {
            if part.is_empty() {
                continue;
            }
            if !first {
                f.write_str(".")?;
            }
            f.write_str(part)?;
            first = false;
        }
        Ok(())
    }
}
