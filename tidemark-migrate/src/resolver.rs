//! Rename resolution.
//!
//! Whenever an entity kind has keys present only in `before` and keys present
//! only in `after`, the diff engine asks a [`Resolver`] which pairs are
//! renames. Everything left over is dropped or created.
//!
//! ```rust
//! use tidemark_migrate::resolver::{EntityKind, HintResolver, Resolver};
//! use tidemark_schema::ObjectKey;
//!
//! let resolver = HintResolver::parse(["public.users->public.accounts"]).unwrap();
//! let resolution = resolver
//!     .resolve(
//!         EntityKind::Table,
//!         &[ObjectKey::new("public", "users")],
//!         &[ObjectKey::new("public", "accounts")],
//!     )
//!     .unwrap();
//! assert_eq!(resolution.renamed.len(), 1);
//! assert!(resolution.created.is_empty());
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tidemark_schema::{ObjectKey, TidemarkConfig};
use tracing::{trace, warn};

use crate::error::{MigrateResult, MigrationError};

/// Entity kinds handed to a resolver, in the order the engine asks about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Postgres schemas.
    Schema,
    /// Enum types.
    Enum,
    /// Sequences.
    Sequence,
    /// Roles.
    Role,
    /// Tables.
    Table,
    /// Columns of a surviving table.
    Column,
    /// Indexes of a surviving table.
    Index,
    /// Policies of a surviving table.
    Policy,
    /// Views and materialized views.
    View,
}

impl EntityKind {
    /// Lowercase plural name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schemas",
            Self::Enum => "enums",
            Self::Sequence => "sequences",
            Self::Role => "roles",
            Self::Table => "tables",
            Self::Column => "columns",
            Self::Index => "indexes",
            Self::Policy => "policies",
            Self::View => "views",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = ();

    /// Parse the singular name used as a hint prefix, e.g. `column`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schema" => Ok(Self::Schema),
            "enum" => Ok(Self::Enum),
            "sequence" => Ok(Self::Sequence),
            "role" => Ok(Self::Role),
            "table" => Ok(Self::Table),
            "column" => Ok(Self::Column),
            "index" => Ok(Self::Index),
            "policy" => Ok(Self::Policy),
            "view" => Ok(Self::View),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rename decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    /// Key in `before`.
    pub from: ObjectKey,
    /// Key in `after`.
    pub to: ObjectKey,
}

/// A resolver's answer for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Pairs treated as renames.
    pub renamed: Vec<Rename>,
    /// Added keys treated as new entities.
    pub created: Vec<ObjectKey>,
    /// Removed keys treated as dropped entities.
    pub deleted: Vec<ObjectKey>,
}

impl Resolution {
    /// Everything is a drop or a create.
    pub fn drop_create(removed: &[ObjectKey], added: &[ObjectKey]) -> Self {
        Self {
            renamed: Vec::new(),
            created: added.to_vec(),
            deleted: removed.to_vec(),
        }
    }

    /// Check that the resolution partitions `removed` and `added` exactly.
    pub fn validate(
        &self,
        kind: EntityKind,
        removed: &[ObjectKey],
        added: &[ObjectKey],
    ) -> MigrateResult<()> {
        let removed_set: HashSet<&ObjectKey> = removed.iter().collect();
        let added_set: HashSet<&ObjectKey> = added.iter().collect();

        let mut seen_removed = HashSet::new();
        for key in self
            .renamed
            .iter()
            .map(|r| &r.from)
            .chain(self.deleted.iter())
        {
            if !removed_set.contains(key) {
                return Err(MigrationError::inconsistent(
                    kind.as_str(),
                    format!("{} was not offered as a removed key", key),
                ));
            }
            if !seen_removed.insert(key) {
                return Err(MigrationError::inconsistent(
                    kind.as_str(),
                    format!("{} resolved more than once", key),
                ));
            }
        }

        let mut seen_added = HashSet::new();
        for key in self
            .renamed
            .iter()
            .map(|r| &r.to)
            .chain(self.created.iter())
        {
            if !added_set.contains(key) {
                return Err(MigrationError::inconsistent(
                    kind.as_str(),
                    format!("{} was not offered as an added key", key),
                ));
            }
            if !seen_added.insert(key) {
                return Err(MigrationError::inconsistent(
                    kind.as_str(),
                    format!("{} resolved more than once", key),
                ));
            }
        }

        if seen_removed.len() != removed_set.len() {
            return Err(MigrationError::inconsistent(
                kind.as_str(),
                format!(
                    "{} of {} removed keys left unresolved",
                    removed_set.len() - seen_removed.len(),
                    removed_set.len()
                ),
            ));
        }
        if seen_added.len() != added_set.len() {
            return Err(MigrationError::inconsistent(
                kind.as_str(),
                format!(
                    "{} of {} added keys left unresolved",
                    added_set.len() - seen_added.len(),
                    added_set.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Decides which removed/added pairs are renames.
///
/// Interactive implementations (prompting a human) live outside this crate
/// and implement the same trait.
pub trait Resolver {
    /// Resolve one entity kind.
    fn resolve(
        &self,
        kind: EntityKind,
        removed: &[ObjectKey],
        added: &[ObjectKey],
    ) -> MigrateResult<Resolution>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn resolve(
        &self,
        kind: EntityKind,
        removed: &[ObjectKey],
        added: &[ObjectKey],
    ) -> MigrateResult<Resolution> {
        (**self).resolve(kind, removed, added)
    }
}

/// A resolver that applies an explicit list of `old->new` hints.
///
/// Keys are matched against their display form (`schema.name`,
/// `schema.table.name`, or just `name` without a schema). A hint may carry a
/// kind prefix, `column:public.users.a->public.users.b`, to restrict it to
/// that entity kind; unprefixed hints apply to every kind. A hint that does
/// not pair exactly one removed key with one added key of the kind being
/// resolved is ignored, so absent hints always mean drop + create.
#[derive(Debug, Clone, Default)]
pub struct HintResolver {
    hints: Vec<Hint>,
}

#[derive(Debug, Clone)]
struct Hint {
    kind: Option<EntityKind>,
    from: String,
    to: String,
}

impl Hint {
    fn applies_to(&self, kind: EntityKind) -> bool {
        self.kind.is_none_or(|k| k == kind)
    }
}

impl HintResolver {
    /// A resolver with no hints.
    pub const fn new() -> Self {
        Self { hints: Vec::new() }
    }

    /// Add a hint for every entity kind.
    pub fn with_hint(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.hints.push(Hint {
            kind: None,
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Add a hint for one entity kind.
    pub fn with_kind_hint(
        mut self,
        kind: EntityKind,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.hints.push(Hint {
            kind: Some(kind),
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Parse hints written as `old->new` or `kind:old->new`.
    pub fn parse(hints: impl IntoIterator<Item = impl AsRef<str>>) -> MigrateResult<Self> {
        let mut resolver = Self::new();
        for hint in hints {
            let hint = hint.as_ref();
            let (from, to) = hint
                .split_once("->")
                .map(|(from, to)| (from.trim(), to.trim()))
                .filter(|(from, to)| !from.is_empty() && !to.is_empty())
                .ok_or_else(|| MigrationError::invalid_hint(hint))?;
            resolver = match from.split_once(':') {
                Some((kind, from)) => {
                    let kind = kind
                        .trim()
                        .parse()
                        .map_err(|_| MigrationError::invalid_hint(hint))?;
                    let from = from.trim();
                    if from.is_empty() {
                        return Err(MigrationError::invalid_hint(hint));
                    }
                    resolver.with_kind_hint(kind, from, to)
                }
                None => resolver.with_hint(from, to),
            };
        }
        Ok(resolver)
    }

    /// Build from the `[diff] renames` list of a config.
    pub fn from_config(config: &TidemarkConfig) -> MigrateResult<Self> {
        Self::parse(&config.diff.renames)
    }

    /// Number of hints.
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    /// Whether there are no hints.
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

impl Resolver for HintResolver {
    fn resolve(
        &self,
        kind: EntityKind,
        removed: &[ObjectKey],
        added: &[ObjectKey],
    ) -> MigrateResult<Resolution> {
        if removed.is_empty() || added.is_empty() || self.hints.is_empty() {
            return Ok(Resolution::drop_create(removed, added));
        }

        let mut renamed = Vec::new();
        let mut used_removed: HashSet<usize> = HashSet::new();
        let mut used_added: HashSet<usize> = HashSet::new();

        for Hint { from, to, .. } in self.hints.iter().filter(|h| h.applies_to(kind)) {
            let from_idx: Vec<usize> = removed
                .iter()
                .enumerate()
                .filter(|(i, k)| !used_removed.contains(i) && k.to_string() == *from)
                .map(|(i, _)| i)
                .collect();
            let to_idx: Vec<usize> = added
                .iter()
                .enumerate()
                .filter(|(i, k)| !used_added.contains(i) && k.to_string() == *to)
                .map(|(i, _)| i)
                .collect();

            match (from_idx.as_slice(), to_idx.as_slice()) {
                ([f], [t]) => {
                    trace!(%kind, from = %from, to = %to, "hint applied");
                    used_removed.insert(*f);
                    used_added.insert(*t);
                    renamed.push(Rename {
                        from: removed[*f].clone(),
                        to: added[*t].clone(),
                    });
                }
                ([], []) => {}
                _ => warn!(%kind, from = %from, to = %to, "hint does not pair one removed with one added key"),
            }
        }

        let deleted = removed
            .iter()
            .enumerate()
            .filter(|(i, _)| !used_removed.contains(i))
            .map(|(_, k)| k.clone())
            .collect();
        let created = added
            .iter()
            .enumerate()
            .filter(|(i, _)| !used_added.contains(i))
            .map(|(_, k)| k.clone())
            .collect();

        Ok(Resolution {
            renamed,
            created,
            deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(name: &str) -> ObjectKey {
        ObjectKey::new("public", name)
    }

    // ==================== HintResolver Tests ====================

    #[test]
    fn test_no_hints_is_drop_create() {
        let resolver = HintResolver::new();
        let resolution = resolver
            .resolve(EntityKind::Table, &[table("a")], &[table("b")])
            .unwrap();
        assert!(resolution.renamed.is_empty());
        assert_eq!(resolution.deleted, vec![table("a")]);
        assert_eq!(resolution.created, vec![table("b")]);
    }

    #[test]
    fn test_hint_pairs_keys() {
        let resolver = HintResolver::parse(["public.users->public.accounts"]).unwrap();
        let resolution = resolver
            .resolve(
                EntityKind::Table,
                &[table("users"), table("logs")],
                &[table("accounts")],
            )
            .unwrap();
        assert_eq!(
            resolution.renamed,
            vec![Rename {
                from: table("users"),
                to: table("accounts"),
            }]
        );
        assert_eq!(resolution.deleted, vec![table("logs")]);
        assert!(resolution.created.is_empty());
    }

    #[test]
    fn test_column_hint_uses_scoped_key() {
        let resolver = HintResolver::parse(["public.users.name->public.users.full_name"]).unwrap();
        let resolution = resolver
            .resolve(
                EntityKind::Column,
                &[ObjectKey::scoped("public", "users", "name")],
                &[ObjectKey::scoped("public", "users", "full_name")],
            )
            .unwrap();
        assert_eq!(resolution.renamed.len(), 1);
    }

    #[test]
    fn test_hint_for_other_kind_ignored() {
        let resolver = HintResolver::parse(["public.users->public.accounts"]).unwrap();
        let resolution = resolver
            .resolve(
                EntityKind::Column,
                &[ObjectKey::scoped("public", "users", "a")],
                &[ObjectKey::scoped("public", "users", "b")],
            )
            .unwrap();
        assert!(resolution.renamed.is_empty());
    }

    #[test]
    fn test_kind_prefix_restricts_hint() {
        let resolver =
            HintResolver::parse(["column:public.users.a->public.users.b"]).unwrap();
        let removed = [ObjectKey::scoped("public", "users", "a")];
        let added = [ObjectKey::scoped("public", "users", "b")];

        let columns = resolver
            .resolve(EntityKind::Column, &removed, &added)
            .unwrap();
        assert_eq!(columns.renamed.len(), 1);

        let indexes = resolver
            .resolve(EntityKind::Index, &removed, &added)
            .unwrap();
        assert!(indexes.renamed.is_empty());
        assert_eq!(indexes.deleted, removed.to_vec());
        assert_eq!(indexes.created, added.to_vec());
    }

    #[test]
    fn test_unknown_kind_prefix_rejected() {
        assert!(matches!(
            HintResolver::parse(["colum:public.users.a->public.users.b"]),
            Err(MigrationError::InvalidHint(_))
        ));
        assert!(HintResolver::parse(["column:->b"]).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            HintResolver::parse(["users"]),
            Err(MigrationError::InvalidHint(_))
        ));
        assert!(HintResolver::parse(["->b"]).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = TidemarkConfig::from_str("[diff]\nrenames = [\"a->b\"]\n").unwrap();
        let resolver = HintResolver::from_config(&config).unwrap();
        assert_eq!(resolver.len(), 1);
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_accepts_partition() {
        let resolution = Resolution {
            renamed: vec![Rename {
                from: table("a"),
                to: table("b"),
            }],
            created: vec![table("c")],
            deleted: vec![],
        };
        assert!(
            resolution
                .validate(EntityKind::Table, &[table("a")], &[table("b"), table("c")])
                .is_ok()
        );
    }

    #[test]
    fn test_validate_rejects_duplicate() {
        let resolution = Resolution {
            renamed: vec![Rename {
                from: table("a"),
                to: table("b"),
            }],
            created: vec![],
            deleted: vec![table("a")],
        };
        let err = resolution
            .validate(EntityKind::Table, &[table("a")], &[table("b")])
            .unwrap_err();
        assert!(matches!(err, MigrationError::InconsistentResolution { .. }));
    }

    #[test]
    fn test_validate_rejects_unknown_key() {
        let resolution = Resolution {
            renamed: vec![],
            created: vec![table("zzz")],
            deleted: vec![table("a")],
        };
        assert!(
            resolution
                .validate(EntityKind::Table, &[table("a")], &[])
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_missing_key() {
        let resolution = Resolution::default();
        assert!(
            resolution
                .validate(EntityKind::Table, &[table("a")], &[])
                .is_err()
        );
    }
}
