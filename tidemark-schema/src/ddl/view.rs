//! Views and materialized views.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::QualifiedName;

/// A view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// Owning schema.
    pub schema: SmolStr,
    /// View name.
    pub name: SmolStr,
    /// Query text.
    #[serde(default)]
    pub definition: Option<String>,
    /// `MATERIALIZED`.
    #[serde(default)]
    pub materialized: bool,
    /// `WITH (...)` options.
    #[serde(default)]
    pub with: BTreeMap<String, String>,
    /// `WITH NO DATA` (materialized only).
    #[serde(default)]
    pub with_no_data: bool,
    /// Access method (materialized only).
    #[serde(default)]
    pub using: Option<SmolStr>,
    /// Managed outside tidemark.
    #[serde(default)]
    pub existing: bool,
}

impl View {
    /// Create an ordinary view.
    pub fn new(
        schema: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            definition: Some(definition.into()),
            materialized: false,
            with: BTreeMap::new(),
            with_no_data: false,
            using: None,
            existing: false,
        }
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

    /// Identity key.
    pub fn key(&self) -> QualifiedName {
        QualifiedName::new(self.schema.clone(), self.name.clone())
    }
}
