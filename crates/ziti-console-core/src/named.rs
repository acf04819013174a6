//! Name/id maps for entities that policies can pin by identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::EntityRef;

/// Display name to entity id, rebuilt from a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedAttributeMap(BTreeMap<String, String>);

impl NamedAttributeMap {
    /// Create an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build from a listing; a repeated name keeps the last id seen.
    #[must_use]
    pub fn from_entities<'a>(entities: impl IntoIterator<Item = &'a EntityRef>) -> Self {
        entities
            .into_iter()
            .map(|entity| (entity.name.clone(), entity.id.clone()))
            .collect()
    }

    /// Insert or overwrite a name.
    pub fn insert(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.0.insert(name.into(), id.into());
    }

    /// Id for a display name.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Display names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derive the id to name map.
    #[must_use]
    pub fn invert(&self) -> InverseMap {
        invert(self)
    }
}

impl FromIterator<(String, String)> for NamedAttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for NamedAttributeMap {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .map(|(name, id)| (name.to_string(), id.to_string()))
            .collect()
    }
}

/// Entity id to display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InverseMap(BTreeMap<String, String>);

impl InverseMap {
    /// Display name for an id.
    #[must_use]
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    /// Number of ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Invert a name to id map in one pass.
#[must_use]
pub fn invert(map: &NamedAttributeMap) -> InverseMap {
    InverseMap(
        map.0
            .iter()
            .map(|(name, id)| (id.clone(), name.clone()))
            .collect(),
    )
}
