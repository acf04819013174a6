//! Role-tag codec.
//!
//! Policies store their role lists as strings: `#attr` selects every entity
//! carrying the role attribute `attr`, `@id` pins one entity by id. Forms work
//! with a [`RoleSelection`] of attribute names and entity display names
//! instead, and convert at load and save time.
//!
//! Decoding classifies strictly by the first character. Anything that does
//! not start with `@` is a role attribute with its first character removed,
//! whether or not that character was `#`; stored policies rely on this.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::named::NamedAttributeMap;

const NAMED_SIGIL: char = '@';
const ATTRIBUTE_SIGIL: char = '#';

/// One decoded role entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EncodedRole {
    /// `#attr`.
    Attribute(String),
    /// `@id`.
    Named(String),
}

impl EncodedRole {
    /// Classify a stored role string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut chars = raw.chars();
        let first = chars.next();
        let rest = chars.as_str().to_string();
        if first == Some(NAMED_SIGIL) {
            Self::Named(rest)
        } else {
            Self::Attribute(rest)
        }
    }

    /// Wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EncodedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(attr) => write!(f, "{ATTRIBUTE_SIGIL}{attr}"),
            Self::Named(id) => write!(f, "{NAMED_SIGIL}{id}"),
        }
    }
}

/// UI-side selection for one role category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSelection {
    /// Selected role attributes, without `#`.
    pub role_attributes: BTreeSet<String>,
    /// Selected entities, by display name.
    pub named_refs: BTreeSet<String>,
}

impl RoleSelection {
    /// Build a selection from attribute and display-name lists.
    #[must_use]
    pub fn new<A, N>(role_attributes: A, named_refs: N) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self {
            role_attributes: role_attributes.into_iter().map(Into::into).collect(),
            named_refs: named_refs.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.role_attributes.is_empty() && self.named_refs.is_empty()
    }

    /// Parse CLI-style tokens (`#attr` or `@name`) into a selection.
    ///
    /// Unlike stored roles, `@` here carries a display name, not an id.
    #[must_use]
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut selection = Self::default();
        for token in tokens {
            match EncodedRole::parse(token.as_ref()) {
                EncodedRole::Attribute(attr) => selection.role_attributes.insert(attr),
                EncodedRole::Named(name) => selection.named_refs.insert(name),
            };
        }
        selection
    }
}

/// Decode stored roles into a selection, rebuilding both sets from scratch.
///
/// An `@id` that no longer resolves keeps its raw id as the display name.
#[must_use]
pub fn decode<S: AsRef<str>>(encoded: &[S], map: &NamedAttributeMap) -> RoleSelection {
    let inverse = map.invert();
    let mut selection = RoleSelection::default();
    for raw in encoded {
        match EncodedRole::parse(raw.as_ref()) {
            EncodedRole::Named(id) => {
                let name = inverse.name_of(&id).map_or_else(
                    || {
                        debug!(%id, "named role does not resolve to a known entity");
                        id.clone()
                    },
                    str::to_string,
                );
                selection.named_refs.insert(name);
            }
            EncodedRole::Attribute(attr) => {
                selection.role_attributes.insert(attr);
            }
        }
    }
    selection
}

/// Encode a selection: role attributes first, then named refs.
///
/// Named refs missing from `map` are dropped so a stale reference never
/// blocks a save.
#[must_use]
pub fn encode(selection: &RoleSelection, map: &NamedAttributeMap) -> Vec<String> {
    let attributes = selection
        .role_attributes
        .iter()
        .map(|attr| EncodedRole::Attribute(attr.clone()).encode());
    let named = selection.named_refs.iter().filter_map(|name| {
        let id = map.id_of(name);
        if id.is_none() {
            debug!(%name, "dropping stale named role");
        }
        id.map(|id| EncodedRole::Named(id.to_string()).encode())
    });
    attributes.chain(named).collect()
}
