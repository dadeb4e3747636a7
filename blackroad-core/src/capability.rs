//! Capability tags

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Set of capability tags.
///
/// Tags are trimmed and lowercased on insertion; empty tags are dropped and
/// duplicates collapse. Serialized as a sorted string array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(tag: &str) -> Option<String> {
        let tag = tag.trim();
        if tag.is_empty() {
            None
        } else {
            Some(tag.to_lowercase())
        }
    }

    /// Insert a tag. Returns false when it was empty or already present.
    pub fn insert(&mut self, tag: &str) -> bool {
        match Self::normalize(tag) {
            Some(tag) => self.0.insert(tag),
            None => false,
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        Self::normalize(tag).is_some_and(|tag| self.0.contains(&tag))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// True when this set holds at least one of `required`, or `required` is empty.
    pub fn match_any(&self, required: &CapabilitySet) -> bool {
        required.is_empty() || required.0.iter().any(|tag| self.0.contains(tag))
    }

    /// True when this set holds every tag of `required`. Vacuously true for an empty `required`.
    pub fn match_all(&self, required: &CapabilitySet) -> bool {
        required.0.is_subset(&self.0)
    }

    pub fn union(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0.union(&other.0).cloned().collect())
    }
}

impl<S: AsRef<str>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = CapabilitySet::new();
        for tag in iter {
            set.insert(tag.as_ref());
        }
        set
    }
}

impl<'de> Deserialize<'de> for CapabilitySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tags = Vec::<String>::deserialize(deserializer)?;
        Ok(tags.iter().collect())
    }
}
