//! Access-scope descriptors.
//!
//! A target names the actions, the resource type and the resource
//! identifiers/attributes a rule applies to. Each set dimension may hold the
//! [`WILDCARD`] sentinel instead of literal values.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Sentinel member meaning "every value" for a set dimension.
///
/// Only meaningful as the sole member of its set; mixing it with literals is
/// rejected by the authoring validation.
pub const WILDCARD: &str = "*";

// ============================================================================
// Target
// ============================================================================

/// The scope a policy or an exception rule applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Actions covered (e.g. "read", "edit", "delete").
    pub actions: BTreeSet<String>,
    /// Resource type (e.g. "document").
    pub resource_type: String,
    /// Resource identifiers, or `{"*"}` for all.
    pub identifiers: BTreeSet<String>,
    /// Resource attributes, or `{"*"}` for all.
    pub attributes: BTreeSet<String>,
}

impl Target {
    /// Creates a target for `resource_type` with every set dimension empty.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = collect_set(actions);
        self
    }

    pub fn with_identifiers<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifiers = collect_set(identifiers);
        self
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = collect_set(attributes);
        self
    }

    /// Returns true when every resource identifier is covered.
    pub fn covers_all_identifiers(&self) -> bool {
        is_wildcard(&self.identifiers)
    }

    /// Returns true when every resource attribute is covered.
    pub fn covers_all_attributes(&self) -> bool {
        is_wildcard(&self.attributes)
    }
}

// ============================================================================
// Set helpers
// ============================================================================

/// Collects string-likes into an ordered set.
pub fn collect_set<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

/// Returns true if `set` is exactly `{"*"}`.
pub fn is_wildcard(set: &BTreeSet<String>) -> bool {
    set.len() == 1 && set.contains(WILDCARD)
}

/// Returns true if `set` holds the wildcard next to literal members.
pub fn mixes_wildcard(set: &BTreeSet<String>) -> bool {
    set.len() > 1 && set.contains(WILDCARD)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_into_ordered_sets() {
        let target = Target::new("document")
            .with_actions(["read", "edit", "read"])
            .with_identifiers(["42"]);

        assert_eq!(target.resource_type, "document");
        assert_eq!(
            target.actions.iter().collect::<Vec<_>>(),
            vec!["edit", "read"]
        );
        assert!(target.attributes.is_empty());
    }

    #[test]
    fn wildcard_detection() {
        let all = collect_set(["*"]);
        let mixed = collect_set(["*", "42"]);
        let literal = collect_set(["42"]);

        assert!(is_wildcard(&all));
        assert!(!mixes_wildcard(&all));

        assert!(!is_wildcard(&mixed));
        assert!(mixes_wildcard(&mixed));

        assert!(!is_wildcard(&literal));
        assert!(!mixes_wildcard(&literal));
    }

    #[test]
    fn covers_all_follows_the_sentinel() {
        let target = Target::new("document")
            .with_identifiers(["*"])
            .with_attributes(["title"]);

        assert!(target.covers_all_identifiers());
        assert!(!target.covers_all_attributes());
    }
}
