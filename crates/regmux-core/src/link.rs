//! Reference-counted link table.
//!
//! Every `add` of a link must be matched by a `remove`; a link is live while
//! its count is above zero. Counts never go negative: removing a link that is
//! not live is a no-op.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{InstanceId, RegLink, RegistryId};

/// Link counts grouped by instance, then registry.
///
/// This is also the shape the host reports links in.
pub type LinkCounts = BTreeMap<InstanceId, BTreeMap<RegistryId, u32>>;

/// The outbound links of one registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkTable {
    counts: LinkCounts,
}

impl LinkTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table from reported counts, dropping zero entries.
    pub fn from_counts(counts: LinkCounts) -> Self {
        let mut table = Self::new();
        for (instance, registries) in counts {
            for (registry, count) in registries {
                if count > 0 {
                    table
                        .counts
                        .entry(instance.clone())
                        .or_default()
                        .insert(registry, count);
                }
            }
        }
        table
    }

    /// Increment the count for `link`, returning the new count.
    pub fn add(&mut self, link: &RegLink) -> u32 {
        let count = self
            .counts
            .entry(link.instance.clone())
            .or_default()
            .entry(link.registry.clone())
            .or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Decrement the count for `link`, returning the new count.
    pub fn remove(&mut self, link: &RegLink) -> u32 {
        let Some(registries) = self.counts.get_mut(&link.instance) else {
            return 0;
        };
        let Some(count) = registries.get_mut(&link.registry) else {
            return 0;
        };

        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            registries.remove(&link.registry);
            if registries.is_empty() {
                self.counts.remove(&link.instance);
            }
        }
        remaining
    }

    /// Current count for `link`.
    pub fn count(&self, link: &RegLink) -> u32 {
        self.counts
            .get(&link.instance)
            .and_then(|registries| registries.get(&link.registry))
            .copied()
            .unwrap_or(0)
    }

    /// Whether `link` is live.
    pub fn contains(&self, link: &RegLink) -> bool {
        self.count(link) > 0
    }

    /// All live links.
    pub fn links(&self) -> BTreeSet<RegLink> {
        self.counts
            .iter()
            .flat_map(|(instance, registries)| {
                registries
                    .keys()
                    .map(move |registry| RegLink::new(instance.clone(), registry.clone()))
            })
            .collect()
    }

    /// Raw counts.
    pub fn counts(&self) -> &LinkCounts {
        &self.counts
    }

    /// Whether no link is live.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn link(instance: &str) -> RegLink {
        RegLink::new(instance, "0")
    }

    #[test]
    fn test_refcount_add_add_remove() {
        let mut table = LinkTable::new();
        let l = link("a");

        assert_eq!(table.add(&l), 1);
        assert_eq!(table.add(&l), 2);
        assert_eq!(table.remove(&l), 1);
        assert!(table.links().contains(&l));

        assert_eq!(table.remove(&l), 0);
        assert!(!table.links().contains(&l));
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut table = LinkTable::new();
        assert_eq!(table.remove(&link("ghost")), 0);
        assert_eq!(table.count(&link("ghost")), 0);

        table.add(&link("a"));
        assert_eq!(table.remove(&RegLink::new("a", "other")), 0);
        assert_eq!(table.count(&link("a")), 1);
    }

    #[test]
    fn test_distinct_registries_on_same_instance() {
        let mut table = LinkTable::new();
        table.add(&RegLink::new("a", "0"));
        table.add(&RegLink::new("a", "1"));

        let links = table.links();
        assert_eq!(links.len(), 2);

        table.remove(&RegLink::new("a", "0"));
        assert_eq!(table.links().into_iter().collect::<Vec<_>>(), vec![RegLink::new("a", "1")]);
    }

    #[test]
    fn test_counts_json_shape() {
        let mut table = LinkTable::new();
        table.add(&link("a"));
        table.add(&link("a"));
        table.add(&link("b"));

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json, serde_json::json!({"a": {"0": 2}, "b": {"0": 1}}));
    }

    #[test]
    fn test_from_counts_drops_zero() {
        let mut counts = LinkCounts::new();
        counts
            .entry(InstanceId::from("a"))
            .or_default()
            .insert(RegistryId::root(), 0);
        counts
            .entry(InstanceId::from("b"))
            .or_default()
            .insert(RegistryId::root(), 3);

        let table = LinkTable::from_counts(counts);
        assert!(!table.contains(&link("a")));
        assert_eq!(table.count(&link("b")), 3);
    }

    proptest! {
        #[test]
        fn prop_live_iff_adds_exceed_removes(ops in prop::collection::vec(any::<bool>(), 0..64)) {
            let mut table = LinkTable::new();
            let l = link("a");
            let mut expected: u32 = 0;

            for add in ops {
                if add {
                    table.add(&l);
                    expected += 1;
                } else {
                    table.remove(&l);
                    expected = expected.saturating_sub(1);
                }
                prop_assert_eq!(table.count(&l), expected);
                prop_assert_eq!(table.contains(&l), expected > 0);
            }
        }
    }
}
