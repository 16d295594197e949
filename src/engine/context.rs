// ABOUTME: Shared run context threaded through every task of a run
// ABOUTME: Writes are functional updates (prev -> patch) merged into the owned value

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::ops::Deref;

/// A context value that can absorb a partial update derived from its previous
/// value.
pub trait Merge {
    type Patch;

    fn merge(&mut self, patch: Self::Patch);
}

impl<K: Eq + Hash, V> Merge for HashMap<K, V> {
    type Patch = HashMap<K, V>;

    fn merge(&mut self, patch: Self::Patch) {
        self.extend(patch);
    }
}

impl<K: Ord, V> Merge for BTreeMap<K, V> {
    type Patch = BTreeMap<K, V>;

    fn merge(&mut self, patch: Self::Patch) {
        self.extend(patch);
    }
}

/// Owner of the caller's context for the duration of a run.
///
/// Only one task holds `&mut SharedContext` at a time, so there is no lock.
/// There is deliberately no `DerefMut`: every write goes through
/// [`SharedContext::update`] or [`SharedContext::replace_with`].
#[derive(Debug, Clone, Default)]
pub struct SharedContext<C> {
    value: C,
    revision: u64,
}

impl<C> SharedContext<C> {
    pub fn new(value: C) -> Self {
        Self { value, revision: 0 }
    }

    pub fn get(&self) -> &C {
        &self.value
    }

    /// Number of writes applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the whole value with one computed from the previous value.
    pub fn replace_with<F>(&mut self, f: F)
    where
        F: FnOnce(&C) -> C,
    {
        self.value = f(&self.value);
        self.revision += 1;
    }

    pub fn into_inner(self) -> C {
        self.value
    }
}

impl<C: Merge> SharedContext<C> {
    /// Derive a patch from the current value and merge it in.
    pub fn update<F>(&mut self, f: F)
    where
        F: FnOnce(&C) -> C::Patch,
    {
        let patch = f(&self.value);
        self.value.merge(patch);
        self.revision += 1;
    }
}

impl<C> Deref for SharedContext<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_merges_patch() {
        let mut context: SharedContext<HashMap<String, u32>> = SharedContext::default();

        context.update(|_| HashMap::from([("buckets".to_string(), 1)]));
        context.update(|prev| {
            let next = prev.get("buckets").copied().unwrap_or(0) + 1;
            HashMap::from([("buckets".to_string(), next), ("sinks".to_string(), 1)])
        });

        assert_eq!(context.get().get("buckets"), Some(&2));
        assert_eq!(context.get().get("sinks"), Some(&1));
        assert_eq!(context.revision(), 2);
    }

    #[test]
    fn test_replace_with() {
        let mut context = SharedContext::new(vec!["a".to_string()]);
        context.replace_with(|prev| {
            let mut next = prev.clone();
            next.push("b".to_string());
            next
        });

        assert_eq!(context.len(), 2);
        assert_eq!(context.revision(), 1);
        assert_eq!(context.into_inner(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_btree_merge_overwrites_keys() {
        let mut map = BTreeMap::from([("region", "us-east-1")]);
        Merge::merge(&mut map, BTreeMap::from([("region", "eu-west-1"), ("zone", "a")]));

        assert_eq!(map.get("region"), Some(&"eu-west-1"));
        assert_eq!(map.len(), 2);
    }
}
