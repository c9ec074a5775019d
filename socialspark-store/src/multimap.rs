use std::{collections::HashMap, hash::Hash};

/// Ordered values grouped under keys.
///
/// Every key owns a sequence whose order is only changed by the methods below.
/// Buckets that become empty are dropped, so [`OrderedMultimap::contains_key`]
/// means "has at least one value".
#[derive(Clone, Debug)]
pub struct OrderedMultimap<K, V> {
    buckets: HashMap<K, Vec<V>>,
}

impl<K, V> Default for OrderedMultimap<K, V> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> OrderedMultimap<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.buckets.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &K) -> &[V] {
        self.buckets.get(key).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self, key: &K) -> usize {
        self.get(key).len()
    }

    #[must_use]
    pub fn position(&self, key: &K, predicate: impl FnMut(&V) -> bool) -> Option<usize> {
        self.get(key).iter().position(predicate)
    }

    pub fn find_mut(&mut self, key: &K, mut predicate: impl FnMut(&V) -> bool) -> Option<&mut V> {
        self.buckets
            .get_mut(key)?
            .iter_mut()
            .find(|value| predicate(value))
    }

    /// Puts `value` in front of everything else under `key`.
    pub fn push_front(&mut self, key: K, value: V) {
        self.insert_at(key, 0, value);
    }

    /// Inserts `value` at `index` under `key`, or at the end if the bucket has
    /// become shorter than `index` in the meantime.
    pub fn insert_at(&mut self, key: K, index: usize, value: V) {
        let bucket = self.buckets.entry(key).or_default();
        bucket.insert(index.min(bucket.len()), value);
    }

    /// Replaces the first value matching `predicate` in place and hands back
    /// the old value. Nothing happens if no value matches.
    pub fn replace_where(
        &mut self,
        key: &K,
        predicate: impl FnMut(&V) -> bool,
        value: V,
    ) -> Option<V> {
        let slot = self.find_mut(key, predicate)?;
        Some(std::mem::replace(slot, value))
    }

    /// Removes the first value matching `predicate`, returning where it was.
    pub fn remove_where(
        &mut self,
        key: &K,
        predicate: impl FnMut(&V) -> bool,
    ) -> Option<(usize, V)> {
        let bucket = self.buckets.get_mut(key)?;
        let index = bucket.iter().position(predicate)?;
        let value = bucket.remove(index);
        if bucket.is_empty() {
            self.buckets.remove(key);
        }
        Some((index, value))
    }

    /// Removes and returns every value under `key`, in order.
    pub fn take(&mut self, key: &K) -> Vec<V> {
        self.buckets.remove(key).unwrap_or_default()
    }

    /// Replaces everything under `key` with `values`.
    pub fn set(&mut self, key: K, values: Vec<V>) {
        if values.is_empty() {
            self.buckets.remove(&key);
        } else {
            self.buckets.insert(key, values);
        }
    }
}
