use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Indexes into a list, wrapping around in both directions.
pub fn wraparound_get<T>(vec: &[T], idx: isize) -> &T {
    let len = vec.len() as isize;
    let idx = idx % len;
    let idx = if idx >= 0 { idx } else { idx + len };
    &vec[idx as usize]
}

/// A map from keys to sets of values. Keys with no values are removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiMap<K, V>
where
    K: Ord + PartialEq + Clone,
    V: Ord + PartialEq + Clone,
{
    map: BTreeMap<K, BTreeSet<V>>,
    empty: BTreeSet<V>,
}

impl<K, V> Default for MultiMap<K, V>
where
    K: Ord + PartialEq + Clone,
    V: Ord + PartialEq + Clone,
{
    fn default() -> Self {
        MultiMap::new()
    }
}

impl<K, V> MultiMap<K, V>
where
    K: Ord + PartialEq + Clone,
    V: Ord + PartialEq + Clone,
{
    pub fn new() -> MultiMap<K, V> {
        MultiMap {
            map: BTreeMap::new(),
            empty: BTreeSet::new(),
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.map.entry(key).or_insert_with(BTreeSet::new).insert(value);
    }

    pub fn remove(&mut self, key: K, value: V) {
        if !self.map.contains_key(&key) {
            return;
        }
        self.map.get_mut(&key).unwrap().remove(&value);
        if self.map[&key].is_empty() {
            self.map.remove(&key);
        }
    }

    pub fn get(&self, key: K) -> &BTreeSet<V> {
        self.map.get(&key).unwrap_or(&self.empty)
    }

    pub fn set(&mut self, key: K, values: BTreeSet<V>) {
        if values.is_empty() {
            self.map.remove(&key);
        } else {
            self.map.insert(key, values);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn borrow(&self) -> &BTreeMap<K, BTreeSet<V>> {
        &self.map
    }
}

/// Counts how many times each key has been seen.
#[derive(Clone, Debug, Default)]
pub struct Counter<T: Ord + PartialEq + Clone> {
    map: BTreeMap<T, usize>,
    sum: usize,
}

impl<T: Ord + PartialEq + Clone> Counter<T> {
    pub fn new() -> Counter<T> {
        Counter {
            map: BTreeMap::new(),
            sum: 0,
        }
    }

    /// Returns the new count
    pub fn add(&mut self, val: T, amount: usize) -> usize {
        let entry = self.map.entry(val).or_insert(0);
        *entry += amount;
        self.sum += amount;
        *entry
    }

    /// Returns the new count
    pub fn inc(&mut self, val: T) -> usize {
        self.add(val, 1)
    }

    /// If the key is missing, returns 0
    pub fn get(&self, val: T) -> usize {
        self.map.get(&val).cloned().unwrap_or(0)
    }

    pub fn sum(&self) -> usize {
        self.sum
    }

    pub fn borrow(&self) -> &BTreeMap<T, usize> {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraparound() {
        let v = vec![1, 2, 3];
        assert_eq!(*wraparound_get(&v, -1), 3);
        assert_eq!(*wraparound_get(&v, 3), 1);
        assert_eq!(*wraparound_get(&v, 1), 2);
    }

    #[test]
    fn multimap_drops_empty_keys() {
        let mut mm: MultiMap<i64, usize> = MultiMap::new();
        mm.insert(5, 1);
        mm.insert(5, 2);
        mm.remove(5, 1);
        assert_eq!(mm.get(5).len(), 1);
        mm.remove(5, 2);
        assert!(mm.is_empty());
        assert!(mm.get(5).is_empty());
    }

    #[test]
    fn counter() {
        let mut c = Counter::new();
        c.inc("a");
        c.inc("a");
        c.inc("b");
        assert_eq!(c.get("a"), 2);
        assert_eq!(c.get("z"), 0);
        assert_eq!(c.sum(), 3);
    }
}
