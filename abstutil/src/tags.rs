use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Convenience functions around a string->string map of OSM-style tags.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new(map: BTreeMap<String, String>) -> Tags {
        Tags(map)
    }

    pub fn empty() -> Tags {
        Tags(BTreeMap::new())
    }

    pub fn get(&self, k: &str) -> Option<&String> {
        self.0.get(k)
    }

    pub fn contains_key(&self, k: &str) -> bool {
        self.0.contains_key(k)
    }

    pub fn has_any(&self, keys: Vec<&str>) -> bool {
        keys.into_iter().any(|key| self.contains_key(key))
    }

    pub fn is(&self, k: &str, v: &str) -> bool {
        self.0.get(k) == Some(&v.to_string())
    }

    pub fn is_any(&self, k: &str, values: Vec<&str>) -> bool {
        if let Some(v) = self.0.get(k) {
            values.contains(&v.as_ref())
        } else {
            false
        }
    }

    /// Parses the value as some type, ignoring anything malformed.
    pub fn parse<T: std::str::FromStr>(&self, k: &str) -> Option<T> {
        self.0.get(k).and_then(|v| v.trim().parse::<T>().ok())
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, k: K, v: V) {
        self.0.insert(k.into(), v.into());
    }

    pub fn remove(&mut self, k: &str) -> Option<String> {
        self.0.remove(k)
    }

    pub fn inner(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Returns (key, value1, value2) for every key where the two tag sets disagree. A missing
    /// value is the empty string.
    pub fn diff(&self, other: &Tags) -> Vec<(String, String, String)> {
        let mut results = Vec::new();
        for (k, v1) in self.inner() {
            let v2 = other.get(k).cloned().unwrap_or_default();
            if v1 != &v2 {
                results.push((k.clone(), v1.clone(), v2));
            }
        }
        for (k, v2) in other.inner() {
            if !self.contains_key(k) {
                results.push((k.clone(), String::new(), v2.clone()));
            }
        }
        results
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Tags {
        Tags(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
