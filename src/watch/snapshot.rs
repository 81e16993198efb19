use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Deref;

use tracing::warn;

use super::CacheIdentity;

/// Immutable keyed view of one complete poll result.
///
/// Caches replace snapshots wholesale and hand them out behind an `Arc`, so a
/// listener may keep one for as long as it likes.
#[derive(Debug, Clone)]
pub struct Snapshot<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for Snapshot<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V: PartialEq> PartialEq for Snapshot<K, V> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.entries == other.entries
    }
}

impl<K: Eq + Hash, V: Eq> Eq for Snapshot<K, V> {}

impl<K, V> Deref for Snapshot<K, V> {
    type Target = HashMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl<K, V> Snapshot<K, V> {
    pub fn into_map(self) -> HashMap<K, V> {
        self.entries
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for Snapshot<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Outcome of keying one poll result
pub(crate) struct Conversion<K, V> {
    pub(crate) snapshot: Snapshot<K, V>,
    /// Elements whose key was already taken by an earlier element
    pub(crate) duplicates: usize,
    /// Elements the extractor produced no key for
    pub(crate) dropped: usize,
}

/// Keys `values` with `key_fn`.
///
/// The first element wins on a key collision; elements without a key are
/// skipped. Both are logged and never fail the conversion.
pub fn convert_to_snapshot<K, V, F>(
    identity: &CacheIdentity,
    values: Vec<V>,
    key_fn: F,
) -> Snapshot<K, V>
where
    K: Eq + Hash + Debug,
    F: Fn(&V) -> Option<K>,
{
    convert(identity, values, key_fn).snapshot
}

pub(crate) fn convert<K, V, F>(
    identity: &CacheIdentity,
    values: Vec<V>,
    key_fn: F,
) -> Conversion<K, V>
where
    K: Eq + Hash + Debug,
    F: Fn(&V) -> Option<K>,
{
    let mut entries = HashMap::with_capacity(values.len());
    let mut duplicates = 0;
    let mut dropped = 0;

    for value in values {
        let Some(key) = key_fn(&value) else {
            dropped += 1;
            continue;
        };

        match entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(slot) => {
                duplicates += 1;
                warn!(
                    cache = %identity,
                    key = ?slot.key(),
                    "Duplicate key in poll result, keeping the first occurrence"
                );
            }
        }
    }

    if dropped > 0 {
        warn!(cache = %identity, dropped, "Key extractor returned no key, elements dropped");
    }

    Conversion {
        snapshot: Snapshot { entries },
        duplicates,
        dropped,
    }
}
