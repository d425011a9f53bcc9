//! Key ledger and inverse lookup.
//!
//! The ledger is the ordered list of keys; a key's position in it is the row
//! of its vector in the index. The inverse lookup maps each key back to that
//! position. Both are owned by `VectorDb`, which keeps them in step with the
//! index on every mutation.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

/// Ordered, duplicate-free key sequence.
///
/// `version` increases on every mutation so owners can tell whether anything
/// derived from the ledger (persisted artifacts, cached views) is stale.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyLedger {
    keys: Vec<String>,
    version: u64,
}

impl KeyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes keys as loaded from disk. Duplicate detection is the caller's job
    /// (it falls out of the inverse-lookup consistency check).
    pub fn from_keys(keys: Vec<String>) -> Self {
        Self { keys, version: 0 }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.keys.get(position).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keys
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.keys.iter().map(String::as_str)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn push(&mut self, key: String) -> usize {
        self.keys.push(key);
        self.version += 1;
        self.keys.len() - 1
    }

    /// Drops the keys at `positions` (sorted, deduplicated, in range) in one
    /// pass and returns them in position order.
    pub(crate) fn remove_positions(&mut self, positions: &[usize]) -> Vec<String> {
        if positions.is_empty() {
            return Vec::new();
        }
        let mut removed = Vec::with_capacity(positions.len());
        let mut drop_at = positions.iter().copied().peekable();
        let old = std::mem::take(&mut self.keys);
        self.keys.reserve(old.len().saturating_sub(positions.len()));
        for (position, key) in old.into_iter().enumerate() {
            if drop_at.peek() == Some(&position) {
                drop_at.next();
                removed.push(key);
            } else {
                self.keys.push(key);
            }
        }
        self.version += 1;
        removed
    }
}

/// Key -> row position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InverseLookup {
    positions: FxHashMap<String, usize>,
}

impl InverseLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, u64>) -> Self {
        let positions = map
            .into_iter()
            .map(|(k, p)| (k, usize::try_from(p).unwrap_or(usize::MAX)))
            .collect();
        Self { positions }
    }

    /// Sorted copy with fixed-width positions, used as the persisted form.
    pub fn to_map(&self) -> BTreeMap<String, u64> {
        self.positions
            .iter()
            .map(|(k, &p)| (k.clone(), p as u64))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub(crate) fn insert(&mut self, key: String, position: usize) {
        self.positions.insert(key, position);
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<usize> {
        self.positions.remove(key)
    }

    /// Rewrites the positions of every ledger key from `start` onwards. After
    /// a removal, keys before the first removed position never move.
    pub(crate) fn reindex_from(&mut self, ledger: &KeyLedger, start: usize) {
        for (position, key) in ledger.as_slice().iter().enumerate().skip(start) {
            if let Some(slot) = self.positions.get_mut(key.as_str()) {
                *slot = position;
            } else {
                self.positions.insert(key.clone(), position);
            }
        }
    }

    pub fn rebuild_from(ledger: &KeyLedger) -> Self {
        let mut out = Self::default();
        out.reindex_from(ledger, 0);
        out
    }

    /// First ledger position whose key does not map back to it, or `None`
    /// when the two collections agree exactly.
    pub fn first_mismatch(&self, ledger: &KeyLedger) -> Option<usize> {
        if let Some(position) = ledger
            .iter()
            .enumerate()
            .find_map(|(i, key)| (self.get(key) != Some(i)).then_some(i))
        {
            return Some(position);
        }
        (self.len() != ledger.len()).then_some(ledger.len())
    }
}
