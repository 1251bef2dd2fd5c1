//! The weighted-map aggregate.
//!
//! [`Odds`] owns a key-indexed map of entries plus a running total, and
//! maintains one invariant at every observable point: the total equals the
//! exact sum of the entry weights. Probabilities are never materialized;
//! `weight / total` is the exact ratio each outcome represents, and every
//! operation manipulates the integers so that ratio stays exact.

use std::fmt;

use hashbrown::HashMap;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::entry::Entry;
use crate::traits::Outcome;

/// An exact weighted distribution over outcomes of type `D`.
pub struct Odds<D: Outcome> {
    pub(crate) map: HashMap<D::Key, Entry<D>>,
    pub(crate) total: BigUint,
}

impl<D: Outcome> Odds<D> {
    /// Create an empty distribution.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            total: BigUint::zero(),
        }
    }

    /// Create an empty distribution with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            total: BigUint::zero(),
        }
    }

    /// An empty distribution sharing this one's configuration.
    ///
    /// Capabilities live in the type rather than on the instance, so this is
    /// equivalent to [`Odds::new`]; it exists to keep derivation explicit at
    /// the call sites that fan a distribution out into sub-distributions.
    pub fn derived(&self) -> Self {
        Self::new()
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the distribution holds no outcomes at all.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The exact sum of all entry weights.
    pub fn total(&self) -> &BigUint {
        &self.total
    }

    /// Look up the entry stored under `key`.
    pub fn get(&self, key: &D::Key) -> Option<&Entry<D>> {
        self.map.get(key)
    }

    /// Look up the entry a payload would collide with, keyed by
    /// `data.key()`. `None` when the outcome is not represented.
    pub fn exists(&self, data: &D) -> Option<&Entry<D>> {
        self.map.get(&data.key())
    }

    /// Iterate the entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry<D>> {
        self.map.values()
    }

    /// Snapshot of all entries, in unspecified order.
    ///
    /// Mutating operations iterate snapshots like this one instead of the
    /// live map, so removal mid-walk is always safe.
    pub fn entries(&self) -> Vec<&Entry<D>> {
        self.map.values().collect()
    }

    /// Snapshot of all entries, sorted by ascending weight contribution.
    pub fn entries_by_weight(&self) -> Vec<&Entry<D>> {
        let mut entries: Vec<&Entry<D>> = self.map.values().collect();
        entries.sort_by(|a, b| a.weight.cmp(&b.weight));
        entries
    }

    /// Drop every entry and reset the total to zero.
    pub fn clear(&mut self) -> &mut Self {
        self.map.clear();
        self.total.set_zero();
        self
    }

    /// Rehash pass: rederive every entry's key from its payload and rebuild
    /// the map, merging any now-colliding entries by weight accumulation.
    ///
    /// Required after any operation that mutates payload data outside the
    /// managed add path. The total is preserved exactly.
    pub fn update_hashes(&mut self) -> &mut Self {
        let stale: Vec<Entry<D>> = self.map.drain().map(|(_, entry)| entry).collect();
        self.total.set_zero();
        for mut entry in stale {
            entry.hash = entry.data.key();
            self.add_entry(entry);
        }
        self
    }
}

impl<D: Outcome> Default for Odds<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Outcome> Clone for Odds<D> {
    /// Full duplication: each payload is cloned, each weight copied as a
    /// fresh integer, and each key rederived from the cloned payload. A key
    /// that differs after cloning means `Clone` and [`Outcome::key`] are
    /// inconsistent for `D`, which is a caller contract violation.
    fn clone(&self) -> Self {
        let mut map = HashMap::with_capacity(self.map.len());
        for entry in self.map.values() {
            let copy = entry.duplicate();
            debug_assert!(
                copy.hash == entry.hash,
                "Outcome::key disagrees with Clone for this payload type"
            );
            map.insert(copy.hash.clone(), copy);
        }
        Self {
            map,
            total: self.total.clone(),
        }
    }
}

impl<D> fmt::Debug for Odds<D>
where
    D: Outcome + fmt::Debug,
    D::Key: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Odds")
            .field("total", &self.total)
            .field("entries", &self.map.values().collect::<Vec<_>>())
            .finish()
    }
}

impl<D> PartialEq for Odds<D>
where
    D: Outcome + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.total == other.total && self.map == other.map
    }
}

impl<D> Eq for Odds<D> where D: Outcome + Eq {}

impl<D> fmt::Display for Odds<D>
where
    D: Outcome,
    D::Key: fmt::Display,
{
    /// Total line followed by key-sorted, width-aligned weight lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total Weight: {}", self.total)?;

        let mut lines: Vec<(String, &BigUint)> = self
            .map
            .values()
            .map(|entry| (entry.hash.to_string(), &entry.weight))
            .collect();
        lines.sort_by(|a, b| a.0.cmp(&b.0));

        let widest = lines.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, weight) in lines {
            write!(f, "\n{key:<widest$}: {weight}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{Face, w};

    #[test]
    fn empty_map_has_zero_total() {
        let odds: Odds<Face> = Odds::new();
        assert!(odds.is_empty());
        assert!(odds.total().is_zero());
    }

    #[test]
    fn exists_finds_by_payload_key() {
        let mut odds = Odds::new();
        odds.add(Face(3), w(4));
        assert!(odds.exists(&Face(3)).is_some());
        assert!(odds.exists(&Face(5)).is_none());
    }

    #[test]
    fn entries_snapshot_covers_every_outcome() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(5));
        odds.add(Face(2), w(0));
        odds.add(Face(3), w(7));

        let snapshot = odds.entries();
        assert_eq!(snapshot.len(), 3);
        let weight_sum: BigUint = snapshot.iter().map(|e| e.weight()).sum();
        assert_eq!(weight_sum, *odds.total());

        let mut keys: Vec<u32> = snapshot.iter().map(|e| *e.key()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn entries_by_weight_sorts_ascending() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(30));
        odds.add(Face(2), w(10));
        odds.add(Face(3), w(20));

        let sorted = odds.entries_by_weight();
        let weights: Vec<u64> = sorted
            .iter()
            .map(|e| u64::try_from(e.weight()).unwrap())
            .collect();
        assert_eq!(weights, vec![10, 20, 30]);
    }

    #[test]
    fn clone_is_a_deep_independent_copy() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(1));
        odds.add(Face(2), w(2));

        let mut copy = odds.clone();
        assert_eq!(copy, odds);

        copy.add(Face(3), w(5));
        assert_eq!(odds.len(), 2);
        assert_eq!(*odds.total(), w(3));
        assert_eq!(*copy.total(), w(8));
    }

    #[test]
    fn update_hashes_merges_collisions_and_preserves_total() {
        let mut odds = Odds::new();
        // Two entries filed under distinct stale keys for the same payload.
        odds.add_entry(Entry::with_key(101, Face(7), w(2)));
        odds.add_entry(Entry::with_key(102, Face(7), w(3)));
        assert_eq!(odds.len(), 2);

        odds.update_hashes();
        assert_eq!(odds.len(), 1);
        assert_eq!(*odds.total(), w(5));
        assert_eq!(*odds.get(&7).unwrap().weight(), w(5));
    }

    #[test]
    fn display_matches_padded_sorted_rendering() {
        let mut odds = Odds::new();
        odds.add(Face(2), w(20));
        odds.add(Face(10), w(1));

        // Keys render as decimal strings and sort lexicographically.
        assert_eq!(format!("{odds}"), "Total Weight: 21\n10: 1\n2 : 20");
    }
}
