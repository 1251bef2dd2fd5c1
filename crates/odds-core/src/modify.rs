//! Additions, removals, replacements, and the arithmetic adjustments.
//!
//! Everything here preserves the aggregate invariant exactly: the total and
//! the entry-weight sum move by the same delta in every operation. The
//! adjustment pair at the bottom ([`Odds::scale`] / [`Odds::reduce`]) is
//! what lets the higher layers compare and recombine fractional weights by
//! cross-multiplication instead of division.

use hashbrown::hash_map::Entry as MapSlot;
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use odds_error::{OddsError, Result};

use crate::entry::Entry;
use crate::odds::Odds;
use crate::traits::{Combine, Outcome};

impl<D: Outcome> Odds<D> {
    /// Add an outcome with the given weight. If the payload's key is already
    /// present the weight accumulates onto the existing entry; otherwise the
    /// payload is inserted as-is (no copy). Zero weights are legal and the
    /// entry persists until explicitly removed.
    pub fn add(&mut self, data: D, weight: BigUint) {
        self.add_entry(Entry::new(data, weight));
    }

    /// Add a pre-built entry, accumulating weight on key collision.
    pub fn add_entry(&mut self, entry: Entry<D>) {
        self.total += &entry.weight;
        match self.map.entry(entry.hash.clone()) {
            MapSlot::Occupied(mut slot) => {
                slot.get_mut().weight += entry.weight;
            }
            MapSlot::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }

    /// Remove the entry stored under `hash`, returning its weight.
    ///
    /// The returned integer is moved out of the map, so the caller owns it
    /// outright; the removed entry no longer belongs to any distribution.
    pub fn remove_hash(&mut self, hash: &D::Key) -> Option<BigUint> {
        self.take_hash(hash).map(|entry| entry.weight)
    }

    /// Remove the entry matching `data.key()`, returning its weight.
    pub fn remove_data(&mut self, data: &D) -> Option<BigUint> {
        self.remove_hash(&data.key())
    }

    /// Remove the entry under `entry`'s key, returning its weight.
    pub fn remove_entry(&mut self, entry: &Entry<D>) -> Option<BigUint> {
        self.remove_hash(&entry.hash)
    }

    /// Remove and return the whole entry stored under `hash`.
    pub(crate) fn take_hash(&mut self, hash: &D::Key) -> Option<Entry<D>> {
        let entry = self.map.remove(hash)?;
        self.total -= &entry.weight;
        Some(entry)
    }

    /// Best-effort removal of every entry whose key exists in `subset`.
    /// Returns the actual total weight removed, which may be less than
    /// `subset.total()` when some keys are absent.
    pub fn remove_subset(&mut self, subset: &Odds<D>) -> BigUint {
        let mut removed = BigUint::zero();
        for hash in subset.map.keys() {
            if let Some(weight) = self.remove_hash(hash) {
                removed += weight;
            }
        }
        removed
    }

    /// Insert `incoming` so that it collectively represents exactly `weight`
    /// units out of the combined total.
    ///
    /// Scaling goes through `gcd(incoming.total, weight)` to find the
    /// minimal mutual factors: the receiver is scaled by the reduced
    /// incoming total and the incoming map by the reduced weight before the
    /// merge, which keeps the integers far smaller than the naive
    /// cross-multiplication would.
    pub fn add_odds(&mut self, mut incoming: Odds<D>, weight: &BigUint) -> Result<&mut Self> {
        if weight.is_zero() {
            return Err(OddsError::ZeroProportion);
        }
        if incoming.total.is_zero() {
            return Err(OddsError::EmptyExpansion);
        }

        let gcd = incoming.total.gcd(weight);
        let reduced_total = &incoming.total / &gcd;
        let reduced_weight = weight / &gcd;

        self.scale(&reduced_total);
        incoming.scale(&reduced_weight);
        self.merge([incoming]);
        Ok(self)
    }

    /// Remove every entry of `subset` and redistribute the removed weight
    /// across `incoming`, preserving all ratios exactly.
    pub fn replace_subset_with_odds(
        &mut self,
        subset: &Odds<D>,
        incoming: Odds<D>,
    ) -> Result<&mut Self> {
        let removed = self.remove_subset(subset);
        if removed.is_zero() {
            return Err(OddsError::NothingRemoved);
        }
        self.add_odds(incoming, &removed)
    }

    /// Remove every entry of `subset` and hand its entire weight to a single
    /// replacement outcome.
    pub fn replace_subset_with_data(&mut self, subset: &Odds<D>, data: D) -> Result<&mut Self> {
        let removed = self.remove_subset(subset);
        if removed.is_zero() {
            return Err(OddsError::NothingRemoved);
        }
        self.add(data, removed);
        Ok(self)
    }

    /// Remove the entry under `hash` and redistribute its weight across
    /// `incoming`.
    pub fn replace_hash_with_odds(&mut self, hash: &D::Key, incoming: Odds<D>) -> Result<&mut Self> {
        match self.remove_hash(hash) {
            Some(removed) if !removed.is_zero() => self.add_odds(incoming, &removed),
            _ => Err(OddsError::NothingRemoved),
        }
    }

    /// Remove the entry under `hash` and hand its weight to `data`.
    pub fn replace_hash_with_data(&mut self, hash: &D::Key, data: D) -> Result<&mut Self> {
        match self.remove_hash(hash) {
            Some(removed) if !removed.is_zero() => {
                self.add(data, removed);
                Ok(self)
            }
            _ => Err(OddsError::NothingRemoved),
        }
    }

    /// Remove the entry matching `remove` and redistribute its weight across
    /// `incoming`.
    pub fn replace_data_with_odds(&mut self, remove: &D, incoming: Odds<D>) -> Result<&mut Self> {
        self.replace_hash_with_odds(&remove.key(), incoming)
    }

    /// Remove the entry matching `remove` and hand its weight to `data`.
    pub fn replace_data_with_data(&mut self, remove: &D, data: D) -> Result<&mut Self> {
        self.replace_hash_with_data(&remove.key(), data)
    }

    /// Remove `entry`'s counterpart and redistribute its weight across
    /// `incoming`.
    pub fn replace_entry_with_odds(
        &mut self,
        entry: &Entry<D>,
        incoming: Odds<D>,
    ) -> Result<&mut Self> {
        self.replace_hash_with_odds(&entry.hash, incoming)
    }

    /// Remove `entry`'s counterpart and hand its weight to `data`.
    pub fn replace_entry_with_data(&mut self, entry: &Entry<D>, data: D) -> Result<&mut Self> {
        self.replace_hash_with_data(&entry.hash, data)
    }

    /// Multiply every weight and the total by `factor`.
    ///
    /// Used to lift two distributions onto a common denominator before
    /// arithmetic that would otherwise need fractions.
    pub fn scale(&mut self, factor: &BigUint) -> &mut Self {
        for entry in self.map.values_mut() {
            entry.weight *= factor;
        }
        self.total *= factor;
        self
    }

    /// Divide every weight and the total by the GCD of all weights.
    ///
    /// Ratios are unchanged; only magnitudes shrink. Without this, repeated
    /// convolution and expansion grow the integers without bound. No-op on
    /// an empty or all-zero map.
    pub fn reduce(&mut self) -> &mut Self {
        if self.total.is_zero() {
            return self;
        }

        let mut gcd: Option<BigUint> = None;
        for entry in self.map.values() {
            let next = match gcd {
                None => entry.weight.clone(),
                Some(current) => current.gcd(&entry.weight),
            };
            if next.is_one() {
                return self;
            }
            gcd = Some(next);
        }

        if let Some(gcd) = gcd {
            for entry in self.map.values_mut() {
                entry.weight /= &gcd;
            }
            self.total /= &gcd;
        }
        self
    }
}

impl<D: Combine> Odds<D> {
    /// [`Odds::add`], folding colliding payloads with [`Combine::combine`].
    pub fn add_combine(&mut self, data: D, weight: BigUint) {
        self.add_entry_combine(Entry::new(data, weight));
    }

    /// [`Odds::add_entry`], folding colliding payloads with
    /// [`Combine::combine`].
    pub fn add_entry_combine(&mut self, entry: Entry<D>) {
        self.total += &entry.weight;
        match self.map.entry(entry.hash.clone()) {
            MapSlot::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.weight += entry.weight;
                existing.data = existing.data.combine(&entry.data);
            }
            MapSlot::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }

    /// [`Odds::add`], folding colliding payloads with
    /// [`Combine::combine_in_place`].
    pub fn add_combine_in_place(&mut self, data: D, weight: BigUint) {
        self.add_entry_combine_in_place(Entry::new(data, weight));
    }

    /// [`Odds::add_entry`], folding colliding payloads with
    /// [`Combine::combine_in_place`].
    pub fn add_entry_combine_in_place(&mut self, entry: Entry<D>) {
        self.total += &entry.weight;
        match self.map.entry(entry.hash.clone()) {
            MapSlot::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.weight += entry.weight;
                existing.data.combine_in_place(&entry.data);
            }
            MapSlot::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{Face, Tally, w};

    #[test]
    fn add_accumulates_weight_on_collision() {
        let mut odds = Odds::new();
        for i in 1..=10u64 {
            odds.add(Face(5), w(10 * i));
        }
        assert_eq!(odds.len(), 1);
        assert_eq!(*odds.total(), w(550));
        assert_eq!(*odds.get(&5).unwrap().weight(), w(550));
    }

    #[test]
    fn zero_weight_entries_persist() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(0));
        assert_eq!(odds.len(), 1);
        assert!(odds.total().is_zero());

        assert_eq!(odds.remove_hash(&1), Some(w(0)));
        assert!(odds.is_empty());
    }

    #[test]
    fn remove_returns_owned_weight_and_updates_total() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(10));
        odds.add(Face(2), w(20));

        assert_eq!(odds.remove_data(&Face(1)), Some(w(10)));
        assert_eq!(*odds.total(), w(20));
        assert_eq!(odds.remove_hash(&1), None);
    }

    #[test]
    fn remove_subset_is_best_effort_and_decrements_once() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(10));
        odds.add(Face(2), w(20));
        odds.add(Face(3), w(30));

        let mut subset = Odds::new();
        subset.add(Face(2), w(1));
        subset.add(Face(3), w(1));
        subset.add(Face(9), w(1)); // absent from the receiver

        let removed = odds.remove_subset(&subset);
        assert_eq!(removed, w(50));
        assert_eq!(*odds.total(), w(10));
        assert_eq!(odds.len(), 1);
    }

    #[test]
    fn scale_then_reduce_restores_ratios() {
        let mut odds = Odds::new();
        for i in 1..=10u64 {
            odds.add(Face(u32::try_from(i).unwrap()), w(10 * i));
        }
        assert_eq!(*odds.total(), w(550));

        odds.scale(&w(2));
        assert_eq!(*odds.total(), w(1100));
        assert_eq!(*odds.get(&1).unwrap().weight(), w(20));

        odds.reduce();
        assert_eq!(*odds.total(), w(55));
        for i in 1..=10u64 {
            let key = u32::try_from(i).unwrap();
            assert_eq!(*odds.get(&key).unwrap().weight(), w(i));
        }
    }

    #[test]
    fn reduce_is_idempotent() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(6));
        odds.add(Face(2), w(9));

        odds.reduce();
        let once = odds.clone();
        odds.reduce();
        assert_eq!(odds, once);
    }

    #[test]
    fn reduce_ignores_empty_and_all_zero_maps() {
        let mut empty: Odds<Face> = Odds::new();
        empty.reduce();
        assert!(empty.is_empty());

        let mut zeroed = Odds::new();
        zeroed.add(Face(1), w(0));
        zeroed.reduce();
        assert!(zeroed.total().is_zero());
        assert_eq!(zeroed.len(), 1);
    }

    #[test]
    fn add_odds_uses_minimal_mutual_scale() {
        // Receiver {1: 3}, incoming {2:1, 3:1} occupying weight 6.
        let mut odds = Odds::new();
        odds.add(Face(1), w(3));

        let mut incoming = Odds::new();
        incoming.add(Face(2), w(1));
        incoming.add(Face(3), w(1));

        odds.add_odds(incoming, &w(6)).unwrap();
        // gcd(2, 6) = 2: receiver scaled by 1, incoming by 3.
        assert_eq!(*odds.total(), w(9));
        assert_eq!(*odds.get(&1).unwrap().weight(), w(3));
        assert_eq!(*odds.get(&2).unwrap().weight(), w(3));
        assert_eq!(*odds.get(&3).unwrap().weight(), w(3));
    }

    #[test]
    fn add_odds_rejects_degenerate_inputs() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(3));

        let mut incoming = Odds::new();
        incoming.add(Face(2), w(1));
        assert_eq!(
            odds.add_odds(incoming, &w(0)),
            Err(OddsError::ZeroProportion)
        );

        let empty: Odds<Face> = Odds::new();
        assert_eq!(odds.add_odds(empty, &w(4)), Err(OddsError::EmptyExpansion));
        // Receiver untouched by either failure.
        assert_eq!(*odds.total(), w(3));
    }

    #[test]
    fn replace_hash_with_odds_redistributes_exactly() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(1));
        odds.add(Face(2), w(1));

        let mut incoming = Odds::new();
        incoming.add(Face(10), w(1));
        incoming.add(Face(11), w(2));

        odds.replace_hash_with_odds(&2, incoming).unwrap();
        // Removed weight 1 out of 2: the replacement trio must keep the
        // survivor at exactly half the total.
        let survivor = odds.get(&1).unwrap().weight().clone();
        assert_eq!(&survivor * 2u32, *odds.total());
        let ten = odds.get(&10).unwrap().weight().clone();
        let eleven = odds.get(&11).unwrap().weight().clone();
        assert_eq!(eleven, &ten * 2u32);
    }

    #[test]
    fn replace_fails_on_zero_removed_weight() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(5));
        odds.add(Face(2), w(0));

        assert_eq!(
            odds.replace_hash_with_data(&9, Face(7)),
            Err(OddsError::NothingRemoved)
        );
        assert_eq!(
            odds.replace_hash_with_data(&2, Face(7)),
            Err(OddsError::NothingRemoved)
        );
    }

    #[test]
    fn replace_subset_with_data_consolidates_weight() {
        let mut odds = Odds::new();
        odds.add(Face(1), w(10));
        odds.add(Face(2), w(20));
        odds.add(Face(3), w(30));

        let mut subset = Odds::new();
        subset.add(Face(2), w(1));
        subset.add(Face(3), w(1));

        odds.replace_subset_with_data(&subset, Face(99)).unwrap();
        assert_eq!(*odds.total(), w(60));
        assert_eq!(*odds.get(&99).unwrap().weight(), w(50));
    }

    #[test]
    fn combine_adds_fold_payloads() {
        let mut odds = Odds::new();
        odds.add_combine(Tally { key: 1, count: 2 }, w(1));
        odds.add_combine(Tally { key: 1, count: 5 }, w(3));

        let entry = odds.get(&1).unwrap();
        assert_eq!(entry.data().count, 7);
        assert_eq!(*entry.weight(), w(4));

        let mut in_place = Odds::new();
        in_place.add_combine_in_place(Tally { key: 2, count: 1 }, w(1));
        in_place.add_combine_in_place(Tally { key: 2, count: 1 }, w(1));
        assert_eq!(in_place.get(&2).unwrap().data().count, 2);
    }
}
