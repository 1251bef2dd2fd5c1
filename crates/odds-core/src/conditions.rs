//! Condition-based subset extraction and queries.
//!
//! Every mutating walk here iterates a snapshotted key list, never the live
//! map, so removal mid-iteration is safe by construction.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::entry::Entry;
use crate::odds::Odds;
use crate::traits::Outcome;

impl<D: Outcome> Odds<D> {
    /// Remove every entry satisfying `condition`.
    pub fn remove_condition<F>(&mut self, condition: F) -> &mut Self
    where
        F: Fn(&Entry<D>) -> bool,
    {
        let doomed: Vec<D::Key> = self
            .map
            .values()
            .filter(|entry| condition(entry))
            .map(|entry| entry.hash.clone())
            .collect();
        for hash in doomed {
            self.remove_hash(&hash);
        }
        self
    }

    /// Ordered, first-match-wins partition. Each condition claims the
    /// entries it matches among those still unclaimed; the final element is
    /// the receiver itself, holding everything no condition matched.
    pub fn split_by_conditions(
        mut self,
        conditions: &[&dyn Fn(&Entry<D>) -> bool],
    ) -> Vec<Odds<D>> {
        let mut parts = Vec::with_capacity(conditions.len() + 1);

        for condition in conditions {
            let mut part = self.derived();
            let claimed: Vec<D::Key> = self
                .map
                .values()
                .filter(|entry| condition(entry))
                .map(|entry| entry.hash.clone())
                .collect();
            for hash in claimed {
                if let Some(entry) = self.take_hash(&hash) {
                    part.add_entry(entry);
                }
            }
            parts.push(part);
        }

        parts.push(self);
        parts
    }

    /// Total weight of the entries satisfying `condition`.
    pub fn condition_weight<F>(&self, condition: F) -> BigUint
    where
        F: Fn(&Entry<D>) -> bool,
    {
        let mut weight = BigUint::zero();
        for entry in self.map.values() {
            if condition(entry) {
                weight += &entry.weight;
            }
        }
        weight
    }

    /// Whether every entry satisfies `condition`. Vacuously true when
    /// empty.
    pub fn condition_all_true<F>(&self, condition: F) -> bool
    where
        F: Fn(&Entry<D>) -> bool,
    {
        self.map.values().all(condition)
    }

    /// Whether no entry satisfies `condition`. Vacuously true when empty.
    pub fn condition_all_false<F>(&self, condition: F) -> bool
    where
        F: Fn(&Entry<D>) -> bool,
    {
        !self.map.values().any(condition)
    }
}
