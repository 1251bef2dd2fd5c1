//! Per-entry expansion: one outcome becomes another outcome, or an entire
//! replacement sub-distribution.
//!
//! The sub-distribution form is the delicate one. Different entries expand
//! into sub-distributions with different totals, so their weights share no
//! common denominator. The algorithm multiplies all sub-totals into one
//! product `L` and scales entry `i`'s expansion by `L × wᵢ / subTotalᵢ` —
//! exact by construction, because `L` contains `subTotalᵢ` as a factor.
//! This is fraction addition over a common denominator, done entirely in
//! integers.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use odds_error::{OddsError, Result};

use crate::combine::MergePolicy;
use crate::entry::Entry;
use crate::odds::Odds;
use crate::traits::{Combine, Outcome};

impl<D: Outcome> Odds<D> {
    /// Replace every entry's payload with `extend_fn(entry)`, then run the
    /// rehash pass, merging any now-colliding entries by weight
    /// accumulation.
    pub fn extend<F>(&mut self, extend_fn: F) -> &mut Self
    where
        F: Fn(&Entry<D>) -> D,
    {
        for entry in self.map.values_mut() {
            let data = extend_fn(&*entry);
            entry.data = data;
            entry.hash = entry.data.key();
        }
        self.update_hashes()
    }

    /// Replace every entry with the sub-distribution `extend_fn(entry)`,
    /// reconciling the heterogeneous sub-totals exactly; collisions
    /// introduced by the expansion accumulate weight.
    ///
    /// Fails with [`OddsError::EmptyExpansion`] before any mutation if some
    /// entry expands to a zero-total distribution.
    pub fn extend_odds<F>(&mut self, extend_fn: F) -> Result<&mut Self>
    where
        F: Fn(&Entry<D>) -> Odds<D>,
    {
        self.extend_odds_inner(extend_fn, |receiver, expanded| {
            receiver.merge([expanded]);
        })
    }

    pub(crate) fn extend_odds_inner<F, M>(&mut self, extend_fn: F, mut merge: M) -> Result<&mut Self>
    where
        F: Fn(&Entry<D>) -> Odds<D>,
        M: FnMut(&mut Self, Self),
    {
        let mut product = BigUint::one();
        let mut expansions: Vec<(BigUint, Odds<D>)> = Vec::with_capacity(self.map.len());

        for entry in self.map.values() {
            let mut expanded = extend_fn(entry);
            expanded.reduce();
            if expanded.total.is_zero() {
                return Err(OddsError::EmptyExpansion);
            }
            product *= &expanded.total;
            expansions.push((entry.weight.clone(), expanded));
        }

        self.clear();
        for (weight, mut expanded) in expansions {
            // Evenly divisible: `product` carries this expansion's total.
            let factor = &product * &weight / &expanded.total;
            expanded.scale(&factor);
            merge(self, expanded);
        }

        self.reduce();
        Ok(self)
    }
}

impl<D: Combine> Odds<D> {
    /// [`Odds::extend_odds`] with an explicit collision policy for the
    /// entries the expansion makes collide.
    pub fn extend_odds_with<F>(&mut self, extend_fn: F, policy: MergePolicy) -> Result<&mut Self>
    where
        F: Fn(&Entry<D>) -> Odds<D>,
    {
        self.extend_odds_inner(extend_fn, move |receiver, expanded| {
            receiver.merge_policy(expanded, policy);
        })
    }
}
