//! Merging distributions and cross-product convolution.
//!
//! Merge is the building block every higher-level recombination (expansion,
//! parallel reduction) is assembled from: incoming entries are moved into
//! the receiver, never copied, and totals accumulate. Convolution is the
//! pairwise cross product of two distributions, with the intended weight of
//! each pair being the product of the source weights.

use num_bigint::BigUint;
use num_traits::One;

use crate::entry::Entry;
use crate::odds::Odds;
use crate::traits::{Combine, Outcome};

/// Collision handling selected by expansion and merge call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Accumulate weights only; the first payload wins.
    #[default]
    Accumulate,
    /// Accumulate weights and fold payloads via [`Combine::combine`].
    Combine,
    /// Accumulate weights and fold payloads via
    /// [`Combine::combine_in_place`].
    CombineInPlace,
}

impl<D: Outcome> Odds<D> {
    /// Fold every source distribution into the receiver. Colliding entries
    /// accumulate weight; new entries are moved in, so the receiver takes
    /// ownership. The receiver's total grows by each source's total.
    pub fn merge<I>(&mut self, sources: I) -> &mut Self
    where
        I: IntoIterator<Item = Odds<D>>,
    {
        for source in sources {
            for (_, entry) in source.map {
                self.add_entry(entry);
            }
        }
        self
    }

    /// Cross-product convolution against each of `others` in turn.
    ///
    /// For every pair `(e, f)` the closure returns replacement entries whose
    /// weights need only be proportionally correct; the intended combined
    /// weight for the pair is `e.weight × f.weight`, captured before any
    /// rescale. When a returned batch totals more than one unit, everything
    /// in flight (pending source entries, accumulated results, and the
    /// source entry being processed) is scaled up by that total first, so
    /// re-expressing each returned entry's share of the pair weight never
    /// divides. New outcomes accumulate in a staging map, which keeps them
    /// from colliding with source entries that are still waiting to be
    /// convolved. The receiver is reduced after each object.
    ///
    /// `others` must not alias the receiver (the borrow shapes enforce it).
    pub fn convolve<F>(&mut self, others: &[&Odds<D>], convolve_fn: F) -> &mut Self
    where
        F: Fn(&Entry<D>, &Entry<D>) -> Vec<Entry<D>>,
    {
        for other in others {
            self.convolve_one(other, &convolve_fn);
            self.reduce();
        }
        self
    }

    fn convolve_one<F>(&mut self, other: &Odds<D>, convolve_fn: &F)
    where
        F: Fn(&Entry<D>, &Entry<D>) -> Vec<Entry<D>>,
    {
        if other.is_empty() {
            return;
        }

        let mut result = self.derived();
        let self_hashes: Vec<D::Key> = self.map.keys().cloned().collect();

        for hash in &self_hashes {
            let Some(mut source) = self.take_hash(hash) else {
                continue;
            };

            for other_entry in other.map.values() {
                let batch = convolve_fn(&source, other_entry);
                let pair_weight = &source.weight * &other_entry.weight;

                let batch_total: BigUint = batch.iter().map(|e| &e.weight).sum();
                if batch_total > BigUint::one() {
                    // Keep every weight in flight commensurate with the
                    // batch about to be folded in.
                    self.scale(&batch_total);
                    result.scale(&batch_total);
                    source.weight *= &batch_total;
                }

                for new_entry in batch {
                    let weight = new_entry.weight * &pair_weight;
                    result.add(new_entry.data, weight);
                }
            }
        }

        self.merge([result]);
    }

    /// Restricted convolution where the closure mutates the receiver
    /// entry's payload directly for every pair; no weight redistribution
    /// happens. Finishes with the rehash pass required after out-of-band
    /// payload mutation.
    pub fn convolve_in_place<F>(&mut self, others: &[&Odds<D>], convolve_fn: F) -> &mut Self
    where
        F: Fn(&mut D, &Entry<D>),
    {
        for other in others {
            for entry in self.map.values_mut() {
                for other_entry in other.map.values() {
                    convolve_fn(&mut entry.data, other_entry);
                }
                entry.hash = entry.data.key();
            }
            self.update_hashes();
        }
        self
    }
}

impl<D: Combine> Odds<D> {
    /// [`Odds::merge`], folding colliding payloads via
    /// [`Combine::combine`].
    pub fn merge_combine<I>(&mut self, sources: I) -> &mut Self
    where
        I: IntoIterator<Item = Odds<D>>,
    {
        for source in sources {
            for (_, entry) in source.map {
                self.add_entry_combine(entry);
            }
        }
        self
    }

    /// [`Odds::merge`], folding colliding payloads via
    /// [`Combine::combine_in_place`].
    pub fn merge_combine_in_place<I>(&mut self, sources: I) -> &mut Self
    where
        I: IntoIterator<Item = Odds<D>>,
    {
        for source in sources {
            for (_, entry) in source.map {
                self.add_entry_combine_in_place(entry);
            }
        }
        self
    }

    /// Fold a single source into the receiver under the given policy.
    pub(crate) fn merge_policy(&mut self, source: Odds<D>, policy: MergePolicy) {
        match policy {
            MergePolicy::Accumulate => {
                self.merge([source]);
            }
            MergePolicy::Combine => {
                self.merge_combine([source]);
            }
            MergePolicy::CombineInPlace => {
                self.merge_combine_in_place([source]);
            }
        }
    }
}

/// Full cross-product combination of two distributions: every payload pair
/// folded via [`Combine::combine`], every pair weight the exact product of
/// the source weights. The result's total is `a.total × b.total`.
pub fn cross<D: Combine>(a: &Odds<D>, b: &Odds<D>) -> Odds<D> {
    let mut out = Odds::with_capacity(a.len() * b.len());
    for left in a.map.values() {
        for right in b.map.values() {
            let data = left.data.combine(&right.data);
            let weight = &left.weight * &right.weight;
            out.add(data, weight);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{Face, Tally, w};

    #[test]
    fn merge_accumulates_totals_and_moves_entries() {
        let mut a = Odds::new();
        a.add(Face(1), w(1));
        a.add(Face(2), w(2));

        let mut b = Odds::new();
        b.add(Face(2), w(5));
        b.add(Face(3), w(3));

        let b_total = b.total().clone();
        let expected = a.total() + &b_total;
        a.merge([b]);

        assert_eq!(*a.total(), expected);
        assert_eq!(*a.get(&2).unwrap().weight(), w(7));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn merge_combine_folds_colliding_payloads() {
        let mut a = Odds::new();
        a.add(Tally { key: 1, count: 10 }, w(1));

        let mut b = Odds::new();
        b.add(Tally { key: 1, count: 32 }, w(1));

        a.merge_combine([b]);
        assert_eq!(a.get(&1).unwrap().data().count, 42);
        assert_eq!(*a.total(), w(2));
    }

    #[test]
    fn cross_total_is_product_of_totals() {
        let mut a = Odds::new();
        let mut b = Odds::new();
        for i in 1..=10u32 {
            a.add(Face(i), w(1));
            b.add(Face(i), w(1));
        }
        assert_eq!(*a.total(), w(10));
        assert_eq!(*b.total(), w(10));

        let combined = cross(&a, &b);
        assert_eq!(*combined.total(), w(100));
        // Face sums 2..=20: 19 distinct outcomes.
        assert_eq!(combined.len(), 19);
        // Seven ways to roll a 8 on 2d10-style faces.
        assert_eq!(*combined.get(&8).unwrap().weight(), w(7));
    }

    #[test]
    fn convolve_preserves_intended_pair_weights() {
        // Two fair d3s convolved through a closure that reports each sum
        // with unit weight: classic triangle distribution.
        let mut a = Odds::new();
        let mut b = Odds::new();
        for i in 1..=3u32 {
            a.add(Face(i), w(1));
            b.add(Face(i), w(1));
        }

        a.convolve(&[&b], |e, f| {
            vec![Entry::new(Face(e.data().0 + f.data().0), BigUint::one())]
        });

        assert_eq!(*a.total(), w(9));
        assert_eq!(*a.get(&2).unwrap().weight(), w(1));
        assert_eq!(*a.get(&4).unwrap().weight(), w(3));
        assert_eq!(*a.get(&6).unwrap().weight(), w(1));
    }

    #[test]
    fn convolve_redistributes_proportional_batches_exactly() {
        // One outcome splits into a 2:1 pair; weights stay integral.
        let mut a = Odds::new();
        a.add(Face(1), w(1));
        let mut b = Odds::new();
        b.add(Face(0), w(1));

        a.convolve(&[&b], |e, f| {
            let base = e.data().0 + f.data().0;
            vec![
                Entry::new(Face(base + 100), w(2)),
                Entry::new(Face(base + 200), w(1)),
            ]
        });

        assert_eq!(*a.total(), w(3));
        assert_eq!(*a.get(&101).unwrap().weight(), w(2));
        assert_eq!(*a.get(&201).unwrap().weight(), w(1));
    }

    #[test]
    fn convolve_chains_objects_sequentially() {
        // 3d2 via two successive convolutions; totals reduce to 8 outcomes
        // weighted 1,3,3,1.
        let mut acc = Odds::new();
        acc.add(Face(1), w(1));
        acc.add(Face(2), w(1));
        let die = acc.clone();

        acc.convolve(&[&die, &die], |e, f| {
            vec![Entry::new(Face(e.data().0 + f.data().0), BigUint::one())]
        });

        assert_eq!(*acc.total(), w(8));
        assert_eq!(*acc.get(&3).unwrap().weight(), w(1));
        assert_eq!(*acc.get(&4).unwrap().weight(), w(3));
        assert_eq!(*acc.get(&5).unwrap().weight(), w(3));
        assert_eq!(*acc.get(&6).unwrap().weight(), w(1));
    }

    #[test]
    fn convolve_in_place_mutates_payloads_and_rehashes() {
        let mut a = Odds::new();
        a.add(Face(1), w(1));
        a.add(Face(2), w(1));

        let mut b = Odds::new();
        b.add(Face(10), w(1));

        a.convolve_in_place(&[&b], |data, other| {
            data.0 += other.data().0;
        });

        assert_eq!(*a.total(), w(2));
        assert!(a.get(&11).is_some());
        assert!(a.get(&12).is_some());
        assert!(a.get(&1).is_none());
    }

    #[test]
    fn convolve_in_place_chains_objects_on_the_in_place_path() {
        let mut a = Odds::new();
        a.add(Face(1), w(1));
        a.add(Face(2), w(3));

        let mut first = Odds::new();
        first.add(Face(0), w(1));
        let mut second = Odds::new();
        second.add(Face(10), w(1));

        // The first object collapses everything onto one key; the second
        // must then shift that merged entry, weight intact.
        a.convolve_in_place(&[&first, &second], |data, other| {
            if other.data().0 == 0 {
                data.0 = 7;
            } else {
                data.0 += other.data().0;
            }
        });

        assert_eq!(a.len(), 1);
        assert_eq!(*a.get(&17).unwrap().weight(), w(4));
        assert_eq!(*a.total(), w(4));
    }

    #[test]
    fn convolve_in_place_merges_new_collisions() {
        let mut a = Odds::new();
        a.add(Face(1), w(1));
        a.add(Face(2), w(3));

        let mut b = Odds::new();
        b.add(Face(0), w(1));

        // Collapse everything onto one key.
        a.convolve_in_place(&[&b], |data, _| {
            data.0 = 7;
        });

        assert_eq!(a.len(), 1);
        assert_eq!(*a.get(&7).unwrap().weight(), w(4));
        assert_eq!(*a.total(), w(4));
    }
}
