//! Multi-threaded variants of the expensive whole-map passes.
//!
//! Each operation here computes the same answer as its serial counterpart;
//! parallelism only changes how the work is partitioned. Entries are split
//! into contiguous chunks, one scoped thread per chunk, and any cross-chunk
//! arithmetic (a global GCD, a common denominator) goes through the
//! two-phase exchange in [`crate::rendezvous`]: no worker touches its chunk
//! again until the coordinator has folded every partial into the global
//! answer.

use std::thread;

use crossbeam_channel::bounded;
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use odds_error::{OddsError, Result};
use tracing::debug;

use crate::combine::MergePolicy;
use crate::entry::Entry;
use crate::odds::Odds;
use crate::rendezvous::rendezvous;
use crate::traits::{Combine, Outcome};

/// Partial reported by one expansion worker: its local common-denominator
/// total after reduction, and the sum of its chunk's original weights.
type ExpansionPartial = std::result::Result<(BigUint, BigUint), OddsError>;

impl<D: Outcome> Odds<D> {
    /// [`Odds::extend`] with the payload rewrites spread over `workers`
    /// threads. Each entry is rewritten by exactly one thread; the rehash
    /// pass that merges new collisions runs once, afterwards, on the
    /// calling thread.
    pub fn extend_parallel<F>(&mut self, extend_fn: F, workers: usize) -> &mut Self
    where
        D: Send,
        D::Key: Send,
        F: Fn(&Entry<D>) -> D + Sync,
    {
        let len = self.map.len();
        let workers = workers.min(len);
        if workers <= 1 {
            return self.extend(extend_fn);
        }

        debug!(workers, entries = len, "parallel extend");
        let mut entries: Vec<&mut Entry<D>> = self.map.values_mut().collect();
        let chunk_size = len.div_ceil(workers);
        let extend_fn = &extend_fn;

        thread::scope(|s| {
            for chunk in entries.chunks_mut(chunk_size) {
                s.spawn(move || {
                    for entry in chunk {
                        let data = extend_fn(&**entry);
                        entry.data = data;
                        entry.hash = entry.data.key();
                    }
                });
            }
        });

        self.update_hashes()
    }

    /// [`Odds::reduce`] with the GCD fold and the division pass spread over
    /// `workers` threads.
    ///
    /// Each worker folds the GCD of its chunk and reports it; the
    /// coordinator folds the partials into the global GCD and broadcasts it
    /// back, after which every worker divides its own chunk. The total is
    /// the weight sum, so the global GCD divides it too; the coordinator
    /// handles that division itself.
    pub fn reduce_parallel(&mut self, workers: usize) -> &mut Self {
        if self.total.is_zero() {
            return self;
        }
        let len = self.map.len();
        let workers = workers.min(len);
        if workers <= 1 {
            return self.reduce();
        }

        debug!(workers, entries = len, "parallel reduce");
        let total = &mut self.total;
        let mut weights: Vec<&mut BigUint> = self.map.values_mut().map(|e| &mut e.weight).collect();
        let chunk_size = len.div_ceil(workers);
        let chunks: Vec<&mut [&mut BigUint]> = weights.chunks_mut(chunk_size).collect();
        let (coordinator, handles) = rendezvous::<BigUint, BigUint>(chunks.len());

        thread::scope(|s| {
            for (chunk, handle) in chunks.into_iter().zip(handles) {
                s.spawn(move || {
                    let mut local = BigUint::zero();
                    for weight in &*chunk {
                        local = local.gcd(weight);
                        if local.is_one() {
                            break;
                        }
                    }
                    let Some(global) = handle.exchange(local) else {
                        return;
                    };
                    if !global.is_one() {
                        for weight in chunk {
                            **weight /= &global;
                        }
                    }
                });
            }

            let mut global = BigUint::zero();
            for (_, partial) in coordinator.collect() {
                global = global.gcd(&partial);
                if global.is_one() {
                    break;
                }
            }
            if !global.is_zero() && !global.is_one() {
                *total /= &global;
            }
            coordinator.broadcast(global);
        });

        self
    }

    /// [`Odds::extend_odds`] with the expansion work spread over `workers`
    /// threads.
    pub fn extend_odds_parallel<F>(&mut self, extend_fn: F, workers: usize) -> Result<&mut Self>
    where
        D: Send + Sync,
        D::Key: Send + Sync,
        F: Fn(&Entry<D>) -> Odds<D> + Sync,
    {
        self.extend_odds_parallel_inner(extend_fn, workers, &|receiver, source| {
            receiver.merge([source]);
        })
    }

    /// Each worker runs the serial common-denominator construction over its
    /// own chunk, producing one local distribution with local total `tᵢ`
    /// representing original mass `wᵢ` (the chunk's weight sum). The
    /// coordinator lifts the locals onto the shared denominator
    /// `L = Π tⱼ` by replying with the factor `wᵢ × L / tᵢ` (factors are
    /// first reduced by their collective GCD to keep magnitudes down).
    /// Workers scale and ship their locals; the receiver is only touched
    /// once every partial has arrived intact, so a failed expansion leaves
    /// it exactly as it was.
    ///
    /// An all-zero-weight chunk reduces to a zero local total; it gets
    /// factor one and contributes its outcomes at zero weight, matching the
    /// serial behavior.
    fn extend_odds_parallel_inner<F, M>(
        &mut self,
        extend_fn: F,
        workers: usize,
        merge_fn: &M,
    ) -> Result<&mut Self>
    where
        D: Send + Sync,
        D::Key: Send + Sync,
        F: Fn(&Entry<D>) -> Odds<D> + Sync,
        M: Fn(&mut Odds<D>, Odds<D>) + Sync,
    {
        let len = self.map.len();
        let workers = workers.min(len);
        if workers <= 1 {
            return self.extend_odds_inner(extend_fn, |receiver, expanded| {
                merge_fn(receiver, expanded);
            });
        }

        debug!(workers, entries = len, "parallel expansion");
        let entries: Vec<&Entry<D>> = self.map.values().collect();
        let chunk_size = len.div_ceil(workers);
        let chunks: Vec<&[&Entry<D>]> = entries.chunks(chunk_size).collect();
        let workers = chunks.len();
        let (coordinator, handles) = rendezvous::<ExpansionPartial, BigUint>(workers);
        let (done_tx, done_rx) = bounded::<Odds<D>>(workers);
        let extend_fn = &extend_fn;

        let locals = thread::scope(|s| -> Result<Vec<Odds<D>>> {
            for (chunk, handle) in chunks.into_iter().zip(handles) {
                let done_tx = done_tx.clone();
                s.spawn(move || {
                    let mut product = BigUint::one();
                    let mut weight_sum = BigUint::zero();
                    let mut expansions: Vec<(BigUint, Odds<D>)> = Vec::with_capacity(chunk.len());
                    for entry in chunk {
                        let mut expanded = extend_fn(entry);
                        expanded.reduce();
                        if expanded.total.is_zero() {
                            let _ = handle.exchange(Err(OddsError::EmptyExpansion));
                            return;
                        }
                        product *= &expanded.total;
                        weight_sum += &entry.weight;
                        expansions.push((entry.weight.clone(), expanded));
                    }

                    let mut local = Odds::new();
                    for (weight, mut expanded) in expansions {
                        let factor = &product * &weight / &expanded.total;
                        expanded.scale(&factor);
                        merge_fn(&mut local, expanded);
                    }
                    local.reduce();

                    let Some(factor) = handle.exchange(Ok((local.total.clone(), weight_sum)))
                    else {
                        return;
                    };
                    if !factor.is_one() {
                        local.scale(&factor);
                    }
                    let _ = done_tx.send(local);
                });
            }
            drop(done_tx);

            let partials = coordinator.collect();
            if partials.len() != workers {
                // Only reachable if a worker died before reporting; the
                // scope re-raises its panic once we unwind out of here.
                coordinator.abandon();
                return Err(OddsError::EmptyExpansion);
            }
            let mut totals = Vec::with_capacity(workers);
            for (id, partial) in partials {
                match partial {
                    Ok(pair) => totals.push((id, pair)),
                    Err(err) => {
                        coordinator.abandon();
                        return Err(err);
                    }
                }
            }

            let mut denominator = BigUint::one();
            for (_, (local_total, _)) in &totals {
                if !local_total.is_zero() {
                    denominator *= local_total;
                }
            }
            let mut factors: Vec<(usize, BigUint)> = totals
                .into_iter()
                .map(|(id, (local_total, weight_sum))| {
                    let factor = if local_total.is_zero() {
                        BigUint::one()
                    } else {
                        weight_sum * &denominator / local_total
                    };
                    (id, factor)
                })
                .collect();
            let mut gcd = BigUint::zero();
            for (_, factor) in &factors {
                gcd = gcd.gcd(factor);
                if gcd.is_one() {
                    break;
                }
            }
            if !gcd.is_zero() && !gcd.is_one() {
                for (_, factor) in &mut factors {
                    *factor /= &gcd;
                }
            }
            coordinator.reply_each(factors);

            let mut locals = Vec::with_capacity(workers);
            for _ in 0..workers {
                match done_rx.recv() {
                    Ok(local) => locals.push(local),
                    Err(_) => {
                        return Err(OddsError::EmptyExpansion);
                    }
                }
            }
            Ok(locals)
        })?;

        self.clear();
        for local in locals {
            merge_fn(self, local);
        }
        self.reduce_parallel(workers);
        Ok(self)
    }
}

impl<D: Combine> Odds<D> {
    /// [`Odds::extend_odds_parallel`] with an explicit collision policy.
    pub fn extend_odds_parallel_with<F>(
        &mut self,
        extend_fn: F,
        workers: usize,
        policy: MergePolicy,
    ) -> Result<&mut Self>
    where
        D: Send + Sync,
        D::Key: Send + Sync,
        F: Fn(&Entry<D>) -> Odds<D> + Sync,
    {
        self.extend_odds_parallel_inner(extend_fn, workers, &move |receiver, source| {
            receiver.merge_policy(source, policy);
        })
    }
}
