//! Weighted random sampling.

use num_bigint::{BigUint, RandBigInt};
use num_traits::Zero;
use rand::rngs::OsRng;

use crate::entry::Entry;
use crate::odds::Odds;
use crate::traits::Outcome;

impl<D: Outcome> Odds<D> {
    /// Draw one entry with probability exactly `weight / total`.
    ///
    /// The draw point is uniform in `[0, total)` from the operating
    /// system's CSPRNG; selection walks cumulative weights in map order.
    /// Iteration order is unspecified, which is fine for selection
    /// probability; it only decides which entry is reported when several
    /// share a cumulative boundary. Returns `None` when the total is zero.
    pub fn sample(&self) -> Option<&Entry<D>> {
        if self.total.is_zero() {
            return None;
        }

        let point = OsRng.gen_biguint_below(&self.total);
        let mut cumulative = BigUint::zero();
        for entry in self.map.values() {
            cumulative += &entry.weight;
            if cumulative > point {
                return Some(entry);
            }
        }
        None
    }
}
