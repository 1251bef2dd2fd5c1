//! One weighted outcome: payload, derived key, and exact weight.

use std::fmt;

use num_bigint::BigUint;

use crate::traits::Outcome;

/// A single outcome inside a distribution.
///
/// The weight is an arbitrary-precision non-negative integer, so repeated
/// convolution and expansion can never overflow or go negative. The `hash`
/// field always equals `data.key()` while the entry lives inside an
/// [`Odds`](crate::Odds) map; operations that mutate `data` out of band are
/// followed by a rehash pass that restores the invariant.
pub struct Entry<D: Outcome> {
    pub(crate) hash: D::Key,
    pub(crate) data: D,
    pub(crate) weight: BigUint,
}

impl<D: Outcome> Entry<D> {
    /// Build an entry, deriving the key from the payload.
    pub fn new(data: D, weight: BigUint) -> Self {
        Self {
            hash: data.key(),
            data,
            weight,
        }
    }

    /// Build an entry under a caller-chosen key.
    ///
    /// The key must match what `data.key()` would produce; a mismatched key
    /// is rederived by the next rehash pass, silently re-homing the weight.
    pub fn with_key(hash: D::Key, data: D, weight: BigUint) -> Self {
        Self { hash, data, weight }
    }

    /// The key this entry is indexed under.
    pub fn key(&self) -> &D::Key {
        &self.hash
    }

    /// The outcome payload.
    pub fn data(&self) -> &D {
        &self.data
    }

    /// The exact relative weight of this outcome.
    pub fn weight(&self) -> &BigUint {
        &self.weight
    }

    /// Split the entry into its payload and weight.
    pub fn into_parts(self) -> (D, BigUint) {
        (self.data, self.weight)
    }

    /// Full duplication: payload cloned, weight copied, key rederived from
    /// the cloned payload.
    pub(crate) fn duplicate(&self) -> Self {
        let data = self.data.clone();
        Self {
            hash: data.key(),
            data,
            weight: self.weight.clone(),
        }
    }
}

impl<D> fmt::Debug for Entry<D>
where
    D: Outcome + fmt::Debug,
    D::Key: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("hash", &self.hash)
            .field("data", &self.data)
            .field("weight", &self.weight)
            .finish()
    }
}

impl<D> PartialEq for Entry<D>
where
    D: Outcome + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.data == other.data && self.weight == other.weight
    }
}

impl<D> Eq for Entry<D> where D: Outcome + Eq {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{Face, w};

    #[test]
    fn new_derives_key_from_payload() {
        let entry = Entry::new(Face(4), w(7));
        assert_eq!(*entry.key(), 4);
        assert_eq!(*entry.weight(), w(7));
    }

    #[test]
    fn duplicate_rederives_key_and_copies_weight() {
        let entry = Entry::new(Face(9), w(3));
        let copy = entry.duplicate();
        assert_eq!(copy, entry);
    }

    #[test]
    fn into_parts_returns_payload_and_weight() {
        let (data, weight) = Entry::new(Face(2), w(5)).into_parts();
        assert_eq!(data, Face(2));
        assert_eq!(weight, w(5));
    }
}
