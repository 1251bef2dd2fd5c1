//! Capability traits for outcome payloads.
//!
//! The engine never inspects payload data directly; everything it needs is
//! declared here. Required capabilities are trait bounds, so invoking an
//! operation without the capability it needs is a compile error rather than
//! a runtime fault.

use std::hash::Hash;

/// The base capability every payload must provide: a deterministic identity
/// key and duplication (via the `Clone` supertrait).
///
/// `key` must be pure and consistent with payload equality: two payloads
/// that represent the same outcome must produce equal keys, and cloning a
/// payload must never change its key. The engine re-derives keys after any
/// out-of-band data mutation, so a key that depends on anything but the
/// payload's value will corrupt the map.
pub trait Outcome: Clone {
    /// Equality/hash key this outcome is indexed under.
    type Key: Eq + Hash + Clone;

    /// Derive the identity key from the payload value.
    fn key(&self) -> Self::Key;
}

/// Optional capability: folding two payloads that landed on the same key
/// into one. Required by the `*_combine` merge/add variants and the
/// combining expansion policies.
pub trait Combine: Outcome {
    /// Produce a new payload representing both inputs.
    fn combine(&self, other: &Self) -> Self;

    /// Fold `other` into `self` without allocating a replacement.
    fn combine_in_place(&mut self, other: &Self) {
        *self = self.combine(other);
    }
}
