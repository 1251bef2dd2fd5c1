//! Exact-arithmetic engine for weighted combinatorial distributions.
//!
//! A distribution is a map from outcome payloads to non-negative integer
//! weights plus a running total. Probabilities are never computed; the
//! exact ratio `weight / total` is the probability of each outcome, and
//! every operation manipulates the integers so the ratios stay exact.
//! Two techniques make that possible without fractions:
//!
//! - **Scaling**: to put two distributions on a common footing, multiply
//!   every weight in one by a factor derived from the other. Ratios are
//!   untouched and no division ever produces a remainder.
//! - **Reduction**: divide all weights and the total by their collective
//!   GCD whenever magnitudes have grown. This is the only division in the
//!   engine and it is exact by construction.
//!
//! Payload capabilities are trait bounds ([`Outcome`] for identity,
//! [`Combine`] for folding collided payloads), so an operation that needs
//! a capability the payload lacks fails at compile time.
//!
//! ```
//! use odds_core::{Odds, Outcome};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Coin(&'static str);
//!
//! impl Outcome for Coin {
//!     type Key = &'static str;
//!     fn key(&self) -> Self::Key {
//!         self.0
//!     }
//! }
//!
//! let mut odds = Odds::new();
//! odds.add(Coin("heads"), 1u32.into());
//! odds.add(Coin("tails"), 1u32.into());
//! assert_eq!(*odds.total(), 2u32.into());
//! assert_eq!(*odds.get(&"heads").unwrap().weight(), 1u32.into());
//! ```

mod combine;
mod conditions;
mod entry;
mod extend;
mod modify;
mod odds;
mod parallel;
mod rendezvous;
mod sample;
mod traits;

pub use combine::{MergePolicy, cross};
pub use entry::Entry;
pub use odds::Odds;
pub use odds_error::{OddsError, Result};
pub use traits::{Combine, Outcome};
