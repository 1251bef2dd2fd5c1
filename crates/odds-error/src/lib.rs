//! Shared error type for the exact-odds engine.
//!
//! All fallible operations in `odds-core` return [`Result`]. Every variant
//! signals a logic error in the caller's weight bookkeeping rather than a
//! retryable runtime condition: the engine never commits a partial mutation
//! that would leave a distribution's total out of sync with its entries.

use thiserror::Error;

/// Errors produced by distribution operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum OddsError {
    /// A proportional insertion was asked to occupy zero weight, so there is
    /// nothing to redistribute.
    #[error("proportional insert requires a non-zero weight")]
    ZeroProportion,

    /// A replacement removed no weight from the receiver, so the incoming
    /// distribution has no share of the total to occupy.
    #[error("replacement target removed zero weight")]
    NothingRemoved,

    /// An expansion produced a sub-distribution with zero total weight,
    /// which cannot participate in the common-denominator construction.
    #[error("expansion produced a distribution with zero total weight")]
    EmptyExpansion,
}

/// Convenience alias used across the engine.
pub type Result<T> = std::result::Result<T, OddsError>;
