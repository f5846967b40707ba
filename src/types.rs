//! Shared identifiers.

/// Integer market-condition label supplied by an external classifier
pub type RegimeId = i32;

/// Pair of regimes observed back to back, `(from, to)`
pub type RegimePair = (RegimeId, RegimeId);
