//! assocrank-ranker — Evidence reduction into association scores.
//! Harmonic-weighted sum, plain sum and max over a key's evidence list.

pub mod harmonic;
pub mod scorer;

pub use harmonic::{harmonic_sum, HarmonicSumScorer, DEFAULT_BUFFER};
pub use scorer::{KeyScores, Scorer, ScorerConfig};
