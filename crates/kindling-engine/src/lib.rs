//! Cold-start collaborative recommendation engine.
//!
//! Scores item relevance by projecting a user's rating vector through a
//! co-occurrence matrix built from everyone's ratings, pads thin result
//! sets from a popularity ranking, and blends in per-category affinity
//! learned from item metadata. Users with no history at all are seeded
//! from popularity alone, which is what makes it a cold-start engine.
//!
//! [`Recommender`] is the entry point; it runs over any
//! [`kindling_core::traits::RatingStore`] backend.

pub mod cooccurrence;
pub mod engine;
pub mod popularity;
pub mod reconcile;
pub mod scoring;

pub use cooccurrence::{Cooccurrence, CooccurrenceModel, LabeledMatrix, LogLikelihood, SimilarityMeasure};
pub use engine::Recommender;
pub use popularity::PopularityRanking;
