//! # kindling-core
//!
//! Foundation crate for the kindling recommendation engine.
//! Defines the data model, the `RatingStore` trait, errors, config,
//! and constants. Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod model;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::RecommenderConfig;
pub use errors::{KindlingError, KindlingResult};
pub use model::{normalize_id, FieldAggregate, RatingVector};
pub use traits::RatingStore;
