//! Data model: id normalization, rating vectors, metadata aggregates.

pub mod aggregate;
pub mod ids;

use std::collections::HashMap;

pub use aggregate::FieldAggregate;
pub use ids::normalize_id;

/// One direction of the rating graph for a single entity:
/// `item_id → score` for a user, `user_id → score` for an item.
pub type RatingVector = HashMap<String, f64>;

/// A full rating direction: `entity_id → RatingVector`.
pub type RatingMap = HashMap<String, RatingVector>;

/// Item metadata: `field → value`.
pub type ItemMetadata = HashMap<String, String>;
