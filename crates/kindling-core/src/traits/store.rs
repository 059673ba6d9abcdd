use std::collections::{BTreeSet, HashMap};

use crate::errors::StoreResult;
use crate::model::{FieldAggregate, ItemMetadata, RatingMap, RatingVector};

/// Rating, item, tracked-field, and aggregate operations.
///
/// The single capability set backing the engine: one trait, two
/// conforming backends (transient in-memory, persistent SQLite), and the
/// engine's algorithms must behave identically against either. Each call
/// is atomic on its own; the engine never assumes a multi-call sequence
/// is atomic as a whole.
///
/// The user direction (`user → {item → score}`) is authoritative. The
/// item direction is kept in sync per call, but backends may diverge
/// under reconciliation churn; `replace_item_vectors` and
/// `replace_value_aggregates` exist so the engine can rebuild the item
/// direction wholesale from the user direction.
pub trait RatingStore: Send + Sync {
    // --- Ratings ---
    /// Set the rating for `(user, item)` in both directions. Overwrites
    /// any previous rating for the pair; no history is kept.
    fn upsert_rating(&self, user_id: &str, item_id: &str, score: f64) -> StoreResult<()>;
    /// Remove the rating for `(user, item)` from both directions.
    fn remove_rating(&self, user_id: &str, item_id: &str) -> StoreResult<()>;
    fn get_user_vector(&self, user_id: &str) -> StoreResult<RatingVector>;
    fn get_item_vector(&self, item_id: &str) -> StoreResult<RatingVector>;
    fn all_user_vectors(&self) -> StoreResult<RatingMap>;
    fn all_item_vectors(&self) -> StoreResult<RatingMap>;
    /// Remove and return a user's forward vector. The reverse direction
    /// is left untouched; callers follow up with a resync.
    fn take_user_vector(&self, user_id: &str) -> StoreResult<RatingVector>;
    /// Replace the entire item-direction map (resync write-back).
    fn replace_item_vectors(&self, vectors: RatingMap) -> StoreResult<()>;

    // --- Items ---
    /// Make an item known with no metadata. Idempotent; keeps existing
    /// metadata if the item is already registered.
    fn register_item(&self, item_id: &str) -> StoreResult<()>;
    fn upsert_item_metadata(&self, item_id: &str, field: &str, value: &str) -> StoreResult<()>;
    fn get_item_metadata(&self, item_id: &str) -> StoreResult<ItemMetadata>;
    fn all_item_ids(&self) -> StoreResult<Vec<String>>;

    // --- Tracked fields ---
    /// Record that `field` has been used for category tracking. The set
    /// only grows; `wipe` is the sole reset.
    fn register_tracked_field(&self, field: &str) -> StoreResult<()>;
    fn tracked_fields(&self) -> StoreResult<BTreeSet<String>>;

    // --- Metadata aggregates ---
    /// `tot[field][user][value] += rating`, `n[field][user][value] += 1`.
    fn bump_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
        value: &str,
        rating: f64,
    ) -> StoreResult<()>;
    /// `tot[field][value][user] += rating`, `n[field][value][user] += 1`.
    fn bump_value_aggregate(
        &self,
        field: &str,
        value: &str,
        user_id: &str,
        rating: f64,
    ) -> StoreResult<()>;
    fn get_user_aggregate(&self, field: &str, user_id: &str)
        -> StoreResult<Option<FieldAggregate>>;
    fn all_user_aggregates(&self, field: &str) -> StoreResult<HashMap<String, FieldAggregate>>;
    /// Remove and return a user's aggregate for `field` (reconciliation).
    fn take_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
    ) -> StoreResult<Option<FieldAggregate>>;
    /// Write a user's aggregate for `field` wholesale (merge write-back).
    fn put_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
        aggregate: FieldAggregate,
    ) -> StoreResult<()>;
    /// Item-direction aggregates for `field`: metadata value → per-user
    /// sums/counts. Feeds the per-field co-occurrence build.
    fn all_value_aggregates(&self, field: &str) -> StoreResult<HashMap<String, FieldAggregate>>;
    /// Replace the item-direction aggregates for `field` wholesale
    /// (resync write-back).
    fn replace_value_aggregates(
        &self,
        field: &str,
        aggregates: HashMap<String, FieldAggregate>,
    ) -> StoreResult<()>;

    // --- Maintenance ---
    /// Drop all data, including the tracked-field set.
    fn wipe(&self) -> StoreResult<()>;
}
