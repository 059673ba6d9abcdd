//! Transient in-memory backend: nested maps behind one RwLock.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use kindling_core::errors::{StoreError, StoreResult};
use kindling_core::model::{FieldAggregate, ItemMetadata, RatingMap, RatingVector};
use kindling_core::traits::RatingStore;

#[derive(Debug, Default)]
struct Inner {
    /// Forward direction: user → {item → score}. Authoritative.
    user_ratings: RatingMap,
    /// Reverse direction: item → {user → score}.
    item_ratings: RatingMap,
    /// Registered items and their metadata.
    items: HashMap<String, ItemMetadata>,
    /// Fields ever used for category tracking. Grows only; reset on wipe.
    tracked: BTreeSet<String>,
    /// field → user → sum/count per metadata value.
    user_aggregates: HashMap<String, HashMap<String, FieldAggregate>>,
    /// field → metadata value → sum/count per user.
    value_aggregates: HashMap<String, HashMap<String, FieldAggregate>>,
}

/// In-process `RatingStore`. Cheap to construct, nothing survives drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> StoreResult<T> {
        let guard = self.inner.read().map_err(StoreError::poisoned)?;
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> StoreResult<T> {
        let mut guard = self.inner.write().map_err(StoreError::poisoned)?;
        Ok(f(&mut guard))
    }
}

impl RatingStore for MemoryStore {
    fn upsert_rating(&self, user_id: &str, item_id: &str, score: f64) -> StoreResult<()> {
        self.write(|inner| {
            inner
                .user_ratings
                .entry(user_id.to_string())
                .or_default()
                .insert(item_id.to_string(), score);
            inner
                .item_ratings
                .entry(item_id.to_string())
                .or_default()
                .insert(user_id.to_string(), score);
        })
    }

    fn remove_rating(&self, user_id: &str, item_id: &str) -> StoreResult<()> {
        self.write(|inner| {
            if let Some(vector) = inner.user_ratings.get_mut(user_id) {
                vector.remove(item_id);
                if vector.is_empty() {
                    inner.user_ratings.remove(user_id);
                }
            }
            if let Some(vector) = inner.item_ratings.get_mut(item_id) {
                vector.remove(user_id);
                if vector.is_empty() {
                    inner.item_ratings.remove(item_id);
                }
            }
        })
    }

    fn get_user_vector(&self, user_id: &str) -> StoreResult<RatingVector> {
        self.read(|inner| inner.user_ratings.get(user_id).cloned().unwrap_or_default())
    }

    fn get_item_vector(&self, item_id: &str) -> StoreResult<RatingVector> {
        self.read(|inner| inner.item_ratings.get(item_id).cloned().unwrap_or_default())
    }

    fn all_user_vectors(&self) -> StoreResult<RatingMap> {
        self.read(|inner| inner.user_ratings.clone())
    }

    fn all_item_vectors(&self) -> StoreResult<RatingMap> {
        self.read(|inner| inner.item_ratings.clone())
    }

    fn take_user_vector(&self, user_id: &str) -> StoreResult<RatingVector> {
        self.write(|inner| inner.user_ratings.remove(user_id).unwrap_or_default())
    }

    fn replace_item_vectors(&self, vectors: RatingMap) -> StoreResult<()> {
        self.write(|inner| inner.item_ratings = vectors)
    }

    fn register_item(&self, item_id: &str) -> StoreResult<()> {
        self.write(|inner| {
            inner.items.entry(item_id.to_string()).or_default();
        })
    }

    fn upsert_item_metadata(&self, item_id: &str, field: &str, value: &str) -> StoreResult<()> {
        self.write(|inner| {
            inner
                .items
                .entry(item_id.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
        })
    }

    fn get_item_metadata(&self, item_id: &str) -> StoreResult<ItemMetadata> {
        self.read(|inner| inner.items.get(item_id).cloned().unwrap_or_default())
    }

    fn all_item_ids(&self) -> StoreResult<Vec<String>> {
        self.read(|inner| {
            let mut ids: BTreeSet<String> = inner.items.keys().cloned().collect();
            ids.extend(inner.item_ratings.keys().cloned());
            ids.into_iter().collect()
        })
    }

    fn register_tracked_field(&self, field: &str) -> StoreResult<()> {
        self.write(|inner| {
            inner.tracked.insert(field.to_string());
        })
    }

    fn tracked_fields(&self) -> StoreResult<BTreeSet<String>> {
        self.read(|inner| inner.tracked.clone())
    }

    fn bump_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
        value: &str,
        rating: f64,
    ) -> StoreResult<()> {
        self.write(|inner| {
            inner
                .user_aggregates
                .entry(field.to_string())
                .or_default()
                .entry(user_id.to_string())
                .or_default()
                .bump(value, rating);
        })
    }

    fn bump_value_aggregate(
        &self,
        field: &str,
        value: &str,
        user_id: &str,
        rating: f64,
    ) -> StoreResult<()> {
        self.write(|inner| {
            inner
                .value_aggregates
                .entry(field.to_string())
                .or_default()
                .entry(value.to_string())
                .or_default()
                .bump(user_id, rating);
        })
    }

    fn get_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
    ) -> StoreResult<Option<FieldAggregate>> {
        self.read(|inner| {
            inner
                .user_aggregates
                .get(field)
                .and_then(|per_user| per_user.get(user_id))
                .cloned()
        })
    }

    fn all_user_aggregates(&self, field: &str) -> StoreResult<HashMap<String, FieldAggregate>> {
        self.read(|inner| inner.user_aggregates.get(field).cloned().unwrap_or_default())
    }

    fn take_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
    ) -> StoreResult<Option<FieldAggregate>> {
        self.write(|inner| {
            inner
                .user_aggregates
                .get_mut(field)
                .and_then(|per_user| per_user.remove(user_id))
        })
    }

    fn put_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
        aggregate: FieldAggregate,
    ) -> StoreResult<()> {
        self.write(|inner| {
            inner
                .user_aggregates
                .entry(field.to_string())
                .or_default()
                .insert(user_id.to_string(), aggregate);
        })
    }

    fn all_value_aggregates(&self, field: &str) -> StoreResult<HashMap<String, FieldAggregate>> {
        self.read(|inner| {
            inner
                .value_aggregates
                .get(field)
                .cloned()
                .unwrap_or_default()
        })
    }

    fn replace_value_aggregates(
        &self,
        field: &str,
        aggregates: HashMap<String, FieldAggregate>,
    ) -> StoreResult<()> {
        self.write(|inner| {
            inner
                .value_aggregates
                .insert(field.to_string(), aggregates);
        })
    }

    fn wipe(&self) -> StoreResult<()> {
        self.write(|inner| *inner = Inner::default())
    }
}
