//! Identity reconciliation and forward/reverse resynchronization.
//!
//! Reconciliation merges everything attributed to one id into another
//! (anonymous session → logged-in user). The user direction is merged
//! key by key under a single merge policy; the item direction is then
//! rebuilt wholesale from the user direction, which is also the repair
//! path when the two directions are found to disagree.

use std::collections::HashMap;

use tracing::{debug, warn};

use kindling_core::errors::EngineResult;
use kindling_core::model::{FieldAggregate, RatingMap};
use kindling_core::traits::RatingStore;

/// Resolve a rating-key collision during reconciliation. The incoming
/// (old id) value wins, last-writer style. Aggregates are merged
/// additively instead; only the rating maps go through this policy, and
/// it stays isolated here because swapping it changes recommendation
/// semantics.
pub(crate) fn merge_policy<T>(incoming: T, _existing: Option<T>) -> T {
    incoming
}

/// Move the old id's forward ratings onto the new id. Returns false when
/// the old id had none. The reverse map still references the old id
/// afterwards; callers follow up with `resync`.
pub(crate) fn merge_user_ratings(
    store: &dyn RatingStore,
    old_id: &str,
    new_id: &str,
) -> EngineResult<bool> {
    let old_vector = store.take_user_vector(old_id)?;
    if old_vector.is_empty() {
        return Ok(false);
    }
    let new_vector = store.get_user_vector(new_id)?;
    for (item, score) in old_vector {
        let merged = merge_policy(score, new_vector.get(&item).copied());
        store.upsert_rating(new_id, &item, merged)?;
    }
    Ok(true)
}

/// Move the old id's user-direction aggregates onto the new id for every
/// tracked field. Sums and counts merge additively: both identities'
/// engagement with a metadata value is real, so the totals stack.
/// Returns false when the old id had none.
pub(crate) fn merge_user_aggregates(
    store: &dyn RatingStore,
    old_id: &str,
    new_id: &str,
) -> EngineResult<bool> {
    let mut moved = false;
    for field in store.tracked_fields()? {
        let Some(old_aggregate) = store.take_user_aggregate(&field, old_id)? else {
            continue;
        };
        moved = true;
        let mut merged = store
            .get_user_aggregate(&field, new_id)?
            .unwrap_or_default();
        for (value, tot) in old_aggregate.tot {
            *merged.tot.entry(value).or_insert(0.0) += tot;
        }
        for (value, n) in old_aggregate.n {
            *merged.n.entry(value).or_insert(0) += n;
        }
        store.put_user_aggregate(&field, new_id, merged)?;
    }
    Ok(moved)
}

/// Rebuild every item-direction structure from its user-direction
/// counterpart: the reverse rating map by inverting the forward map, and
/// each field's value aggregates by inverting the user aggregates. The
/// user direction is the authoritative truth.
pub fn resync(store: &dyn RatingStore) -> EngineResult<()> {
    warn!("resynchronizing item-direction maps from the user direction");

    let forward = store.all_user_vectors()?;
    let mut reverse = RatingMap::new();
    for (user, vector) in &forward {
        for (item, &score) in vector {
            reverse
                .entry(item.clone())
                .or_default()
                .insert(user.clone(), score);
        }
    }
    store.replace_item_vectors(reverse)?;

    for field in store.tracked_fields()? {
        let by_user = store.all_user_aggregates(&field)?;
        let mut by_value: HashMap<String, FieldAggregate> = HashMap::new();
        for (user, aggregate) in by_user {
            for (value, tot) in aggregate.tot {
                by_value
                    .entry(value)
                    .or_default()
                    .tot
                    .insert(user.clone(), tot);
            }
            for (value, n) in aggregate.n {
                by_value.entry(value).or_default().n.insert(user.clone(), n);
            }
        }
        debug!(field = %field, values = by_value.len(), "resynced field aggregates");
        store.replace_value_aggregates(&field, by_value)?;
    }

    Ok(())
}

/// Compare the reverse map against the inversion of the forward map.
/// Returns a human-readable description of the first disagreement, or
/// `None` when the directions agree.
pub(crate) fn detect_divergence(store: &dyn RatingStore) -> EngineResult<Option<String>> {
    let forward = store.all_user_vectors()?;
    let reverse = store.all_item_vectors()?;

    let mut expected = RatingMap::new();
    for (user, vector) in &forward {
        for (item, &score) in vector {
            expected
                .entry(item.clone())
                .or_default()
                .insert(user.clone(), score);
        }
    }

    if expected == reverse {
        return Ok(None);
    }

    for (item, per_user) in &expected {
        match reverse.get(item) {
            None => return Ok(Some(format!("item '{item}' missing from reverse map"))),
            Some(actual) if actual != per_user => {
                return Ok(Some(format!("item '{item}' disagrees between directions")))
            }
            Some(_) => {}
        }
    }
    let extra = reverse.keys().find(|item| !expected.contains_key(*item));
    Ok(extra.map(|item| format!("item '{item}' exists only in reverse map")))
}

#[cfg(test)]
mod tests {
    use super::*;

    use kindling_store::MemoryStore;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.upsert_rating("u1", "i1", 5.0).unwrap();
        store.upsert_rating("u1", "i2", 4.0).unwrap();
        store.upsert_rating("u2", "i1", 3.0).unwrap();
        store
    }

    #[test]
    fn agreeing_directions_report_no_divergence() {
        let store = seeded();
        assert_eq!(detect_divergence(&store).unwrap(), None);
    }

    #[test]
    fn skewed_reverse_map_is_detected_and_repaired() {
        let store = seeded();

        // Clobber the reverse map with a stale, disagreeing snapshot.
        let mut skewed = RatingMap::new();
        skewed
            .entry("i1".to_string())
            .or_default()
            .insert("u1".to_string(), 1.0);
        store.replace_item_vectors(skewed).unwrap();

        let symptom = detect_divergence(&store).unwrap();
        assert!(symptom.is_some(), "skew went undetected");

        resync(&store).unwrap();
        assert_eq!(detect_divergence(&store).unwrap(), None);
        let i2 = store.get_item_vector("i2").unwrap();
        assert_eq!(i2.get("u1"), Some(&4.0));
    }

    #[test]
    fn take_without_resync_is_divergence() {
        let store = seeded();
        store.take_user_vector("u2").unwrap();
        let symptom = detect_divergence(&store).unwrap();
        assert!(symptom.is_some(), "orphaned reverse entries went undetected");
    }
}
