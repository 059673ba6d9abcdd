//! Recommendation scoring: item-based projection, popularity padding,
//! cold-start seeding, category blending, and the final ordering.
//!
//! Kept as free functions over a `(item_id, score)` candidate list so
//! the engine's retry chain can re-run individual stages after a rebuild
//! or resync.

use std::collections::HashSet;

use kindling_core::errors::{EngineError, EngineResult};
use kindling_core::model::RatingVector;
use kindling_core::traits::RatingStore;

use crate::cooccurrence::CooccurrenceModel;
use crate::popularity::PopularityRanking;

/// Raw item-based scores: the user's rating vector projected through the
/// co-occurrence matrix, sorted descending. Every matrix item receives a
/// score (zero when nothing the user rated co-occurs with it).
///
/// A nonzero-rated item missing from the matrix means the matrix
/// predates that rating: surfaced as `StaleMatrix` so the caller can
/// rebuild and retry. Zero ratings are outside the incidence and never
/// count as staleness.
pub fn item_scores(
    model: &CooccurrenceModel,
    user_vector: &RatingVector,
) -> EngineResult<Vec<(String, f64)>> {
    let projected = model
        .items
        .project(user_vector)
        .map_err(|detail| EngineError::StaleMatrix { detail })?;
    let mut scores: Vec<(String, f64)> = projected.into_iter().collect();
    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    Ok(scores)
}

/// Append popular items the candidate list is missing, each scored
/// `last_score × n/(n+1)` where n is the list length at insertion. The
/// tail decreases strictly, so popularity fill never outranks a
/// rating-derived entry and stays internally ordered by popularity rank.
pub fn pad_from_popularity(
    candidates: &mut Vec<(String, f64)>,
    popularity: &PopularityRanking,
    max_results: usize,
) {
    let mut present: HashSet<&String> = candidates.iter().map(|(item, _)| item).collect();
    let mut fill = Vec::new();
    for item in &popularity.ranked {
        if candidates.len() + fill.len() >= max_results {
            break;
        }
        if present.contains(item) {
            continue;
        }
        present.insert(item);
        fill.push(item.clone());
    }
    for item in fill {
        let n = candidates.len() as f64;
        let base = candidates.last().map(|(_, score)| *score).unwrap_or(0.0);
        candidates.push((item, base * n / (n + 1.0)));
    }
}

/// Cold-start candidate list: the popularity ranking with harmonic
/// decay, `max_rating / (rank + 1)`.
pub fn seed_from_popularity(
    popularity: &PopularityRanking,
    max_rating: f64,
    max_results: usize,
) -> Vec<(String, f64)> {
    popularity
        .ranked
        .iter()
        .take(max_results)
        .enumerate()
        .map(|(rank, item)| (item.clone(), max_rating / (rank as f64 + 1.0)))
        .collect()
}

/// Category blending: for every tracked field the user has an aggregate
/// for, project the user's per-value affinity (`tot / max(n, 1)`)
/// through that field's matrix and add each candidate's value-level
/// score to its running total. A candidate with no value for the field,
/// or a value absent from the matrix, contributes zero; that is not an
/// error.
pub fn blend_categories(
    candidates: &mut [(String, f64)],
    model: &CooccurrenceModel,
    store: &dyn RatingStore,
    user_id: &str,
) -> EngineResult<()> {
    for (field, matrix) in &model.fields {
        let Some(aggregate) = store.get_user_aggregate(field, user_id)? else {
            continue;
        };
        let value_scores = matrix.project_lenient(&aggregate.affinity());

        for (item, score) in candidates.iter_mut() {
            let metadata = store.get_item_metadata(item)?;
            if let Some(value) = metadata.get(field) {
                *score += value_scores.get(value).copied().unwrap_or(0.0);
            }
        }
    }
    Ok(())
}

/// Final ranking: descending blended score, ties broken by popularity
/// rank then item id, already-rated items dropped, truncated to
/// `max_results`.
pub fn finalize(
    mut candidates: Vec<(String, f64)>,
    user_vector: &RatingVector,
    popularity: &PopularityRanking,
    max_results: usize,
) -> Vec<String> {
    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| popularity.rank_of(&a.0).cmp(&popularity.rank_of(&b.0)))
            .then_with(|| a.0.cmp(&b.0))
    });
    candidates
        .into_iter()
        .filter(|(item, _)| user_vector.get(item).copied().unwrap_or(0.0) == 0.0)
        .map(|(item, _)| item)
        .take(max_results)
        .collect()
}
