//! Co-occurrence model construction.
//!
//! The incidence is binary: a rating of any magnitude counts as one
//! co-rating event, so `C[i][j]` is the number of users who rated both
//! i and j and the diagonal is each item's rater count. The same
//! construction runs once over items and once per tracked metadata
//! field over that field's values. Building is O(items² · users) dense,
//! which is why callers throttle it behind a staleness window instead of
//! rebuilding per request.

pub mod matrix;
pub mod similarity;

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::debug;

use kindling_core::errors::EngineResult;
use kindling_core::traits::RatingStore;

pub use matrix::LabeledMatrix;
pub use similarity::{Cooccurrence, LogLikelihood, SimilarityMeasure};

/// The derived similarity model: one item matrix, one matrix per tracked
/// metadata field, and the build timestamp. A cache, never authoritative.
#[derive(Debug, Clone, Default)]
pub struct CooccurrenceModel {
    pub items: LabeledMatrix,
    pub fields: HashMap<String, LabeledMatrix>,
    pub built_at: Option<DateTime<Utc>>,
}

impl CooccurrenceModel {
    /// A model that has never been built. Always stale.
    pub fn unbuilt() -> Self {
        Self::default()
    }

    /// Seconds since the last build; `None` if never built.
    pub fn age_secs(&self) -> Option<i64> {
        self.built_at.map(|t| (Utc::now() - t).num_seconds())
    }

    pub fn is_older_than(&self, window_secs: u64) -> bool {
        match self.age_secs() {
            Some(age) => age < 0 || age as u64 > window_secs,
            None => true,
        }
    }
}

/// Build the full model from the store's current snapshot.
pub fn build_model(
    store: &dyn RatingStore,
    measure: &dyn SimilarityMeasure,
) -> EngineResult<CooccurrenceModel> {
    let user_vectors = store.all_user_vectors()?;
    let observations: Vec<Vec<String>> = user_vectors
        .values()
        .map(|vector| {
            vector
                .iter()
                .filter(|(_, &score)| score != 0.0)
                .map(|(item, _)| item.clone())
                .collect()
        })
        .collect();
    let items = cooccurrence_matrix(&observations, measure);
    debug!(items = items.len(), users = observations.len(), "built item co-occurrence");

    let mut fields = HashMap::new();
    for field in store.tracked_fields()? {
        let by_value = store.all_value_aggregates(&field)?;
        // Invert value → {user → tot} into per-user value sets; the
        // incidence is binary so only nonzero sums matter.
        let mut per_user: HashMap<String, Vec<String>> = HashMap::new();
        for (value, aggregate) in &by_value {
            for (user, &tot) in &aggregate.tot {
                if tot != 0.0 {
                    per_user.entry(user.clone()).or_default().push(value.clone());
                }
            }
        }
        let value_observations: Vec<Vec<String>> = per_user.into_values().collect();
        let matrix = cooccurrence_matrix(&value_observations, measure);
        debug!(field = %field, values = matrix.len(), "built field co-occurrence");
        fields.insert(field, matrix);
    }

    Ok(CooccurrenceModel {
        items,
        fields,
        built_at: Some(Utc::now()),
    })
}

/// Count pair co-occurrences across observations, then weigh every
/// off-diagonal cell through the measure. The diagonal keeps raw
/// occurrence counts (popularity) regardless of measure.
fn cooccurrence_matrix(observations: &[Vec<String>], measure: &dyn SimilarityMeasure) -> LabeledMatrix {
    let labels: BTreeSet<String> = observations.iter().flatten().cloned().collect();
    let mut matrix = LabeledMatrix::zeroed(labels.into_iter().collect());
    if matrix.is_empty() {
        return matrix;
    }

    for observation in observations {
        let mut indices: Vec<usize> = observation
            .iter()
            .filter_map(|label| matrix.index_of(label))
            .collect();
        indices.sort_unstable();
        indices.dedup();
        for &a in &indices {
            for &b in &indices {
                matrix.add(a, b, 1.0);
            }
        }
    }

    let n = matrix.len();
    let n_obs = observations.len() as f64;
    let diagonal: Vec<f64> = (0..n).map(|i| matrix.get(i, i)).collect();
    matrix
        .data_mut()
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let k11 = row[j];
                let k12 = diagonal[i] - k11;
                let k21 = diagonal[j] - k11;
                let k22 = (n_obs - diagonal[i] - diagonal[j] + k11).max(0.0);
                row[j] = measure.weigh(k11, k12, k21, k22);
            }
        });

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations() -> Vec<Vec<String>> {
        vec![
            vec!["b1".into(), "b2".into()],
            vec!["b1".into(), "b3".into()],
            vec!["b1".into()],
        ]
    }

    #[test]
    fn diagonal_is_rater_count() {
        let m = cooccurrence_matrix(&observations(), &Cooccurrence);
        assert_eq!(m.get_labeled("b1", "b1"), Some(3.0));
        assert_eq!(m.get_labeled("b2", "b2"), Some(1.0));
        assert_eq!(m.get_labeled("b3", "b3"), Some(1.0));
    }

    #[test]
    fn off_diagonal_counts_co_raters() {
        let m = cooccurrence_matrix(&observations(), &Cooccurrence);
        assert_eq!(m.get_labeled("b1", "b2"), Some(1.0));
        assert_eq!(m.get_labeled("b2", "b3"), Some(0.0));
    }

    #[test]
    fn matrix_is_symmetric_and_non_negative() {
        let m = cooccurrence_matrix(&observations(), &Cooccurrence);
        for a in m.labels() {
            for b in m.labels() {
                let ab = m.get_labeled(a, b).unwrap();
                assert!(ab >= 0.0);
                assert_eq!(ab, m.get_labeled(b, a).unwrap());
            }
        }
    }

    #[test]
    fn duplicate_items_in_one_observation_count_once() {
        let m = cooccurrence_matrix(&[vec!["x".into(), "x".into()]], &Cooccurrence);
        assert_eq!(m.get_labeled("x", "x"), Some(1.0));
    }

    #[test]
    fn llr_weighted_matrix_stays_symmetric() {
        let m = cooccurrence_matrix(&observations(), &LogLikelihood);
        for a in m.labels() {
            for b in m.labels() {
                let ab = m.get_labeled(a, b).unwrap();
                let ba = m.get_labeled(b, a).unwrap();
                assert!((ab - ba).abs() < 1e-9);
                assert!(ab >= 0.0);
            }
        }
        // Diagonal stays a raw rater count under any measure.
        assert_eq!(m.get_labeled("b1", "b1"), Some(3.0));
    }

    #[test]
    fn empty_observations_build_empty_matrix() {
        let m = cooccurrence_matrix(&[], &Cooccurrence);
        assert!(m.is_empty());
    }

    #[test]
    fn unbuilt_model_is_always_stale() {
        let model = CooccurrenceModel::unbuilt();
        assert!(model.is_older_than(0));
        assert!(model.age_secs().is_none());
    }
}
