//! Global popularity ranking: items ordered by total rating mass.
//!
//! Only consulted when item-based scores cannot fill a request (sparse
//! history) or the user has no history at all. Registered items that
//! nobody has rated trail the ranked portion so a cold catalog can still
//! be served.

use chrono::{DateTime, Utc};

use kindling_core::errors::EngineResult;
use kindling_core::traits::RatingStore;

/// Item ids ordered most-popular first, with the build timestamp.
#[derive(Debug, Clone, Default)]
pub struct PopularityRanking {
    pub ranked: Vec<String>,
    pub built_at: Option<DateTime<Utc>>,
}

impl PopularityRanking {
    pub fn unbuilt() -> Self {
        Self::default()
    }

    pub fn is_older_than(&self, window_secs: u64) -> bool {
        match self.built_at.map(|t| (Utc::now() - t).num_seconds()) {
            Some(age) => age < 0 || age as u64 > window_secs,
            None => true,
        }
    }

    /// 0-based rank per item; items outside the ranking compare last.
    pub fn rank_of(&self, item_id: &str) -> usize {
        self.ranked
            .iter()
            .position(|i| i == item_id)
            .unwrap_or(usize::MAX)
    }
}

/// Rank every known item by the sum of its ratings, descending. Ties and
/// the unrated tail are ordered by item id so two builds over the same
/// data produce the same sequence.
pub fn build_popularity(store: &dyn RatingStore) -> EngineResult<PopularityRanking> {
    let user_vectors = store.all_user_vectors()?;
    let mut mass: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    for vector in user_vectors.values() {
        for (item, score) in vector {
            *mass.entry(item.clone()).or_insert(0.0) += score;
        }
    }

    let mut ranked: Vec<(String, f64)> = mass.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    let mut ranked: Vec<String> = ranked.into_iter().map(|(item, _)| item).collect();

    // Registered-but-unrated items fill the tail (already sorted by id).
    for item in store.all_item_ids()? {
        if !ranked.contains(&item) {
            ranked.push(item);
        }
    }

    Ok(PopularityRanking {
        ranked,
        built_at: Some(Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_of_unknown_item_is_last() {
        let ranking = PopularityRanking {
            ranked: vec!["a".into(), "b".into()],
            built_at: Some(Utc::now()),
        };
        assert_eq!(ranking.rank_of("a"), 0);
        assert_eq!(ranking.rank_of("zz"), usize::MAX);
    }

    #[test]
    fn unbuilt_ranking_is_stale() {
        assert!(PopularityRanking::unbuilt().is_older_than(3600));
    }
}
