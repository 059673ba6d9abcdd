//! Property checks over randomly generated rating graphs.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use kindling_core::config::RecommenderConfig;
use kindling_core::traits::RatingStore;
use kindling_engine::cooccurrence::{build_model, Cooccurrence, LogLikelihood, SimilarityMeasure};
use kindling_engine::Recommender;
use kindling_store::MemoryStore;

/// A random rating graph: (user index, item index, rating).
fn rating_graph() -> impl Strategy<Value = Vec<(u8, u8, f64)>> {
    prop::collection::vec((0u8..12, 0u8..20, 1.0f64..=5.0), 1..60)
}

fn seeded_store(graph: &[(u8, u8, f64)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for (user, item, rating) in graph {
        store
            .upsert_rating(&format!("u{user}"), &format!("i{item}"), *rating)
            .expect("upsert");
    }
    store
}

proptest! {
    /// Co-rating is symmetric and counts are never negative.
    #[test]
    fn item_matrix_is_symmetric_and_non_negative(graph in rating_graph()) {
        let store = seeded_store(&graph);
        let model = build_model(store.as_ref(), &Cooccurrence).expect("build");
        let m = &model.items;
        for (i, _) in m.labels().iter().enumerate() {
            for (j, _) in m.labels().iter().enumerate() {
                prop_assert!(m.get(i, j) >= 0.0);
                prop_assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }

    /// Building twice from the same snapshot yields the same matrix.
    #[test]
    fn rebuild_is_idempotent(graph in rating_graph()) {
        let store = seeded_store(&graph);
        let first = build_model(store.as_ref(), &Cooccurrence).expect("build");
        let second = build_model(store.as_ref(), &Cooccurrence).expect("build");
        prop_assert_eq!(&first.items, &second.items);
    }

    /// The log-likelihood ratio is clamped to be non-negative for any
    /// contingency table.
    #[test]
    fn log_likelihood_is_non_negative(
        k11 in 0.0f64..500.0,
        k12 in 0.0f64..500.0,
        k21 in 0.0f64..500.0,
        k22 in 0.0f64..500.0,
    ) {
        let score = LogLikelihood.weigh(k11, k12, k21, k22);
        prop_assert!(score >= 0.0, "llr({k11},{k12},{k21},{k22}) = {score}");
    }

    /// Recommendations never exceed the requested bound and never
    /// include an item the user already rated.
    #[test]
    fn recommendations_are_bounded_and_exclude_rated(
        graph in rating_graph(),
        user in 0u8..12,
        max_results in 1usize..10,
    ) {
        let store = seeded_store(&graph);
        let user_id = format!("u{user}");
        let rated: HashSet<String> = store.get_user_vector(&user_id).expect("vector")
            .into_keys()
            .collect();

        let engine = Recommender::new(store, RecommenderConfig::default());
        let recs = engine
            .get_recommendations(&user_id, Some(max_results), false)
            .expect("recommendations");

        prop_assert!(recs.len() <= max_results);
        let unique: HashSet<&String> = recs.iter().collect();
        prop_assert_eq!(unique.len(), recs.len());
        for item in &recs {
            prop_assert!(!rated.contains(item), "{item} was already rated");
        }
    }
}
