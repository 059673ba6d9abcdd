//! End-to-end scenarios for the recommender, exercised against both
//! store backends. Every scenario runs on a fresh engine.

use std::collections::HashMap;
use std::sync::Arc;

use kindling_core::config::RecommenderConfig;
use kindling_core::traits::RatingStore;
use kindling_engine::Recommender;
use kindling_store::{MemoryStore, SqliteStore};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn for_each_backend(scenario: impl Fn(Recommender)) {
    init_tracing();
    let memory: Arc<dyn RatingStore> = Arc::new(MemoryStore::new());
    scenario(Recommender::new(memory, RecommenderConfig::default()));

    let sqlite: Arc<dyn RatingStore> =
        Arc::new(SqliteStore::open_in_memory().expect("in-memory sqlite"));
    scenario(Recommender::new(sqlite, RecommenderConfig::default()));
}

fn rate(engine: &Recommender, user: &str, item: &str, rating: f64) {
    engine
        .insert_rating(user, item, Some(rating), &[], false)
        .expect("insert_rating");
}

fn item_with_author(engine: &Recommender, id: &str, author: &str) {
    let fields: HashMap<String, String> = [
        ("_id".to_string(), id.to_string()),
        ("author".to_string(), author.to_string()),
    ]
    .into_iter()
    .collect();
    engine.insert_item(&fields, "_id").expect("insert_item");
}

/// Three readers with overlapping shelves. The reader who only rated
/// "brave_new_world" should be pointed at "1984" first (one shared
/// rater) and never at their own book.
#[test]
fn recommends_cooccurring_items_first() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "1984", 5.0);
        rate(&engine, "u1", "brave_new_world", 4.0);
        rate(&engine, "u2", "1984", 5.0);
        rate(&engine, "u2", "animal_farm", 5.0);
        rate(&engine, "u3", "brave_new_world", 3.0);

        let recs = engine
            .get_recommendations("u3", Some(10), false)
            .expect("recommendations");
        assert_eq!(recs[0], "1984");
        assert!(recs.contains(&"animal_farm".to_string()));
        assert!(!recs.contains(&"brave_new_world".to_string()));
    });
}

/// Category blending: a reader who rated one Orwell title highly gets
/// the other Orwell title recommended, driven by both the co-rating
/// link and the shared author.
#[test]
fn shared_author_boosts_unseen_item() {
    for_each_backend(|engine| {
        item_with_author(&engine, "B1", "Orwell");
        item_with_author(&engine, "B2", "Orwell");
        item_with_author(&engine, "B3", "Huxley");
        let tracked = vec!["author".to_string()];

        engine
            .insert_rating("user1", "B1", Some(5.0), &tracked, false)
            .expect("insert_rating");
        engine
            .insert_rating("user1", "B2", Some(4.0), &tracked, false)
            .expect("insert_rating");
        engine
            .insert_rating("user2", "B1", Some(5.0), &tracked, false)
            .expect("insert_rating");
        engine
            .insert_rating("user2", "B3", Some(5.0), &tracked, false)
            .expect("insert_rating");

        let recs = engine
            .get_recommendations("user2", Some(5), false)
            .expect("recommendations");
        assert_eq!(recs[0], "B2");
    });
}

#[test]
fn never_recommends_already_rated_items() {
    for_each_backend(|engine| {
        for item in ["a", "b", "c", "d"] {
            rate(&engine, "u1", item, 4.0);
        }
        rate(&engine, "u2", "a", 5.0);
        rate(&engine, "u2", "e", 5.0);

        let recs = engine
            .get_recommendations("u1", Some(10), false)
            .expect("recommendations");
        for rated in ["a", "b", "c", "d"] {
            assert!(!recs.contains(&rated.to_string()), "{rated} was already rated");
        }
        assert!(recs.contains(&"e".to_string()));
    });
}

#[test]
fn output_is_bounded_and_duplicate_free() {
    for_each_backend(|engine| {
        for i in 0..20 {
            rate(&engine, "u1", &format!("item_{i:02}"), 4.0);
        }
        rate(&engine, "u2", "item_00", 5.0);

        let recs = engine
            .get_recommendations("u2", Some(5), false)
            .expect("recommendations");
        assert!(recs.len() <= 5);
        let mut deduped = recs.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), recs.len(), "duplicates in {recs:?}");
    });
}

/// A user with no history is seeded from popularity: rating mass first,
/// id as the deterministic tiebreak.
#[test]
fn cold_user_gets_popularity_ranking() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "1984", 5.0);
        rate(&engine, "u2", "1984", 5.0);
        rate(&engine, "u1", "brave_new_world", 4.0);
        rate(&engine, "u3", "brave_new_world", 3.0);
        rate(&engine, "u2", "animal_farm", 5.0);

        let recs = engine
            .get_recommendations("nobody", Some(10), false)
            .expect("recommendations");
        assert_eq!(recs, vec!["1984", "brave_new_world", "animal_farm"]);

        // A second call does not reshuffle anything.
        let again = engine
            .get_recommendations("nobody", Some(10), false)
            .expect("recommendations");
        assert_eq!(recs, again);
    });
}

/// Registered-but-unrated items trail the popularity ranking instead of
/// disappearing from cold-start results.
#[test]
fn unrated_items_trail_the_popularity_ranking() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "rated", 5.0);
        item_with_author(&engine, "shelf_warmer", "nobody");

        let recs = engine
            .get_recommendations("cold", Some(10), false)
            .expect("recommendations");
        assert_eq!(recs, vec!["rated", "shelf_warmer"]);
    });
}

#[test]
fn removing_a_rating_removes_its_influence() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "1984", 5.0);
        rate(&engine, "u1", "animal_farm", 5.0);
        rate(&engine, "u2", "1984", 5.0);

        let before = engine
            .get_recommendations("u2", Some(10), false)
            .expect("recommendations");
        assert_eq!(before[0], "animal_farm");

        engine.remove_rating("u1", "animal_farm").expect("remove");
        assert_eq!(engine.get_user_ratings("u1").expect("ratings").len(), 1);

        // No co-rater links animal_farm to 1984 any more; it survives
        // only as a popularity-tail candidate.
        let after = engine
            .get_recommendations("u2", Some(10), false)
            .expect("recommendations");
        assert!(after.contains(&"animal_farm".to_string()));
        let similar = engine.get_similar_items("1984", None, 10).expect("similar");
        assert!(similar.is_empty(), "unexpected matrix link: {similar:?}");
    });
}

/// A rating on an item the cached model has never seen must not fail
/// the request: the stale projection is retried after a rebuild.
#[test]
fn stale_model_recovers_via_rebuild() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "old_item", 4.0);
        rate(&engine, "u2", "old_item", 4.0);
        rate(&engine, "u2", "other", 4.0);
        engine.rebuild().expect("rebuild");

        rate(&engine, "u1", "brand_new", 5.0);
        let recs = engine
            .get_recommendations("u1", Some(10), true)
            .expect("stale model should recover");
        assert!(recs.contains(&"other".to_string()));
        assert!(!recs.contains(&"brand_new".to_string()));
    });
}

#[test]
fn reconciles_two_identities_into_one() {
    for_each_backend(|engine| {
        rate(&engine, "old_me", "1984", 5.0);
        rate(&engine, "old_me", "animal_farm", 2.0);
        rate(&engine, "new_me", "animal_farm", 4.0);
        rate(&engine, "new_me", "brave_new_world", 3.0);

        engine.reconcile_ids("old_me", "new_me").expect("reconcile");

        assert!(engine.get_user_ratings("old_me").expect("ratings").is_empty());
        let merged = engine.get_user_ratings("new_me").expect("ratings");
        assert_eq!(merged.len(), 3);
        // On conflict the incoming (old) rating wins.
        assert_eq!(merged["animal_farm"], 2.0);
        assert_eq!(merged["1984"], 5.0);
        assert_eq!(merged["brave_new_world"], 3.0);
    });
}

/// Both identities' engagement is real, so category sums and counts
/// stack instead of one side winning.
#[test]
fn reconciliation_sums_category_aggregates() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let engine = Recommender::new(store.clone(), RecommenderConfig::default());
    item_with_author(&engine, "i_orwell", "orwell");
    let tracked = vec!["author".to_string()];

    engine
        .insert_rating("old_me", "i_orwell", Some(5.0), &tracked, false)
        .expect("insert_rating");
    engine
        .insert_rating("new_me", "i_orwell", Some(3.0), &tracked, false)
        .expect("insert_rating");

    engine.reconcile_ids("old_me", "new_me").expect("reconcile");

    let agg = store
        .get_user_aggregate("author", "new_me")
        .expect("aggregate")
        .expect("aggregate exists");
    assert_eq!(agg.tot["orwell"], 8.0);
    assert_eq!(agg.n["orwell"], 2);
    assert!(store
        .get_user_aggregate("author", "old_me")
        .expect("aggregate")
        .is_none());
}

#[test]
fn reconciling_a_ghost_id_is_a_noop() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "1984", 5.0);
        engine.reconcile_ids("ghost", "u1").expect("no-op reconcile");
        assert_eq!(engine.get_user_ratings("u1").expect("ratings").len(), 1);
    });
}

/// `info_only` feeds the category aggregates without faking a consumed
/// item: the user stays cold but their taste steers the blending.
#[test]
fn info_only_shapes_cold_start_without_recording_a_rating() {
    for_each_backend(|engine| {
        item_with_author(&engine, "i_orwell", "orwell");
        item_with_author(&engine, "i_huxley", "huxley");
        let tracked = vec!["author".to_string()];

        for user in ["b1", "b2"] {
            engine
                .insert_rating(user, "i_huxley", Some(5.0), &tracked, false)
                .expect("insert_rating");
        }
        engine
            .insert_rating("b3", "i_orwell", Some(5.0), &tracked, false)
            .expect("insert_rating");

        engine
            .insert_rating("c", "i_orwell", Some(5.0), &tracked, true)
            .expect("info_only insert");
        assert!(engine.get_user_ratings("c").expect("ratings").is_empty());

        // Popularity alone would put the Huxley title first; the
        // author affinity pulls the Orwell title ahead.
        let recs = engine
            .get_recommendations("c", Some(10), false)
            .expect("recommendations");
        assert_eq!(recs[0], "i_orwell");

        let blind = engine
            .get_recommendations("someone_else", Some(10), false)
            .expect("recommendations");
        assert_eq!(blind[0], "i_huxley");
    });
}

#[test]
fn similar_items_come_from_the_matrix_row() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "1984", 5.0);
        rate(&engine, "u1", "brave_new_world", 4.0);
        rate(&engine, "u2", "1984", 5.0);
        rate(&engine, "u2", "animal_farm", 5.0);
        rate(&engine, "u2", "brave_new_world", 4.0);

        let similar = engine
            .get_similar_items("1984", None, 10)
            .expect("similar items");
        assert!(!similar.contains(&"1984".to_string()));
        // brave_new_world shares two raters, animal_farm one.
        assert_eq!(similar[0], "brave_new_world");
        assert_eq!(similar[1], "animal_farm");
    });
}

#[test]
fn zero_max_results_yields_empty() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "1984", 5.0);
        let recs = engine.get_recommendations("u1", Some(0), false).expect("zero cap");
        assert!(recs.is_empty());
    });
}

#[test]
fn insert_item_requires_its_id_field() {
    for_each_backend(|engine| {
        let fields: HashMap<String, String> =
            [("author".to_string(), "orwell".to_string())].into_iter().collect();
        assert!(engine.insert_item(&fields, "_id").is_err());
    });
}

#[test]
fn ids_are_normalized_consistently() {
    for_each_backend(|engine| {
        rate(&engine, "u.s.e.r", "some.item", 5.0);
        let ratings = engine.get_user_ratings("user").expect("ratings");
        assert_eq!(ratings.get("someitem"), Some(&5.0));
    });
}

/// Ratings written through one engine survive a process restart: a new
/// engine over the same database file rebuilds the same model.
#[test]
fn recommendations_survive_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("kindling.db");

    {
        let store: Arc<dyn RatingStore> =
            Arc::new(SqliteStore::open(&path).expect("open"));
        let engine = Recommender::new(store, RecommenderConfig::default());
        rate(&engine, "u1", "1984", 5.0);
        rate(&engine, "u1", "brave_new_world", 4.0);
        rate(&engine, "u2", "1984", 5.0);
    }

    let store: Arc<dyn RatingStore> = Arc::new(SqliteStore::open(&path).expect("reopen"));
    let engine = Recommender::new(store, RecommenderConfig::default());
    let recs = engine
        .get_recommendations("u2", Some(10), false)
        .expect("recommendations");
    assert_eq!(recs, vec!["brave_new_world"]);
}

/// A zero rating is recorded against the user but carries no incidence
/// mass, so the model never learns the item. Scoring must treat such an
/// entry as weightless rather than as a sign of a stale matrix.
#[test]
fn zero_score_rating_does_not_fail_scoring() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "i1", 0.0);
        rate(&engine, "u1", "i2", 5.0);
        rate(&engine, "u2", "i2", 4.0);
        rate(&engine, "u2", "i3", 4.0);

        let recs = engine
            .get_recommendations("u1", Some(10), false)
            .expect("zero-score rating must not fail scoring");
        assert_eq!(recs[0], "i3");
        assert!(!recs.contains(&"i2".to_string()));
        // A zero rating does not mark the item as consumed; it can still
        // come back through the popularity tail.
        assert!(recs.contains(&"i1".to_string()));
    });
}

/// If something clobbers the item-direction map behind the engine's
/// back, `resync` restores it from the user direction and the next
/// request scores normally again.
#[test]
fn resync_repairs_skewed_reverse_maps() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let engine = Recommender::new(store.clone(), RecommenderConfig::default());
    rate(&engine, "u1", "1984", 5.0);
    rate(&engine, "u1", "animal_farm", 4.0);
    rate(&engine, "u2", "1984", 5.0);

    store
        .replace_item_vectors(kindling_core::model::RatingMap::new())
        .expect("clobber reverse map");
    assert!(store.get_item_vector("1984").expect("vector").is_empty());

    engine.resync().expect("resync");
    assert_eq!(store.get_item_vector("1984").expect("vector").len(), 2);
    let recs = engine
        .get_recommendations("u2", Some(10), false)
        .expect("recommendations");
    assert_eq!(recs, vec!["animal_farm"]);
}

/// Omitting the count falls back to the configured default rather than
/// capping an explicit larger request.
#[test]
fn omitted_max_results_falls_back_to_configured_default() {
    for_each_backend(|engine| {
        for i in 0..60 {
            rate(&engine, "collector", &format!("item_{i:02}"), 4.0);
        }

        let defaulted = engine
            .get_recommendations("nobody", None, false)
            .expect("recommendations");
        assert_eq!(defaulted.len(), 50);

        let explicit = engine
            .get_recommendations("nobody", Some(100), false)
            .expect("recommendations");
        assert_eq!(explicit.len(), 60);
    });
}

/// A stale-tolerant read on a freshly started engine still builds the
/// model once: an `info_only` user's author affinity must shape their
/// very first request instead of falling through to raw popularity.
#[test]
fn stale_read_on_fresh_engine_still_blends_categories() {
    for_each_backend(|engine| {
        item_with_author(&engine, "i_orwell", "orwell");
        item_with_author(&engine, "i_huxley", "huxley");
        let tracked = vec!["author".to_string()];

        for user in ["b1", "b2"] {
            engine
                .insert_rating(user, "i_huxley", Some(5.0), &tracked, false)
                .expect("insert_rating");
        }
        engine
            .insert_rating("b3", "i_orwell", Some(5.0), &tracked, false)
            .expect("insert_rating");
        engine
            .insert_rating("c", "i_orwell", Some(5.0), &tracked, true)
            .expect("info_only insert");

        let recs = engine
            .get_recommendations("c", Some(10), true)
            .expect("recommendations");
        assert_eq!(recs[0], "i_orwell");
    });
}

#[test]
fn wipe_clears_data_and_caches() {
    for_each_backend(|engine| {
        rate(&engine, "u1", "1984", 5.0);
        rate(&engine, "u2", "1984", 5.0);
        engine.rebuild().expect("rebuild");

        engine.wipe().expect("wipe");
        assert!(engine.get_user_ratings("u1").expect("ratings").is_empty());
        let recs = engine
            .get_recommendations("u1", Some(10), false)
            .expect("recommendations");
        assert!(recs.is_empty());
    });
}
