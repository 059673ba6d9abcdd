//! Recommender — the engine facade.
//!
//! Owns the store handle, the derived model caches, and the write gate
//! that serializes mutation with rebuilds. A rebuild reads a full
//! snapshot of the rating graph, so a concurrent partial write would
//! corrupt its dimensional consistency; every mutating operation and
//! every rebuild therefore goes through the same mutex. Scoring reads a
//! cloned `Arc` snapshot of the model and never blocks on the gate
//! unless it has to rebuild.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use tracing::{debug, info, warn};

use kindling_core::config::RecommenderConfig;
use kindling_core::errors::{EngineError, EngineResult, StoreError};
use kindling_core::model::{normalize_id, ItemMetadata, RatingVector};
use kindling_core::traits::RatingStore;

use crate::cooccurrence::{build_model, Cooccurrence, CooccurrenceModel, SimilarityMeasure};
use crate::popularity::{build_popularity, PopularityRanking};
use crate::reconcile;
use crate::scoring;

/// The cold-start recommendation engine.
pub struct Recommender {
    store: Arc<dyn RatingStore>,
    config: RecommenderConfig,
    measure: Box<dyn SimilarityMeasure>,
    model: RwLock<Arc<CooccurrenceModel>>,
    popularity: RwLock<Arc<PopularityRanking>>,
    /// Serializes mutation and rebuilds (see module docs).
    write_gate: Mutex<()>,
}

impl Recommender {
    pub fn new(store: Arc<dyn RatingStore>, config: RecommenderConfig) -> Self {
        Self {
            store,
            config,
            measure: Box::new(Cooccurrence),
            model: RwLock::new(Arc::new(CooccurrenceModel::unbuilt())),
            popularity: RwLock::new(Arc::new(PopularityRanking::unbuilt())),
            write_gate: Mutex::new(()),
        }
    }

    /// Swap the similarity measure (e.g. `LogLikelihood`). Takes effect
    /// at the next rebuild.
    pub fn with_measure(mut self, measure: Box<dyn SimilarityMeasure>) -> Self {
        self.measure = measure;
        self
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    // --- Ratings and items ---

    /// Record (or overwrite) a rating. `rating` falls back to the
    /// configured default. `tracked_fields` names the metadata fields to
    /// fold into the category aggregates; fields the item does not carry
    /// are skipped. With `info_only` the rating maps are left untouched
    /// and only the aggregates learn from the event (segmentation-page
    /// flow: "likes Orwell" without pretending the item was consumed).
    pub fn insert_rating(
        &self,
        user_id: &str,
        item_id: &str,
        rating: Option<f64>,
        tracked_fields: &[String],
        info_only: bool,
    ) -> EngineResult<()> {
        let user_id = normalize_id(user_id);
        let item_id = normalize_id(item_id);
        let rating = rating.unwrap_or(self.config.default_rating);
        let _gate = self.gate()?;

        let metadata = self.store.get_item_metadata(&item_id)?;
        if metadata.is_empty() {
            // Unknown (or bare) item: no categories to learn from.
            self.store.register_item(&item_id)?;
        } else {
            for field in tracked_fields {
                let Some(value) = metadata.get(field) else {
                    continue;
                };
                self.store.register_tracked_field(field)?;
                self.store
                    .bump_user_aggregate(field, &user_id, value, rating)?;
                self.store
                    .bump_value_aggregate(field, value, &user_id, rating)?;
            }
        }

        if !info_only {
            self.store.upsert_rating(&user_id, &item_id, rating)?;
        }
        debug!(user = %user_id, item = %item_id, rating, info_only, "rating recorded");
        Ok(())
    }

    /// Register an item from a field map. `id_field` names the key
    /// holding the item id; every other entry becomes metadata.
    pub fn insert_item(&self, fields: &ItemMetadata, id_field: &str) -> EngineResult<()> {
        let raw_id = fields.get(id_field).ok_or_else(|| EngineError::InvalidRequest {
            reason: format!("item is missing its id field '{id_field}'"),
        })?;
        let item_id = normalize_id(raw_id);
        let _gate = self.gate()?;

        self.store.register_item(&item_id)?;
        for (field, value) in fields {
            if field != id_field {
                self.store.upsert_item_metadata(&item_id, field, value)?;
            }
        }
        Ok(())
    }

    /// Remove one rating from both directions. Category aggregates are
    /// deliberately not corrected; they are running approximations.
    pub fn remove_rating(&self, user_id: &str, item_id: &str) -> EngineResult<()> {
        let user_id = normalize_id(user_id);
        let item_id = normalize_id(item_id);
        let _gate = self.gate()?;
        self.store.remove_rating(&user_id, &item_id)?;
        // The item stays known even with no raters left.
        self.store.register_item(&item_id)?;
        Ok(())
    }

    /// The user's rated items: `item_id → score`.
    pub fn get_user_ratings(&self, user_id: &str) -> EngineResult<RatingVector> {
        Ok(self.store.get_user_vector(&normalize_id(user_id))?)
    }

    // --- Recommendations ---

    /// Ranked recommendations for a user, most relevant first, excluding
    /// items they already rated, at most `max_results` long.
    ///
    /// `max_results` falls back to the configured default when `None`.
    /// With `allow_stale` the cached model is reused inside the
    /// staleness window; otherwise every call rebuilds first. A model
    /// that has never been built is built regardless, so aggregates-only
    /// users get their category blend even on stale-tolerant reads.
    pub fn get_recommendations(
        &self,
        user_id: &str,
        max_results: Option<usize>,
        allow_stale: bool,
    ) -> EngineResult<Vec<String>> {
        let max_results = max_results.unwrap_or(self.config.max_recommendations);
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let user_id = normalize_id(user_id);
        let user_vector = self.store.get_user_vector(&user_id)?;
        let item_based = !user_vector.is_empty();

        let window = self.config.staleness_window_secs;
        let needs_build = {
            let model = self.current_model();
            model.built_at.is_none() || (item_based && model.is_older_than(window))
        };
        if !allow_stale || needs_build {
            self.rebuild()?;
        }

        let popularity = self.fresh_popularity()?;
        let mut candidates = if item_based {
            let mut scores = self.item_scores_with_retry(&user_id)?;
            scoring::pad_from_popularity(&mut scores, &popularity, max_results);
            scores
        } else {
            debug!(user = %user_id, "no rating history, seeding from popularity");
            scoring::seed_from_popularity(&popularity, self.config.max_rating, max_results)
        };

        let model = self.current_model();
        scoring::blend_categories(&mut candidates, &model, self.store.as_ref(), &user_id)?;

        // Re-read the vector: the filter must reflect ratings, not the
        // possibly-rebuilt projection input.
        let user_vector = self.store.get_user_vector(&user_id)?;
        Ok(scoring::finalize(
            candidates,
            &user_vector,
            &popularity,
            max_results,
        ))
    }

    /// Items most similar to `item_id`: its matrix row ordered by score,
    /// the item itself excluded. With a `user_id` the row is weighted by
    /// that user's rating of the seed item.
    pub fn get_similar_items(
        &self,
        item_id: &str,
        user_id: Option<&str>,
        max_results: usize,
    ) -> EngineResult<Vec<String>> {
        let item_id = normalize_id(item_id);
        if !self.current_model().items.contains(&item_id) {
            self.rebuild()?;
        }
        let model = self.current_model();
        let Some(mut row) = model.items.row(&item_id) else {
            return Ok(Vec::new());
        };

        if let Some(user_id) = user_id {
            let rating = self
                .store
                .get_user_vector(&normalize_id(user_id))?
                .get(&item_id)
                .copied()
                .unwrap_or(0.0);
            if rating != 0.0 {
                for (_, score) in row.iter_mut() {
                    *score *= rating;
                }
            }
        }

        row.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(row
            .into_iter()
            .filter(|(item, _)| *item != item_id)
            .map(|(item, _)| item)
            .take(max_results)
            .collect())
    }

    // --- Reconciliation and maintenance ---

    /// Merge every rating and aggregate attributed to `old_id` into
    /// `new_id`, then rebuild. After this `old_id` no longer exists in
    /// any structure. A source id with no data is a warned no-op.
    pub fn reconcile_ids(&self, old_id: &str, new_id: &str) -> EngineResult<()> {
        let old_id = normalize_id(old_id);
        let new_id = normalize_id(new_id);
        let _gate = self.gate()?;

        let moved_ratings = reconcile::merge_user_ratings(self.store.as_ref(), &old_id, &new_id)?;
        let moved_aggregates =
            reconcile::merge_user_aggregates(self.store.as_ref(), &old_id, &new_id)?;
        if !moved_ratings && !moved_aggregates {
            let reason = EngineError::MissingIdentity { id: old_id };
            warn!(%reason, new = %new_id, "skipping reconciliation");
            return Ok(());
        }

        // The reverse maps still mention old_id; rebuild them from the
        // merged user direction, then rebuild the model. Reconciliation
        // is complete only once the rebuild succeeds.
        reconcile::resync(self.store.as_ref())?;
        self.rebuild_locked()?;
        info!(old = %old_id, new = %new_id, moved_ratings, moved_aggregates, "identities reconciled");
        Ok(())
    }

    /// Rebuild the item-direction maps from the authoritative user
    /// direction, then rebuild the model.
    pub fn resync(&self) -> EngineResult<()> {
        let _gate = self.gate()?;
        reconcile::resync(self.store.as_ref())?;
        self.rebuild_locked()
    }

    /// Force a model and popularity rebuild from the store's current
    /// snapshot.
    pub fn rebuild(&self) -> EngineResult<()> {
        let _gate = self.gate()?;
        self.rebuild_locked()
    }

    /// Drop all data and caches. The only operation that resets the
    /// tracked-field set.
    pub fn wipe(&self) -> EngineResult<()> {
        let _gate = self.gate()?;
        self.store.wipe()?;
        *self.model.write().map_err(StoreError::poisoned)? =
            Arc::new(CooccurrenceModel::unbuilt());
        *self.popularity.write().map_err(StoreError::poisoned)? =
            Arc::new(PopularityRanking::unbuilt());
        info!("store wiped, caches reset");
        Ok(())
    }

    // --- Internals ---

    fn gate(&self) -> EngineResult<MutexGuard<'_, ()>> {
        self.write_gate
            .lock()
            .map_err(|e| EngineError::Store(StoreError::poisoned(e)))
    }

    fn current_model(&self) -> Arc<CooccurrenceModel> {
        self.model
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    fn current_popularity(&self) -> Arc<PopularityRanking> {
        self.popularity
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    /// Rebuild both caches. Caller must hold the write gate.
    fn rebuild_locked(&self) -> EngineResult<()> {
        let started = Instant::now();
        let model = build_model(self.store.as_ref(), self.measure.as_ref())?;
        let ranking = build_popularity(self.store.as_ref())?;
        let items = model.items.len();
        let fields = model.fields.len();
        *self.model.write().map_err(StoreError::poisoned)? = Arc::new(model);
        *self.popularity.write().map_err(StoreError::poisoned)? = Arc::new(ranking);
        info!(
            items,
            fields,
            elapsed_ms = started.elapsed().as_millis() as u64,
            measure = self.measure.name(),
            "co-occurrence model rebuilt"
        );
        Ok(())
    }

    /// Popularity for the scoring path; refreshed when outside the
    /// staleness window (a forced rebuild has already refreshed it).
    fn fresh_popularity(&self) -> EngineResult<Arc<PopularityRanking>> {
        if self
            .current_popularity()
            .is_older_than(self.config.staleness_window_secs)
        {
            let _gate = self.gate()?;
            // Re-check: another caller may have refreshed while we
            // waited on the gate.
            if self
                .current_popularity()
                .is_older_than(self.config.staleness_window_secs)
            {
                let ranking = build_popularity(self.store.as_ref())?;
                *self.popularity.write().map_err(StoreError::poisoned)? =
                    Arc::new(ranking);
            }
        }
        Ok(self.current_popularity())
    }

    /// Item-based projection with the bounded recovery chain:
    /// stale → rebuild, retry; still stale → divergence check, resync,
    /// rebuild, final retry; anything after that is fatal for this
    /// request.
    fn item_scores_with_retry(&self, user_id: &str) -> EngineResult<Vec<(String, f64)>> {
        let user_vector = self.store.get_user_vector(user_id)?;
        match scoring::item_scores(&self.current_model(), &user_vector) {
            Ok(scores) => return Ok(scores),
            Err(EngineError::StaleMatrix { detail }) => {
                debug!(%detail, "stale matrix on first projection, rebuilding");
            }
            Err(e) => return Err(e),
        }

        self.rebuild()?;
        let user_vector = self.store.get_user_vector(user_id)?;
        match scoring::item_scores(&self.current_model(), &user_vector) {
            Ok(scores) => return Ok(scores),
            Err(EngineError::StaleMatrix { detail }) => {
                debug!(%detail, "projection failed after rebuild, checking divergence");
            }
            Err(e) => return Err(e),
        }

        match reconcile::detect_divergence(self.store.as_ref())? {
            Some(detail) => {
                let symptom = EngineError::StoreDiverged { detail };
                warn!(%symptom, "resyncing reverse maps");
                let _gate = self.gate()?;
                reconcile::resync(self.store.as_ref())?;
                self.rebuild_locked()?;
            }
            None => self.rebuild()?,
        }

        let user_vector = self.store.get_user_vector(user_id)?;
        scoring::item_scores(&self.current_model(), &user_vector).map_err(|e| {
            EngineError::ScoringFailed {
                reason: e.to_string(),
            }
        })
    }
}
