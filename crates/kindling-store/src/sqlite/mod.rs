//! SqliteStore — persistent, document-style `RatingStore` over rusqlite.
//!
//! A single mutex-guarded connection; WAL pragmas and schema applied on
//! open. Every trait call is one statement or one transaction, matching
//! the per-call atomicity the engine expects.

mod aggregate_ops;
mod item_ops;
mod rating_ops;
mod schema;

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use kindling_core::errors::{StoreError, StoreResult};
use kindling_core::model::{FieldAggregate, ItemMetadata, RatingMap, RatingVector};
use kindling_core::traits::RatingStore;

/// Persistent `RatingStore` backed by a SQLite file (or an in-memory
/// database for tests).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if missing) a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(StoreError::sqlite)?;
        schema::apply_pragmas(&conn)?;
        schema::init_schema(&conn)?;
        info!(path = %path.display(), "opened rating store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::sqlite)?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.conn.lock().map_err(StoreError::poisoned)?;
        f(&guard)
    }
}

impl RatingStore for SqliteStore {
    fn upsert_rating(&self, user_id: &str, item_id: &str, score: f64) -> StoreResult<()> {
        self.with_conn(|conn| rating_ops::upsert_rating(conn, user_id, item_id, score))
    }

    fn remove_rating(&self, user_id: &str, item_id: &str) -> StoreResult<()> {
        self.with_conn(|conn| rating_ops::remove_rating(conn, user_id, item_id))
    }

    fn get_user_vector(&self, user_id: &str) -> StoreResult<RatingVector> {
        self.with_conn(|conn| rating_ops::get_user_vector(conn, user_id))
    }

    fn get_item_vector(&self, item_id: &str) -> StoreResult<RatingVector> {
        self.with_conn(|conn| rating_ops::get_item_vector(conn, item_id))
    }

    fn all_user_vectors(&self) -> StoreResult<RatingMap> {
        self.with_conn(rating_ops::all_user_vectors)
    }

    fn all_item_vectors(&self) -> StoreResult<RatingMap> {
        self.with_conn(rating_ops::all_item_vectors)
    }

    fn take_user_vector(&self, user_id: &str) -> StoreResult<RatingVector> {
        self.with_conn(|conn| rating_ops::take_user_vector(conn, user_id))
    }

    fn replace_item_vectors(&self, vectors: RatingMap) -> StoreResult<()> {
        self.with_conn(|conn| rating_ops::replace_item_vectors(conn, &vectors))
    }

    fn register_item(&self, item_id: &str) -> StoreResult<()> {
        self.with_conn(|conn| item_ops::register_item(conn, item_id))
    }

    fn upsert_item_metadata(&self, item_id: &str, field: &str, value: &str) -> StoreResult<()> {
        self.with_conn(|conn| item_ops::upsert_item_metadata(conn, item_id, field, value))
    }

    fn get_item_metadata(&self, item_id: &str) -> StoreResult<ItemMetadata> {
        self.with_conn(|conn| item_ops::get_item_metadata(conn, item_id))
    }

    fn all_item_ids(&self) -> StoreResult<Vec<String>> {
        self.with_conn(item_ops::all_item_ids)
    }

    fn register_tracked_field(&self, field: &str) -> StoreResult<()> {
        self.with_conn(|conn| item_ops::register_tracked_field(conn, field))
    }

    fn tracked_fields(&self) -> StoreResult<BTreeSet<String>> {
        self.with_conn(item_ops::tracked_fields)
    }

    fn bump_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
        value: &str,
        rating: f64,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            aggregate_ops::bump_user_aggregate(conn, field, user_id, value, rating)
        })
    }

    fn bump_value_aggregate(
        &self,
        field: &str,
        value: &str,
        user_id: &str,
        rating: f64,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            aggregate_ops::bump_value_aggregate(conn, field, value, user_id, rating)
        })
    }

    fn get_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
    ) -> StoreResult<Option<FieldAggregate>> {
        self.with_conn(|conn| aggregate_ops::get_user_aggregate(conn, field, user_id))
    }

    fn all_user_aggregates(&self, field: &str) -> StoreResult<HashMap<String, FieldAggregate>> {
        self.with_conn(|conn| aggregate_ops::all_user_aggregates(conn, field))
    }

    fn take_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
    ) -> StoreResult<Option<FieldAggregate>> {
        self.with_conn(|conn| aggregate_ops::take_user_aggregate(conn, field, user_id))
    }

    fn put_user_aggregate(
        &self,
        field: &str,
        user_id: &str,
        aggregate: FieldAggregate,
    ) -> StoreResult<()> {
        self.with_conn(|conn| aggregate_ops::put_user_aggregate(conn, field, user_id, &aggregate))
    }

    fn all_value_aggregates(&self, field: &str) -> StoreResult<HashMap<String, FieldAggregate>> {
        self.with_conn(|conn| aggregate_ops::all_value_aggregates(conn, field))
    }

    fn replace_value_aggregates(
        &self,
        field: &str,
        aggregates: HashMap<String, FieldAggregate>,
    ) -> StoreResult<()> {
        self.with_conn(|conn| aggregate_ops::replace_value_aggregates(conn, field, &aggregates))
    }

    fn wipe(&self) -> StoreResult<()> {
        debug!("wiping all rating-store tables");
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                DELETE FROM user_ratings;
                DELETE FROM item_ratings;
                DELETE FROM items;
                DELETE FROM tracked_fields;
                DELETE FROM user_aggregates;
                DELETE FROM value_aggregates;
                ",
            )
            .map_err(StoreError::sqlite)
        })
    }
}
