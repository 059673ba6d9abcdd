//! Schema and PRAGMA setup for the document-style SQLite backend.
//!
//! One table per collection of the rating graph: forward/reverse rating
//! maps, the item registry, the tracked-field set, and the aggregate
//! accumulators in both directions.

use rusqlite::Connection;

use kindling_core::errors::{StoreError, StoreResult};

/// Apply performance and safety pragmas to a connection.
pub fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(StoreError::sqlite)?;
    Ok(())
}

/// Create all tables if missing. Idempotent; run on every open.
pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS user_ratings (
            user_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            score   REAL NOT NULL,
            PRIMARY KEY (user_id, item_id)
        );

        CREATE TABLE IF NOT EXISTS item_ratings (
            item_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            score   REAL NOT NULL,
            PRIMARY KEY (item_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS items (
            item_id  TEXT PRIMARY KEY,
            metadata TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS tracked_fields (
            field TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS user_aggregates (
            field   TEXT NOT NULL,
            user_id TEXT NOT NULL,
            value   TEXT NOT NULL,
            tot     REAL NOT NULL DEFAULT 0,
            n       INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (field, user_id, value)
        );

        CREATE TABLE IF NOT EXISTS value_aggregates (
            field   TEXT NOT NULL,
            value   TEXT NOT NULL,
            user_id TEXT NOT NULL,
            tot     REAL NOT NULL DEFAULT 0,
            n       INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (field, value, user_id)
        );
        ",
    )
    .map_err(StoreError::sqlite)?;
    Ok(())
}
