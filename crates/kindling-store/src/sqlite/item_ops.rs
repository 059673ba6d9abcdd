//! Item registry and tracked-field queries. Metadata is stored as a JSON
//! blob per item, document style.

use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension};

use kindling_core::errors::{StoreError, StoreResult};
use kindling_core::model::ItemMetadata;

pub fn register_item(conn: &Connection, item_id: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO items (item_id) VALUES (?1)",
        params![item_id],
    )
    .map_err(StoreError::sqlite)?;
    Ok(())
}

pub fn upsert_item_metadata(
    conn: &Connection,
    item_id: &str,
    field: &str,
    value: &str,
) -> StoreResult<()> {
    let mut metadata = get_item_metadata(conn, item_id)?;
    metadata.insert(field.to_string(), value.to_string());
    let blob = serde_json::to_string(&metadata).map_err(StoreError::serialization)?;
    conn.execute(
        "INSERT INTO items (item_id, metadata) VALUES (?1, ?2)
         ON CONFLICT (item_id) DO UPDATE SET metadata = excluded.metadata",
        params![item_id, blob],
    )
    .map_err(StoreError::sqlite)?;
    Ok(())
}

pub fn get_item_metadata(conn: &Connection, item_id: &str) -> StoreResult<ItemMetadata> {
    let blob: Option<String> = conn
        .query_row(
            "SELECT metadata FROM items WHERE item_id = ?1",
            params![item_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(StoreError::sqlite)?;
    match blob {
        Some(raw) => serde_json::from_str(&raw).map_err(StoreError::serialization),
        None => Ok(ItemMetadata::new()),
    }
}

/// Registered items plus anything present in the reverse rating map,
/// sorted for deterministic iteration.
pub fn all_item_ids(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT item_id FROM items
             UNION
             SELECT DISTINCT item_id FROM item_ratings
             ORDER BY item_id",
        )
        .map_err(StoreError::sqlite)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(StoreError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::sqlite)
}

pub fn register_tracked_field(conn: &Connection, field: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO tracked_fields (field) VALUES (?1)",
        params![field],
    )
    .map_err(StoreError::sqlite)?;
    Ok(())
}

pub fn tracked_fields(conn: &Connection) -> StoreResult<BTreeSet<String>> {
    let mut stmt = conn
        .prepare("SELECT field FROM tracked_fields")
        .map_err(StoreError::sqlite)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(StoreError::sqlite)?;
    rows.collect::<Result<BTreeSet<_>, _>>()
        .map_err(StoreError::sqlite)
}
