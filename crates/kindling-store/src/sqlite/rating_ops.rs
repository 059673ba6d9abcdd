//! Rating-map queries: upsert/remove in both directions, vector reads,
//! and the wholesale reverse-map replacement used by resync.

use rusqlite::{params, Connection};

use kindling_core::errors::{StoreError, StoreResult};
use kindling_core::model::{RatingMap, RatingVector};

/// Write the rating into both directions inside one transaction.
pub fn upsert_rating(
    conn: &Connection,
    user_id: &str,
    item_id: &str,
    score: f64,
) -> StoreResult<()> {
    let tx = conn.unchecked_transaction().map_err(StoreError::sqlite)?;
    tx.execute(
        "INSERT INTO user_ratings (user_id, item_id, score) VALUES (?1, ?2, ?3)
         ON CONFLICT (user_id, item_id) DO UPDATE SET score = excluded.score",
        params![user_id, item_id, score],
    )
    .map_err(StoreError::sqlite)?;
    tx.execute(
        "INSERT INTO item_ratings (item_id, user_id, score) VALUES (?1, ?2, ?3)
         ON CONFLICT (item_id, user_id) DO UPDATE SET score = excluded.score",
        params![item_id, user_id, score],
    )
    .map_err(StoreError::sqlite)?;
    tx.commit().map_err(StoreError::sqlite)
}

pub fn remove_rating(conn: &Connection, user_id: &str, item_id: &str) -> StoreResult<()> {
    let tx = conn.unchecked_transaction().map_err(StoreError::sqlite)?;
    tx.execute(
        "DELETE FROM user_ratings WHERE user_id = ?1 AND item_id = ?2",
        params![user_id, item_id],
    )
    .map_err(StoreError::sqlite)?;
    tx.execute(
        "DELETE FROM item_ratings WHERE item_id = ?1 AND user_id = ?2",
        params![item_id, user_id],
    )
    .map_err(StoreError::sqlite)?;
    tx.commit().map_err(StoreError::sqlite)
}

pub fn get_user_vector(conn: &Connection, user_id: &str) -> StoreResult<RatingVector> {
    vector_query(
        conn,
        "SELECT item_id, score FROM user_ratings WHERE user_id = ?1",
        user_id,
    )
}

pub fn get_item_vector(conn: &Connection, item_id: &str) -> StoreResult<RatingVector> {
    vector_query(
        conn,
        "SELECT user_id, score FROM item_ratings WHERE item_id = ?1",
        item_id,
    )
}

pub fn all_user_vectors(conn: &Connection) -> StoreResult<RatingMap> {
    map_query(conn, "SELECT user_id, item_id, score FROM user_ratings")
}

pub fn all_item_vectors(conn: &Connection) -> StoreResult<RatingMap> {
    map_query(conn, "SELECT item_id, user_id, score FROM item_ratings")
}

/// Delete and return the forward vector of `user_id`. The reverse map is
/// deliberately untouched; callers follow up with a resync.
pub fn take_user_vector(conn: &Connection, user_id: &str) -> StoreResult<RatingVector> {
    let vector = get_user_vector(conn, user_id)?;
    conn.execute(
        "DELETE FROM user_ratings WHERE user_id = ?1",
        params![user_id],
    )
    .map_err(StoreError::sqlite)?;
    Ok(vector)
}

/// Replace the whole item-direction table (resync write-back).
pub fn replace_item_vectors(conn: &Connection, vectors: &RatingMap) -> StoreResult<()> {
    let tx = conn.unchecked_transaction().map_err(StoreError::sqlite)?;
    tx.execute("DELETE FROM item_ratings", [])
        .map_err(StoreError::sqlite)?;
    {
        let mut stmt = tx
            .prepare("INSERT INTO item_ratings (item_id, user_id, score) VALUES (?1, ?2, ?3)")
            .map_err(StoreError::sqlite)?;
        for (item_id, per_user) in vectors {
            for (user_id, score) in per_user {
                stmt.execute(params![item_id, user_id, score])
                    .map_err(StoreError::sqlite)?;
            }
        }
    }
    tx.commit().map_err(StoreError::sqlite)
}

fn vector_query(conn: &Connection, sql: &str, key: &str) -> StoreResult<RatingVector> {
    let mut stmt = conn.prepare(sql).map_err(StoreError::sqlite)?;
    let rows = stmt
        .query_map(params![key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })
        .map_err(StoreError::sqlite)?;
    let mut vector = RatingVector::new();
    for row in rows {
        let (id, score) = row.map_err(StoreError::sqlite)?;
        vector.insert(id, score);
    }
    Ok(vector)
}

fn map_query(conn: &Connection, sql: &str) -> StoreResult<RatingMap> {
    let mut stmt = conn.prepare(sql).map_err(StoreError::sqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })
        .map_err(StoreError::sqlite)?;
    let mut map = RatingMap::new();
    for row in rows {
        let (outer, inner, score) = row.map_err(StoreError::sqlite)?;
        map.entry(outer).or_default().insert(inner, score);
    }
    Ok(map)
}
