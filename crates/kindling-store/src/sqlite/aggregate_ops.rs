//! Metadata-aggregate queries: atomic sum/count increments in both
//! directions, plus the bulk reads and write-backs the engine needs for
//! co-occurrence builds, reconciliation, and resync.

use std::collections::HashMap;

use rusqlite::{params, Connection};

use kindling_core::errors::{StoreError, StoreResult};
use kindling_core::model::FieldAggregate;

pub fn bump_user_aggregate(
    conn: &Connection,
    field: &str,
    user_id: &str,
    value: &str,
    rating: f64,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO user_aggregates (field, user_id, value, tot, n) VALUES (?1, ?2, ?3, ?4, 1)
         ON CONFLICT (field, user_id, value)
         DO UPDATE SET tot = tot + excluded.tot, n = n + 1",
        params![field, user_id, value, rating],
    )
    .map_err(StoreError::sqlite)?;
    Ok(())
}

pub fn bump_value_aggregate(
    conn: &Connection,
    field: &str,
    value: &str,
    user_id: &str,
    rating: f64,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO value_aggregates (field, value, user_id, tot, n) VALUES (?1, ?2, ?3, ?4, 1)
         ON CONFLICT (field, value, user_id)
         DO UPDATE SET tot = tot + excluded.tot, n = n + 1",
        params![field, value, user_id, rating],
    )
    .map_err(StoreError::sqlite)?;
    Ok(())
}

pub fn get_user_aggregate(
    conn: &Connection,
    field: &str,
    user_id: &str,
) -> StoreResult<Option<FieldAggregate>> {
    let mut stmt = conn
        .prepare("SELECT value, tot, n FROM user_aggregates WHERE field = ?1 AND user_id = ?2")
        .map_err(StoreError::sqlite)?;
    let rows = stmt
        .query_map(params![field, user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })
        .map_err(StoreError::sqlite)?;
    let mut aggregate = FieldAggregate::default();
    for row in rows {
        let (value, tot, n) = row.map_err(StoreError::sqlite)?;
        aggregate.tot.insert(value.clone(), tot);
        aggregate.n.insert(value, n);
    }
    Ok(if aggregate.is_empty() {
        None
    } else {
        Some(aggregate)
    })
}

pub fn all_user_aggregates(
    conn: &Connection,
    field: &str,
) -> StoreResult<HashMap<String, FieldAggregate>> {
    keyed_aggregates(
        conn,
        "SELECT user_id, value, tot, n FROM user_aggregates WHERE field = ?1",
        field,
    )
}

pub fn take_user_aggregate(
    conn: &Connection,
    field: &str,
    user_id: &str,
) -> StoreResult<Option<FieldAggregate>> {
    let aggregate = get_user_aggregate(conn, field, user_id)?;
    if aggregate.is_some() {
        conn.execute(
            "DELETE FROM user_aggregates WHERE field = ?1 AND user_id = ?2",
            params![field, user_id],
        )
        .map_err(StoreError::sqlite)?;
    }
    Ok(aggregate)
}

pub fn put_user_aggregate(
    conn: &Connection,
    field: &str,
    user_id: &str,
    aggregate: &FieldAggregate,
) -> StoreResult<()> {
    let tx = conn.unchecked_transaction().map_err(StoreError::sqlite)?;
    tx.execute(
        "DELETE FROM user_aggregates WHERE field = ?1 AND user_id = ?2",
        params![field, user_id],
    )
    .map_err(StoreError::sqlite)?;
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO user_aggregates (field, user_id, value, tot, n)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(StoreError::sqlite)?;
        for (value, tot) in &aggregate.tot {
            let n = aggregate.n.get(value).copied().unwrap_or(0);
            stmt.execute(params![field, user_id, value, tot, n])
                .map_err(StoreError::sqlite)?;
        }
    }
    tx.commit().map_err(StoreError::sqlite)
}

pub fn all_value_aggregates(
    conn: &Connection,
    field: &str,
) -> StoreResult<HashMap<String, FieldAggregate>> {
    keyed_aggregates(
        conn,
        "SELECT value, user_id, tot, n FROM value_aggregates WHERE field = ?1",
        field,
    )
}

pub fn replace_value_aggregates(
    conn: &Connection,
    field: &str,
    aggregates: &HashMap<String, FieldAggregate>,
) -> StoreResult<()> {
    let tx = conn.unchecked_transaction().map_err(StoreError::sqlite)?;
    tx.execute(
        "DELETE FROM value_aggregates WHERE field = ?1",
        params![field],
    )
    .map_err(StoreError::sqlite)?;
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO value_aggregates (field, value, user_id, tot, n)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(StoreError::sqlite)?;
        for (value, aggregate) in aggregates {
            for (user_id, tot) in &aggregate.tot {
                let n = aggregate.n.get(user_id).copied().unwrap_or(0);
                stmt.execute(params![field, value, user_id, tot, n])
                    .map_err(StoreError::sqlite)?;
            }
        }
    }
    tx.commit().map_err(StoreError::sqlite)
}

/// Collect `(outer_key, inner_key, tot, n)` rows into per-outer-key
/// aggregates.
fn keyed_aggregates(
    conn: &Connection,
    sql: &str,
    field: &str,
) -> StoreResult<HashMap<String, FieldAggregate>> {
    let mut stmt = conn.prepare(sql).map_err(StoreError::sqlite)?;
    let rows = stmt
        .query_map(params![field], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, u64>(3)?,
            ))
        })
        .map_err(StoreError::sqlite)?;
    let mut out: HashMap<String, FieldAggregate> = HashMap::new();
    for row in rows {
        let (outer, inner, tot, n) = row.map_err(StoreError::sqlite)?;
        let aggregate = out.entry(outer).or_default();
        aggregate.tot.insert(inner.clone(), tot);
        aggregate.n.insert(inner, n);
    }
    Ok(out)
}
