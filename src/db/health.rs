// src/db/health.rs
//
// Persistence for the per-source and system health rows. Rows are created
// lazily: a source or system with no row yet counts as healthy.

use crate::errors::TrackerError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

pub fn load_source_health(conn: &Connection) -> Result<HashMap<String, bool>, TrackerError> {
    let mut stmt = conn.prepare("SELECT source, healthy FROM source_health")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

pub fn save_source_health(
    conn: &Connection,
    source: &str,
    healthy: bool,
) -> Result<(), TrackerError> {
    conn.execute(
        "INSERT INTO source_health (source, healthy) VALUES (?1, ?2)
         ON CONFLICT (source) DO UPDATE SET healthy = excluded.healthy",
        params![source, healthy],
    )?;
    Ok(())
}

pub fn load_system_health(conn: &Connection) -> Result<bool, TrackerError> {
    let healthy: Option<bool> = conn
        .query_row("SELECT healthy FROM status WHERE status_id = 0", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(healthy.unwrap_or(true))
}

pub fn save_system_health(
    conn: &Connection,
    healthy: bool,
    now: NaiveDateTime,
) -> Result<(), TrackerError> {
    conn.execute(
        "INSERT INTO status (status_id, healthy, updated_at) VALUES (0, ?1, ?2)
         ON CONFLICT (status_id) DO UPDATE SET
             healthy = excluded.healthy,
             updated_at = excluded.updated_at",
        params![healthy, now],
    )?;
    Ok(())
}
