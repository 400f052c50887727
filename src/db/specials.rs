// src/db/specials.rs
//
// Persistence for stored specials. All functions take a &Connection so they
// compose with the run-level transaction.

use crate::domain::special::{SpecialType, StoredSpecial};
use crate::errors::TrackerError;
use rusqlite::{params, Connection, Row};

const ALL_COLUMNS: &str = "special_id, source, mention_id, url, special_type, points, price, \
     check_in, check_out, resort, room, view, error, \
     old_points, old_price, old_check_in, old_check_out, \
     old_resort, old_room, old_view, old_duration, old_price_per_night";

/// All stored specials for one source, ordered the way digests list them.
pub fn query_by_source(
    conn: &Connection,
    source: &str,
) -> Result<Vec<StoredSpecial>, TrackerError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALL_COLUMNS} FROM stored_specials WHERE source = ?1 \
         ORDER BY check_in, check_out"
    ))?;
    let specials = stmt
        .query_map(params![source], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(specials)
}

pub fn upsert(conn: &Connection, special: &StoredSpecial) -> Result<(), TrackerError> {
    conn.execute(
        "INSERT INTO stored_specials (
            special_id, source, mention_id, url, special_type, points, price,
            check_in, check_out, resort, room, view, error,
            old_points, old_price, old_check_in, old_check_out,
            old_resort, old_room, old_view, old_duration, old_price_per_night
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                  ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
        ON CONFLICT (source, special_id) DO UPDATE SET
            mention_id = excluded.mention_id,
            url = excluded.url,
            special_type = excluded.special_type,
            points = excluded.points,
            price = excluded.price,
            check_in = excluded.check_in,
            check_out = excluded.check_out,
            resort = excluded.resort,
            room = excluded.room,
            view = excluded.view,
            error = excluded.error,
            old_points = excluded.old_points,
            old_price = excluded.old_price,
            old_check_in = excluded.old_check_in,
            old_check_out = excluded.old_check_out,
            old_resort = excluded.old_resort,
            old_room = excluded.old_room,
            old_view = excluded.old_view,
            old_duration = excluded.old_duration,
            old_price_per_night = excluded.old_price_per_night",
        params![
            special.special_id,
            special.source,
            special.mention_id,
            special.url,
            special.special_type.as_str(),
            special.points,
            special.price,
            special.check_in,
            special.check_out,
            special.resort,
            special.room,
            special.view,
            special.error,
            special.old_points,
            special.old_price,
            special.old_check_in,
            special.old_check_out,
            special.old_resort,
            special.old_room,
            special.old_view,
            special.old_duration,
            special.old_price_per_night,
        ],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, special: &StoredSpecial) -> Result<(), TrackerError> {
    conn.execute(
        "DELETE FROM stored_specials WHERE source = ?1 AND special_id = ?2",
        params![special.source, special.special_id],
    )?;
    Ok(())
}

pub fn clear_all_errors(conn: &Connection) -> Result<usize, TrackerError> {
    let cleared = conn.execute("UPDATE stored_specials SET error = 0 WHERE error = 1", [])?;
    Ok(cleared)
}

fn from_row(row: &Row) -> rusqlite::Result<StoredSpecial> {
    let type_str: String = row.get(4)?;
    let special_type = SpecialType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown special_type '{type_str}'").into(),
        )
    })?;

    Ok(StoredSpecial {
        special_id: row.get(0)?,
        source: row.get(1)?,
        mention_id: row.get(2)?,
        url: row.get(3)?,
        special_type,
        points: row.get(5)?,
        price: row.get(6)?,
        check_in: row.get(7)?,
        check_out: row.get(8)?,
        resort: row.get(9)?,
        room: row.get(10)?,
        view: row.get(11)?,
        error: row.get(12)?,
        old_points: row.get(13)?,
        old_price: row.get(14)?,
        old_check_in: row.get(15)?,
        old_check_out: row.get(16)?,
        old_resort: row.get(17)?,
        old_room: row.get(18)?,
        old_view: row.get(19)?,
        old_duration: row.get(20)?,
        old_price_per_night: row.get(21)?,
    })
}
