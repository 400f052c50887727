// src/db/catalog.rs

use crate::errors::TrackerError;
use crate::parsers::resolve::{Catalog, CharacteristicKind};
use rusqlite::Connection;

/// Loads the whole characteristics lookup table in one pass. Rows with an
/// unknown kind are skipped with a log line rather than failing the run.
pub fn load_catalog(conn: &Connection) -> Result<Catalog, TrackerError> {
    let mut stmt = conn.prepare("SELECT ref_key, kind, name FROM characteristics")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut catalog = Catalog::default();
    for (ref_key, kind_str, name) in rows {
        match CharacteristicKind::parse(&kind_str) {
            Some(kind) => catalog.insert(kind, ref_key, name),
            None => eprintln!("Skipping characteristic '{ref_key}' with unknown kind '{kind_str}'"),
        }
    }
    Ok(catalog)
}
