// src/domain/reconcile.rs

use crate::domain::special::{ParsedSpecial, StoredSpecial};
use chrono::NaiveDate;
use std::collections::HashMap;

/// The outcome of diffing one source's fresh snapshot against its stored
/// records. `updated` pairs the parsed special with the stored record it will
/// be merged into; the merge itself happens later so this stays a pure
/// in-memory transformation.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub added: Vec<ParsedSpecial>,
    pub updated: Vec<(ParsedSpecial, StoredSpecial)>,
    pub removed: Vec<StoredSpecial>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Partitions one source's records into Added/Updated/Removed.
///
/// Every stored key ends up in exactly one of updated, removed or unchanged;
/// every parsed key that never matched a stored record ends up in added. The
/// added list is sorted by `(check_in, check_out)` with missing dates pushed
/// to the front via a far-past sentinel (sort only, never stored).
pub fn reconcile(
    stored: Vec<StoredSpecial>,
    mut parsed: HashMap<String, ParsedSpecial>,
) -> ChangeSet {
    let mut updated = Vec::new();
    let mut removed = Vec::new();

    for stored_special in stored {
        match parsed.remove(&stored_special.special_id) {
            Some(new_special) => {
                if !stored_special.matches(&new_special) {
                    updated.push((new_special, stored_special));
                }
            }
            None => removed.push(stored_special),
        }
    }

    let mut added: Vec<ParsedSpecial> = parsed.into_values().collect();
    added.sort_by_key(|special| {
        (
            special.check_in.unwrap_or(NaiveDate::MIN),
            special.check_out.unwrap_or(NaiveDate::MIN),
        )
    });

    ChangeSet {
        added,
        updated,
        removed,
    }
}
