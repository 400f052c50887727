// src/parsers/resolve.rs
//
// Second phase of characteristic handling: parsers emit reference keys, and
// this pass swaps every key for its display name in one batch before
// reconciliation. An unknown key stays on the record as-is and is surfaced as
// its own parse error rather than blowing up later.

use crate::domain::special::ParsedSpecial;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicKind {
    Resort,
    Room,
    View,
}

impl CharacteristicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacteristicKind::Resort => "resort",
            CharacteristicKind::Room => "room",
            CharacteristicKind::View => "view",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resort" => Some(CharacteristicKind::Resort),
            "room" => Some(CharacteristicKind::Room),
            "view" => Some(CharacteristicKind::View),
            _ => None,
        }
    }
}

/// Reference-key → display-name lookup, loaded from the characteristics
/// table in one batch.
#[derive(Debug, Default)]
pub struct Catalog {
    resorts: HashMap<String, String>,
    rooms: HashMap<String, String>,
    views: HashMap<String, String>,
}

impl Catalog {
    pub fn insert(&mut self, kind: CharacteristicKind, ref_key: String, name: String) {
        let table = match kind {
            CharacteristicKind::Resort => &mut self.resorts,
            CharacteristicKind::Room => &mut self.rooms,
            CharacteristicKind::View => &mut self.views,
        };
        table.insert(ref_key, name);
    }

    pub fn resolve(&self, kind: CharacteristicKind, ref_key: &str) -> Option<&str> {
        let table = match kind {
            CharacteristicKind::Resort => &self.resorts,
            CharacteristicKind::Room => &self.rooms,
            CharacteristicKind::View => &self.views,
        };
        table.get(ref_key).map(String::as_str)
    }
}

/// Resolves resort/room/view reference keys on every special in the
/// snapshot. Unresolvable references leave the raw key in place and append a
/// field error so they show up in error reports.
pub fn resolve_references(
    specials: &mut HashMap<String, ParsedSpecial>,
    catalog: &Catalog,
) {
    for special in specials.values_mut() {
        resolve_one(special, catalog);
    }
}

fn resolve_one(special: &mut ParsedSpecial, catalog: &Catalog) {
    let fields = [
        (CharacteristicKind::Resort, special.resort.take()),
        (CharacteristicKind::Room, special.room.take()),
        (CharacteristicKind::View, special.view.take()),
    ];

    for (kind, value) in fields {
        let resolved = match value {
            Some(ref_key) => match catalog.resolve(kind, &ref_key) {
                Some(name) => Some(name.to_string()),
                None => {
                    special.push_error(
                        kind.as_str(),
                        format!("unresolvable reference '{ref_key}'"),
                    );
                    Some(ref_key)
                }
            },
            None => None,
        };
        match kind {
            CharacteristicKind::Resort => special.resort = resolved,
            CharacteristicKind::Room => special.room = resolved,
            CharacteristicKind::View => special.view = resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::special::SpecialType;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.insert(
            CharacteristicKind::Resort,
            "resort_ccv".to_string(),
            "Copper Creek Villas & Cabins".to_string(),
        );
        catalog.insert(
            CharacteristicKind::Room,
            "room_studio".to_string(),
            "Deluxe Studio Villa".to_string(),
        );
        catalog.insert(
            CharacteristicKind::View,
            "view_standard".to_string(),
            "Standard View".to_string(),
        );
        catalog
    }

    fn snapshot(special: ParsedSpecial) -> HashMap<String, ParsedSpecial> {
        HashMap::from([("s1".to_string(), special)])
    }

    #[test]
    fn known_references_resolve_to_display_names() {
        let mut special =
            ParsedSpecial::new("test_source", "https://example.com/", SpecialType::Preconfirm);
        special.resort = Some("resort_ccv".to_string());
        special.room = Some("room_studio".to_string());
        special.view = Some("view_standard".to_string());

        let mut specials = snapshot(special);
        resolve_references(&mut specials, &catalog());

        let special = &specials["s1"];
        assert_eq!(
            special.resort.as_deref(),
            Some("Copper Creek Villas & Cabins")
        );
        assert_eq!(special.room.as_deref(), Some("Deluxe Studio Villa"));
        assert_eq!(special.view.as_deref(), Some("Standard View"));
        assert!(!special.has_errors());
    }

    #[test]
    fn unknown_reference_keeps_key_and_records_error() {
        let mut special =
            ParsedSpecial::new("test_source", "https://example.com/", SpecialType::Preconfirm);
        special.resort = Some("resort_unknown".to_string());

        let mut specials = snapshot(special);
        resolve_references(&mut specials, &catalog());

        let special = &specials["s1"];
        assert_eq!(special.resort.as_deref(), Some("resort_unknown"));
        assert_eq!(special.errors.len(), 1);
        assert_eq!(special.errors[0].field, "resort");
    }

    #[test]
    fn kinds_do_not_cross_resolve() {
        let mut special =
            ParsedSpecial::new("test_source", "https://example.com/", SpecialType::Preconfirm);
        special.room = Some("resort_ccv".to_string());

        let mut specials = snapshot(special);
        resolve_references(&mut specials, &catalog());
        assert!(specials["s1"].has_errors());
    }

    #[test]
    fn missing_fields_are_left_alone() {
        let special =
            ParsedSpecial::new("test_source", "https://example.com/", SpecialType::Preconfirm);
        let mut specials = snapshot(special);
        resolve_references(&mut specials, &catalog());
        assert!(!specials["s1"].has_errors());
    }
}
