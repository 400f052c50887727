// src/parsers/preconfirms.rs
//
// Preconfirmed-reservation specials, served as JSON records from the rental
// store's Knack backend.

use crate::domain::special::{ParseError, ParsedSpecial, SpecialType};
use crate::parsers::fetch::FetchRequest;
use crate::parsers::{
    derive_special_id, mention_and_check_in, mention_and_check_out, mention_only, IdStrategy,
    ParseFailure, SourceParser,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::HashMap;

const NAME: &str = "dvcrentalstore_preconfirms";
const SOURCE_LABEL: &str = "DVC Rental Store";
const SITE_URL: &str = "https://dvcrentalstore.com/discounted-points-confirmed-reservations/";
const DATA_URL: &str =
    "https://us-east-1-renderer-read.knack.com/v1/scenes/scene_143/views/view_230/records";

const ID_STRATEGIES: &[IdStrategy] =
    &[mention_and_check_out, mention_and_check_in, mention_only];

// Payload characteristic names mapped onto catalog reference keys. Matching
// is by distinctive substring since the site pads names with marketing text.
// Order matters where one name contains another ("Tower Studio" vs "Studio").
const RESORT_REFS: &[(&str, &str)] = &[
    ("Animal Kingdom", "resort_akv"),
    ("Bay Lake", "resort_blt"),
    ("Beach Club", "resort_bcv"),
    ("Copper Creek", "resort_ccv"),
    ("Grand Floridian", "resort_gfv"),
    ("Polynesian", "resort_poly"),
    ("Riviera", "resort_rr"),
    ("Saratoga Springs", "resort_ssr"),
    ("Old Key West", "resort_okw"),
    ("Boulder Ridge", "resort_wlv"),
    ("Grand Californian", "resort_vgc"),
    ("Hilton Head", "resort_hhi"),
    ("Vero Beach", "resort_vb"),
    ("Aulani", "resort_aul"),
    ("BoardWalk", "resort_bwv"),
];

const ROOM_REFS: &[(&str, &str)] = &[
    ("Tower", "room_tower"),
    ("Studio", "room_studio"),
    ("One", "room_one"),
    ("Two", "room_two"),
    ("Three", "room_three"),
    ("Grand Villa", "room_three"),
    ("Cabin", "room_cabin"),
    ("Bungalow", "room_bungalow"),
];

const VIEW_REFS: &[(&str, &str)] = &[
    ("Standard", "view_standard"),
    ("Preferred", "view_preferred"),
    ("Theme Park", "view_theme_park"),
    ("Lake", "view_lake"),
    ("Savanna", "view_savanna"),
    ("BoardWalk", "view_boardwalk"),
    ("Garden", "view_garden"),
    ("Ocean", "view_ocean"),
];

pub struct PreconfirmParser {
    rows_per_page: u32,
}

impl PreconfirmParser {
    pub fn new(rows_per_page: u32) -> Self {
        Self { rows_per_page }
    }

    fn process_element(&self, record: &Value) -> ParsedSpecial {
        let mut special = ParsedSpecial::new(NAME, SITE_URL, SpecialType::Preconfirm);
        special.raw_string = serde_json::to_string_pretty(record).unwrap_or_default();

        match special_id(record) {
            Ok(id) => special.special_id = Some(id),
            Err(e) => special.errors.push(e),
        }
        match mention_id(record) {
            Ok(id) => special.mention_id = Some(id),
            Err(e) => special.errors.push(e),
        }
        match price(record) {
            Ok(p) => special.price = Some(p),
            Err(e) => special.errors.push(e),
        }
        match iso_date(record, "field_10_raw", "check_in") {
            Ok(d) => special.check_in = Some(d),
            Err(e) => special.errors.push(e),
        }
        match iso_date(record, "field_11_raw", "check_out") {
            Ok(d) => special.check_out = Some(d),
            Err(e) => special.errors.push(e),
        }
        match identifier(record, "field_57_raw", "resort") {
            Ok(name) => special.resort = Some(to_ref_key(&name, RESORT_REFS)),
            Err(e) => special.errors.push(e),
        }
        match identifier(record, "field_145_raw", "room") {
            Ok(name) => special.room = Some(to_ref_key(&name, ROOM_REFS)),
            Err(e) => special.errors.push(e),
        }
        match identifier(record, "field_9_raw", "view") {
            Ok(name) => special.view = Some(to_ref_key(&name, VIEW_REFS)),
            Err(e) => special.errors.push(e),
        }

        if special.special_id.is_none() {
            special.special_id = derive_special_id(&special, ID_STRATEGIES);
        }
        special
    }
}

impl SourceParser for PreconfirmParser {
    fn name(&self) -> &'static str {
        NAME
    }

    fn source_label(&self) -> &'static str {
        SOURCE_LABEL
    }

    fn site_url(&self) -> &'static str {
        SITE_URL
    }

    fn request(&self) -> FetchRequest {
        FetchRequest {
            url: DATA_URL.to_string(),
            headers: knack_headers(),
            params: vec![
                ("format", "both".to_string()),
                ("page", "1".to_string()),
                ("rows_per_page", self.rows_per_page.to_string()),
                ("sort_field", "field_10".to_string()),
                ("sort_order", "asc".to_string()),
            ],
        }
    }

    fn parse(&self, body: &[u8]) -> Result<HashMap<String, ParsedSpecial>, ParseFailure> {
        parse_knack_records(body, |record| self.process_element(record))
    }
}

pub(crate) fn knack_headers() -> Vec<(&'static str, String)> {
    vec![
        ("X-Knack-REST-API-Key", "renderer".to_string()),
        ("X-Knack-Application-Id", "5b1e9f1bd250af137b419ba5".to_string()),
        ("x-knack-new-builder", "true".to_string()),
        ("X-Requested-With", "XMLHttpRequest".to_string()),
    ]
}

/// Decodes a Knack `{"records": [...]}` payload, building one ParsedSpecial
/// per record and dropping only records with no derivable identity.
pub(crate) fn parse_knack_records(
    body: &[u8],
    mut process: impl FnMut(&Value) -> ParsedSpecial,
) -> Result<HashMap<String, ParsedSpecial>, ParseFailure> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| ParseFailure::Json(e.to_string()))?;
    let records = payload
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseFailure::UnexpectedShape("records missing".to_string()))?;

    let mut specials = HashMap::new();
    for record in records {
        let special = process(record);
        match special.special_id.clone() {
            Some(id) => {
                specials.insert(id, special);
            }
            None => eprintln!("Dropping record with no derivable identity"),
        }
    }
    Ok(specials)
}

/// Maps a payload characteristic name onto its catalog reference key. Unknown
/// names pass through untouched so the resolve pass can flag them.
fn to_ref_key(payload_name: &str, table: &[(&str, &str)]) -> String {
    table
        .iter()
        .find(|(needle, _)| payload_name.contains(needle))
        .map(|(_, ref_key)| ref_key.to_string())
        .unwrap_or_else(|| payload_name.to_string())
}

fn special_id(record: &Value) -> Result<String, ParseError> {
    record
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ParseError::new("special_id", "id = None"))
}

fn mention_id(record: &Value) -> Result<String, ParseError> {
    record
        .get("field_199_raw")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ParseError::new("mention_id", "field_199_raw = None"))
}

fn price(record: &Value) -> Result<i64, ParseError> {
    let raw = record
        .get("field_78_raw")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::new("price", "field_78_raw = None"))?;
    raw.replace(',', "")
        .parse::<f64>()
        .map(|p| p as i64)
        .map_err(|_| ParseError::new("price", format!("field_78_raw = {raw}")))
}

pub(crate) fn iso_date(
    record: &Value,
    key: &str,
    field: &'static str,
) -> Result<NaiveDate, ParseError> {
    let raw = record
        .get(key)
        .and_then(|v| v.get("iso_timestamp"))
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::new(field, format!("{key} = None")))?;
    raw.trim_end_matches('Z')
        .parse::<NaiveDateTime>()
        .map(|dt| dt.date())
        .map_err(|_| ParseError::new(field, format!("{key} = {raw}")))
}

fn identifier(record: &Value, key: &str, field: &'static str) -> Result<String, ParseError> {
    record
        .get(key)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("identifier"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ParseError::new(field, format!("{key} = None")))
}
