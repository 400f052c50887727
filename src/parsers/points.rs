// src/parsers/points.rs
//
// Discounted-points specials from the rental store's Knack backend.

use crate::domain::special::{ParseError, ParsedSpecial, SpecialType};
use crate::parsers::fetch::FetchRequest;
use crate::parsers::preconfirms::{iso_date, knack_headers, parse_knack_records};
use crate::parsers::{
    derive_special_id, mention_and_check_out, mention_only, IdStrategy, ParseFailure, SourceParser,
};
use serde_json::Value;
use std::collections::HashMap;

const NAME: &str = "dvcrentalstore_points";
const SOURCE_LABEL: &str = "DVC Rental Store";
const SITE_URL: &str =
    "https://dvcrentalstore.com/discounted-points-confirmed-reservations/#view-discounted-points/";
const DATA_URL: &str =
    "https://us-east-1-renderer-read.knack.com/v1/scenes/scene_152/views/view_245/records";

const ID_STRATEGIES: &[IdStrategy] = &[mention_and_check_out, mention_only];

pub struct PointsParser;

impl PointsParser {
    pub fn new() -> Self {
        Self
    }

    fn process_element(&self, record: &Value) -> ParsedSpecial {
        let mut special = ParsedSpecial::new(NAME, SITE_URL, SpecialType::DiscPoints);
        special.raw_string = serde_json::to_string_pretty(record).unwrap_or_default();

        match special_id(record) {
            Ok(id) => special.special_id = Some(id),
            Err(e) => special.errors.push(e),
        }
        match mention_id(record) {
            Ok(id) => special.mention_id = Some(id),
            Err(e) => special.errors.push(e),
        }
        match points(record) {
            Ok(p) => special.points = Some(p),
            Err(e) => special.errors.push(e),
        }
        match price(record) {
            Ok(p) => special.price = Some(p),
            Err(e) => special.errors.push(e),
        }
        match iso_date(record, "field_336_raw", "check_out") {
            Ok(d) => special.check_out = Some(d),
            Err(e) => special.errors.push(e),
        }

        if special.special_id.is_none() {
            special.special_id = derive_special_id(&special, ID_STRATEGIES);
        }
        special
    }
}

impl SourceParser for PointsParser {
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
                ("rows_per_page", "100".to_string()),
                ("sort_field", "field_152".to_string()),
                ("sort_order", "asc".to_string()),
            ],
        }
    }

    fn parse(&self, body: &[u8]) -> Result<HashMap<String, ParsedSpecial>, ParseFailure> {
        parse_knack_records(body, |record| self.process_element(record))
    }
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
        .get("field_203_raw")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ParseError::new("mention_id", "field_203_raw = None"))
}

fn points(record: &Value) -> Result<i64, ParseError> {
    let value = record
        .get("field_154_raw")
        .ok_or_else(|| ParseError::new("points", "field_154_raw = None"))?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.replace(',', "").parse().ok()))
        .ok_or_else(|| ParseError::new("points", format!("field_154_raw = {value}")))
}

fn price(record: &Value) -> Result<i64, ParseError> {
    let value = record
        .get("field_193_raw")
        .ok_or_else(|| ParseError::new("price", "field_193_raw = None"))?;
    value
        .as_f64()
        .map(|p| p as i64)
        .or_else(|| {
            value
                .as_str()
                .and_then(|s| s.replace(',', "").parse::<f64>().ok())
                .map(|p| p as i64)
        })
        .ok_or_else(|| ParseError::new("price", format!("field_193_raw = {value}")))
}
