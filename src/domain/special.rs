// src/domain/special.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two kinds of specials: discounted points & preconfirmed reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialType {
    #[serde(rename = "disc_points")]
    DiscPoints,
    #[serde(rename = "preconfirm")]
    Preconfirm,
}

impl SpecialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialType::DiscPoints => "disc_points",
            SpecialType::Preconfirm => "preconfirm",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "disc_points" => Some(SpecialType::DiscPoints),
            "preconfirm" => Some(SpecialType::Preconfirm),
            _ => None,
        }
    }
}

/// One field on one record that could not be derived from the raw payload.
/// Non-fatal: the record keeps building and the error surfaces in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub field: &'static str,
    pub detail: String,
}

impl ParseError {
    pub fn new(field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            field,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.detail)
    }
}

/// A special as parsed from a source payload during one run. Mirrors
/// StoredSpecial minus the previous-value fields, plus the raw payload text
/// (kept for error emails and the fallback identity hash) and the list of
/// field-level parse errors.
///
/// `resort`/`room`/`view` may hold unresolved reference keys until the batch
/// resolve pass has run.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSpecial {
    pub special_id: Option<String>,
    pub mention_id: Option<String>,
    pub source: String,
    pub url: String,
    pub special_type: SpecialType,
    pub points: Option<i64>,
    pub price: Option<i64>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub resort: Option<String>,
    pub room: Option<String>,
    pub view: Option<String>,
    pub raw_string: String,
    pub errors: Vec<ParseError>,
}

impl ParsedSpecial {
    pub fn new(source: &str, url: &str, special_type: SpecialType) -> Self {
        Self {
            special_id: None,
            mention_id: None,
            source: source.to_string(),
            url: url.to_string(),
            special_type,
            points: None,
            price: None,
            check_in: None,
            check_out: None,
            resort: None,
            room: None,
            view: None,
            raw_string: String::new(),
            errors: Vec::new(),
        }
    }

    pub fn push_error(&mut self, field: &'static str, detail: impl Into<String>) {
        self.errors.push(ParseError::new(field, detail));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A special as stored in the database, keyed by `(source, special_id)`.
///
/// Beyond the current field values it carries an `error` flag and, for any
/// field that changed on the most recent update, the prior value in a
/// matching `old_*` field. The `old_*` values exist only for rendering
/// human-readable deltas and are cleared once the current value settles back
/// to the recorded previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSpecial {
    pub special_id: String,
    pub mention_id: Option<String>,
    pub source: String,
    pub url: String,
    pub special_type: SpecialType,
    pub points: Option<i64>,
    pub price: Option<i64>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub resort: Option<String>,
    pub room: Option<String>,
    pub view: Option<String>,
    pub error: bool,

    pub old_points: Option<i64>,
    pub old_price: Option<i64>,
    pub old_check_in: Option<NaiveDate>,
    pub old_check_out: Option<NaiveDate>,
    pub old_resort: Option<String>,
    pub old_room: Option<String>,
    pub old_view: Option<String>,
    pub old_duration: Option<i64>,
    pub old_price_per_night: Option<f64>,
}

impl StoredSpecial {
    /// Builds a fresh StoredSpecial from a parsed one. Returns None when the
    /// parsed special never got an identity, which means it was supposed to
    /// have been dropped by the parser already.
    pub fn from_parsed(parsed: &ParsedSpecial) -> Option<Self> {
        let special_id = parsed.special_id.clone()?;
        Some(Self {
            special_id,
            mention_id: parsed.mention_id.clone(),
            source: parsed.source.clone(),
            url: parsed.url.clone(),
            special_type: parsed.special_type,
            points: parsed.points,
            price: parsed.price,
            check_in: parsed.check_in,
            check_out: parsed.check_out,
            resort: parsed.resort.clone(),
            room: parsed.room.clone(),
            view: parsed.view.clone(),
            error: parsed.has_errors(),
            old_points: None,
            old_price: None,
            old_check_in: None,
            old_check_out: None,
            old_resort: None,
            old_room: None,
            old_view: None,
            old_duration: None,
            old_price_per_night: None,
        })
    }

    /// Nights between check-in and check-out, None when either date is
    /// missing.
    pub fn duration(&self) -> Option<i64> {
        match (self.check_in, self.check_out) {
            (Some(check_in), Some(check_out)) => Some((check_out - check_in).num_days()),
            _ => None,
        }
    }

    pub fn price_per_night(&self) -> Option<f64> {
        match (self.price, self.duration()) {
            (Some(price), Some(duration)) if duration > 0 => Some(price as f64 / duration as f64),
            _ => None,
        }
    }

    /// Equality with a freshly parsed special, over every core field. The
    /// error list, raw payload and previous values are metadata and never
    /// take part in the comparison.
    pub fn matches(&self, other: &ParsedSpecial) -> bool {
        self.mention_id == other.mention_id
            && self.source == other.source
            && self.url == other.url
            && self.special_type == other.special_type
            && self.points == other.points
            && self.price == other.price
            && self.check_in == other.check_in
            && self.check_out == other.check_out
            && self.resort == other.resort
            && self.room == other.room
            && self.view == other.view
    }

    /// Copies every differing field from `other` onto self, recording prior
    /// values in the `old_*` fields.
    ///
    /// Rules:
    /// - an `old_*` field is only written while it is unset, so a chain of
    ///   updates keeps the true original rather than an intermediate value;
    /// - the derived `old_duration`/`old_price_per_night` capture their
    ///   pre-update values whenever any of their inputs change;
    /// - after the merge, any `old_*` value equal to the current one is
    ///   cleared since no user-visible delta remains.
    pub fn update_with(&mut self, other: &ParsedSpecial) {
        let prior_duration = self.duration();
        let prior_price_per_night = self.price_per_night();
        let dates_changed =
            self.check_in != other.check_in || self.check_out != other.check_out;
        let price_changed = self.price != other.price;

        macro_rules! merge_field {
            ($field:ident, $old:ident) => {
                if self.$field != other.$field {
                    if self.$old.is_none() {
                        self.$old = self.$field.clone();
                    }
                    self.$field = other.$field.clone();
                }
            };
        }

        merge_field!(points, old_points);
        merge_field!(price, old_price);
        merge_field!(check_in, old_check_in);
        merge_field!(check_out, old_check_out);
        merge_field!(resort, old_resort);
        merge_field!(room, old_room);
        merge_field!(view, old_view);

        // No delta display for these, plain overwrite.
        if self.mention_id != other.mention_id {
            self.mention_id = other.mention_id.clone();
        }
        if self.url != other.url {
            self.url = other.url.clone();
        }

        if dates_changed {
            if self.old_duration.is_none() {
                self.old_duration = prior_duration;
            }
            if self.old_price_per_night.is_none() {
                self.old_price_per_night = prior_price_per_night;
            }
        }
        if price_changed && self.old_price_per_night.is_none() {
            self.old_price_per_night = prior_price_per_night;
        }

        self.clear_settled_previous();
    }

    /// Explicitly updates the persistent error flag from this run's parse
    /// outcome. Returns true when the flag newly flipped on, which is what
    /// drives the "new error" email.
    pub fn mark_error(&mut self, has_errors: bool) -> bool {
        let newly_errored = !self.error && has_errors;
        self.error = has_errors;
        newly_errored
    }

    fn clear_settled_previous(&mut self) {
        if self.old_points.is_some() && self.old_points == self.points {
            self.old_points = None;
        }
        if self.old_price.is_some() && self.old_price == self.price {
            self.old_price = None;
        }
        if self.old_check_in.is_some() && self.old_check_in == self.check_in {
            self.old_check_in = None;
        }
        if self.old_check_out.is_some() && self.old_check_out == self.check_out {
            self.old_check_out = None;
        }
        if self.old_resort.is_some() && self.old_resort == self.resort {
            self.old_resort = None;
        }
        if self.old_room.is_some() && self.old_room == self.room {
            self.old_room = None;
        }
        if self.old_view.is_some() && self.old_view == self.view {
            self.old_view = None;
        }
        if self.old_duration.is_some() && self.old_duration == self.duration() {
            self.old_duration = None;
        }
        if let (Some(old), Some(current)) = (self.old_price_per_night, self.price_per_night()) {
            if (old - current).abs() < f64::EPSILON {
                self.old_price_per_night = None;
            }
        }
    }
}
