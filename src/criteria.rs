// src/criteria.rs

use crate::domain::special::{SpecialType, StoredSpecial};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One importance criterion. A closed set dispatched with a single match, so
/// adding a kind forces every call site to handle it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    /// For preconfirms the stay must overlap [start, end]; for other types
    /// the record's check-out must be on or after `end`.
    Date { start: NaiveDate, end: NaiveDate },
    LengthOfStay { min_nights: i64 },
    Price { max: i64 },
    PricePerNight { max: f64 },
    Points { min: i64 },
    Resorts { any_of: Vec<String> },
    Rooms { any_of: Vec<String> },
    Views { any_of: Vec<String> },
}

/// All criteria in a group must hold (AND).
pub type CriterionGroup = Vec<Criterion>;

/// A subscriber's criteria, grouped per special type. Any matching group
/// marks a record important (OR across groups). Stored as JSON on the
/// subscriber row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaConfig {
    #[serde(default)]
    pub preconfirm: Vec<CriterionGroup>,
    #[serde(default)]
    pub disc_points: Vec<CriterionGroup>,
}

/// Evaluates a subscriber's criteria against stored specials. Built per
/// subscriber per run; carries no global state.
pub struct ImportanceEvaluator {
    criteria: CriteriaConfig,
}

impl ImportanceEvaluator {
    pub fn new(criteria: CriteriaConfig) -> Self {
        Self { criteria }
    }

    pub fn is_important(&self, special: &StoredSpecial) -> bool {
        let groups = match special.special_type {
            SpecialType::Preconfirm => &self.criteria.preconfirm,
            SpecialType::DiscPoints => &self.criteria.disc_points,
        };
        groups
            .iter()
            .any(|group| !group.is_empty() && group.iter().all(|c| check(c, special)))
    }
}

fn check(criterion: &Criterion, special: &StoredSpecial) -> bool {
    match criterion {
        Criterion::Date { start, end } => check_date(special, *start, *end),
        Criterion::LengthOfStay { min_nights } => {
            special.duration().map_or(false, |d| d >= *min_nights)
        }
        Criterion::Price { max } => special.price.map_or(false, |p| p <= *max),
        Criterion::PricePerNight { max } => {
            special.price_per_night().map_or(false, |p| p <= *max)
        }
        Criterion::Points { min } => special.points.map_or(false, |p| p >= *min),
        Criterion::Resorts { any_of } => member_of(special.resort.as_deref(), any_of),
        Criterion::Rooms { any_of } => member_of(special.room.as_deref(), any_of),
        Criterion::Views { any_of } => member_of(special.view.as_deref(), any_of),
    }
}

fn check_date(special: &StoredSpecial, start: NaiveDate, end: NaiveDate) -> bool {
    let Some(check_out) = special.check_out else {
        return false;
    };
    match special.special_type {
        SpecialType::Preconfirm => {
            let Some(check_in) = special.check_in else {
                return false;
            };
            let latest_start = start.max(check_in);
            let earliest_end = end.min(check_out);
            let overlap_days = (earliest_end - latest_start).num_days() + 1;
            overlap_days > 0
        }
        // Date importance for point specials just means the points stay
        // usable long enough.
        SpecialType::DiscPoints => check_out >= end,
    }
}

fn member_of(value: Option<&str>, any_of: &[String]) -> bool {
    value.map_or(false, |v| any_of.iter().any(|wanted| v.contains(wanted.as_str())))
}
