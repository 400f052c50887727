// src/notifications/render.rs
//
// Digest and error-report bodies. Everything user-facing renders through
// maud; the operator error notice for an unhandled failure is plain text and
// assembled at the call site.

use crate::domain::special::{ParsedSpecial, SpecialType, StoredSpecial};
use crate::notifications::dispatch::{Digest, DigestItem};
use chrono::NaiveDate;
use maud::{html, Markup};

pub const UPDATE_TEXT_MSG: &str = "Hey this is SpecialsTracker!\nA special you are interested in \
     was either just added or updated. Check your emails for more info!";

pub const ERROR_TEXT_MSG: &str = "Hey this is SpecialsTracker!\nThere seems to be a problem \
     checking for updates and/or sending emails. Check your emails for more info!";

pub fn empty_source_alert(source_label: &str, site_url: &str, detail: Option<&str>) -> String {
    let mut body = format!(
        "There is a problem getting data from the '{source_label}' website.\n\n{site_url}"
    );
    if let Some(detail) = detail {
        body.push_str("\n\n");
        body.push_str(detail);
    }
    body
}

pub fn update_digest(digest: &Digest) -> String {
    let sections = [
        ("Added", &digest.added),
        ("Updated", &digest.updated),
        ("Removed", &digest.removed),
    ];
    html! {
        div {
            @for (title, items) in sections {
                @if !items.is_empty() {
                    h2 { (title) " Specials" }
                    @for item in items {
                        (special_card(item))
                    }
                }
            }
        }
    }
    .into_string()
}

/// Parse errors accumulated this run, plus any sources currently down. Used
/// both for the "new errors" email and, with `error_report` set, the full
/// on-demand report.
pub fn error_report(
    specials: &[ParsedSpecial],
    unhealthy_sources: &[String],
    error_report: bool,
) -> String {
    html! {
        div {
            @if error_report {
                h1 { "SpecialsTracker Error Report" }
            } @else {
                h1 { "New parsing errors" }
            }
            @if !unhealthy_sources.is_empty() {
                h2 { "Unhealthy sources" }
                ul {
                    @for source in unhealthy_sources {
                        li { (source) }
                    }
                }
            }
            @for special in specials {
                div {
                    h3 { "Special " (special.special_id.as_deref().unwrap_or("<no id>")) }
                    ul {
                        @for error in &special.errors {
                            li { (error.field) ": " (error.detail) }
                        }
                    }
                    pre { (special.raw_string) }
                }
            }
        }
    }
    .into_string()
}

fn special_card(item: &DigestItem) -> Markup {
    let special = item.special;
    html! {
        div {
            @if item.important {
                p { b { "Important!" } }
            }
            @match special.special_type {
                SpecialType::Preconfirm => { (preconfirm_body(special)) }
                SpecialType::DiscPoints => { (points_body(special)) }
            }
            p {
                a href=(special.url) { "View Special" }
            }
            hr;
        }
    }
}

fn preconfirm_body(special: &StoredSpecial) -> Markup {
    html! {
        p {
            (labeled_date("Check-In", special.check_in, special.old_check_in))
            (labeled_date("Check-Out", special.check_out, special.old_check_out))
            (labeled_text("Resort", special.resort.as_deref(), special.old_resort.as_deref()))
            (labeled_text("Room", special.room.as_deref(), special.old_room.as_deref()))
            (labeled_text("View", special.view.as_deref(), special.old_view.as_deref()))
            (labeled_price("Price", special.price, special.old_price))
            (price_per_night_line(special))
            @if let Some(mention_id) = &special.mention_id {
                "Mention ID: " (mention_id)
            }
        }
    }
}

fn points_body(special: &StoredSpecial) -> Markup {
    html! {
        p {
            @if let Some(points) = special.points {
                "Points Available: "
                @if let Some(old) = special.old_points {
                    s { (old) } " "
                }
                (points)
                br;
            }
            @if let Some(price) = special.price {
                "Price: "
                @if let Some(old) = special.old_price {
                    s { (currency(old)) } " "
                }
                (currency(price)) "/Point"
                br;
            }
            @if let Some(check_out) = special.check_out {
                "Check-Out no later than: " (long_date(check_out)) br;
            }
            @if let Some(mention_id) = &special.mention_id {
                "Mention ID: " (mention_id)
            }
        }
    }
}

fn price_per_night_line(special: &StoredSpecial) -> Markup {
    html! {
        @if let Some(price_per_night) = special.price_per_night() {
            "Price/Night: "
            @if let Some(old) = special.old_price_per_night {
                s { (currency_f64(old)) } " "
            }
            (currency_f64(price_per_night))
            br;
        }
    }
}

fn labeled_text(label: &str, value: Option<&str>, old: Option<&str>) -> Markup {
    html! {
        @if let Some(value) = value {
            (label) ": "
            @if let Some(old) = old {
                s { (old) } " "
            }
            (value)
            br;
        }
    }
}

fn labeled_date(label: &str, value: Option<NaiveDate>, old: Option<NaiveDate>) -> Markup {
    html! {
        @if let Some(value) = value {
            (label) ": "
            @if let Some(old) = old {
                s { (long_date(old)) } " "
            }
            (long_date(value))
            br;
        }
    }
}

fn labeled_price(label: &str, value: Option<i64>, old: Option<i64>) -> Markup {
    html! {
        @if let Some(value) = value {
            (label) ": "
            @if let Some(old) = old {
                s { (currency(old)) } " "
            }
            (currency(value))
            br;
        }
    }
}

fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// "$1,234" with thousands separators.
pub fn currency(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if negative {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

fn currency_f64(value: f64) -> String {
    // Round once at cent precision so .995 carries into the dollars.
    let total_cents = (value * 100.0).round() as i64;
    let whole = total_cents / 100;
    let cents = (total_cents % 100).abs();
    if cents == 0 {
        currency(whole)
    } else {
        format!("{}.{cents:02}", currency(whole))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::special::ParsedSpecial;

    fn stored() -> StoredSpecial {
        let mut parsed = ParsedSpecial::new(
            "dvcrentalstore_preconfirms",
            "https://example.com/",
            SpecialType::Preconfirm,
        );
        parsed.special_id = Some("s1".to_string());
        parsed.mention_id = Some("M1".to_string());
        parsed.price = Some(1500);
        parsed.check_in = NaiveDate::from_ymd_opt(2024, 10, 5);
        parsed.check_out = NaiveDate::from_ymd_opt(2024, 10, 8);
        parsed.resort = Some("Copper Creek Villas & Cabins".to_string());
        StoredSpecial::from_parsed(&parsed).unwrap()
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(currency(0), "$0");
        assert_eq!(currency(950), "$950");
        assert_eq!(currency(1500), "$1,500");
        assert_eq!(currency(1234567), "$1,234,567");
        assert_eq!(currency(-1500), "-$1,500");
    }

    #[test]
    fn fractional_currency_carries_rounding_into_dollars() {
        assert_eq!(currency_f64(9.9999), "$10");
        assert_eq!(currency_f64(10.0), "$10");
        assert_eq!(currency_f64(123.456), "$123.46");
        assert_eq!(currency_f64(1071.6667), "$1,071.67");
    }

    #[test]
    fn digest_shows_delta_with_old_value_struck_through() {
        let mut special = stored();
        special.old_price = Some(1200);
        let digest = Digest {
            added: vec![],
            updated: vec![DigestItem {
                special: &special,
                important: true,
            }],
            removed: vec![],
        };

        let body = update_digest(&digest);
        assert!(body.contains("Updated Specials"));
        assert!(body.contains("Important!"));
        assert!(body.contains("<s>$1,200</s>"));
        assert!(body.contains("$1,500"));
        assert!(body.contains("October 5, 2024"));
    }

    #[test]
    fn error_report_includes_raw_payload_and_sources() {
        let mut parsed = ParsedSpecial::new(
            "dvcrentalstore_points",
            "https://example.com/",
            SpecialType::DiscPoints,
        );
        parsed.special_id = Some("p1".to_string());
        parsed.raw_string = "{\"field\": 1}".to_string();
        parsed.push_error("price", "field_193_raw = None");

        let body = error_report(
            &[parsed],
            &["dvcrentalstore_points".to_string()],
            true,
        );
        assert!(body.contains("Error Report"));
        assert!(body.contains("price: field_193_raw = None"));
        assert!(body.contains("Unhealthy sources"));
        assert!(body.contains("field"));
    }
}
