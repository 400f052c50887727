// src/notifications/dispatch.rs
//
// Fan-out of a run's outcome to subscribers. Channel failures are logged and
// isolated: a dead SMS gateway never blocks the push notification, and a bad
// subscriber never blocks the next one.

use crate::criteria::ImportanceEvaluator;
use crate::domain::special::{ParsedSpecial, StoredSpecial};
use crate::notifications::{log_response, render, EmailChannel, PushChannel, SmsChannel};
use crate::db::subscribers::Subscriber;

pub const UPDATES_SUBJECT: &str = "SpecialsTracker Updates";
pub const ERROR_SUBJECT: &str = "SpecialsTracker Error";
pub const ERROR_REPORT_SUBJECT: &str = "SpecialsTracker Error Report";

/// The merged outcome of one reconciliation, post-merge: updated entries
/// carry their old_* deltas already.
#[derive(Debug, Default)]
pub struct RunChanges {
    pub added: Vec<StoredSpecial>,
    pub updated: Vec<StoredSpecial>,
    pub removed: Vec<StoredSpecial>,
}

impl RunChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

pub struct DigestItem<'a> {
    pub special: &'a StoredSpecial,
    pub important: bool,
}

/// One subscriber's view of the changes, after their criteria and
/// `important_only` filter have been applied.
pub struct Digest<'a> {
    pub added: Vec<DigestItem<'a>>,
    pub updated: Vec<DigestItem<'a>>,
    pub removed: Vec<DigestItem<'a>>,
}

impl Digest<'_> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn any_important(&self) -> bool {
        self.added
            .iter()
            .chain(&self.updated)
            .chain(&self.removed)
            .any(|item| item.important)
    }
}

pub fn build_digest<'a>(
    changes: &'a RunChanges,
    evaluator: &ImportanceEvaluator,
    important_only: bool,
) -> Digest<'a> {
    let section = |specials: &'a [StoredSpecial]| {
        specials
            .iter()
            .map(|special| DigestItem {
                special,
                important: evaluator.is_important(special),
            })
            .filter(|item| item.important || !important_only)
            .collect()
    };
    Digest {
        added: section(&changes.added),
        updated: section(&changes.updated),
        removed: section(&changes.removed),
    }
}

/// The three delivery channels, behind traits so tests can script them.
pub struct Channels<'a> {
    pub email: &'a dyn EmailChannel,
    pub sms: &'a dyn SmsChannel,
    pub push: &'a dyn PushChannel,
}

/// Sends each subscriber their personalized digest. Returns the ids of the
/// subscribers a digest actually went to, so the caller can stamp
/// `last_notified_at`.
pub fn send_updates(
    changes: &RunChanges,
    subscribers: &[Subscriber],
    channels: &Channels,
) -> Vec<i64> {
    let mut notified = Vec::new();
    for subscriber in subscribers {
        let evaluator = ImportanceEvaluator::new(subscriber.criteria.clone());
        let digest = build_digest(changes, &evaluator, subscriber.important_only);
        if digest.is_empty() {
            continue;
        }

        let body = render::update_digest(&digest);
        let addresses: Vec<String> = subscriber
            .emails
            .iter()
            .map(|c| c.address.clone())
            .collect();
        let email_resp = channels
            .email
            .send_email(UPDATES_SUBJECT, &body, &addresses, true);
        log_response(
            "Mailgun",
            &format!("Update email sent to {}.", subscriber.name),
            &email_resp,
        );

        // SMS and push are attention-getters, reserved for specials the
        // subscriber marked important.
        if digest.any_important() {
            let numbers: Vec<String> = subscriber
                .phones
                .iter()
                .map(|c| c.phone_number.clone())
                .collect();
            let sms_resp = channels.sms.send_sms(render::UPDATE_TEXT_MSG, &numbers);
            log_response(
                "Twilio",
                &format!("Update txt sent to {}.", subscriber.name),
                &sms_resp,
            );

            let tokens: Vec<String> = subscriber
                .push_tokens
                .iter()
                .map(|c| c.push_token.clone())
                .collect();
            let push_resp = channels.push.send_push(
                render::UPDATE_TEXT_MSG,
                &tokens,
                email_resp.data.as_deref(),
            );
            log_response(
                "Push",
                &format!("Update push sent to {}.", subscriber.name),
                &push_resp,
            );
        }

        notified.push(subscriber.id);
    }
    notified
}

/// A source came back intolerably empty. One plain-text notice to the error
/// contacts, linking the site so the operator can eyeball it; the hysteresis
/// gate lives with the caller.
pub fn send_empty_source_alert(
    source_label: &str,
    site_url: &str,
    detail: Option<&str>,
    subscribers: &[Subscriber],
    channels: &Channels,
) {
    let body = render::empty_source_alert(source_label, site_url, detail);
    send_error_notice(ERROR_SUBJECT, &body, false, subscribers, channels);
}

/// Parse errors appeared on records that were clean before, or the operator
/// asked for the full report.
pub fn send_error_email(
    specials: &[ParsedSpecial],
    unhealthy_sources: &[String],
    full_report: bool,
    subscribers: &[Subscriber],
    channels: &Channels,
) {
    let subject = if full_report {
        ERROR_REPORT_SUBJECT
    } else {
        ERROR_SUBJECT
    };
    let body = render::error_report(specials, unhealthy_sources, full_report);
    send_error_notice(subject, &body, true, subscribers, channels);
}

/// The run died in a way nothing else reported. Plain text, error contacts
/// only.
pub fn send_unhandled_failure(detail: &str, subscribers: &[Subscriber], channels: &Channels) {
    let body = format!(
        "SpecialsTracker hit an unhandled failure while checking for updates.\n\n{detail}"
    );
    send_error_notice(ERROR_SUBJECT, &body, false, subscribers, channels);
}

fn send_error_notice(
    subject: &str,
    body: &str,
    html: bool,
    subscribers: &[Subscriber],
    channels: &Channels,
) {
    for subscriber in subscribers {
        let addresses = subscriber.error_emails();
        let numbers = subscriber.error_phones();
        let tokens = subscriber.error_push_tokens();
        if addresses.is_empty() && numbers.is_empty() && tokens.is_empty() {
            continue;
        }

        let email_resp = channels.email.send_email(subject, body, &addresses, html);
        log_response(
            "Mailgun",
            &format!("Error email sent to {}.", subscriber.name),
            &email_resp,
        );

        let sms_resp = channels.sms.send_sms(render::ERROR_TEXT_MSG, &numbers);
        log_response(
            "Twilio",
            &format!("Error txt sent to {}.", subscriber.name),
            &sms_resp,
        );

        let push_resp =
            channels
                .push
                .send_push(render::ERROR_TEXT_MSG, &tokens, email_resp.data.as_deref());
        log_response(
            "Push",
            &format!("Error push sent to {}.", subscriber.name),
            &push_resp,
        );
    }
}
