// src/run.rs
//
// One full update cycle: fetch every source, resolve references, reconcile
// against the stored records inside a single transaction, then notify.
// Fetch and parse failures are isolated per source; an exploding source is
// treated like an intolerable empty snapshot and never touches its stored
// records.

use crate::config::Config;
use crate::db::{self, connection::Database, subscribers::Subscriber};
use crate::domain::reconcile::{reconcile, ChangeSet};
use crate::domain::special::{ParsedSpecial, StoredSpecial};
use crate::errors::TrackerError;
use crate::health::{EmptyObservation, HealthTracker};
use crate::notifications::dispatch::{self, Channels, RunChanges};
use crate::parsers::fetch::Transport;
use crate::parsers::resolve::{resolve_references, Catalog};
use crate::parsers::SourceParser;
use rusqlite::Connection;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[derive(Default)]
pub struct RunOptions {
    /// Source name to local payload file, used instead of the network.
    pub local_payloads: HashMap<String, PathBuf>,
    /// Reconcile and persist but stay silent on every channel.
    pub no_notifications: bool,
}

/// A source that crossed the healthy to unhealthy edge this run.
pub struct SourceAlert {
    pub label: String,
    pub site_url: String,
    pub detail: Option<String>,
}

/// What one cycle did, for logging and tests.
#[derive(Default)]
pub struct RunReport {
    pub changes: RunChanges,
    pub alerts: Vec<SourceAlert>,
    pub new_error_specials: Vec<ParsedSpecial>,
}

struct Snapshot {
    source: &'static str,
    label: &'static str,
    site_url: &'static str,
    outcome: Result<HashMap<String, ParsedSpecial>, String>,
}

pub fn run_update(
    config: &Config,
    db: &Database,
    transport: &dyn Transport,
    channels: &Channels,
    options: &RunOptions,
) -> Result<RunReport, TrackerError> {
    let subscribers = db.with_conn(|conn| db::subscribers::list_subscribers(conn))?;
    let mut tracker = db.with_conn(|conn| HealthTracker::load(conn))?;
    let was_system_healthy = tracker.system_healthy();

    let result = run_cycle(config, db, transport, channels, options, &subscribers, &mut tracker);

    match result {
        Ok(report) => {
            tracker.set_system_healthy(true);
            db.with_conn(|conn| tracker.persist_system(conn))?;
            Ok(report)
        }
        Err(e) => {
            eprintln!("Update run failed: {e}");
            if was_system_healthy && !options.no_notifications {
                dispatch::send_unhandled_failure(&e.to_string(), &subscribers, channels);
            }
            tracker.set_system_healthy(false);
            // Best effort; the original failure is the one worth returning.
            if let Err(persist_err) = db.with_conn(|conn| tracker.persist_system(conn)) {
                eprintln!("Failed to persist system health: {persist_err}");
            }
            Err(e)
        }
    }
}

fn run_cycle(
    config: &Config,
    db: &Database,
    transport: &dyn Transport,
    channels: &Channels,
    options: &RunOptions,
    subscribers: &[Subscriber],
    tracker: &mut HealthTracker,
) -> Result<RunReport, TrackerError> {
    let catalog = db.with_conn(|conn| db::catalog::load_catalog(conn))?;
    let parsers = crate::parsers::all_parsers(config);
    let snapshots = collect_snapshots(&parsers, transport, config, options, &catalog);

    let mut report = RunReport::default();

    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        for snapshot in snapshots {
            match snapshot.outcome {
                Ok(parsed) => {
                    if parsed.is_empty() {
                        let tolerable = config.empty_tolerable(snapshot.source);
                        match tracker.observe_empty(snapshot.source, tolerable) {
                            EmptyObservation::Alert => {
                                report.alerts.push(SourceAlert {
                                    label: snapshot.label.to_string(),
                                    site_url: snapshot.site_url.to_string(),
                                    detail: None,
                                });
                                continue;
                            }
                            EmptyObservation::Suppressed => continue,
                            EmptyObservation::Tolerated => {}
                        }
                    } else {
                        tracker.observe_nonempty(snapshot.source);
                    }

                    let stored = db::specials::query_by_source(&tx, snapshot.source)?;
                    let change_set = reconcile(stored, parsed);
                    apply_changes(&tx, change_set, &mut report)?;
                }
                Err(detail) => {
                    eprintln!("Source {} failed: {detail}", snapshot.source);
                    if let EmptyObservation::Alert = tracker.observe_empty(snapshot.source, false)
                    {
                        report.alerts.push(SourceAlert {
                            label: snapshot.label.to_string(),
                            site_url: snapshot.site_url.to_string(),
                            detail: Some(detail),
                        });
                    }
                }
            }
        }
        tracker.persist_sources(&tx)?;
        tx.commit()?;
        Ok(())
    })?;

    if !options.no_notifications {
        notify(db, channels, subscribers, tracker, &report)?;
    }

    println!(
        "Run complete: {} added, {} updated, {} removed.",
        report.changes.added.len(),
        report.changes.updated.len(),
        report.changes.removed.len()
    );
    Ok(report)
}

fn collect_snapshots(
    parsers: &[Box<dyn SourceParser>],
    transport: &dyn Transport,
    config: &Config,
    options: &RunOptions,
    catalog: &Catalog,
) -> Vec<Snapshot> {
    parsers
        .iter()
        .map(|parser| {
            let body = match options.local_payloads.get(parser.name()) {
                Some(path) => fs::read(path).map_err(|e| format!("read {path:?}: {e}")),
                None => parser
                    .fetch(transport, config.fetch_max_attempts)
                    .map_err(|e| e.to_string()),
            };
            let outcome = body.and_then(|body| {
                parser.parse(&body).map_err(|e| e.to_string()).map(
                    |mut parsed| {
                        resolve_references(&mut parsed, catalog);
                        parsed
                    },
                )
            });
            Snapshot {
                source: parser.name(),
                label: parser.source_label(),
                site_url: parser.site_url(),
                outcome,
            }
        })
        .collect()
}

fn apply_changes(
    conn: &Connection,
    change_set: ChangeSet,
    report: &mut RunReport,
) -> Result<(), TrackerError> {
    for parsed in change_set.added {
        // Identity-less records were already dropped by the parser.
        let Some(special) = StoredSpecial::from_parsed(&parsed) else {
            eprintln!("Skipping added special with no identity: {}", parsed.raw_string);
            continue;
        };
        db::specials::upsert(conn, &special)?;
        if parsed.has_errors() {
            report.new_error_specials.push(parsed);
        }
        report.changes.added.push(special);
    }

    for (parsed, mut stored) in change_set.updated {
        stored.update_with(&parsed);
        let newly_errored = stored.mark_error(parsed.has_errors());
        db::specials::upsert(conn, &stored)?;
        if newly_errored {
            report.new_error_specials.push(parsed);
        }
        report.changes.updated.push(stored);
    }

    for stored in change_set.removed {
        db::specials::delete(conn, &stored)?;
        report.changes.removed.push(stored);
    }

    Ok(())
}

fn notify(
    db: &Database,
    channels: &Channels,
    subscribers: &[Subscriber],
    tracker: &HealthTracker,
    report: &RunReport,
) -> Result<(), TrackerError> {
    for alert in &report.alerts {
        dispatch::send_empty_source_alert(
            &alert.label,
            &alert.site_url,
            alert.detail.as_deref(),
            subscribers,
            channels,
        );
    }

    if !report.changes.is_empty() {
        let notified = dispatch::send_updates(&report.changes, subscribers, channels);
        let now = chrono::Utc::now().naive_utc();
        db.with_conn(|conn| {
            for subscriber_id in &notified {
                db::subscribers::touch_last_notified(conn, *subscriber_id, now)?;
            }
            Ok(())
        })?;
    }

    if !report.new_error_specials.is_empty() {
        dispatch::send_error_email(
            &report.new_error_specials,
            &tracker.unhealthy_sources(),
            false,
            subscribers,
            channels,
        );
    }

    Ok(())
}

/// On-demand error report: fetches and parses every source, then mails the
/// full set of records that still carry parse errors plus any sources that
/// are currently down. Stored records are not touched.
pub fn run_error_report(
    config: &Config,
    db: &Database,
    transport: &dyn Transport,
    channels: &Channels,
    options: &RunOptions,
) -> Result<(), TrackerError> {
    let subscribers = db.with_conn(|conn| db::subscribers::list_subscribers(conn))?;
    let tracker = db.with_conn(|conn| HealthTracker::load(conn))?;
    let catalog = db.with_conn(|conn| db::catalog::load_catalog(conn))?;
    let parsers = crate::parsers::all_parsers(config);
    let snapshots = collect_snapshots(&parsers, transport, config, options, &catalog);

    let mut error_specials = Vec::new();
    let mut unhealthy = tracker.unhealthy_sources();
    for snapshot in snapshots {
        match snapshot.outcome {
            Ok(parsed) => {
                let mut with_errors: Vec<ParsedSpecial> = parsed
                    .into_values()
                    .filter(ParsedSpecial::has_errors)
                    .collect();
                with_errors.sort_by(|a, b| a.special_id.cmp(&b.special_id));
                error_specials.extend(with_errors);
            }
            Err(detail) => {
                eprintln!("Source {} failed: {detail}", snapshot.source);
                if !unhealthy.contains(&snapshot.source.to_string()) {
                    unhealthy.push(snapshot.source.to_string());
                }
            }
        }
    }
    unhealthy.sort();

    dispatch::send_error_email(&error_specials, &unhealthy, true, &subscribers, channels);
    Ok(())
}

/// Clears the error flag on every stored special and marks the system
/// healthy again, so the next run reports errors and failures afresh.
pub fn reset_errors(db: &Database) -> Result<(), TrackerError> {
    let cleared = db.with_conn(|conn| {
        let cleared = db::specials::clear_all_errors(conn)?;
        db::health::save_system_health(conn, true, chrono::Utc::now().naive_utc())?;
        Ok(cleared)
    })?;
    println!("Cleared error flag on {cleared} stored specials.");
    Ok(())
}
