// src/tests/run_tests.rs
//
// Full update cycles against a real temp-file database, with the network and
// the notification channels scripted.

use crate::config::Config;
use crate::db::connection::{init_db, Database};
use crate::db;
use crate::notifications::dispatch::Channels;
use crate::notifications::{ChannelResponse, EmailChannel, PushChannel, SmsChannel};
use crate::parsers::fetch::{FetchError, FetchRequest, Transport};
use crate::run::{self, RunOptions};
use std::cell::RefCell;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

fn make_db(tag: &str) -> Database {
    let path = std::env::temp_dir().join(format!(
        "run_test_{tag}_{}.sqlite",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let db = Database::new(path.to_string_lossy().to_string());
    init_db(&db, "sql/schema.sql").expect("Failed to initialize DB");
    db
}

fn test_config() -> Config {
    Config {
        database_path: String::new(),
        schema_path: "sql/schema.sql".to_string(),
        env_label: None,
        mailgun_api_key: None,
        mailgun_domain: None,
        twilio_sid: None,
        twilio_token: None,
        twilio_msg_service: None,
        push_webhook_url: None,
        fetch_max_attempts: 2,
        empty_tolerable_sources: HashSet::new(),
        preconfirm_rows_per_page: 100,
    }
}

fn seed_subscriber(db: &Database) {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO subscribers (id, name, important_only, criteria)
             VALUES (1, 'Luke', 0, '{}')",
            [],
        )?;
        conn.execute(
            "INSERT INTO emails (address, subscriber_id, get_errors)
             VALUES ('luke@example.com', 1, 1)",
            [],
        )?;
        Ok(())
    })
    .unwrap();
}

/// Serves a fixed body per URL marker; unmatched URLs are transport errors.
struct FakeTransport {
    responses: Vec<(&'static str, u16, String)>,
}

impl Transport for FakeTransport {
    fn get(&self, request: &FetchRequest) -> Result<(u16, Vec<u8>), FetchError> {
        for (marker, status, body) in &self.responses {
            if request.url.contains(marker) {
                return Ok((*status, body.clone().into_bytes()));
            }
        }
        Err(FetchError::Transport(format!(
            "no scripted response for {}",
            request.url
        )))
    }
}

#[derive(Default)]
struct RecordingChannels {
    emails: RefCell<Vec<(String, String)>>,
}

impl RecordingChannels {
    fn email_count(&self) -> usize {
        self.emails.borrow().len()
    }
}

impl EmailChannel for RecordingChannels {
    fn send_email(
        &self,
        subject: &str,
        body: &str,
        _addresses: &[String],
        _html: bool,
    ) -> ChannelResponse {
        self.emails
            .borrow_mut()
            .push((subject.to_string(), body.to_string()));
        ChannelResponse::success()
    }
}

impl SmsChannel for RecordingChannels {
    fn send_sms(&self, _body: &str, _numbers: &[String]) -> ChannelResponse {
        ChannelResponse::success()
    }
}

impl PushChannel for RecordingChannels {
    fn send_push(
        &self,
        _body: &str,
        _tokens: &[String],
        _correlation_id: Option<&str>,
    ) -> ChannelResponse {
        ChannelResponse::success()
    }
}

// The preconfirm endpoint lives under scene_143, the points endpoint under
// scene_152.
fn preconfirm_payload(price: &str) -> String {
    format!(
        r#"{{"records": [{{
            "id": "rec_1",
            "field_199_raw": "M4471",
            "field_78_raw": "{price}",
            "field_10_raw": {{"iso_timestamp": "2024-10-10T00:00:00Z"}},
            "field_11_raw": {{"iso_timestamp": "2024-10-12T00:00:00Z"}},
            "field_57_raw": [{{"identifier": "Copper Creek Villas & Cabins at Disney's Wilderness Lodge"}}],
            "field_145_raw": [{{"identifier": "Deluxe Studio"}}],
            "field_9_raw": [{{"identifier": "Standard View"}}]
        }}]}}"#
    )
}

fn points_payload() -> String {
    r#"{"records": [{
        "id": "pt_1",
        "field_203_raw": "P2210",
        "field_154_raw": 160,
        "field_193_raw": "14",
        "field_336_raw": {"iso_timestamp": "2024-11-30T00:00:00Z"}
    }]}"#
        .to_string()
}

fn empty_payload() -> String {
    r#"{"records": []}"#.to_string()
}

fn stored_count(db: &Database) -> i64 {
    db.with_conn(|conn| {
        Ok(conn
            .query_row("SELECT COUNT(*) FROM stored_specials", [], |row| row.get(0))
            .unwrap())
    })
    .unwrap()
}

#[test]
fn first_run_adds_and_identical_rerun_is_silent() {
    let db = make_db("adds");
    seed_subscriber(&db);
    let config = test_config();
    let transport = FakeTransport {
        responses: vec![
            ("scene_143", 200, preconfirm_payload("2,150")),
            ("scene_152", 200, points_payload()),
        ],
    };
    let recorder = RecordingChannels::default();
    let channels = Channels {
        email: &recorder,
        sms: &recorder,
        push: &recorder,
    };

    let report = run::run_update(&config, &db, &transport, &channels, &RunOptions::default())
        .unwrap();
    assert_eq!(report.changes.added.len(), 2);
    assert_eq!(stored_count(&db), 2);

    // The digest went out with resolved display names, and the subscriber
    // got stamped.
    assert_eq!(recorder.email_count(), 1);
    let body = &recorder.emails.borrow()[0].1;
    assert!(body.contains("Added Specials"));
    assert!(body.contains("Copper Creek Villas &amp; Cabins"));
    assert!(body.contains("Deluxe Studio Villa"));
    let stamped: Option<String> = db
        .with_conn(|conn| {
            Ok(conn
                .query_row("SELECT last_notified_at FROM subscribers WHERE id = 1", [], |r| {
                    r.get(0)
                })
                .unwrap())
        })
        .unwrap();
    assert!(stamped.is_some());

    // Same payloads again: nothing changes, nobody hears about it.
    let report = run::run_update(&config, &db, &transport, &channels, &RunOptions::default())
        .unwrap();
    assert!(report.changes.is_empty());
    assert_eq!(recorder.email_count(), 1);
}

#[test]
fn changed_price_produces_update_with_previous_value() {
    let db = make_db("update");
    seed_subscriber(&db);
    let config = test_config();
    let recorder = RecordingChannels::default();
    let channels = Channels {
        email: &recorder,
        sms: &recorder,
        push: &recorder,
    };

    let transport = FakeTransport {
        responses: vec![
            ("scene_143", 200, preconfirm_payload("2,150")),
            ("scene_152", 200, points_payload()),
        ],
    };
    run::run_update(&config, &db, &transport, &channels, &RunOptions::default()).unwrap();

    let transport = FakeTransport {
        responses: vec![
            ("scene_143", 200, preconfirm_payload("1,999")),
            ("scene_152", 200, points_payload()),
        ],
    };
    let report = run::run_update(&config, &db, &transport, &channels, &RunOptions::default())
        .unwrap();

    assert_eq!(report.changes.updated.len(), 1);
    let updated = &report.changes.updated[0];
    assert_eq!(updated.price, Some(1999));
    assert_eq!(updated.old_price, Some(2150));

    let body = &recorder.emails.borrow()[1].1;
    assert!(body.contains("Updated Specials"));
    assert!(body.contains("<s>$2,150</s>"));
    assert!(body.contains("$1,999"));
}

#[test]
fn intolerable_empty_alerts_once_and_keeps_stored_rows() {
    let db = make_db("empty");
    seed_subscriber(&db);
    let config = test_config();
    let recorder = RecordingChannels::default();
    let channels = Channels {
        email: &recorder,
        sms: &recorder,
        push: &recorder,
    };

    let transport = FakeTransport {
        responses: vec![
            ("scene_143", 200, preconfirm_payload("2,150")),
            ("scene_152", 200, points_payload()),
        ],
    };
    run::run_update(&config, &db, &transport, &channels, &RunOptions::default()).unwrap();
    assert_eq!(stored_count(&db), 2);
    let emails_after_seed = recorder.email_count();

    let outage = FakeTransport {
        responses: vec![
            ("scene_143", 200, empty_payload()),
            ("scene_152", 200, empty_payload()),
        ],
    };
    let report = run::run_update(&config, &db, &outage, &channels, &RunOptions::default())
        .unwrap();
    assert_eq!(report.alerts.len(), 2);
    assert!(report.changes.is_empty());
    assert_eq!(stored_count(&db), 2);
    assert_eq!(recorder.email_count(), emails_after_seed + 2);

    // Still down: suppressed, no more noise.
    let report = run::run_update(&config, &db, &outage, &channels, &RunOptions::default())
        .unwrap();
    assert!(report.alerts.is_empty());
    assert_eq!(recorder.email_count(), emails_after_seed + 2);

    // Back up: records reconcile as usual and the next outage alerts again.
    let transport = FakeTransport {
        responses: vec![
            ("scene_143", 200, preconfirm_payload("2,150")),
            ("scene_152", 200, points_payload()),
        ],
    };
    run::run_update(&config, &db, &transport, &channels, &RunOptions::default()).unwrap();
    let report = run::run_update(&config, &db, &outage, &channels, &RunOptions::default())
        .unwrap();
    assert_eq!(report.alerts.len(), 2);
}

#[test]
fn tolerable_empty_removes_rows_without_alerting() {
    let db = make_db("tolerable");
    seed_subscriber(&db);
    let mut config = test_config();
    config.empty_tolerable_sources = ["dvcrentalstore_preconfirms", "dvcrentalstore_points"]
        .into_iter()
        .map(String::from)
        .collect();
    let recorder = RecordingChannels::default();
    let channels = Channels {
        email: &recorder,
        sms: &recorder,
        push: &recorder,
    };

    let transport = FakeTransport {
        responses: vec![
            ("scene_143", 200, preconfirm_payload("2,150")),
            ("scene_152", 200, points_payload()),
        ],
    };
    run::run_update(&config, &db, &transport, &channels, &RunOptions::default()).unwrap();
    assert_eq!(stored_count(&db), 2);

    let outage = FakeTransport {
        responses: vec![
            ("scene_143", 200, empty_payload()),
            ("scene_152", 200, empty_payload()),
        ],
    };
    let report = run::run_update(&config, &db, &outage, &channels, &RunOptions::default())
        .unwrap();
    assert!(report.alerts.is_empty());
    assert_eq!(report.changes.removed.len(), 2);
    assert_eq!(stored_count(&db), 0);
}

#[test]
fn hard_fetch_failure_is_isolated_to_its_source() {
    let db = make_db("fetchfail");
    seed_subscriber(&db);
    let config = test_config();
    let recorder = RecordingChannels::default();
    let channels = Channels {
        email: &recorder,
        sms: &recorder,
        push: &recorder,
    };

    // Preconfirms are blocked, points still work.
    let transport = FakeTransport {
        responses: vec![
            ("scene_143", 403, "forbidden".to_string()),
            ("scene_152", 200, points_payload()),
        ],
    };
    let report = run::run_update(&config, &db, &transport, &channels, &RunOptions::default())
        .unwrap();

    assert_eq!(report.alerts.len(), 1);
    assert!(report.alerts[0].detail.as_deref().unwrap().contains("403"));
    assert_eq!(report.changes.added.len(), 1);
    assert_eq!(report.changes.added[0].source, "dvcrentalstore_points");
    assert_eq!(stored_count(&db), 1);

    // The alert links the site it could not read.
    let alert_body = &recorder.emails.borrow()[0].1;
    assert!(alert_body.contains("https://dvcrentalstore.com/"));
}

#[test]
fn no_notifications_flag_persists_but_stays_silent() {
    let db = make_db("silent");
    seed_subscriber(&db);
    let config = test_config();
    let recorder = RecordingChannels::default();
    let channels = Channels {
        email: &recorder,
        sms: &recorder,
        push: &recorder,
    };
    let transport = FakeTransport {
        responses: vec![
            ("scene_143", 200, preconfirm_payload("2,150")),
            ("scene_152", 200, points_payload()),
        ],
    };

    let options = RunOptions {
        no_notifications: true,
        ..Default::default()
    };
    let report = run::run_update(&config, &db, &transport, &channels, &options).unwrap();
    assert_eq!(report.changes.added.len(), 2);
    assert_eq!(stored_count(&db), 2);
    assert_eq!(recorder.email_count(), 0);
}

#[test]
fn reset_errors_clears_flags_and_system_health() {
    let db = make_db("reset");
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO stored_specials (special_id, source, special_type, error)
             VALUES ('s1', 'dvcrentalstore_points', 'disc_points', 1)",
            [],
        )?;
        db::health::save_system_health(conn, false, chrono::Utc::now().naive_utc())?;
        Ok(())
    })
    .unwrap();

    run::reset_errors(&db).unwrap();

    let (error_count, healthy) = db
        .with_conn(|conn| {
            let errors: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM stored_specials WHERE error = 1",
                    [],
                    |r| r.get(0),
                )
                .unwrap();
            let healthy = db::health::load_system_health(conn)?;
            Ok((errors, healthy))
        })
        .unwrap();
    assert_eq!(error_count, 0);
    assert!(healthy);
}

#[test]
fn error_report_collects_parse_errors_and_down_sources() {
    let db = make_db("report");
    seed_subscriber(&db);
    let config = test_config();
    let recorder = RecordingChannels::default();
    let channels = Channels {
        email: &recorder,
        sms: &recorder,
        push: &recorder,
    };

    // Points record with a bad price; preconfirms blocked outright.
    let broken_points = r#"{"records": [{
        "id": "pt_9",
        "field_203_raw": "P9",
        "field_154_raw": 100,
        "field_193_raw": null,
        "field_336_raw": {"iso_timestamp": "2024-11-30T00:00:00Z"}
    }]}"#;
    let transport = FakeTransport {
        responses: vec![
            ("scene_143", 403, "forbidden".to_string()),
            ("scene_152", 200, broken_points.to_string()),
        ],
    };

    run::run_error_report(&config, &db, &transport, &channels, &RunOptions::default()).unwrap();

    assert_eq!(recorder.email_count(), 1);
    let (subject, body) = recorder.emails.borrow()[0].clone();
    assert!(subject.contains("Error Report"));
    assert!(body.contains("price"));
    assert!(body.contains("dvcrentalstore_preconfirms"));
}
