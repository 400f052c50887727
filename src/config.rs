// src/config.rs

use std::collections::HashSet;
use std::env;

/// Runtime configuration, read once from the environment at startup.
/// Channel credentials are optional; a channel with no credentials logs and
/// skips instead of failing the run.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub schema_path: String,
    /// Label prepended to outgoing subjects/bodies, e.g. "beta".
    pub env_label: Option<String>,
    pub mailgun_api_key: Option<String>,
    pub mailgun_domain: Option<String>,
    pub twilio_sid: Option<String>,
    pub twilio_token: Option<String>,
    pub twilio_msg_service: Option<String>,
    pub push_webhook_url: Option<String>,
    pub fetch_max_attempts: u32,
    /// Sources for which an empty snapshot is normal rather than an outage.
    pub empty_tolerable_sources: HashSet<String>,
    pub preconfirm_rows_per_page: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "specials.sqlite3".to_string()),
            schema_path: env::var("SCHEMA_PATH").unwrap_or_else(|_| "sql/schema.sql".to_string()),
            env_label: env::var("ENV_LABEL").ok().filter(|s| !s.is_empty()),
            mailgun_api_key: env::var("MAILGUN_API_KEY").ok(),
            mailgun_domain: env::var("MAILGUN_DOMAIN_NAME").ok(),
            twilio_sid: env::var("TWILIO_SID").ok(),
            twilio_token: env::var("TWILIO_TOKEN").ok(),
            twilio_msg_service: env::var("TWILIO_MSG_SRVC").ok(),
            push_webhook_url: env::var("PUSH_WEBHOOK_URL").ok(),
            fetch_max_attempts: env::var("FETCH_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            empty_tolerable_sources: env::var("EMPTY_TOLERABLE_SOURCES")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            preconfirm_rows_per_page: env::var("DVCRENTALSTORE_PRECONFIRM_RPP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
        }
    }

    pub fn empty_tolerable(&self, source: &str) -> bool {
        self.empty_tolerable_sources.contains(source)
    }
}
