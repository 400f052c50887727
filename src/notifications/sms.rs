// src/notifications/sms.rs

use crate::config::Config;
use crate::notifications::{ChannelResponse, SmsChannel};
use reqwest::blocking::Client;
use std::time::Duration;

/// Twilio SMS, one message-create call per number. Partial failures report
/// the numbers that failed but never raise.
pub struct TwilioChannel {
    client: Client,
    sid: Option<String>,
    token: Option<String>,
    msg_service: Option<String>,
    env_label: Option<String>,
}

impl TwilioChannel {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            sid: config.twilio_sid.clone(),
            token: config.twilio_token.clone(),
            msg_service: config.twilio_msg_service.clone(),
            env_label: config.env_label.clone(),
        }
    }

    pub fn default_client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default()
    }
}

impl SmsChannel for TwilioChannel {
    fn send_sms(&self, body: &str, numbers: &[String]) -> ChannelResponse {
        let (Some(sid), Some(token), Some(msg_service)) =
            (&self.sid, &self.token, &self.msg_service)
        else {
            return ChannelResponse::skipped("No Twilio SID, not sending txt.");
        };
        if numbers.is_empty() {
            return ChannelResponse::skipped("No phone numbers, not sending txt.");
        }

        let body = match &self.env_label {
            Some(label) => format!("- \n\n({label}) {body}"),
            None => format!("- \n\n{body}"),
        };
        let url = format!("https://api.twilio.com/2010-04-01/Accounts/{sid}/Messages.json");

        let mut failed: Vec<String> = Vec::new();
        for number in numbers {
            let resp = self
                .client
                .post(&url)
                .basic_auth(sid, Some(token))
                .form(&[
                    ("MessagingServiceSid", msg_service.as_str()),
                    ("To", number.as_str()),
                    ("Body", body.as_str()),
                ])
                .send();
            match resp {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => failed.push(format!("{number}: {}", resp.status())),
                Err(e) => failed.push(format!("{number}: {e}")),
            }
        }

        if failed.is_empty() {
            ChannelResponse::success()
        } else {
            ChannelResponse::failure(failed.join(", "))
        }
    }
}
