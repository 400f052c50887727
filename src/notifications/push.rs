// src/notifications/push.rs

use crate::config::Config;
use crate::notifications::{ChannelResponse, PushChannel};
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;

/// Push notifications via a relay webhook: one JSON post carrying the device
/// tokens, the message text, and the correlation id of the email the push
/// points at.
pub struct WebhookPushChannel {
    client: Client,
    url: Option<String>,
    env_label: Option<String>,
}

#[derive(Serialize)]
struct PushPayload<'a> {
    tokens: &'a [String],
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<&'a str>,
}

impl WebhookPushChannel {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            url: config.push_webhook_url.clone(),
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

impl PushChannel for WebhookPushChannel {
    fn send_push(
        &self,
        body: &str,
        tokens: &[String],
        correlation_id: Option<&str>,
    ) -> ChannelResponse {
        let Some(url) = &self.url else {
            return ChannelResponse::skipped("No push webhook URL, not sending push notification.");
        };
        if tokens.is_empty() {
            return ChannelResponse::skipped("No push tokens, not sending push notification.");
        }

        let text = match &self.env_label {
            Some(label) => format!("({label}) {body}"),
            None => body.to_string(),
        };
        let payload = PushPayload {
            tokens,
            text,
            correlation_id,
        };

        let resp = self.client.post(url).json(&payload).send();
        match resp {
            Ok(resp) if resp.status().is_success() => ChannelResponse::success(),
            Ok(resp) => ChannelResponse::failure(format!("{}", resp.status())),
            Err(e) => ChannelResponse::failure(e.to_string()),
        }
    }
}
