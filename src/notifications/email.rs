// src/notifications/email.rs

use crate::config::Config;
use crate::notifications::{ChannelResponse, EmailChannel};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

/// Mailgun messages API. The queued message id comes back in the response
/// body and doubles as the correlation id for the other channels.
pub struct MailgunChannel {
    client: Client,
    api_key: Option<String>,
    domain: Option<String>,
    env_label: Option<String>,
}

#[derive(Deserialize)]
struct MailgunResponse {
    id: Option<String>,
}

impl MailgunChannel {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            api_key: config.mailgun_api_key.clone(),
            domain: config.mailgun_domain.clone(),
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

impl EmailChannel for MailgunChannel {
    fn send_email(
        &self,
        subject: &str,
        body: &str,
        addresses: &[String],
        html: bool,
    ) -> ChannelResponse {
        let (Some(api_key), Some(domain)) = (&self.api_key, &self.domain) else {
            return ChannelResponse::skipped("No Mailgun API key, not sending email.");
        };
        if addresses.is_empty() {
            return ChannelResponse::skipped("No email addresses, not sending email.");
        }

        let subject = match &self.env_label {
            Some(label) => format!("({label}) {subject}"),
            None => subject.to_string(),
        };
        let body_field = if html { "html" } else { "text" };

        let mut form: Vec<(&str, String)> = vec![
            ("from", format!("SpecialsTracker <mailgun@{domain}>")),
            ("subject", subject),
            (body_field, body.to_string()),
        ];
        for address in addresses {
            form.push(("to", address.clone()));
        }

        let resp = self
            .client
            .post(format!("https://api.mailgun.net/v3/{domain}/messages"))
            .basic_auth("api", Some(api_key))
            .form(&form)
            .send();

        match resp {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<MailgunResponse>() {
                    Ok(MailgunResponse { id: Some(id) }) => ChannelResponse::success_with_data(id),
                    _ => ChannelResponse::success(),
                }
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().unwrap_or_else(|_| "<no body>".to_string());
                ChannelResponse::failure(format!("{status} {body}"))
            }
            Err(e) => ChannelResponse::failure(e.to_string()),
        }
    }
}
