// src/notifications/mod.rs

pub mod dispatch;
pub mod email;
pub mod push;
pub mod render;
pub mod sms;

/// Uniform result for every channel call. Failures are values, never
/// panics/errors: one bad channel must not take down the others.
#[derive(Debug, Clone)]
pub struct ChannelResponse {
    pub success: bool,
    pub msg: Option<String>,
    /// Channel-specific payload; the email channel returns the provider's
    /// message id here, used as the correlation id for push notifications.
    pub data: Option<String>,
}

impl ChannelResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            msg: None,
            data: None,
        }
    }

    pub fn success_with_data(data: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: None,
            data: Some(data.into()),
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: Some(msg.into()),
            data: None,
        }
    }

    /// Channel not configured; logged and treated as a non-event.
    pub fn skipped(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: Some(msg.into()),
            data: None,
        }
    }
}

pub trait EmailChannel {
    /// `html` selects the body content type; operator notices go out as
    /// plain text.
    fn send_email(
        &self,
        subject: &str,
        body: &str,
        addresses: &[String],
        html: bool,
    ) -> ChannelResponse;
}

pub trait SmsChannel {
    fn send_sms(&self, body: &str, numbers: &[String]) -> ChannelResponse;
}

pub trait PushChannel {
    fn send_push(
        &self,
        body: &str,
        tokens: &[String],
        correlation_id: Option<&str>,
    ) -> ChannelResponse;
}

/// Logs a channel response the way every call site wants it logged.
pub fn log_response(service: &str, success_msg: &str, response: &ChannelResponse) {
    if response.success {
        match &response.msg {
            Some(msg) => println!("{service}: {msg}"),
            None => println!("{service}: {success_msg}"),
        }
    } else {
        let msg = response
            .msg
            .as_deref()
            .unwrap_or("There was a problem with the notification.");
        eprintln!("{service}: {msg}");
    }
}
