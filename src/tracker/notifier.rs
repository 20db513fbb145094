use crate::error::TrackerError;
use crate::tracker::util::truncate_with_ellipsis;
use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;

/// Hard message ceiling enforced by Discord.
pub const DISCORD_MAX_CHARS: usize = 2000;
const REQUEST_TIMEOUT_SECS: u64 = 15;
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Delivery of one already-sized message.
pub trait Notifier {
    fn send(&self, content: &str) -> Result<(), TrackerError>;
}

#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    pub url: String,
}

impl DiscordWebhook {
    /// `None` when no webhook is configured.
    pub fn from_url(url: &str) -> Option<Self> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            url: trimmed.to_string(),
        })
    }
}

fn check_size(content: &str) -> Result<(), TrackerError> {
    let len = content.chars().count();
    if len > DISCORD_MAX_CHARS {
        return Err(TrackerError::Delivery(format!(
            "payload blocked locally: length={len} exceeds {DISCORD_MAX_CHARS}"
        )));
    }
    if content.trim().is_empty() {
        return Err(TrackerError::Delivery("payload is empty".to_string()));
    }
    Ok(())
}

impl Notifier for DiscordWebhook {
    fn send(&self, content: &str) -> Result<(), TrackerError> {
        check_size(content)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| TrackerError::Delivery(format!("http client setup: {err}")))?;
        let response = client
            .post(&self.url)
            .json(&json!({ "content": content }))
            .send()
            .map_err(|err| TrackerError::Delivery(format!("webhook request: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TrackerError::Delivery(format!(
                "webhook returned {status}: {}",
                truncate_with_ellipsis(&body, MAX_ERROR_BODY_CHARS)
            )));
        }
        Ok(())
    }
}
