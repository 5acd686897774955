use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::NotificationSink;
use crate::models::BookingEvent;

pub const SIGNATURE_HEADER: &str = "X-Slotbook-Signature";
pub const EVENT_HEADER: &str = "X-Slotbook-Event";

/// POSTs each event as JSON to a configured endpoint.
pub struct WebhookSink {
    url: String,
    secret: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String, secret: String) -> Self {
        Self {
            url,
            secret,
            client: reqwest::Client::new(),
        }
    }
}

/// Base64 HMAC-SHA1 of `body` keyed with `secret`.
pub fn sign(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid webhook secret: {e}"))?;
    mac.update(body);
    let result = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(result))
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn publish(&self, event: &BookingEvent) -> anyhow::Result<()> {
        let body = serde_json::to_vec(event).context("failed to encode booking event")?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, event.kind.as_str());
        // Unsigned when no secret is configured (local development).
        if !self.secret.is_empty() {
            request = request.header(SIGNATURE_HEADER, sign(&self.secret, &body)?);
        }

        request
            .body(body)
            .send()
            .await
            .context("failed to deliver booking webhook")?
            .error_for_status()
            .context("booking webhook endpoint returned error")?;

        tracing::debug!(url = %self.url, booking = %event.booking_id, "webhook delivered");
        Ok(())
    }
}
