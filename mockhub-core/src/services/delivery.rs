// src/services/delivery.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use serde_json::json;
use tracing::{debug, trace};

use mockhub_common::models::{Subscription, WebhookEvent};

use crate::crypto::{signature_header_value, SIGNATURE_HEADER};
use crate::http::HubHttpClient;
use crate::Error;

/// Statuses worth another attempt. Anything else outside 2xx fails the delivery at once.
pub const RETRYABLE_STATUSES: [u16; 10] = [408, 413, 429, 500, 502, 503, 504, 521, 522, 524];

/// Retry and transport limits for event deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff_unit * 2^n`, capped at `max_backoff`.
    pub backoff_unit: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
    pub max_redirects: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_unit: Duration::from_secs(1),
            max_backoff: Duration::from_secs(32),
            request_timeout: Duration::from_secs(10),
            max_redirects: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay before the `retry`-th retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_backoff)
    }
}

/// The delivered body: `{"data":[<event data>]}`.
pub fn envelope(event: &WebhookEvent) -> Result<String, Error> {
    Ok(serde_json::to_string(&json!({ "data": [event.data()?] }))?)
}

/// Signs and posts event bodies to one subscriber at a time, retrying per [`RetryPolicy`].
pub struct DeliveryService {
    http: Arc<dyn HubHttpClient>,
    policy: RetryPolicy,
}

impl DeliveryService {
    pub fn new(http: Arc<dyn HubHttpClient>, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Delivers `body` to the subscription's callback. Returns how many attempts it took.
    pub async fn deliver(&self, sub: &Subscription, body: &str) -> Result<u32, Error> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert(
            SIGNATURE_HEADER.to_string(),
            signature_header_value(&sub.secret, body.as_bytes())?,
        );

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            trace!(id = sub.id, attempt, "POST {}", sub.callback_url);

            let (retryable, reason) = match self
                .http
                .post(sub.callback_url.clone(), body.to_string(), headers.clone())
                .await
            {
                Ok(response) if response.is_success() => return Ok(attempt),
                Ok(response) => (
                    RETRYABLE_STATUSES.contains(&response.status),
                    format!("HTTP {}", response.status),
                ),
                Err(e) => (true, e.to_string()),
            };

            if !retryable || attempt > self.policy.max_retries {
                return Err(Error::DeliveryFailed {
                    callback: sub.callback_url.clone(),
                    attempts: attempt,
                    reason,
                });
            }

            let delay = self.policy.delay_for(attempt);
            debug!(id = sub.id, attempt, "Delivery failed ({}), retrying in {:?}", reason, delay);
            tokio::time::sleep(delay).await;
        }
    }
}
