use std::sync::Arc;
use chrono::{Duration, Utc};
use tracing::info;

use mockhub_common::models::{HubMode, HubSubscriptionRequest, NewSubscription, Subscription, NO_CLIENT_ID};
use mockhub_common::traits::SubscriptionRepository;

use crate::services::validation::{extract_filter, validate_request};
use crate::utils::hub_step;
use crate::Error;

/// Front door for subscribe/unsubscribe requests: validates them and records the result.
/// The handshake with the subscriber happens later, on the scheduler's verification passes.
pub struct SubscriptionService {
    repo: Arc<dyn SubscriptionRepository>,
    verbose: bool,
}

impl SubscriptionService {
    pub fn new(repo: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repo, verbose: false }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Stores a pending subscription for a valid subscribe request.
    pub async fn add_subscription(
        &self,
        request: &HubSubscriptionRequest,
        client_id: Option<&str>,
    ) -> Result<Subscription, Error> {
        let validated = validate_request(request)?;
        if validated.mode != HubMode::Subscribe {
            return Err(Error::bad_request(format!(
                "hub.mode is '{}', but must be subscribe",
                validated.mode
            )));
        }
        let filter = extract_filter(validated.kind, &validated.topic)?;
        let lease = validated.lease_seconds.unwrap_or_default();

        let new = NewSubscription {
            callback_url: request.callback.clone(),
            secret: request.secret.clone(),
            expires_at: Utc::now() + Duration::seconds(lease),
            created_by_client_id: client_id.unwrap_or(NO_CLIENT_ID).to_string(),
            filter,
        };
        let sub = self.repo.create_subscription(&new).await?;
        info!(
            id = sub.id,
            callback = %sub.callback_url,
            topic = %validated.topic,
            "Subscription pending verification"
        );
        Ok(sub)
    }

    /// Queues the callback's subscription for the unsubscribe handshake.
    pub async fn remove_subscription(&self, callback_url: &str) -> Result<(), Error> {
        if self.repo.queue_for_removal(callback_url).await? {
            info!(callback = %callback_url, "Subscription queued for removal");
            Ok(())
        } else {
            Err(Error::NotFound(format!("No subscription for callback {}", callback_url)))
        }
    }

    /// Dispatches on `hub.mode`. Unsubscribes only pass the generic checks.
    pub async fn handle_request(
        &self,
        request: &HubSubscriptionRequest,
        client_id: Option<&str>,
    ) -> Result<HubMode, Error> {
        let validated = validate_request(request)?;
        hub_step!(self.verbose, mode = %validated.mode, callback = %request.callback, "Hub request accepted for processing");
        match validated.mode {
            HubMode::Subscribe => {
                self.add_subscription(request, client_id).await?;
            }
            HubMode::Unsubscribe => {
                self.remove_subscription(&request.callback).await?;
            }
        }
        Ok(validated.mode)
    }
}
