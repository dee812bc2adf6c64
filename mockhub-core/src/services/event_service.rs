use std::sync::Arc;
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, error, info};

use mockhub_common::models::WebhookEvent;
use mockhub_common::traits::SubscriptionRepository;

use crate::services::delivery::{envelope, DeliveryService};
use crate::utils::hub_step;
use crate::Error;

/// Outcome of one event fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Fans an event out to every matching subscriber. Deliveries run concurrently and a failed
/// one is logged and dropped without touching the others.
pub struct EventService {
    repo: Arc<dyn SubscriptionRepository>,
    delivery: DeliveryService,
    log_errors: bool,
    verbose: bool,
}

impl EventService {
    pub fn new(repo: Arc<dyn SubscriptionRepository>, delivery: DeliveryService, log_errors: bool) -> Self {
        Self { repo, delivery, log_errors, verbose: false }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub async fn emit_event(&self, event: &WebhookEvent) -> Result<DeliveryReport, Error> {
        let subscribers = self.repo.find_matching(event, Utc::now()).await?;
        if subscribers.is_empty() {
            hub_step!(self.verbose, "No subscribers for {} event", event.kind());
            return Ok(DeliveryReport::default());
        }

        let body = envelope(event)?;
        let results = join_all(
            subscribers
                .iter()
                .map(|sub| self.delivery.deliver(sub, &body)),
        )
            .await;

        let mut report = DeliveryReport { matched: subscribers.len(), ..Default::default() };
        for (sub, result) in subscribers.iter().zip(results) {
            match result {
                Ok(attempts) => {
                    hub_step!(self.verbose, id = sub.id, attempts, "Delivered {} event", event.kind());
                    report.delivered += 1;
                }
                Err(e) => {
                    if self.log_errors {
                        error!(id = sub.id, "{}", e);
                    } else {
                        debug!(id = sub.id, "{}", e);
                    }
                    report.failed += 1;
                }
            }
        }

        info!(
            "{} event delivered to {}/{} subscriber(s)",
            event.kind(),
            report.delivered,
            report.matched
        );
        Ok(report)
    }
}
