// src/services/verification.rs

use std::sync::Arc;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};
use url::Url;

use mockhub_common::models::{HubMode, Subscription};
use mockhub_common::traits::SubscriptionRepository;

use crate::crypto::generate_challenge;
use crate::http::HubHttpClient;
use crate::utils::hub_step;
use crate::Error;

/// What a handshake did to its subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Subscribe confirmed; the subscription now receives events.
    Validated,
    /// Subscribe handshake failed; the subscription was deleted.
    Rejected(String),
    /// Unsubscribe confirmed; the subscription was deleted.
    Unsubscribed,
    /// Unsubscribe handshake failed; the subscription stays active.
    Retained(String),
    /// The row changed under us (deleted or already validated) before the result was recorded.
    Gone,
}

/// Tally of one verification or removal pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub processed: usize,
    /// Validated or unsubscribed.
    pub confirmed: usize,
    /// Rejected or retained.
    pub refused: usize,
    pub gone: usize,
    /// Rows whose result couldn't be recorded.
    pub failed: usize,
}

impl PassReport {
    fn tally(results: Vec<Result<VerificationOutcome, Error>>) -> Self {
        let mut report = PassReport { processed: results.len(), ..Default::default() };
        for result in results {
            match result {
                Ok(VerificationOutcome::Validated) | Ok(VerificationOutcome::Unsubscribed) => report.confirmed += 1,
                Ok(VerificationOutcome::Rejected(_)) | Ok(VerificationOutcome::Retained(_)) => report.refused += 1,
                Ok(VerificationOutcome::Gone) => report.gone += 1,
                Err(e) => {
                    error!("Failed to record verification result: {}", e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// The callback URL with its own query and fragment replaced by the handshake parameters.
pub fn verification_url(
    sub: &Subscription,
    mode: HubMode,
    challenge: &str,
    now: DateTime<Utc>,
) -> Result<Url, Error> {
    let mut url = Url::parse(&sub.callback_url)?;
    url.set_query(None);
    url.set_fragment(None);

    let topic = sub.filter.topic_url()?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("hub.mode", &mode.to_string());
        query.append_pair("hub.topic", topic.as_str());
        query.append_pair("hub.challenge", challenge);
        if mode == HubMode::Subscribe {
            query.append_pair("hub.lease_seconds", &sub.lease_remaining_secs(now).to_string());
        }
    }
    Ok(url)
}

/// Runs the subscribe and unsubscribe handshakes against subscriber callbacks.
pub struct VerificationService {
    repo: Arc<dyn SubscriptionRepository>,
    http: Arc<dyn HubHttpClient>,
    log_errors: bool,
    verbose: bool,
}

impl VerificationService {
    pub fn new(repo: Arc<dyn SubscriptionRepository>, http: Arc<dyn HubHttpClient>, log_errors: bool) -> Self {
        Self { repo, http, log_errors, verbose: false }
    }

    /// Raises the per-handshake step logs to `info`.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sends the challenge and checks the echo. No store access happens here.
    async fn challenge(&self, sub: &Subscription, mode: HubMode) -> Result<(), Error> {
        let failed = |reason: String| Error::VerificationFailed {
            callback: sub.callback_url.clone(),
            reason,
        };

        let token = generate_challenge();
        let url = verification_url(sub, mode, &token, Utc::now()).map_err(|e| failed(e.to_string()))?;
        hub_step!(self.verbose, id = sub.id, mode = %mode, "GET {}", url);

        match self.http.get(url.to_string()).await {
            Ok(response) if response.is_success() && response.body.as_ref() == token.as_bytes() => Ok(()),
            Ok(response) => Err(failed(format!(
                "response code ({}) or challenge mismatch",
                response.status
            ))),
            Err(e) => {
                if self.log_errors {
                    error!(id = sub.id, callback = %sub.callback_url, "Verification request failed: {}", e);
                } else {
                    debug!(id = sub.id, callback = %sub.callback_url, "Verification request failed: {}", e);
                }
                Err(failed(e.to_string()))
            }
        }
    }

    /// Subscribe handshake for one pending subscription.
    pub async fn verify_subscription(&self, sub: &Subscription) -> Result<VerificationOutcome, Error> {
        match self.challenge(sub, HubMode::Subscribe).await {
            Ok(()) => {
                if self.repo.mark_validated(sub.id).await? {
                    info!(id = sub.id, callback = %sub.callback_url, "Subscription validated");
                    Ok(VerificationOutcome::Validated)
                } else {
                    Ok(VerificationOutcome::Gone)
                }
            }
            Err(e) => {
                hub_step!(self.verbose, id = sub.id, "{}; deleting subscription", e);
                if self.repo.delete_subscription(sub.id).await? {
                    Ok(VerificationOutcome::Rejected(e.to_string()))
                } else {
                    Ok(VerificationOutcome::Gone)
                }
            }
        }
    }

    /// Unsubscribe handshake for one subscription queued for removal.
    pub async fn confirm_removal(&self, sub: &Subscription) -> Result<VerificationOutcome, Error> {
        match self.challenge(sub, HubMode::Unsubscribe).await {
            Ok(()) => {
                if self.repo.delete_subscription(sub.id).await? {
                    info!(id = sub.id, callback = %sub.callback_url, "Subscription removed");
                    Ok(VerificationOutcome::Unsubscribed)
                } else {
                    Ok(VerificationOutcome::Gone)
                }
            }
            Err(e) => {
                hub_step!(self.verbose, id = sub.id, "{}; ignoring delete request", e);
                if self.repo.revert_removal(sub.id).await? {
                    Ok(VerificationOutcome::Retained(e.to_string()))
                } else {
                    Ok(VerificationOutcome::Gone)
                }
            }
        }
    }

    /// Handshakes every pending subscription concurrently.
    pub async fn verify_pending(&self) -> Result<PassReport, Error> {
        let pending = self.repo.list_pending().await?;
        if pending.is_empty() {
            return Ok(PassReport::default());
        }
        hub_step!(self.verbose, "Verifying {} pending subscription(s)", pending.len());

        let results = join_all(pending.iter().map(|sub| self.verify_subscription(sub))).await;
        let report = PassReport::tally(results);
        if report.failed > 0 {
            warn!("Verification pass left {} subscription(s) unrecorded", report.failed);
        }
        Ok(report)
    }

    /// Unsubscribe handshakes for every queued removal, concurrently.
    pub async fn process_removals(&self) -> Result<PassReport, Error> {
        let queued = self.repo.list_queued_for_removal().await?;
        if queued.is_empty() {
            return Ok(PassReport::default());
        }
        hub_step!(self.verbose, "Processing {} queued removal(s)", queued.len());

        let results = join_all(queued.iter().map(|sub| self.confirm_removal(sub))).await;
        Ok(PassReport::tally(results))
    }
}
