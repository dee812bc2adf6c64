use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::error::Error;
use crate::models::{NewSubscription, Subscription, WebhookEvent};

/// Transactional CRUD over subscription rows and their 1:1 filter rows.
///
/// Every mutation is its own store transaction, committed before it returns. Callers doing
/// network I/O read first, talk to the subscriber, then call one of the mutations; no lock is
/// held across the network call.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Inserts the subscription and its filter atomically.
    async fn create_subscription(&self, new: &NewSubscription) -> Result<Subscription, Error>;

    async fn get_subscription(&self, id: i64) -> Result<Option<Subscription>, Error>;

    async fn get_by_callback(&self, callback_url: &str) -> Result<Option<Subscription>, Error>;

    /// Marks the callback's subscription for removal. Returns false if there is none.
    async fn queue_for_removal(&self, callback_url: &str) -> Result<bool, Error>;

    /// Subscriptions still waiting for their subscribe handshake.
    async fn list_pending(&self) -> Result<Vec<Subscription>, Error>;

    /// Subscriptions waiting for their unsubscribe handshake.
    async fn list_queued_for_removal(&self) -> Result<Vec<Subscription>, Error>;

    /// Validated, unexpired subscriptions whose filter matches `event`.
    async fn find_matching(&self, event: &WebhookEvent, now: DateTime<Utc>) -> Result<Vec<Subscription>, Error>;

    /// Sets `validated`; false if the row is gone or was already validated.
    async fn mark_validated(&self, id: i64) -> Result<bool, Error>;

    /// Clears `queued_for_removal`; false if the row is gone.
    async fn revert_removal(&self, id: i64) -> Result<bool, Error>;

    /// Deletes the subscription and its filter; false if the row was already gone.
    async fn delete_subscription(&self, id: i64) -> Result<bool, Error>;

    /// Deletes every subscription whose lease ended at or before `now`. Returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;

    async fn count(&self) -> Result<i64, Error>;

    /// Removes every subscription and filter row.
    async fn clear(&self) -> Result<(), Error>;
}
