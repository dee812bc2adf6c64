// File: mockhub-common/src/models/subscription.rs

use chrono::{DateTime, Utc};
use crate::models::filter::Filter;
use crate::models::topic::TopicKind;

/// Recorded as the creator when the request carries no `Client-ID` header.
pub const NO_CLIENT_ID: &str = "no-id";

/// One accepted `hub.callback` + topic pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub callback_url: String,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    pub created_by_client_id: String,
    pub validated: bool,
    pub queued_for_removal: bool,
    pub created_at: DateTime<Utc>,
    pub filter: Filter,
}

impl Subscription {
    pub fn topic_kind(&self) -> TopicKind {
        self.filter.kind()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whole seconds left on the lease, never negative.
    pub fn lease_remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// A validated subscribe request, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub callback_url: String,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    pub created_by_client_id: String,
    pub filter: Filter,
}
