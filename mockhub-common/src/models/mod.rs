// File: mockhub-common/src/models/mod.rs
pub mod topic;
pub mod filter;
pub mod event;
pub mod subscription;
pub mod hub_request;

pub use topic::TopicKind;
pub use filter::{Dimension, Filter, FilterSchema, MatchClause, MatchTerm, Requirement, FILTER_COLUMNS};
pub use event::WebhookEvent;
pub use subscription::{NewSubscription, Subscription, NO_CLIENT_ID};
pub use hub_request::{HubMode, HubSubscriptionRequest};
