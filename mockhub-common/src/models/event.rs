// File: mockhub-common/src/models/event.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::models::topic::TopicKind;

/// "users/follows" event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowEvent {
    pub from_id: String,
    pub from_name: String,
    pub to_id: String,
    pub to_name: String,
    pub followed_at: DateTime<Utc>,
}

/// "streams" event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChangedEvent {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub game_id: String,
    #[serde(default)]
    pub community_ids: Vec<String>,
    #[serde(rename = "type")]
    pub stream_type: String,
    pub title: String,
    pub viewer_count: u64,
    pub started_at: DateTime<Utc>,
    pub language: String,
    pub thumbnail_url: String,
}

/// "users" event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserChangedEvent {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub broadcaster_type: String,
    pub description: String,
    pub profile_image_url: String,
    pub offline_image_url: String,
    pub view_count: u64,
}

/// "extensions/transactions" event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionTransactionEvent {
    pub id: String,
    pub extension_id: String,
    pub timestamp: DateTime<Utc>,
    pub broadcaster_id: String,
    pub broadcaster_name: String,
    pub user_id: String,
    pub user_name: String,
    /// Always `BITS_IN_EXTENSION` upstream.
    pub product_type: String,
    pub product_data: ProductData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductData {
    pub domain: String,
    pub broadcast: bool,
    /// Empty for purchasable products.
    pub expiration: String,
    pub sku: String,
    pub cost: CostData,
    pub display_name: String,
    pub in_development: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostData {
    pub amount: u64,
    #[serde(rename = "type")]
    pub cost_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeratorEventType {
    #[serde(rename = "moderation.moderator.add")]
    ModeratorAdd,
    #[serde(rename = "moderation.moderator.remove")]
    ModeratorRemove,
    #[serde(rename = "moderation.user.ban")]
    BanUser,
    #[serde(rename = "moderation.user.unban")]
    UnbanUser,
}

/// Shared envelope of the moderator and ban feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationEvent {
    /// Unique event id.
    pub id: String,
    pub event_type: ModeratorEventType,
    pub event_timestamp: DateTime<Utc>,
    pub version: String,
    pub event_data: ModeratorEventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeratorEventData {
    pub broadcaster_id: String,
    pub broadcaster_name: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionEventType {
    #[serde(rename = "subscriptions.subscribe")]
    Subscribe,
    #[serde(rename = "subscriptions.notification")]
    Notification,
    #[serde(rename = "subscriptions.unsubscribe")]
    Unsubscribe,
}

/// "subscriptions/events" event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub id: String,
    pub event_type: SubscriptionEventType,
    pub event_timestamp: DateTime<Utc>,
    pub version: String,
    pub event_data: SubscriptionEventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEventData {
    pub broadcaster_id: String,
    pub broadcaster_name: String,
    pub is_gift: bool,
    pub plan_name: String,
    pub tier: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gifter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gifter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An event handed to the hub for fan-out. The payload shape is fixed by the kind tag.
///
/// Wire form: `{"type": "stream_changed", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WebhookEvent {
    Follows(FollowEvent),
    StreamChanged(StreamChangedEvent),
    UserChanged(UserChangedEvent),
    ExtensionTransaction(ExtensionTransactionEvent),
    ModeratorChange(ModerationEvent),
    BanChange(ModerationEvent),
    SubscriptionEvent(SubscriptionEvent),
}

impl WebhookEvent {
    pub fn kind(&self) -> TopicKind {
        match self {
            WebhookEvent::Follows(_) => TopicKind::Follows,
            WebhookEvent::StreamChanged(_) => TopicKind::StreamChanged,
            WebhookEvent::UserChanged(_) => TopicKind::UserChanged,
            WebhookEvent::ExtensionTransaction(_) => TopicKind::ExtensionTransaction,
            WebhookEvent::ModeratorChange(_) => TopicKind::ModeratorChange,
            WebhookEvent::BanChange(_) => TopicKind::BanChange,
            WebhookEvent::SubscriptionEvent(_) => TopicKind::SubscriptionEvent,
        }
    }

    /// The event's value for a filter dimension, addressed by the dimension's column name.
    /// `None` means the event carries no value for it (e.g. no gifter on a non-gift sub).
    pub fn attribute(&self, column: &str) -> Option<&str> {
        match (self, column) {
            (WebhookEvent::Follows(e), "from_id") => Some(e.from_id.as_str()),
            (WebhookEvent::Follows(e), "to_id") => Some(e.to_id.as_str()),
            (WebhookEvent::StreamChanged(e), "user_id") => Some(e.user_id.as_str()),
            (WebhookEvent::UserChanged(e), "user_id") => Some(e.id.as_str()),
            (WebhookEvent::ExtensionTransaction(e), "extension_id") => Some(e.extension_id.as_str()),
            (WebhookEvent::ModeratorChange(e) | WebhookEvent::BanChange(e), "broadcaster_id") => {
                Some(e.event_data.broadcaster_id.as_str())
            }
            (WebhookEvent::ModeratorChange(e) | WebhookEvent::BanChange(e), "user_id") => {
                Some(e.event_data.user_id.as_str())
            }
            (WebhookEvent::SubscriptionEvent(e), "broadcaster_id") => Some(e.event_data.broadcaster_id.as_str()),
            (WebhookEvent::SubscriptionEvent(e), "user_id") => Some(e.event_data.user_id.as_str()),
            (WebhookEvent::SubscriptionEvent(e), "gifter_id") => e.event_data.gifter_id.as_deref(),
            (WebhookEvent::SubscriptionEvent(e), "gifter_name") => e.event_data.gifter_name.as_deref(),
            _ => None,
        }
    }

    /// The bare payload, without the kind tag.
    pub fn data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            WebhookEvent::Follows(e) => serde_json::to_value(e),
            WebhookEvent::StreamChanged(e) => serde_json::to_value(e),
            WebhookEvent::UserChanged(e) => serde_json::to_value(e),
            WebhookEvent::ExtensionTransaction(e) => serde_json::to_value(e),
            WebhookEvent::ModeratorChange(e) | WebhookEvent::BanChange(e) => serde_json::to_value(e),
            WebhookEvent::SubscriptionEvent(e) => serde_json::to_value(e),
        }
    }
}
