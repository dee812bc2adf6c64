// File: mockhub-common/src/models/topic.rs

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use url::Url;

/// The event feeds the hub knows how to serve.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    Follows,
    StreamChanged,
    UserChanged,
    ExtensionTransaction,
    ModeratorChange,
    BanChange,
    SubscriptionEvent,
}

/// Kind ↔ canonical base URL (origin + path, no query).
const TOPIC_BASE_URLS: [(TopicKind, &str); 7] = [
    (TopicKind::Follows, "https://api.twitch.tv/helix/users/follows"),
    (TopicKind::StreamChanged, "https://api.twitch.tv/helix/streams"),
    (TopicKind::UserChanged, "https://api.twitch.tv/helix/users"),
    (TopicKind::ExtensionTransaction, "https://api.twitch.tv/helix/extensions/transactions"),
    (TopicKind::ModeratorChange, "https://api.twitch.tv/helix/moderation/moderators/events"),
    (TopicKind::BanChange, "https://api.twitch.tv/helix/moderation/banned/events"),
    (TopicKind::SubscriptionEvent, "https://api.twitch.tv/helix/subscriptions/events"),
];

impl TopicKind {
    pub const ALL: [TopicKind; 7] = [
        TopicKind::Follows,
        TopicKind::StreamChanged,
        TopicKind::UserChanged,
        TopicKind::ExtensionTransaction,
        TopicKind::ModeratorChange,
        TopicKind::BanChange,
        TopicKind::SubscriptionEvent,
    ];

    pub fn base_url(&self) -> &'static str {
        TOPIC_BASE_URLS
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, url)| *url)
            .unwrap_or_default()
    }

    /// Looks up the kind whose base URL equals `origin + path` exactly.
    pub fn from_base_url(base: &str) -> Option<TopicKind> {
        TOPIC_BASE_URLS
            .iter()
            .find(|(_, url)| *url == base)
            .map(|(kind, _)| *kind)
    }

    /// Classifies a full topic URL by its origin and path, ignoring the query.
    pub fn from_topic_url(topic: &Url) -> Option<TopicKind> {
        Self::from_base_url(&topic_base(topic))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::Follows => "follows",
            TopicKind::StreamChanged => "stream_changed",
            TopicKind::UserChanged => "user_changed",
            TopicKind::ExtensionTransaction => "extension_transaction",
            TopicKind::ModeratorChange => "moderator_change",
            TopicKind::BanChange => "ban_change",
            TopicKind::SubscriptionEvent => "subscription_event",
        }
    }
}

/// `origin + path` of a URL, the registry's lookup key.
pub fn topic_base(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TopicKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopicKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown topic kind: {}", s))
    }
}
