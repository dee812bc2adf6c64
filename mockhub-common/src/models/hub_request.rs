// File: mockhub-common/src/models/hub_request.rs

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubMode {
    Subscribe,
    Unsubscribe,
}

impl fmt::Display for HubMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubMode::Subscribe => write!(f, "subscribe"),
            HubMode::Unsubscribe => write!(f, "unsubscribe"),
        }
    }
}

impl FromStr for HubMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribe" => Ok(HubMode::Subscribe),
            "unsubscribe" => Ok(HubMode::Unsubscribe),
            _ => Err(format!("hub.mode is '{}', but must be subscribe or unsubscribe", s)),
        }
    }
}

/// An inbound subscribe/unsubscribe request, as the caller sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubSubscriptionRequest {
    #[serde(rename = "hub.callback")]
    pub callback: String,
    #[serde(rename = "hub.mode")]
    pub mode: String,
    #[serde(rename = "hub.topic")]
    pub topic: String,
    /// Required for subscribe.
    #[serde(rename = "hub.lease_seconds", default, skip_serializing_if = "Option::is_none")]
    pub lease_seconds: Option<i64>,
    #[serde(rename = "hub.secret")]
    pub secret: String,
}

impl HubSubscriptionRequest {
    pub fn subscribe(callback: &str, topic: &str, lease_seconds: i64, secret: &str) -> Self {
        Self {
            callback: callback.to_string(),
            mode: HubMode::Subscribe.to_string(),
            topic: topic.to_string(),
            lease_seconds: Some(lease_seconds),
            secret: secret.to_string(),
        }
    }

    pub fn unsubscribe(callback: &str, topic: &str, secret: &str) -> Self {
        Self {
            callback: callback.to_string(),
            mode: HubMode::Unsubscribe.to_string(),
            topic: topic.to_string(),
            lease_seconds: None,
            secret: secret.to_string(),
        }
    }
}
