// Shared fixtures for the hub integration tests.
#![allow(dead_code)]

use std::time::Duration;
use chrono::Utc;
use tempfile::TempDir;
use wiremock::{Request, Respond, ResponseTemplate};

use mockhub_common::models::event::*;
use mockhub_common::models::WebhookEvent;
use mockhub_core::services::RetryPolicy;
use mockhub_core::test_utils::helpers::setup_test_database;
use mockhub_core::{Error, HubConfig, MockHub};

pub const STREAMS: &str = "https://api.twitch.tv/helix/streams";
pub const FOLLOWS: &str = "https://api.twitch.tv/helix/users/follows";
pub const SUB_EVENTS: &str = "https://api.twitch.tv/helix/subscriptions/events";
pub const MODERATORS: &str = "https://api.twitch.tv/helix/moderation/moderators/events";
pub const BANS: &str = "https://api.twitch.tv/helix/moderation/banned/events";
pub const EXTENSIONS: &str = "https://api.twitch.tv/helix/extensions/transactions";
pub const USERS: &str = "https://api.twitch.tv/helix/users";

/// Config whose timers never fire during a test; passes are run by hand.
pub fn test_config() -> HubConfig {
    HubConfig {
        poll_interval: Duration::from_secs(3600),
        delivery: RetryPolicy {
            backoff_unit: Duration::from_millis(1),
            max_backoff: Duration::from_millis(8),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn start_hub(config: HubConfig) -> Result<(TempDir, MockHub), Error> {
    let (dir, db) = setup_test_database().await?;
    let hub = MockHub::start_with_database(config, db).await?;
    Ok((dir, hub))
}

/// Answers a verification GET the way a well-behaved subscriber does.
pub struct EchoChallenge;

impl Respond for EchoChallenge {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        match request.url.query_pairs().find(|(k, _)| k == "hub.challenge") {
            Some((_, challenge)) => ResponseTemplate::new(200).set_body_string(challenge.into_owned()),
            None => ResponseTemplate::new(400),
        }
    }
}

pub fn query_value(request: &Request, name: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub fn stream_changed(user_id: &str) -> WebhookEvent {
    WebhookEvent::StreamChanged(StreamChangedEvent {
        id: "stream-1".into(),
        user_id: user_id.into(),
        user_name: "streamer".into(),
        game_id: "509658".into(),
        community_ids: vec![],
        stream_type: "live".into(),
        title: "testing".into(),
        viewer_count: 10,
        started_at: Utc::now(),
        language: "en".into(),
        thumbnail_url: "https://example.test/thumb.jpg".into(),
    })
}

pub fn follow(from_id: &str, to_id: &str) -> WebhookEvent {
    WebhookEvent::Follows(FollowEvent {
        from_id: from_id.into(),
        from_name: "follower".into(),
        to_id: to_id.into(),
        to_name: "followed".into(),
        followed_at: Utc::now(),
    })
}

pub fn sub_event(broadcaster_id: &str, user_id: &str, gifter: Option<(&str, &str)>) -> WebhookEvent {
    WebhookEvent::SubscriptionEvent(SubscriptionEvent {
        id: "sub-evt".into(),
        event_type: SubscriptionEventType::Subscribe,
        event_timestamp: Utc::now(),
        version: "1.0".into(),
        event_data: SubscriptionEventData {
            broadcaster_id: broadcaster_id.into(),
            broadcaster_name: "caster".into(),
            is_gift: gifter.is_some(),
            plan_name: "Tier 1".into(),
            tier: "1000".into(),
            user_id: user_id.into(),
            user_name: "subscriber".into(),
            gifter_id: gifter.map(|(id, _)| id.to_string()),
            gifter_name: gifter.map(|(_, name)| name.to_string()),
            message: None,
        },
    })
}

fn moderation_event(event_type: ModeratorEventType, broadcaster_id: &str, user_id: &str) -> ModerationEvent {
    ModerationEvent {
        id: "mod-evt".into(),
        event_type,
        event_timestamp: Utc::now(),
        version: "v1".into(),
        event_data: ModeratorEventData {
            broadcaster_id: broadcaster_id.into(),
            broadcaster_name: "caster".into(),
            user_id: user_id.into(),
            user_name: "someone".into(),
        },
    }
}

pub fn moderator_added(broadcaster_id: &str, user_id: &str) -> WebhookEvent {
    WebhookEvent::ModeratorChange(moderation_event(ModeratorEventType::ModeratorAdd, broadcaster_id, user_id))
}

pub fn user_banned(broadcaster_id: &str, user_id: &str) -> WebhookEvent {
    WebhookEvent::BanChange(moderation_event(ModeratorEventType::BanUser, broadcaster_id, user_id))
}

pub fn extension_transaction(extension_id: &str) -> WebhookEvent {
    WebhookEvent::ExtensionTransaction(ExtensionTransactionEvent {
        id: "tx-1".into(),
        extension_id: extension_id.into(),
        timestamp: Utc::now(),
        broadcaster_id: "100".into(),
        broadcaster_name: "caster".into(),
        user_id: "7".into(),
        user_name: "buyer".into(),
        product_type: "BITS_IN_EXTENSION".into(),
        product_data: ProductData {
            domain: "twitch.ext.ext".into(),
            broadcast: true,
            expiration: String::new(),
            sku: "sku-1".into(),
            cost: CostData { amount: 100, cost_type: "bits".into() },
            display_name: "Boost".into(),
            in_development: false,
        },
    })
}
