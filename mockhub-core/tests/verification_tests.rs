// File: mockhub-core/tests/verification_tests.rs

mod common;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use mockhub_common::models::HubSubscriptionRequest;
use mockhub_core::{Error, ShutdownOptions};

use common::*;

/// Echoes the challenge behind a UTF-8 byte order mark.
struct EchoWithBom;

impl Respond for EchoWithBom {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut body = vec![0xEF, 0xBB, 0xBF];
        body.extend_from_slice(query_value(request, "hub.challenge").unwrap_or_default().as_bytes());
        ResponseTemplate::new(200).set_body_raw(body, "text/plain; charset=utf-8")
    }
}

#[tokio::test]
async fn test_echoed_challenge_validates_subscription() -> Result<(), Error> {
    let (_dir, hub) = start_hub(test_config()).await?;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cb"))
        .respond_with(EchoChallenge)
        .expect(1)
        .mount(&server)
        .await;

    let callback = format!("{}/cb?tag=keep-out#frag", server.uri());
    let topic = format!("{}?user_id=5", STREAMS);
    let sub = hub
        .add_subscription(&HubSubscriptionRequest::subscribe(&callback, &topic, 600, "s"), None)
        .await?;
    assert!(!sub.validated);

    let report = hub.run_verification_pass().await?;
    assert_eq!(report.processed, 1);
    assert_eq!(report.confirmed, 1);
    assert!(hub.repository().get_subscription(sub.id).await?.expect("kept").validated);

    let requests = server.received_requests().await.expect("recording enabled");
    let request = &requests[0];
    assert_eq!(query_value(request, "hub.mode").as_deref(), Some("subscribe"));
    assert_eq!(query_value(request, "hub.topic").as_deref(), Some(topic.as_str()));
    assert_eq!(query_value(request, "hub.challenge").map(|c| c.len()), Some(200));
    assert!(query_value(request, "tag").is_none());
    let lease: i64 = query_value(request, "hub.lease_seconds")
        .expect("lease sent")
        .parse()
        .expect("whole seconds");
    assert!((590..=600).contains(&lease), "lease {}", lease);

    // a validated subscription is not verified again
    assert_eq!(hub.run_verification_pass().await?.processed, 0);

    hub.shutdown(ShutdownOptions::default()).await;
    Ok(())
}

#[tokio::test]
async fn test_failed_challenge_deletes_subscription() -> Result<(), Error> {
    let (_dir, hub) = start_hub(test_config()).await?;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wrong"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not the challenge"))
        .mount(&server)
        .await;

    let topic = format!("{}?user_id=5", STREAMS);
    let missing = hub
        .add_subscription(
            &HubSubscriptionRequest::subscribe(&format!("{}/missing", server.uri()), &topic, 600, "s"),
            None,
        )
        .await?;
    let wrong = hub
        .add_subscription(
            &HubSubscriptionRequest::subscribe(&format!("{}/wrong", server.uri()), &topic, 600, "s"),
            None,
        )
        .await?;
    // nothing listens here
    let unreachable = hub
        .add_subscription(
            &HubSubscriptionRequest::subscribe("http://127.0.0.1:9/unreachable", &topic, 600, "s"),
            None,
        )
        .await?;

    let report = hub.run_verification_pass().await?;
    assert_eq!(report.processed, 3);
    assert_eq!(report.refused, 3);

    let repo = hub.repository();
    for id in [missing.id, wrong.id, unreachable.id] {
        assert!(repo.get_subscription(id).await?.is_none(), "subscription {} should be gone", id);
    }
    hub.shutdown(ShutdownOptions::default()).await;
    Ok(())
}

#[tokio::test]
async fn test_unsubscribe_handshake() -> Result<(), Error> {
    let (_dir, hub) = start_hub(test_config()).await?;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("hub.mode", "subscribe"))
        .respond_with(EchoChallenge)
        .mount(&server)
        .await;
    // /stays refuses to unsubscribe, /goes confirms
    Mock::given(method("GET"))
        .and(path("/stays"))
        .and(query_param("hub.mode", "unsubscribe"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/goes"))
        .and(query_param("hub.mode", "unsubscribe"))
        .respond_with(EchoChallenge)
        .mount(&server)
        .await;

    let topic = format!("{}?user_id=5", STREAMS);
    let stays_url = format!("{}/stays", server.uri());
    let goes_url = format!("{}/goes", server.uri());
    let stays = hub
        .add_subscription(&HubSubscriptionRequest::subscribe(&stays_url, &topic, 600, "s"), None)
        .await?;
    let goes = hub
        .add_subscription(&HubSubscriptionRequest::subscribe(&goes_url, &topic, 600, "s"), None)
        .await?;
    assert_eq!(hub.run_verification_pass().await?.confirmed, 2);

    hub.remove_subscription(&stays_url).await?;
    hub.remove_subscription(&goes_url).await?;

    let report = hub.run_removal_pass().await?;
    assert_eq!(report.processed, 2);
    assert_eq!(report.confirmed, 1);
    assert_eq!(report.refused, 1);

    let repo = hub.repository();
    let kept = repo.get_subscription(stays.id).await?.expect("refused unsubscribe keeps the row");
    assert!(!kept.queued_for_removal);
    assert!(kept.validated);
    assert!(repo.get_subscription(goes.id).await?.is_none());

    // the unsubscribe GET carries no lease
    let requests = server.received_requests().await.expect("recording enabled");
    let unsubscribe_gets: Vec<_> = requests
        .iter()
        .filter(|r| query_value(r, "hub.mode").as_deref() == Some("unsubscribe"))
        .collect();
    assert_eq!(unsubscribe_gets.len(), 2);
    assert!(unsubscribe_gets.iter().all(|r| query_value(r, "hub.lease_seconds").is_none()));

    hub.shutdown(ShutdownOptions::default()).await;
    Ok(())
}

#[tokio::test]
async fn test_echo_with_byte_order_mark_is_rejected() -> Result<(), Error> {
    let (_dir, hub) = start_hub(test_config()).await?;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bom"))
        .respond_with(EchoWithBom)
        .expect(1)
        .mount(&server)
        .await;

    let topic = format!("{}?user_id=5", STREAMS);
    let sub = hub
        .add_subscription(
            &HubSubscriptionRequest::subscribe(&format!("{}/bom", server.uri()), &topic, 600, "s"),
            None,
        )
        .await?;

    let report = hub.run_verification_pass().await?;
    assert_eq!(report.processed, 1);
    assert_eq!(report.refused, 1);
    assert!(hub.repository().get_subscription(sub.id).await?.is_none());

    hub.shutdown(ShutdownOptions::default()).await;
    Ok(())
}
