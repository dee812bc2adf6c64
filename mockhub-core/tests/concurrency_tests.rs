// File: mockhub-core/tests/concurrency_tests.rs

mod common;

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use futures_util::future::join_all;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer};

use mockhub_common::models::HubSubscriptionRequest;
use mockhub_core::repositories::SubscriptionRepository;
use mockhub_core::tasks::hub_maintenance::run_purge_pass;
use mockhub_core::{Error, ShutdownOptions};

use common::*;

#[tokio::test]
async fn test_concurrent_unsubscribes_of_same_callback() -> Result<(), Error> {
    let (_dir, hub) = start_hub(test_config()).await?;
    let topic = format!("{}?user_id=5", STREAMS);
    let callback = "http://127.0.0.1:9/cb";
    let sub = hub
        .add_subscription(&HubSubscriptionRequest::subscribe(callback, &topic, 600, "s"), None)
        .await?;

    let (a, b) = tokio::join!(hub.remove_subscription(callback), hub.remove_subscription(callback));
    a?;
    b?;

    let row = hub.repository().get_subscription(sub.id).await?.expect("still present");
    assert!(row.queued_for_removal);
    hub.shutdown(ShutdownOptions::default()).await;
    Ok(())
}

#[tokio::test]
async fn test_parallel_writers_all_commit() -> Result<(), Error> {
    let (_dir, hub) = start_hub(test_config()).await?;
    let topic = format!("{}?user_id=5", STREAMS);

    let requests: Vec<HubSubscriptionRequest> = (0..20)
        .map(|i| HubSubscriptionRequest::subscribe(&format!("http://127.0.0.1:9/cb/{}", i), &topic, 600, "s"))
        .collect();
    let results = join_all(requests.iter().map(|r| hub.add_subscription(r, None))).await;
    for result in results {
        result?;
    }

    assert_eq!(hub.repository().count().await?, 20);
    hub.shutdown(ShutdownOptions::default()).await;
    Ok(())
}

#[tokio::test]
async fn test_verification_races_purge_without_corruption() -> Result<(), Error> {
    let (_dir, hub) = start_hub(test_config()).await?;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(EchoChallenge)
        .mount(&server)
        .await;

    let topic = format!("{}?user_id=5", STREAMS);
    for i in 0..10 {
        // leases of 0 are expired as soon as they are created
        let lease = if i % 2 == 0 { 0 } else { 600 };
        let callback = format!("{}/cb/{}", server.uri(), i);
        hub.add_subscription(&HubSubscriptionRequest::subscribe(&callback, &topic, lease, "s"), None)
            .await?;
    }

    let repo: Arc<dyn SubscriptionRepository> = hub.repository();
    let (verified, purged) = tokio::join!(hub.run_verification_pass(), run_purge_pass(repo.as_ref()));
    let verified = verified?;
    purged?;
    assert_eq!(verified.failed, 0);

    // whatever the interleaving, expired rows are gone after one more purge and live rows are validated
    tokio::time::sleep(Duration::from_millis(5)).await;
    run_purge_pass(repo.as_ref()).await?;
    let remaining = repo.list_pending().await?;
    assert!(remaining.is_empty(), "unverified rows left: {:?}", remaining);
    assert_eq!(repo.count().await?, 5);
    assert_eq!(repo.find_matching(&stream_changed("5"), Utc::now()).await?.len(), 5);

    hub.shutdown(ShutdownOptions::default()).await;
    Ok(())
}
