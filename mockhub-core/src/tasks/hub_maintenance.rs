// mockhub-core/src/tasks/hub_maintenance.rs

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use mockhub_common::traits::SubscriptionRepository;

use crate::services::VerificationService;
use crate::Error;

/// Deletes every subscription whose lease has ended, validated or not.
pub async fn run_purge_pass(repo: &dyn SubscriptionRepository) -> Result<u64, Error> {
    let purged = repo.purge_expired(Utc::now()).await?;
    if purged > 0 {
        info!("Purged {} expired subscription(s)", purged);
    }
    Ok(purged)
}

/// Runs `pass` every `interval` until the shutdown flag flips or its sender is dropped. A pass that is already running
/// when shutdown is requested finishes before the task exits.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut pass: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {}
                changed = shutdown_rx.changed() => {
                    // a dropped sender means the owning scheduler is gone
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("{} task shutting down => break from loop.", name);
                        break;
                    }
                    continue;
                }
            }
            if *shutdown_rx.borrow() {
                break;
            }
            pass().await;
        }
    })
}

pub fn spawn_verification_task(
    verification: Arc<VerificationService>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_periodic("verify-pending", interval, shutdown_rx, move || {
        let verification = verification.clone();
        async move {
            match verification.verify_pending().await {
                Ok(report) if report.processed > 0 => debug!("Verification pass: {:?}", report),
                Ok(_) => {}
                Err(e) => error!("Verification pass failed: {}", e),
            }
        }
    })
}

pub fn spawn_removal_task(
    verification: Arc<VerificationService>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_periodic("process-removals", interval, shutdown_rx, move || {
        let verification = verification.clone();
        async move {
            match verification.process_removals().await {
                Ok(report) if report.processed > 0 => debug!("Removal pass: {:?}", report),
                Ok(_) => {}
                Err(e) => error!("Removal pass failed: {}", e),
            }
        }
    })
}

pub fn spawn_purge_task(
    repo: Arc<dyn SubscriptionRepository>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_periodic("purge-expired", interval, shutdown_rx, move || {
        let repo = repo.clone();
        async move {
            if let Err(e) = run_purge_pass(repo.as_ref()).await {
                error!("Purge pass failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::SqliteSubscriptionRepository;
    use crate::test_utils::helpers::setup_test_database;

    #[tokio::test]
    async fn test_job_exits_when_sender_is_dropped() -> Result<(), Error> {
        let (_dir, db) = setup_test_database().await?;
        let repo: Arc<dyn SubscriptionRepository> = Arc::new(SqliteSubscriptionRepository::new(db));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_purge_task(repo, Duration::from_secs(3600), shutdown_rx);
        drop(shutdown_tx);

        let finished = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(matches!(finished, Ok(Ok(()))), "purge job kept running without its scheduler");
        Ok(())
    }

    #[tokio::test]
    async fn test_job_exits_on_shutdown_flag() -> Result<(), Error> {
        let (_dir, db) = setup_test_database().await?;
        let repo: Arc<dyn SubscriptionRepository> = Arc::new(SqliteSubscriptionRepository::new(db));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_purge_task(repo, Duration::from_secs(3600), shutdown_rx);
        let _ = shutdown_tx.send(true);

        let finished = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(matches!(finished, Ok(Ok(()))));
        Ok(())
    }
}
