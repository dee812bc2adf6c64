//! mockhub-core/src/context.rs
//!
//! The running hub: store, services, scheduler and (optionally) its own HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::Router;
use axum_server::{Handle, Server};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use mockhub_common::models::{HubSubscriptionRequest, Subscription, WebhookEvent};
use mockhub_common::traits::SubscriptionRepository;

use crate::api::{hub_router, HubApiState};
use crate::config::HubConfig;
use crate::db::Database;
use crate::http::{DefaultHttpClient, HubHttpClient};
use crate::repositories::SqliteSubscriptionRepository;
use crate::services::{
    DeliveryReport, DeliveryService, EventService, PassReport, SubscriptionService, VerificationService,
};
use crate::tasks::hub_maintenance::run_purge_pass;
use crate::tasks::{Scheduler, ShutdownMode};
use crate::Error;

/// How [`MockHub::shutdown`] treats in-flight work and the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutdownOptions {
    pub mode: ShutdownMode,
    /// Close the store's connection pool too.
    pub close_store: bool,
}

struct Listener {
    handle: Handle,
    task: JoinHandle<()>,
}

pub struct MockHub {
    config: HubConfig,
    db: Database,
    repo: Arc<dyn SubscriptionRepository>,
    subscriptions: Arc<SubscriptionService>,
    verification: Arc<VerificationService>,
    events: EventService,
    router: Router,
    scheduler: Mutex<Scheduler>,
    listener: Mutex<Option<Listener>>,
    local_addr: Option<SocketAddr>,
}

impl MockHub {
    /// Opens the store named by `config.database_url` and starts the hub on it.
    pub async fn start(config: HubConfig) -> Result<Self, Error> {
        let db = Database::connect(&config.database_url, config.busy_timeout).await?;
        Self::start_with_database(config, db).await
    }

    pub async fn start_with_database(config: HubConfig, db: Database) -> Result<Self, Error> {
        let http: Arc<dyn HubHttpClient> = Arc::new(DefaultHttpClient::new(
            config.delivery.request_timeout,
            config.delivery.max_redirects,
        )?);
        Self::start_with(config, db, http).await
    }

    /// Starts the hub on an open store with the given outbound client.
    pub async fn start_with(config: HubConfig, db: Database, http: Arc<dyn HubHttpClient>) -> Result<Self, Error> {
        if config.verbose {
            info!("Starting mock hub: {:?}", config);
        }
        let db = db.with_max_contention_retries(config.max_contention_retries);
        db.migrate().await?;

        let repo: Arc<dyn SubscriptionRepository> = Arc::new(SqliteSubscriptionRepository::new(db.clone()));
        if config.clear_on_start {
            repo.clear().await?;
            info!("Cleared subscription store.");
        }

        let subscriptions = Arc::new(SubscriptionService::new(repo.clone()).with_verbose(config.verbose));
        let verification = Arc::new(
            VerificationService::new(repo.clone(), http.clone(), config.log_errors).with_verbose(config.verbose),
        );
        let events = EventService::new(
            repo.clone(),
            DeliveryService::new(http, config.delivery.clone()),
            config.log_errors,
        )
            .with_verbose(config.verbose);

        let router = hub_router(
            &config.hub_path()?,
            HubApiState { subscriptions: subscriptions.clone(), log_errors: config.log_errors },
        );

        let (listener, local_addr) = match config.listen_port {
            Some(port) => {
                let (listener, addr) = serve(router.clone(), port).await?;
                (Some(listener), Some(addr))
            }
            None => (None, None),
        };

        let scheduler = Scheduler::start(verification.clone(), repo.clone(), config.poll_interval);

        Ok(Self {
            config,
            db,
            repo,
            subscriptions,
            verification,
            events,
            router,
            scheduler: Mutex::new(scheduler),
            listener: Mutex::new(listener),
            local_addr,
        })
    }

    /// The hub route, for mounting into a caller-owned axum app.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Where our own listener is bound, if we have one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn repository(&self) -> Arc<dyn SubscriptionRepository> {
        self.repo.clone()
    }

    pub async fn add_subscription(
        &self,
        request: &HubSubscriptionRequest,
        client_id: Option<&str>,
    ) -> Result<Subscription, Error> {
        self.subscriptions.add_subscription(request, client_id).await
    }

    pub async fn remove_subscription(&self, callback_url: &str) -> Result<(), Error> {
        self.subscriptions.remove_subscription(callback_url).await
    }

    pub async fn emit_event(&self, event: &WebhookEvent) -> Result<DeliveryReport, Error> {
        self.events.emit_event(event).await
    }

    pub async fn clear_db(&self) -> Result<(), Error> {
        self.repo.clear().await
    }

    pub async fn run_verification_pass(&self) -> Result<PassReport, Error> {
        self.verification.verify_pending().await
    }

    pub async fn run_removal_pass(&self) -> Result<PassReport, Error> {
        self.verification.process_removals().await
    }

    pub async fn run_purge_pass(&self) -> Result<u64, Error> {
        run_purge_pass(self.repo.as_ref()).await
    }

    /// Stops timers and the listener, then optionally closes the store. Later calls do nothing
    /// beyond closing the store if asked.
    pub async fn shutdown(&self, options: ShutdownOptions) {
        self.scheduler.lock().await.shutdown(options.mode).await;

        if let Some(listener) = self.listener.lock().await.take() {
            match options.mode {
                ShutdownMode::Graceful => listener.handle.graceful_shutdown(Some(Duration::from_secs(5))),
                ShutdownMode::Abort => listener.handle.shutdown(),
            }
            if let Err(e) = listener.task.await {
                warn!("Hub listener task ended abnormally: {}", e);
            }
        }

        if options.close_store && !self.db.is_closed() {
            self.db.close().await;
            info!("Subscription store closed.");
        }
    }
}

async fn serve(router: Router, port: u16) -> Result<(Listener, SocketAddr), Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let handle = Handle::new();

    let server = Server::bind(addr)
        .handle(handle.clone())
        .serve(router.into_make_service());

    let task = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Hub server error: {}", e);
        }
        info!("Hub server shut down.");
    });

    match handle.listening().await {
        Some(local) => {
            info!("Mock hub listening on http://{}", local);
            Ok((Listener { handle, task }, local))
        }
        None => Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            format!("Could not listen on {}", addr),
        ))),
    }
}
