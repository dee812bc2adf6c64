use std::time::Duration;
use url::Url;

use crate::services::RetryPolicy;
use crate::Error;

pub const DEFAULT_PORT: u16 = 3080;

/// Everything a [`MockHub`](crate::context::MockHub) needs to start.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// The route is mounted on this URL's path.
    pub hub_url: String,
    /// Bind our own listener on `0.0.0.0:<port>`. `None` leaves serving to the caller via
    /// [`MockHub::router`](crate::context::MockHub::router).
    pub listen_port: Option<u16>,
    pub database_url: String,
    pub busy_timeout: Duration,
    /// Shared by the verification, removal and purge jobs.
    pub poll_interval: Duration,
    /// Raise per-step handshake, request and delivery logs from debug to info.
    pub verbose: bool,
    /// Log verification transport errors and failed deliveries at error level.
    pub log_errors: bool,
    /// Wipe every subscription once the store is ready.
    pub clear_on_start: bool,
    pub delivery: RetryPolicy,
    /// `None` retries contended transactions until they go through.
    pub max_contention_retries: Option<u32>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub_url: format!("http://localhost:{}/hub", DEFAULT_PORT),
            listen_port: None,
            database_url: "sqlite://mockhub.db".to_string(),
            busy_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10_000),
            verbose: false,
            log_errors: false,
            clear_on_start: false,
            delivery: RetryPolicy::default(),
            max_contention_retries: None,
        }
    }
}

impl HubConfig {
    /// Path component of `hub_url`, e.g. `/hub`.
    pub fn hub_path(&self) -> Result<String, Error> {
        let url = Url::parse(&self.hub_url)?;
        Ok(url.path().to_string())
    }
}
