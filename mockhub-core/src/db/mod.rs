// mockhub-core/src/db/mod.rs

use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, warn};
use crate::Error;

/// How a transaction takes the database lock when it begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Lock lazily on first read/write.
    Deferred,
    /// Take the write lock up front; other writers wait (or get `SQLITE_BUSY`).
    Immediate,
    /// Take the write lock and keep readers out too.
    Exclusive,
}

impl TransactionMode {
    fn begin_statement(&self) -> &'static str {
        match self {
            TransactionMode::Deferred => "BEGIN DEFERRED",
            TransactionMode::Immediate => "BEGIN IMMEDIATE",
            TransactionMode::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// Shared handle to the subscription store.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    max_contention_retries: Option<u32>,
}

impl Database {
    /// Connect to a `sqlite://` URL, creating the file if needed.
    pub async fn new(database_url: &str) -> Result<Self, Error> {
        Self::connect(database_url, Duration::from_secs(5)).await
    }

    pub async fn connect(database_url: &str, busy_timeout: Duration) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(database_url)?;
        let db = Self::connect_with(options, busy_timeout).await?;
        info!("Connected to SQLite at {}", database_url);
        Ok(db)
    }

    pub async fn open_file(path: &Path, busy_timeout: Duration) -> Result<Self, Error> {
        let options = SqliteConnectOptions::new().filename(path);
        Self::connect_with(options, busy_timeout).await
    }

    async fn connect_with(options: SqliteConnectOptions, busy_timeout: Duration) -> Result<Self, Error> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool, max_contention_retries: None })
    }

    /// Caps how many times a contended transaction is retried. `None` retries until it
    /// succeeds or fails for another reason.
    pub fn with_max_contention_retries(mut self, limit: Option<u32>) -> Self {
        self.max_contention_retries = limit;
        self
    }

    /// Run migrations in the `migrations/` folder.
    pub async fn migrate(&self) -> Result<(), Error> {
        debug!("Applying migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        debug!("Migrations applied successfully.");
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool, max_contention_retries: None }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Opens a transaction on a dedicated pool connection with the given locking mode.
    pub async fn begin(&self, mode: TransactionMode) -> Result<HubTransaction, Error> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query(mode.begin_statement()).execute(&mut *conn).await?;
        Ok(HubTransaction { conn, open: true })
    }

    /// Runs `op` (which opens, uses and commits its own transaction) again from the top for as
    /// long as it fails with a lock-contention error. Any other error is returned as is.
    pub async fn retry_on_contention<T, F, Fut>(&self, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut retries: u32 = 0;
        loop {
            match op().await {
                Err(e) if e.is_contention() => {
                    retries += 1;
                    if let Some(limit) = self.max_contention_retries {
                        if retries > limit {
                            warn!("Giving up on contended transaction after {} retries", limit);
                            return Err(Error::StoreContention(e.to_string()));
                        }
                    }
                    debug!("Store busy, retrying transaction (retry #{}): {}", retries, e);
                    tokio::task::yield_now().await;
                }
                other => return other,
            }
        }
    }
}

/// An open store transaction.
///
/// Must be finished with [`commit`](Self::commit) or [`rollback`](Self::rollback). Dropping it
/// unfinished closes the underlying connection, which makes SQLite roll the transaction back.
pub struct HubTransaction {
    conn: PoolConnection<Sqlite>,
    open: bool,
}

impl HubTransaction {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.conn
    }

    pub async fn commit(mut self) -> Result<(), Error> {
        sqlx::query("COMMIT").execute(&mut *self.conn).await?;
        self.open = false;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), Error> {
        sqlx::query("ROLLBACK").execute(&mut *self.conn).await?;
        self.open = false;
        Ok(())
    }
}

impl Drop for HubTransaction {
    fn drop(&mut self) {
        if self.open {
            self.conn.close_on_drop();
        }
    }
}
