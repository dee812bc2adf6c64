// File: mockhub-core/src/test_utils/helpers.rs

use std::time::Duration;
use tempfile::TempDir;
use crate::Error;
use crate::db::Database;

/// File name of the store inside the directory returned by [`setup_test_database`].
pub const TEST_DB_FILE: &str = "hub.db";

/// Returns a migrated, empty store in a fresh temp directory. The store lives as long as the
/// returned `TempDir`.
pub async fn setup_test_database() -> Result<(TempDir, Database), Error> {
    let dir = tempfile::tempdir()?;
    let db = Database::open_file(&dir.path().join(TEST_DB_FILE), Duration::from_secs(5)).await?;
    db.migrate().await?;
    Ok((dir, db))
}
