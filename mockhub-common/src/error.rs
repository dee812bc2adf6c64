// ================================================================
// File: mockhub-common/src/error.rs
// ================================================================

use thiserror::Error;

/// SQLite primary result codes that signal a lock held by another writer.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or semantically invalid subscribe/unsubscribe input.
    #[error("{0}")]
    BadRequest(String),

    /// The topic URL does not resolve to a registered topic kind.
    #[error("'{0}' is not a valid topic.")]
    TopicUnknown(String),

    #[error("Verification failed for {callback}: {reason}")]
    VerificationFailed { callback: String, reason: String },

    #[error("Delivery to {callback} failed after {attempts} attempt(s): {reason}")]
    DeliveryFailed {
        callback: String,
        attempts: u32,
        reason: String,
    },

    /// A transactional write kept losing the race for the store lock.
    #[error("Store contention: {0}")]
    StoreContention(String),

    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("A subscription already exists for callback {0}")]
    DuplicateCallback(String),

    // Fatal store errors:
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }

    /// HTTP status the hub front door answers with for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_)
            | Error::TopicUnknown(_)
            | Error::Parse(_)
            | Error::InvalidUri(_)
            | Error::Json(_) => 400,
            Error::NotFound(_) => 404,
            Error::DuplicateCallback(_) => 409,
            Error::StoreContention(_) => 503,
            _ => 500,
        }
    }

    /// True for the `BadRequest` family (topic lookups included).
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::BadRequest(_) | Error::TopicUnknown(_))
    }

    /// True when the store reported that another connection holds the lock.
    /// Extended codes (e.g. `SQLITE_BUSY_SNAPSHOT` = 517) carry the primary code in the low byte.
    pub fn is_contention(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// True when the store rejected a row because of a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_failure_kind() {
        assert_eq!(Error::bad_request("nope").status_code(), 400);
        assert_eq!(Error::TopicUnknown("https://example.com".into()).status_code(), 400);
        assert_eq!(Error::NotFound("cb".into()).status_code(), 404);
        assert_eq!(Error::DuplicateCallback("cb".into()).status_code(), 409);
        assert_eq!(Error::StoreContention("busy".into()).status_code(), 503);
        assert_eq!(Error::Database(sqlx::Error::RowNotFound).status_code(), 500);
    }

    #[test]
    fn test_topic_unknown_is_a_bad_request() {
        assert!(Error::TopicUnknown("x".into()).is_bad_request());
        assert!(!Error::NotFound("x".into()).is_bad_request());
    }

    #[test]
    fn test_non_database_errors_are_not_contention() {
        assert!(!Error::bad_request("x").is_contention());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_contention());
        assert!(!Error::StoreContention("busy".into()).is_contention());
    }
}
