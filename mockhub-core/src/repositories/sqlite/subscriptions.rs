// src/repositories/sqlite/subscriptions.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use mockhub_common::models::{
    Filter, MatchTerm, NewSubscription, Subscription, TopicKind, WebhookEvent, FILTER_COLUMNS,
};
use mockhub_common::traits::SubscriptionRepository;

use crate::db::{Database, TransactionMode};
use crate::utils::time::{from_epoch_millis, to_epoch_millis};
use crate::Error;

const SELECT_SUBSCRIPTIONS: &str = r#"
    SELECT s.id,
           s.callback_url,
           s.topic_kind,
           s.secret,
           s.expires_at,
           s.created_by_client_id,
           s.validated,
           s.queued_for_removal,
           s.created_at,
           f.from_id,
           f.to_id,
           f.user_id,
           f.extension_id,
           f.broadcaster_id,
           f.gifter_id,
           f.gifter_name
    FROM subscriptions s
    JOIN subscription_filters f ON f.subscription_id = s.id
"#;

/// Subscriptions and their filters in SQLite. Every write runs in an immediate transaction and
/// is retried from the top when another writer holds the lock.
#[derive(Clone)]
pub struct SqliteSubscriptionRepository {
    db: Database,
}

impl SqliteSubscriptionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn fetch_where(&self, condition: &str) -> Result<Vec<Subscription>, Error> {
        let sql = format!("{} WHERE {} ORDER BY s.id", SELECT_SUBSCRIPTIONS, condition);
        let rows = sqlx::query(&sql).fetch_all(self.db.pool()).await?;
        rows.iter().map(row_to_subscription).collect()
    }

    /// Runs one single-row statement keyed by subscription id in its own transaction.
    async fn update_by_id(&self, sql: &'static str, id: i64) -> Result<u64, Error> {
        let db = &self.db;
        db.retry_on_contention(move || async move {
            let mut tx = db.begin(TransactionMode::Immediate).await?;
            let affected = sqlx::query(sql).bind(id).execute(tx.conn()).await?.rows_affected();
            tx.commit().await?;
            Ok(affected)
        })
            .await
    }
}

fn row_to_subscription(row: &SqliteRow) -> Result<Subscription, Error> {
    let kind = row.try_get::<String, _>("topic_kind")?.parse::<TopicKind>()?;

    let mut filter = Filter::new(kind);
    for dim in kind.filter_schema().dimensions {
        filter.set(dim.column, row.try_get::<Option<String>, _>(dim.column)?)?;
    }

    Ok(Subscription {
        id: row.try_get("id")?,
        callback_url: row.try_get("callback_url")?,
        secret: row.try_get("secret")?,
        expires_at: from_epoch_millis(row.try_get("expires_at")?),
        created_by_client_id: row.try_get("created_by_client_id")?,
        validated: row.try_get::<i64, _>("validated")? != 0,
        queued_for_removal: row.try_get::<i64, _>("queued_for_removal")? != 0,
        created_at: from_epoch_millis(row.try_get("created_at")?),
        filter,
    })
}

async fn insert_filter(conn: &mut SqliteConnection, subscription_id: i64, filter: &Filter) -> Result<(), Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO subscription_filters (subscription_id");
    for column in FILTER_COLUMNS {
        qb.push(", ").push(column);
    }
    qb.push(") VALUES (");
    {
        let mut values = qb.separated(", ");
        values.push_bind(subscription_id);
        for column in FILTER_COLUMNS {
            values.push_bind(filter.value(column).map(str::to_string));
        }
    }
    qb.push(")");
    qb.build().execute(conn).await?;
    Ok(())
}

#[async_trait]
impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn create_subscription(&self, new: &NewSubscription) -> Result<Subscription, Error> {
        let db = &self.db;
        let created = db
            .retry_on_contention(move || async move {
                let created_at = to_epoch_millis(Utc::now());
                let mut tx = db.begin(TransactionMode::Immediate).await?;

                let id = sqlx::query(
                    r#"
                    INSERT INTO subscriptions (
                        callback_url, topic_kind, secret, expires_at,
                        created_by_client_id, validated, queued_for_removal, created_at
                    )
                    VALUES (?, ?, ?, ?, ?, 0, 0, ?)
                    "#,
                )
                    .bind(&new.callback_url)
                    .bind(new.filter.kind().as_str())
                    .bind(&new.secret)
                    .bind(to_epoch_millis(new.expires_at))
                    .bind(&new.created_by_client_id)
                    .bind(created_at)
                    .execute(tx.conn())
                    .await?
                    .last_insert_rowid();

                insert_filter(tx.conn(), id, &new.filter).await?;
                tx.commit().await?;

                Ok(Subscription {
                    id,
                    callback_url: new.callback_url.clone(),
                    secret: new.secret.clone(),
                    expires_at: from_epoch_millis(to_epoch_millis(new.expires_at)),
                    created_by_client_id: new.created_by_client_id.clone(),
                    validated: false,
                    queued_for_removal: false,
                    created_at: from_epoch_millis(created_at),
                    filter: new.filter.clone(),
                })
            })
            .await;

        created.map_err(|e| {
            if e.is_unique_violation() {
                Error::DuplicateCallback(new.callback_url.clone())
            } else {
                e
            }
        })
    }

    async fn get_subscription(&self, id: i64) -> Result<Option<Subscription>, Error> {
        let sql = format!("{} WHERE s.id = ?", SELECT_SUBSCRIPTIONS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.db.pool()).await?;
        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn get_by_callback(&self, callback_url: &str) -> Result<Option<Subscription>, Error> {
        let sql = format!("{} WHERE s.callback_url = ?", SELECT_SUBSCRIPTIONS);
        let row = sqlx::query(&sql)
            .bind(callback_url)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn queue_for_removal(&self, callback_url: &str) -> Result<bool, Error> {
        let db = &self.db;
        let affected = db
            .retry_on_contention(move || async move {
                let mut tx = db.begin(TransactionMode::Immediate).await?;
                let affected = sqlx::query(
                    "UPDATE subscriptions SET queued_for_removal = 1 WHERE callback_url = ?",
                )
                    .bind(callback_url)
                    .execute(tx.conn())
                    .await?
                    .rows_affected();
                tx.commit().await?;
                Ok(affected)
            })
            .await?;
        Ok(affected > 0)
    }

    async fn list_pending(&self) -> Result<Vec<Subscription>, Error> {
        self.fetch_where("s.validated = 0").await
    }

    async fn list_queued_for_removal(&self) -> Result<Vec<Subscription>, Error> {
        self.fetch_where("s.queued_for_removal = 1").await
    }

    async fn find_matching(&self, event: &WebhookEvent, now: DateTime<Utc>) -> Result<Vec<Subscription>, Error> {
        let kind = event.kind();
        let clauses = kind.filter_schema().match_clauses(event);
        if clauses.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_SUBSCRIPTIONS);
        qb.push(" WHERE s.topic_kind = ")
            .push_bind(kind.as_str())
            .push(" AND s.validated = 1 AND s.expires_at > ")
            .push_bind(to_epoch_millis(now))
            .push(" AND (");

        for (i, clause) in clauses.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("(");
            for (j, term) in clause.terms.iter().enumerate() {
                if j > 0 {
                    qb.push(" AND ");
                }
                match term {
                    MatchTerm::Equals { column, value } => {
                        qb.push("f.").push(*column).push(" = ").push_bind(value.clone());
                    }
                    MatchTerm::Wildcard { column } => {
                        qb.push("f.").push(*column).push(" IS NULL");
                    }
                }
            }
            qb.push(")");
        }
        qb.push(") ORDER BY s.id");

        let rows = qb.build().fetch_all(self.db.pool()).await?;
        debug!("{} event matched {} subscription(s) across {} clause(s)", kind, rows.len(), clauses.len());
        rows.iter().map(row_to_subscription).collect()
    }

    async fn mark_validated(&self, id: i64) -> Result<bool, Error> {
        let affected = self
            .update_by_id("UPDATE subscriptions SET validated = 1 WHERE id = ? AND validated = 0", id)
            .await?;
        Ok(affected > 0)
    }

    async fn revert_removal(&self, id: i64) -> Result<bool, Error> {
        let affected = self
            .update_by_id("UPDATE subscriptions SET queued_for_removal = 0 WHERE id = ?", id)
            .await?;
        Ok(affected > 0)
    }

    async fn delete_subscription(&self, id: i64) -> Result<bool, Error> {
        let db = &self.db;
        let affected = db
            .retry_on_contention(move || async move {
                let mut tx = db.begin(TransactionMode::Immediate).await?;
                sqlx::query("DELETE FROM subscription_filters WHERE subscription_id = ?")
                    .bind(id)
                    .execute(tx.conn())
                    .await?;
                let affected = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
                    .bind(id)
                    .execute(tx.conn())
                    .await?
                    .rows_affected();
                tx.commit().await?;
                Ok(affected)
            })
            .await?;
        Ok(affected > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let cutoff = to_epoch_millis(now);
        let db = &self.db;
        db.retry_on_contention(move || async move {
            let mut tx = db.begin(TransactionMode::Immediate).await?;
            sqlx::query(
                r#"
                DELETE FROM subscription_filters
                WHERE subscription_id IN (SELECT id FROM subscriptions WHERE expires_at <= ?)
                "#,
            )
                .bind(cutoff)
                .execute(tx.conn())
                .await?;
            let purged = sqlx::query("DELETE FROM subscriptions WHERE expires_at <= ?")
                .bind(cutoff)
                .execute(tx.conn())
                .await?
                .rows_affected();
            tx.commit().await?;
            Ok(purged)
        })
            .await
    }

    async fn count(&self) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    async fn clear(&self) -> Result<(), Error> {
        let db = &self.db;
        db.retry_on_contention(move || async move {
            let mut tx = db.begin(TransactionMode::Immediate).await?;
            sqlx::query("DELETE FROM subscription_filters").execute(tx.conn()).await?;
            sqlx::query("DELETE FROM subscriptions").execute(tx.conn()).await?;
            tx.commit().await
        })
            .await
    }
}
