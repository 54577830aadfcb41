//! Activity log repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use homedrive_core::error::{AppError, ErrorKind};
use homedrive_core::result::AppResult;
use homedrive_entity::activity::ActivityLog;

use crate::store::ActivitySink;

/// Postgres-backed [`ActivitySink`].
#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivitySink for ActivityRepository {
    async fn record(&self, log: ActivityLog) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO activity_logs (id, user_id, action, subject, timestamp) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(log.action)
        .bind(&log.subject)
        .bind(log.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record activity", e))?;
        Ok(())
    }

    async fn recent(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<ActivityLog>> {
        sqlx::query_as::<_, ActivityLog>(
            "SELECT * FROM activity_logs WHERE user_id = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list activity", e))
    }
}
