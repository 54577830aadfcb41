//! User repository: quota bookkeeping on account records.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use homedrive_core::error::{AppError, ErrorKind};
use homedrive_core::result::AppResult;
use homedrive_entity::user::User;

use crate::store::QuotaLedger;

/// Postgres-backed [`QuotaLedger`].
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaLedger for UserRepository {
    async fn create_user(&self, user: User) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users \
             (id, email, username, storage_used, storage_quota, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(user.storage_used)
        .bind(user.storage_quota)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if matches!(
                    db_err.constraint(),
                    Some("users_email_key") | Some("users_username_key")
                ) =>
            {
                AppError::conflict("Email or username already taken")
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create user", e),
        })
    }

    async fn usage(&self, owner_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))?
            .ok_or_else(|| AppError::not_found(format!("User {owner_id} not found")))
    }

    async fn release(&self, owner_id: Uuid, bytes: i64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET storage_used = GREATEST(0, storage_used - $2), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(owner_id)
        .bind(bytes)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to release quota", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {owner_id} not found")));
        }
        Ok(())
    }

    async fn set_quota(&self, owner_id: Uuid, quota_bytes: i64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET storage_quota = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(owner_id)
        .bind(quota_bytes)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set quota", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {owner_id} not found")));
        }
        Ok(())
    }
}
