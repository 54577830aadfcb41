//! Account record, as far as storage accounting is concerned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A drive owner. Credentials live in the auth layer; this crate only
/// carries the fields storage accounting reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    /// Bytes currently charged against the quota.
    pub storage_used: i64,
    /// Quota in bytes. Zero or negative means unlimited (fall back to
    /// the volume capacity).
    pub storage_quota: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether a further `additional` bytes fit under the quota.
    /// An unlimited quota always fits.
    pub fn fits(&self, additional: i64) -> bool {
        self.storage_quota <= 0 || self.storage_used + additional <= self.storage_quota
    }
}

/// Fields supplied when provisioning a new owner.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub username: String,
    pub storage_quota: i64,
}

impl CreateUser {
    /// Materialize a full [`User`] with a fresh id, zero usage, and
    /// timestamps.
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            username: self.username,
            storage_used: 0,
            storage_quota: self.storage_quota,
            created_at: now,
            updated_at: now,
        }
    }
}
