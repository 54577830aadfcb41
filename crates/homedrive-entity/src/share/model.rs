//! Share link records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a share link lets anonymous visitors do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_permission", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SharePermission {
    /// Preview only; the download endpoint refuses.
    View,
    /// Preview and download.
    Download,
}

/// Lifecycle state of a link at a given instant, derived from the
/// record rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareLinkStatus {
    Active,
    /// Deactivated by the owner. Terminal.
    Revoked,
    Expired,
    /// Download budget used up.
    Exhausted,
}

/// A public share link over a single file entry.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShareLink {
    pub id: Uuid,
    /// URL-safe random token, unique across all links.
    pub token: String,
    pub entry_id: Uuid,
    pub owner_id: Uuid,
    pub permission: SharePermission,
    /// Argon2 hash of the access password, if one is set.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_downloads: Option<i32>,
    pub download_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl ShareLink {
    /// Derive the link's status at `now`. Revocation wins over expiry,
    /// expiry over exhaustion.
    pub fn status(&self, now: DateTime<Utc>) -> ShareLinkStatus {
        if !self.is_active {
            return ShareLinkStatus::Revoked;
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return ShareLinkStatus::Expired;
            }
        }
        if let Some(max) = self.max_downloads {
            if self.download_count >= max {
                return ShareLinkStatus::Exhausted;
            }
        }
        ShareLinkStatus::Active
    }

    pub fn requires_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Fields supplied when creating a share link.
#[derive(Debug, Clone)]
pub struct CreateShareLink {
    pub entry_id: Uuid,
    pub owner_id: Uuid,
    pub permission: SharePermission,
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_downloads: Option<i32>,
}

impl CreateShareLink {
    /// Materialize a full [`ShareLink`] with the given token.
    pub fn into_link(self, token: String, now: DateTime<Utc>) -> ShareLink {
        ShareLink {
            id: Uuid::new_v4(),
            token,
            entry_id: self.entry_id,
            owner_id: self.owner_id,
            permission: self.permission,
            password_hash: self.password_hash,
            expires_at: self.expires_at,
            max_downloads: self.max_downloads,
            download_count: 0,
            is_active: true,
            created_at: now,
            last_accessed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link() -> ShareLink {
        CreateShareLink {
            entry_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            permission: SharePermission::Download,
            password_hash: None,
            expires_at: None,
            max_downloads: None,
        }
        .into_link("tok".into(), Utc::now())
    }

    #[test]
    fn test_status_precedence() {
        let now = Utc::now();

        let mut l = link();
        assert_eq!(l.status(now), ShareLinkStatus::Active);

        l.expires_at = Some(now - Duration::hours(1));
        l.max_downloads = Some(1);
        l.download_count = 5;
        assert_eq!(l.status(now), ShareLinkStatus::Expired);

        l.is_active = false;
        assert_eq!(l.status(now), ShareLinkStatus::Revoked);
    }

    #[test]
    fn test_exhausted_when_budget_spent() {
        let now = Utc::now();
        let mut l = link();
        l.max_downloads = Some(3);
        l.download_count = 3;
        assert_eq!(l.status(now), ShareLinkStatus::Exhausted);
        l.download_count = 2;
        assert_eq!(l.status(now), ShareLinkStatus::Active);
    }
}
