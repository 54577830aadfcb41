//! Activity log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Upload,
    Download,
    Rename,
    Move,
    Star,
    CreateFolder,
    Trash,
    Restore,
    Purge,
    Share,
    Revoke,
}

/// One recorded user action. Logging is best effort; a failed insert
/// never fails the operation it describes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: ActivityAction,
    /// Human-readable subject, usually the entry's full path.
    pub subject: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(user_id: Uuid, action: ActivityAction, subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            action,
            subject: subject.into(),
            timestamp: Utc::now(),
        }
    }
}
