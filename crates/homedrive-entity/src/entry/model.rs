//! Entry record: one row per file or folder in the virtual hierarchy.

use chrono::{DateTime, Utc};
use homedrive_core::types::Location;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EntryKind;

/// A file or folder owned by a user. `location` holds the path of the
/// containing folder; the entry's own path is `location` plus `name`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: Uuid,
    pub name: String,
    pub kind: EntryKind,
    pub mime_type: Option<String>,
    /// Byte size of the blob. Zero for folders.
    pub size_bytes: i64,
    /// Location of the containing folder. Root is the empty location.
    pub location: Location,
    /// Key of the stored blob, if any. Folders have none.
    pub blob_ref: Option<String>,
    pub thumbnail_ref: Option<String>,
    pub is_starred: bool,
    pub is_trashed: bool,
    pub trashed_at: Option<DateTime<Utc>>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// The full virtual path of this entry, including its own name.
    pub fn full_path(&self) -> Location {
        self.location.child(&self.name)
    }

    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }
}

/// Fields supplied when creating a new entry.
#[derive(Debug, Clone)]
pub struct CreateEntry {
    pub name: String,
    pub kind: EntryKind,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub location: Location,
    pub blob_ref: Option<String>,
    pub owner_id: Uuid,
}

impl CreateEntry {
    /// A folder entry at `location` named `name`.
    pub fn folder(owner_id: Uuid, location: Location, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
            mime_type: None,
            size_bytes: 0,
            location,
            blob_ref: None,
            owner_id,
        }
    }

    /// Materialize a full [`Entry`] with a fresh id and timestamps.
    pub fn into_entry(self, now: DateTime<Utc>) -> Entry {
        Entry {
            id: Uuid::new_v4(),
            name: self.name,
            kind: self.kind,
            mime_type: self.mime_type,
            size_bytes: self.size_bytes,
            location: self.location,
            blob_ref: self.blob_ref,
            thumbnail_ref: None,
            is_starred: false,
            is_trashed: false,
            trashed_at: None,
            owner_id: self.owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}
