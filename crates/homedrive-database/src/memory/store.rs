//! In-memory store implementing every store trait.
//!
//! All state sits behind one mutex, so each operation is atomic with
//! respect to every other, matching the transactional guarantees of
//! the Postgres repositories. Used by the integration tests and by
//! local tooling that runs without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use homedrive_core::error::AppError;
use homedrive_core::result::AppResult;
use homedrive_core::types::Location;
use homedrive_entity::activity::ActivityLog;
use homedrive_entity::entry::{Entry, EntryKind};
use homedrive_entity::quota::KindBreakdown;
use homedrive_entity::share::ShareLink;
use homedrive_entity::user::User;

use crate::store::{
    ActivitySink, EntryFilter, EntryStore, PurgedTree, QuotaLedger, ShareStore,
};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    entries: HashMap<Uuid, Entry>,
    shares: HashMap<Uuid, ShareLink>,
    activity: Vec<ActivityLog>,
}

impl Inner {
    fn entry(&self, owner_id: Uuid, id: Uuid) -> AppResult<&Entry> {
        self.entries
            .get(&id)
            .filter(|e| e.owner_id == owner_id)
            .ok_or_else(|| AppError::not_found(format!("Entry {id} not found")))
    }

    fn user_mut(&mut self, owner_id: Uuid) -> AppResult<&mut User> {
        self.users
            .get_mut(&owner_id)
            .ok_or_else(|| AppError::not_found(format!("User {owner_id} not found")))
    }

    /// Ids of `id` plus, when it is a folder, every descendant.
    fn subtree_ids(&self, owner_id: Uuid, root: &Entry) -> Vec<Uuid> {
        let mut ids = vec![root.id];
        if root.is_folder() {
            let prefix = root.full_path().storage_key();
            ids.extend(
                self.entries
                    .values()
                    .filter(|e| {
                        e.owner_id == owner_id
                            && e.id != root.id
                            && e.location.storage_key().starts_with(&prefix)
                    })
                    .map(|e| e.id),
            );
        }
        ids
    }

    fn parent_is_trashed(&self, entry: &Entry) -> bool {
        self.entries.values().any(|p| {
            p.owner_id == entry.owner_id
                && p.is_folder()
                && p.is_trashed
                && p.full_path() == entry.location
        })
    }

    fn remove_subtree(&mut self, owner_id: Uuid, ids: &[Uuid]) -> PurgedTree {
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(e) = self.entries.remove(id) {
                removed.push(e);
            }
        }
        let freed: i64 = removed
            .iter()
            .filter(|e| !e.is_folder())
            .map(|e| e.size_bytes)
            .sum();
        if freed > 0 {
            if let Some(user) = self.users.get_mut(&owner_id) {
                user.storage_used = (user.storage_used - freed).max(0);
            }
        }
        // Share links follow their entry, like the FK cascade does.
        self.shares
            .retain(|_, l| removed.iter().all(|e| e.id != l.entry_id));
        PurgedTree {
            entries: removed,
            freed_bytes: freed,
        }
    }
}

fn sort_listing(entries: &mut [Entry]) {
    entries.sort_by_key(|e| (!e.is_folder(), e.name.to_lowercase()));
}

/// All four store traits over in-process state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account record with the given quota and no usage.
    pub async fn register_user(
        &self,
        email: impl Into<String>,
        username: impl Into<String>,
        storage_quota: i64,
    ) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.into(),
            username: username.into(),
            storage_used: 0,
            storage_quota,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().await.users.insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn insert(&self, entry: Entry) -> AppResult<Entry> {
        let mut inner = self.inner.lock().await;
        inner.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn insert_file(&self, entry: Entry) -> AppResult<Entry> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(entry.owner_id)?;
        if !user.fits(entry.size_bytes) {
            let remaining = (user.storage_quota - user.storage_used).max(0);
            return Err(AppError::quota_exceeded(remaining));
        }
        user.storage_used += entry.size_bytes;
        inner.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn find(&self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Entry>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .get(&id)
            .filter(|e| e.owner_id == owner_id)
            .cloned())
    }

    async fn find_live_folder(&self, owner_id: Uuid, path: &Location) -> AppResult<Option<Entry>> {
        let Some(name) = path.last() else {
            return Ok(None);
        };
        let parent = path.parent().unwrap_or_else(Location::root);
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .values()
            .find(|e| {
                e.owner_id == owner_id
                    && e.is_folder()
                    && !e.is_trashed
                    && e.name == name
                    && e.location == parent
            })
            .cloned())
    }

    async fn list_children(
        &self,
        owner_id: Uuid,
        location: &Location,
        filter: EntryFilter,
    ) -> AppResult<Vec<Entry>> {
        let inner = self.inner.lock().await;
        let mut children: Vec<Entry> = inner
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id && &e.location == location)
            .filter(|e| filter.include_trashed || !e.is_trashed)
            .filter(|e| !filter.starred_only || e.is_starred)
            .cloned()
            .collect();
        sort_listing(&mut children);
        Ok(children)
    }

    async fn list_descendants(&self, owner_id: Uuid, prefix: &Location) -> AppResult<Vec<Entry>> {
        let key = prefix.storage_key();
        let inner = self.inner.lock().await;
        let mut found: Vec<Entry> = inner
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id && e.location.storage_key().starts_with(&key))
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.location.storage_key(), !e.is_folder(), e.name.to_lowercase()));
        Ok(found)
    }

    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<Entry>> {
        let inner = self.inner.lock().await;
        let mut trashed: Vec<Entry> = inner
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id && e.is_trashed && !inner.parent_is_trashed(e))
            .cloned()
            .collect();
        trashed.sort_by(|a, b| b.trashed_at.cmp(&a.trashed_at));
        Ok(trashed)
    }

    async fn set_starred(&self, owner_id: Uuid, id: Uuid, starred: bool) -> AppResult<Entry> {
        let mut inner = self.inner.lock().await;
        inner.entry(owner_id, id)?;
        let entry = inner.entries.get_mut(&id).ok_or_else(|| {
            AppError::not_found(format!("Entry {id} not found"))
        })?;
        entry.is_starred = starred;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn set_thumbnail(
        &self,
        owner_id: Uuid,
        id: Uuid,
        thumbnail_ref: Option<String>,
    ) -> AppResult<Entry> {
        let mut inner = self.inner.lock().await;
        inner.entry(owner_id, id)?;
        let entry = inner.entries.get_mut(&id).ok_or_else(|| {
            AppError::not_found(format!("Entry {id} not found"))
        })?;
        entry.thumbnail_ref = thumbnail_ref;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn rename_tree(&self, owner_id: Uuid, id: Uuid, new_name: &str) -> AppResult<Entry> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(owner_id, id)?.clone();
        let now = Utc::now();

        if entry.is_folder() {
            let old_prefix = entry.full_path();
            let new_prefix = entry.location.child(new_name);
            for e in inner.entries.values_mut().filter(|e| e.owner_id == owner_id) {
                if let Some(rewritten) = e.location.reparent(&old_prefix, &new_prefix) {
                    e.location = rewritten;
                    e.updated_at = now;
                }
            }
        }

        let entry = inner.entries.get_mut(&id).ok_or_else(|| {
            AppError::not_found(format!("Entry {id} not found"))
        })?;
        entry.name = new_name.to_string();
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn move_tree(
        &self,
        owner_id: Uuid,
        id: Uuid,
        destination: &Location,
    ) -> AppResult<Entry> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(owner_id, id)?.clone();
        let now = Utc::now();

        if entry.is_folder() {
            let old_prefix = entry.full_path();
            let new_prefix = destination.child(&entry.name);
            for e in inner.entries.values_mut().filter(|e| e.owner_id == owner_id) {
                if let Some(rewritten) = e.location.reparent(&old_prefix, &new_prefix) {
                    e.location = rewritten;
                    e.updated_at = now;
                }
            }
        }

        let entry = inner.entries.get_mut(&id).ok_or_else(|| {
            AppError::not_found(format!("Entry {id} not found"))
        })?;
        entry.location = destination.clone();
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn trash_tree(&self, owner_id: Uuid, id: Uuid, now: DateTime<Utc>) -> AppResult<Entry> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(owner_id, id)?.clone();
        let ids = inner.subtree_ids(owner_id, &entry);
        for sid in &ids {
            if let Some(e) = inner.entries.get_mut(sid) {
                e.is_trashed = true;
                e.trashed_at = Some(now);
                e.updated_at = now;
            }
        }
        inner.entry(owner_id, id).map(Entry::clone)
    }

    async fn restore_tree(&self, owner_id: Uuid, id: Uuid) -> AppResult<Entry> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(owner_id, id)?.clone();
        let ids = inner.subtree_ids(owner_id, &entry);
        let now = Utc::now();
        for sid in &ids {
            if let Some(e) = inner.entries.get_mut(sid) {
                e.is_trashed = false;
                e.trashed_at = None;
                e.updated_at = now;
            }
        }
        inner.entry(owner_id, id).map(Entry::clone)
    }

    async fn purge_tree(&self, owner_id: Uuid, id: Uuid) -> AppResult<PurgedTree> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(owner_id, id)?.clone();
        let ids = inner.subtree_ids(owner_id, &entry);
        Ok(inner.remove_subtree(owner_id, &ids))
    }

    async fn purge_expired(&self, owner_id: Uuid, cutoff: DateTime<Utc>) -> AppResult<PurgedTree> {
        let mut inner = self.inner.lock().await;
        let ids: Vec<Uuid> = inner
            .entries
            .values()
            .filter(|e| {
                e.owner_id == owner_id
                    && e.is_trashed
                    && e.trashed_at.is_some_and(|t| t <= cutoff)
            })
            .map(|e| e.id)
            .collect();
        Ok(inner.remove_subtree(owner_id, &ids))
    }

    async fn owners_with_expired_trash(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.lock().await;
        let mut owners: Vec<Uuid> = inner
            .entries
            .values()
            .filter(|e| e.is_trashed && e.trashed_at.is_some_and(|t| t <= cutoff))
            .map(|e| e.owner_id)
            .collect();
        owners.sort();
        owners.dedup();
        Ok(owners)
    }

    async fn usage_breakdown(&self, owner_id: Uuid) -> AppResult<Vec<KindBreakdown>> {
        let inner = self.inner.lock().await;
        let mut by_kind: HashMap<EntryKind, (i64, i64)> = HashMap::new();
        for e in inner
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id && !e.is_trashed && !e.is_folder())
        {
            let slot = by_kind.entry(e.kind).or_default();
            slot.0 += e.size_bytes;
            slot.1 += 1;
        }
        let mut breakdown: Vec<KindBreakdown> = by_kind
            .into_iter()
            .map(|(kind, (size_bytes, count))| KindBreakdown {
                kind,
                size_bytes,
                count,
            })
            .collect();
        breakdown.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        Ok(breakdown)
    }
}

#[async_trait]
impl QuotaLedger for MemoryStore {
    async fn create_user(&self, user: User) -> AppResult<User> {
        let mut inner = self.inner.lock().await;
        if inner
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(AppError::conflict("Email or username already taken"));
        }
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn usage(&self, owner_id: Uuid) -> AppResult<User> {
        let inner = self.inner.lock().await;
        inner
            .users
            .get(&owner_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("User {owner_id} not found")))
    }

    async fn release(&self, owner_id: Uuid, bytes: i64) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(owner_id)?;
        user.storage_used = (user.storage_used - bytes).max(0);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_quota(&self, owner_id: Uuid, quota_bytes: i64) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(owner_id)?;
        user.storage_quota = quota_bytes;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn insert(&self, link: ShareLink) -> AppResult<ShareLink> {
        let mut inner = self.inner.lock().await;
        if inner.shares.values().any(|l| l.token == link.token) {
            return Err(AppError::conflict("Share token collision"));
        }
        inner.shares.insert(link.id, link.clone());
        Ok(link)
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<ShareLink>> {
        let inner = self.inner.lock().await;
        Ok(inner.shares.values().find(|l| l.token == token).cloned())
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<ShareLink>> {
        let inner = self.inner.lock().await;
        let mut links: Vec<ShareLink> = inner
            .shares
            .values()
            .filter(|l| l.owner_id == owner_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn revoke(&self, owner_id: Uuid, id: Uuid) -> AppResult<ShareLink> {
        let mut inner = self.inner.lock().await;
        let link = inner
            .shares
            .get_mut(&id)
            .filter(|l| l.owner_id == owner_id)
            .ok_or_else(|| AppError::not_found(format!("Share link {id} not found")))?;
        link.is_active = false;
        Ok(link.clone())
    }

    async fn touch_access(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(link) = inner.shares.get_mut(&id) {
            link.last_accessed = Some(now);
        }
        Ok(())
    }

    async fn try_consume_download(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ShareLink>> {
        let mut inner = self.inner.lock().await;
        let Some(link) = inner.shares.get_mut(&id) else {
            return Ok(None);
        };
        let valid = link.is_active
            && link.expires_at.is_none_or(|t| t > now)
            && link.max_downloads.is_none_or(|max| link.download_count < max);
        if !valid {
            return Ok(None);
        }
        link.download_count += 1;
        link.last_accessed = Some(now);
        Ok(Some(link.clone()))
    }
}

#[async_trait]
impl ActivitySink for MemoryStore {
    async fn record(&self, log: ActivityLog) -> AppResult<()> {
        self.inner.lock().await.activity.push(log);
        Ok(())
    }

    async fn recent(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<ActivityLog>> {
        let inner = self.inner.lock().await;
        let mut logs: Vec<ActivityLog> = inner
            .activity
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }
}
