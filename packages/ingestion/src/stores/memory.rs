//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::traits::store::{BookmarkStore, SnapshotStore};
use crate::types::{BookmarkRecord, EnrichmentStatus, PageSnapshot, Tag, TagAssociation};

/// In-memory store for bookmarks, tags, and page snapshots.
///
/// Useful for testing and development. Not suitable for production as data
/// is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    bookmarks: RwLock<HashMap<Uuid, BookmarkRecord>>,
    tags: RwLock<HashMap<Uuid, Tag>>,
    associations: RwLock<Vec<TagAssociation>>,
    snapshots: RwLock<HashMap<String, PageSnapshot>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.bookmarks.write().unwrap().clear();
        self.tags.write().unwrap().clear();
        self.associations.write().unwrap().clear();
        self.snapshots.write().unwrap().clear();
    }

    /// Number of stored bookmarks.
    pub fn bookmark_count(&self) -> usize {
        self.bookmarks.read().unwrap().len()
    }

    /// Number of stored snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.read().unwrap().len()
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn find_by_owner_and_url(
        &self,
        owner_id: Uuid,
        url: &str,
    ) -> Result<Option<BookmarkRecord>> {
        Ok(self
            .bookmarks
            .read()
            .unwrap()
            .values()
            .find(|b| b.owner_id == owner_id && b.url == url)
            .cloned())
    }

    async fn insert_bookmark(&self, record: &BookmarkRecord) -> Result<()> {
        self.bookmarks
            .write()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn get_bookmark(&self, id: Uuid) -> Result<Option<BookmarkRecord>> {
        Ok(self.bookmarks.read().unwrap().get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: EnrichmentStatus,
        summary: Option<&str>,
    ) -> Result<()> {
        let mut bookmarks = self.bookmarks.write().unwrap();
        if let Some(record) = bookmarks.get_mut(&id) {
            record.status = status;
            if let Some(summary) = summary {
                record.ai_summary = Some(summary.to_string());
            }
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn try_begin_processing(&self, id: Uuid) -> Result<bool> {
        let mut bookmarks = self.bookmarks.write().unwrap();
        match bookmarks.get_mut(&id) {
            Some(record)
                if matches!(
                    record.status,
                    EnrichmentStatus::Pending | EnrichmentStatus::Failed
                ) =>
            {
                record.status = EnrichmentStatus::Processing;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert_tag(&self, owner_id: Uuid, name: &str) -> Result<Tag> {
        let name = name.trim().to_lowercase();
        let mut tags = self.tags.write().unwrap();
        if let Some(existing) = tags
            .values()
            .find(|t| t.owner_id == owner_id && t.name == name)
        {
            return Ok(existing.clone());
        }
        let tag = Tag {
            id: Uuid::new_v4(),
            owner_id,
            name,
        };
        tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn replace_ai_tags(&self, bookmark_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        let mut associations = self.associations.write().unwrap();
        associations.retain(|a| !(a.bookmark_id == bookmark_id && a.ai_generated));
        for tag_id in tag_ids {
            let already_linked = associations
                .iter()
                .any(|a| a.bookmark_id == bookmark_id && a.tag_id == *tag_id);
            if !already_linked {
                associations.push(TagAssociation {
                    bookmark_id,
                    tag_id: *tag_id,
                    ai_generated: true,
                });
            }
        }
        Ok(())
    }

    async fn tags_for_bookmark(&self, bookmark_id: Uuid) -> Result<Vec<Tag>> {
        let associations = self.associations.read().unwrap();
        let tags = self.tags.read().unwrap();
        Ok(associations
            .iter()
            .filter(|a| a.bookmark_id == bookmark_id)
            .filter_map(|a| tags.get(&a.tag_id).cloned())
            .collect())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn get_snapshot(&self, key: &str) -> Result<Option<PageSnapshot>> {
        Ok(self.snapshots.read().unwrap().get(key).cloned())
    }

    async fn put_snapshot(&self, snapshot: &PageSnapshot) -> Result<()> {
        self.snapshots
            .write()
            .unwrap()
            .insert(snapshot.url.clone(), snapshot.clone());
        Ok(())
    }

    async fn delete_snapshot(&self, key: &str) -> Result<()> {
        self.snapshots.write().unwrap().remove(key);
        Ok(())
    }

    async fn delete_expired(&self, ttl: std::time::Duration) -> Result<usize> {
        let mut snapshots = self.snapshots.write().unwrap();
        let before = snapshots.len();
        snapshots.retain(|_, s| !s.is_stale(ttl));
        Ok(before - snapshots.len())
    }

    async fn clear_snapshots(&self) -> Result<()> {
        self.snapshots.write().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageMetadata;

    #[tokio::test]
    async fn dedupe_lookup_by_owner_and_url() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let record = BookmarkRecord::new(owner, "https://example.com/a", "example.com");
        store.insert_bookmark(&record).await.unwrap();

        let found = store
            .find_by_owner_and_url(owner, "https://example.com/a")
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, record.id);

        let other_owner = store
            .find_by_owner_and_url(Uuid::new_v4(), "https://example.com/a")
            .await
            .unwrap();
        assert!(other_owner.is_none());
    }

    #[tokio::test]
    async fn begin_processing_cas() {
        let store = MemoryStore::new();
        let record = BookmarkRecord::new(Uuid::new_v4(), "https://example.com/a", "example.com");
        store.insert_bookmark(&record).await.unwrap();

        assert!(store.try_begin_processing(record.id).await.unwrap());
        // Second attempt loses while Processing
        assert!(!store.try_begin_processing(record.id).await.unwrap());

        store
            .update_status(record.id, EnrichmentStatus::Failed, None)
            .await
            .unwrap();
        // Failed is retryable
        assert!(store.try_begin_processing(record.id).await.unwrap());
    }

    #[tokio::test]
    async fn upsert_tag_is_case_insensitive() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let a = store.upsert_tag(owner, "Rust").await.unwrap();
        let b = store.upsert_tag(owner, "rust").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.name, "rust");

        let other = store.upsert_tag(Uuid::new_v4(), "rust").await.unwrap();
        assert_ne!(a.id, other.id);
    }

    #[tokio::test]
    async fn replace_ai_tags_preserves_user_tags() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let record = BookmarkRecord::new(owner, "https://example.com/a", "example.com");
        store.insert_bookmark(&record).await.unwrap();

        let user_tag = store.upsert_tag(owner, "keep").await.unwrap();
        store.associations.write().unwrap().push(TagAssociation {
            bookmark_id: record.id,
            tag_id: user_tag.id,
            ai_generated: false,
        });

        let ai1 = store.upsert_tag(owner, "old-ai").await.unwrap();
        store.replace_ai_tags(record.id, &[ai1.id]).await.unwrap();

        let ai2 = store.upsert_tag(owner, "new-ai").await.unwrap();
        store.replace_ai_tags(record.id, &[ai2.id]).await.unwrap();

        let names: Vec<String> = store
            .tags_for_bookmark(record.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert!(names.contains(&"keep".to_string()));
        assert!(names.contains(&"new-ai".to_string()));
        assert!(!names.contains(&"old-ai".to_string()));
    }

    #[tokio::test]
    async fn snapshot_expiry_sweep() {
        let store = MemoryStore::new();
        let mut old = PageSnapshot::new("https://example.com/old", PageMetadata::default(), "");
        old.captured_at = Utc::now() - chrono::Duration::hours(2);
        let fresh = PageSnapshot::new("https://example.com/fresh", PageMetadata::default(), "");

        store.put_snapshot(&old).await.unwrap();
        store.put_snapshot(&fresh).await.unwrap();

        let removed = store
            .delete_expired(std::time::Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .get_snapshot("https://example.com/fresh")
            .await
            .unwrap()
            .is_some());
    }
}
