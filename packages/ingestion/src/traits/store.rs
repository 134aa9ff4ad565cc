//! Persistence ports.
//!
//! The pipeline does not own a database; it consumes these narrow ports and
//! leaves transaction semantics to the implementing layer. Split into
//! focused traits so the snapshot cache can be backed independently of the
//! bookmark table.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{BookmarkRecord, EnrichmentStatus, PageSnapshot, Tag};

/// CRUD surface over bookmark records and their tag associations.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Look up a bookmark by owner and normalized URL (the dedupe path).
    async fn find_by_owner_and_url(
        &self,
        owner_id: Uuid,
        url: &str,
    ) -> Result<Option<BookmarkRecord>>;

    /// Persist a new record.
    async fn insert_bookmark(&self, record: &BookmarkRecord) -> Result<()>;

    /// Fetch a record by ID.
    async fn get_bookmark(&self, id: Uuid) -> Result<Option<BookmarkRecord>>;

    /// Set enrichment status; `summary` of `Some` also replaces the AI summary.
    async fn update_status(
        &self,
        id: Uuid,
        status: EnrichmentStatus,
        summary: Option<&str>,
    ) -> Result<()>;

    /// Compare-and-swap into `Processing`.
    ///
    /// Succeeds only from `Pending` or `Failed`; returns false when another
    /// run already holds the transition. This is the advisory lock that
    /// serializes concurrent enrichment triggers for one bookmark.
    async fn try_begin_processing(&self, id: Uuid) -> Result<bool>;

    /// Find or create the owner's tag for a lowercased name.
    async fn upsert_tag(&self, owner_id: Uuid, name: &str) -> Result<Tag>;

    /// Replace all AI-generated associations for a bookmark with `tag_ids`.
    ///
    /// User-supplied associations are untouched; a tag already linked by the
    /// user is not double-linked.
    async fn replace_ai_tags(&self, bookmark_id: Uuid, tag_ids: &[Uuid]) -> Result<()>;

    /// Tags currently linked to a bookmark.
    async fn tags_for_bookmark(&self, bookmark_id: Uuid) -> Result<Vec<Tag>>;
}

/// Keyed store for fetched page snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Get a snapshot by normalized URL.
    async fn get_snapshot(&self, key: &str) -> Result<Option<PageSnapshot>>;

    /// Upsert a snapshot under its normalized URL.
    async fn put_snapshot(&self, snapshot: &PageSnapshot) -> Result<()>;

    /// Delete a snapshot by key.
    async fn delete_snapshot(&self, key: &str) -> Result<()>;

    /// Delete all snapshots older than `ttl`; returns the count removed.
    async fn delete_expired(&self, ttl: std::time::Duration) -> Result<usize>;

    /// Delete everything (testing/admin).
    async fn clear_snapshots(&self) -> Result<()>;
}
