//! Bookmark records, tags, and enrichment result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::metadata::{Language, PageSnapshot};

/// Lifecycle of a bookmark's AI enrichment.
///
/// Created `Pending`; moved `Processing` -> `Completed`/`Failed` exclusively
/// by the enrichment service. `Failed` is terminal for automatic processing
/// only; a manual retry re-enters `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A stored bookmark.
///
/// Invariant: (owner_id, url) is unique, with `url` already normalized --
/// duplicate submissions resolve to the existing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Normalized canonical URL
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub language: Language,
    pub status: EnrichmentStatus,
    pub ai_summary: Option<String>,
    /// Readable text captured at ingest time, used as enrichment input
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookmarkRecord {
    /// Create a pending record with no metadata (fetch failed or skipped).
    pub fn new(owner_id: Uuid, url: impl Into<String>, domain: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            url: url.into(),
            domain: domain.into(),
            title: None,
            description: None,
            thumbnail_url: None,
            favicon_url: None,
            language: Language::Unknown,
            status: EnrichmentStatus::Pending,
            ai_summary: None,
            content: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Populate metadata fields from a page snapshot.
    pub fn with_snapshot(mut self, snapshot: &PageSnapshot) -> Self {
        self.title = snapshot.metadata.title.clone();
        self.description = snapshot.metadata.description.clone();
        self.thumbnail_url = snapshot.metadata.thumbnail_url.clone();
        self.favicon_url = snapshot.metadata.favicon_url.clone();
        self.language = snapshot.language();
        self.content = snapshot.text.clone();
        self
    }
}

/// A per-owner tag, unique by lowercased name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Lowercased, trimmed
    pub name: String,
}

/// Links a bookmark to a tag.
///
/// Invariant: at most one association per (bookmark, tag) pair. AI-generated
/// associations are replaced wholesale on each successful enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagAssociation {
    pub bookmark_id: Uuid,
    pub tag_id: Uuid,
    pub ai_generated: bool,
}

/// Outcome of an enrichment run.
///
/// `success` is true whenever the bookmark ends up with *some* summary,
/// including the heuristic fallback path; `used_fallback` distinguishes the
/// two. `retry_count` is the number of extra attempts the retry wrapper
/// consumed (always 0 on the plain path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub success: bool,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub used_fallback: bool,
    pub retry_count: u32,
}

impl EnrichmentResult {
    /// A model-backed completion.
    pub fn completed(summary: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            success: true,
            summary: Some(summary.into()),
            tags,
            used_fallback: false,
            retry_count: 0,
        }
    }

    /// A heuristic fallback completion.
    pub fn fallback(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: Some(summary.into()),
            tags: Vec::new(),
            used_fallback: true,
            retry_count: 0,
        }
    }

    /// Another run currently holds the processing lock.
    pub fn in_flight() -> Self {
        Self {
            success: false,
            summary: None,
            tags: Vec::new(),
            used_fallback: false,
            retry_count: 0,
        }
    }

    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// Poll target for clients waiting on enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentStatusReport {
    pub status: EnrichmentStatus,
    pub summary: Option<String>,
    pub quota_limit: u32,
    pub quota_remaining: u32,
    /// Epoch seconds at which the oldest quota bucket expires
    pub quota_reset_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::metadata::PageMetadata;

    #[test]
    fn record_starts_pending_and_empty() {
        let record = BookmarkRecord::new(Uuid::new_v4(), "https://example.com/a", "example.com");
        assert_eq!(record.status, EnrichmentStatus::Pending);
        assert!(record.title.is_none());
        assert!(record.ai_summary.is_none());
    }

    #[test]
    fn with_snapshot_copies_metadata() {
        let mut meta = PageMetadata::default();
        meta.title = Some("A Title".into());
        meta.description = Some("About things".into());
        let snap = PageSnapshot::new("https://example.com/a", meta, "<html>");

        let record = BookmarkRecord::new(Uuid::new_v4(), "https://example.com/a", "example.com")
            .with_snapshot(&snap);
        assert_eq!(record.title.as_deref(), Some("A Title"));
        assert_eq!(record.description.as_deref(), Some("About things"));
    }
}
