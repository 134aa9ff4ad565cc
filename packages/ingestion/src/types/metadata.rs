//! Page metadata, snapshots, and extracted content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Declared or detected page language.
///
/// The pipeline only distinguishes the two languages it can prompt in;
/// everything else is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
    #[default]
    Unknown,
}

impl Language {
    /// Parse a BCP-47-ish tag ("en", "en-US", "zh-CN") into a supported value.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        if tag == "zh" || tag.starts_with("zh-") {
            Self::Zh
        } else if tag == "en" || tag.starts_with("en-") {
            Self::En
        } else {
            Self::Unknown
        }
    }

    /// Two-letter code, or "unknown".
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Metadata extracted from a fetched HTML document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    /// og:title > twitter:title > <title>
    pub title: Option<String>,

    /// og:description > twitter:description > meta description
    pub description: Option<String>,

    /// og:image > twitter:image, resolved against the final URL
    pub thumbnail_url: Option<String>,

    /// link[rel~=icon], else /favicon.ico, resolved against the final URL
    pub favicon_url: Option<String>,

    /// html[lang] or content-language meta
    #[serde(default)]
    pub language: Language,

    /// link[rel=canonical]
    pub canonical_url: Option<String>,

    /// meta author
    pub author: Option<String>,

    /// article:published_time, kept as declared
    pub published_at: Option<String>,

    /// og:site_name
    pub site_name: Option<String>,
}

/// A fetched page: metadata plus the raw HTML it came from.
///
/// The HTML is kept so the content extractor can run on the same bytes
/// without a second fetch; it is never persisted.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub metadata: PageMetadata,
    pub html: String,
    /// URL after redirects, used to resolve relative asset links
    pub final_url: Url,
}

/// Readable content isolated from a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub title: Option<String>,
    /// Whitespace-normalized body text, truncated at a word boundary
    pub text: String,
    pub excerpt: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    /// Character count of `text`
    pub length: usize,
    pub language: Language,
}

/// Cached result of a fetch+extract pass, keyed by normalized URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Normalized URL (the cache key)
    pub url: String,

    pub metadata: PageMetadata,

    /// Readable text, when the page was extractable
    pub text: Option<String>,

    /// Detected content language (declared language lives in `metadata`)
    #[serde(default)]
    pub detected_language: Language,

    /// SHA-256 of the raw HTML the snapshot was built from
    pub content_hash: String,

    pub captured_at: DateTime<Utc>,
}

impl PageSnapshot {
    /// Build a snapshot from a fetch+extract pass.
    pub fn new(url: impl Into<String>, metadata: PageMetadata, html: &str) -> Self {
        Self {
            url: url.into(),
            metadata,
            text: None,
            detected_language: Language::Unknown,
            content_hash: Self::hash_content(html),
            captured_at: Utc::now(),
        }
    }

    /// Attach extracted readable text.
    pub fn with_text(mut self, content: &ExtractedContent) -> Self {
        self.detected_language = content.language;
        self.text = Some(content.text.clone());
        self
    }

    /// Calculate SHA-256 hash of content.
    pub fn hash_content(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Check if the snapshot is older than the TTL.
    pub fn is_stale(&self, ttl: std::time::Duration) -> bool {
        let age = Utc::now() - self.captured_at;
        age > chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero())
    }

    /// Best language guess: declared wins over detected.
    pub fn language(&self) -> Language {
        if self.metadata.language.is_known() {
            self.metadata.language
        } else {
            self.detected_language
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_tag() {
        assert_eq!(Language::from_tag("en"), Language::En);
        assert_eq!(Language::from_tag("en-US"), Language::En);
        assert_eq!(Language::from_tag("zh-CN"), Language::Zh);
        assert_eq!(Language::from_tag("ZH"), Language::Zh);
        assert_eq!(Language::from_tag("fr"), Language::Unknown);
        assert_eq!(Language::from_tag(""), Language::Unknown);
    }

    #[test]
    fn snapshot_hash_and_staleness() {
        let snap = PageSnapshot::new("https://example.com/a", PageMetadata::default(), "<html>");
        assert_eq!(snap.content_hash.len(), 64);
        assert!(!snap.is_stale(std::time::Duration::from_secs(3600)));

        let mut old = snap.clone();
        old.captured_at = Utc::now() - chrono::Duration::hours(2);
        assert!(old.is_stale(std::time::Duration::from_secs(3600)));
    }

    #[test]
    fn snapshot_language_prefers_declared() {
        let mut meta = PageMetadata::default();
        meta.language = Language::Zh;
        let mut snap = PageSnapshot::new("k", meta, "");
        snap.detected_language = Language::En;
        assert_eq!(snap.language(), Language::Zh);

        snap.metadata.language = Language::Unknown;
        assert_eq!(snap.language(), Language::En);
    }
}
