//! Bookmark Ingestion & AI Enrichment Pipeline
//!
//! Takes a user-submitted URL, validates it against SSRF targets, fetches
//! and parses the page under hard bounds, extracts readable content, and
//! enriches the resulting bookmark with a model-written summary and tags --
//! caching, rate limiting, retrying, and falling back at every step.
//!
//! # Design
//!
//! - Validation and normalization are pure and lexical ([`security`]).
//! - The fetch path is bounded in time, redirects, content type, and size
//!   ([`fetcher`]), and cached by normalized URL with a 1 hour TTL
//!   ([`cache`]).
//! - Enrichment is quota-gated and always terminates with a summary: model
//!   success completes the bookmark, any failure resolves to a heuristic
//!   fallback ([`enrich`]).
//! - Persistence is an injected port ([`traits`]); an in-memory
//!   implementation ships for tests and development ([`stores`]).
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ingestion::{IngestionPipeline, MemoryStore, MetadataFetcher, OpenAiModel, PipelineConfig};
//!
//! let store = Arc::new(MemoryStore::new());
//! let model = Arc::new(OpenAiModel::from_env()?);
//! let fetcher = Arc::new(MetadataFetcher::default());
//! let pipeline = IngestionPipeline::new(store, model, fetcher, PipelineConfig::default());
//!
//! let record = pipeline.submit_url(owner_id, "https://example.com/article").await?;
//! // record is Pending with metadata; enrichment continues in the background
//! let status = pipeline.enrichment_status(record.id, owner_id).await?;
//! ```

pub mod ai;
pub mod cache;
pub mod enrich;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod limiter;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{FetchError, IngestError, ModelError, SecurityError};
pub use traits::{
    fetch::PageFetcher,
    model::LanguageModel,
    store::{BookmarkStore, SnapshotStore},
};
pub use types::{
    BookmarkRecord, EnrichConfig, EnrichmentResult, EnrichmentStatus, EnrichmentStatusReport,
    ExtractedContent, FetchConfig, FetchedPage, Language, PageMetadata, PageSnapshot,
    PipelineConfig, Tag, TagAssociation,
};

// Components
pub use ai::{parse_model_response, EnrichmentOutput, ModelVerdict, OpenAiModel};
pub use cache::FetchCache;
pub use enrich::EnrichmentService;
pub use extractor::{detect_language, extract, is_extractable};
pub use fetcher::{extract_metadata, MetadataFetcher};
pub use limiter::{RateLimitDecision, RatePolicy, SlidingWindowLimiter};
pub use pipeline::{EnrichJob, EnrichmentQueue, IngestionPipeline};
pub use security::{normalize, UrlValidator};
pub use stores::MemoryStore;
