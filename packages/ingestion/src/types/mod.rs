//! Domain types for the ingestion pipeline.

pub mod bookmark;
pub mod config;
pub mod metadata;

pub use bookmark::{
    BookmarkRecord, EnrichmentResult, EnrichmentStatus, EnrichmentStatusReport, Tag,
    TagAssociation,
};
pub use config::{EnrichConfig, FetchConfig, PipelineConfig};
pub use metadata::{ExtractedContent, FetchedPage, Language, PageMetadata, PageSnapshot};
