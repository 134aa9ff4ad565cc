//! Ingestion orchestration: submit, status, retry, background enrichment.

pub mod submit;
pub mod worker;

pub use submit::IngestionPipeline;
pub use worker::{spawn_worker, EnrichJob, EnrichmentQueue};
