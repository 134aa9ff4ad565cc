//! Port traits consumed by the pipeline.

pub mod fetch;
pub mod model;
pub mod store;

pub use fetch::PageFetcher;
pub use model::LanguageModel;
pub use store::{BookmarkStore, SnapshotStore};
