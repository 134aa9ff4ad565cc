//! Typed errors for the ingestion pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Top-level errors surfaced to callers of the pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Bad input that is not a security concern (4xx-class, never retried)
    #[error("validation failed: {0}")]
    Validation(String),

    /// SSRF or protocol violation (4xx-class, never retried)
    #[error("security rejection: {0}")]
    Security(#[from] SecurityError),

    /// Throughput or quota limit exceeded; retry only after `reset_at`
    #[error("rate limited on {action}: limit {limit}, retry after {reset_at}")]
    RateLimited {
        /// Which policy denied the request
        action: &'static str,
        /// Configured limit for the window
        limit: u32,
        /// Remaining units (always 0 when denied)
        remaining: u32,
        /// Epoch seconds at which the window frees up
        reset_at: i64,
    },

    /// Outbound fetch failed; the bookmark is still created without metadata
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Model call failed; always resolved via fallback, never left unresolved
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Storage operation failed (hard failure, owned by the persistence layer)
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Bookmark does not exist or belongs to another owner
    #[error("bookmark not found: {id}")]
    NotFound { id: uuid::Uuid },
}

impl IngestError {
    /// Wrap an arbitrary storage-layer error.
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage(err.into())
    }
}

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL exceeds the maximum accepted length
    #[error("URL too long: {len} characters")]
    TooLong { len: usize },

    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// URL carries user:pass@ credentials
    #[error("URL contains embedded credentials")]
    EmbeddedCredentials,

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// Host is blocked (e.g., localhost, metadata services)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in a blocked range (private, loopback, link-local, reserved)
    #[error("blocked IP range: {0}")]
    BlockedRange(String),

    /// Hostname matches an internal-looking pattern (.local, intranet., ...)
    #[error("internal hostname pattern: {0}")]
    InternalHost(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Errors from the bounded metadata fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Wall-clock timeout exceeded
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Redirect chain exceeded the hop cap
    #[error("too many redirects: {url}")]
    TooManyRedirects { url: String },

    /// Response content type is not in the allow-list
    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    /// Declared or actual body size exceeds the cap
    #[error("content too large: {bytes} bytes (max {limit})")]
    ContentTooLarge { bytes: u64, limit: u64 },

    /// Non-success HTTP status
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the external language model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model call exceeded its timeout
    #[error("model call timed out")]
    Timeout,

    /// Provider returned an error or unusable payload
    #[error("model provider error: {0}")]
    Provider(String),

    /// Provider returned no content
    #[error("empty model response")]
    EmptyResponse,

    /// Client is not configured (missing API key)
    #[error("model config error: {0}")]
    Config(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for security validation.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
