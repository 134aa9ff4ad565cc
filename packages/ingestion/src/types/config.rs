//! Configuration for the ingestion pipeline.

use std::time::Duration;

/// Bounds for the metadata fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Descriptive User-Agent sent with every fetch
    pub user_agent: String,

    /// Accept-Language header value
    pub accept_language: String,

    /// Wall-clock limit for the whole request, body included
    pub timeout: Duration,

    /// Redirect hop cap; host-changing redirects count too
    pub max_redirects: usize,

    /// Cap on declared and actual body size, in bytes
    pub max_content_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "LinkhiveBot/1.0 (+https://linkhive.app/bot)".to_string(),
            accept_language: "en-US,en;q=0.8,zh-CN;q=0.6".to_string(),
            timeout: Duration::from_secs(5),
            max_redirects: 3,
            max_content_bytes: 5 * 1024 * 1024,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the body size cap.
    pub fn with_max_content_bytes(mut self, bytes: u64) -> Self {
        self.max_content_bytes = bytes;
        self
    }
}

/// Knobs for the enrichment service.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Hard timeout on a single model call
    pub model_timeout: Duration,

    /// Rolling 24h cap on model-backed completions per user
    pub daily_quota: u32,

    /// Extra attempts the retry wrapper may consume
    pub retry_attempts: u32,

    /// Cooperative wait between retry attempts
    pub retry_delay: Duration,

    /// Character cap on heuristic fallback summaries
    pub fallback_truncate: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(10),
            daily_quota: 20,
            retry_attempts: 2,
            retry_delay: Duration::from_secs(30),
            fallback_truncate: 200,
        }
    }
}

impl EnrichConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the daily model-call quota.
    pub fn with_daily_quota(mut self, quota: u32) -> Self {
        self.daily_quota = quota;
        self
    }

    /// Set the retry delay (tests shrink this).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the number of extra retry attempts.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub enrich: EnrichConfig,

    /// Snapshot cache TTL
    pub cache_ttl: Duration,

    /// Bookmark creations allowed per `create_window` per owner
    pub create_limit: u32,
    pub create_window: Duration,

    /// Depth of the background enrichment queue; overflow is dropped
    pub worker_queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            enrich: EnrichConfig::default(),
            cache_ttl: Duration::from_secs(3600),
            create_limit: 10,
            create_window: Duration::from_secs(60),
            worker_queue_depth: 64,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_enrich(mut self, enrich: EnrichConfig) -> Self {
        self.enrich = enrich;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_create_limit(mut self, limit: u32, window: Duration) -> Self {
        self.create_limit = limit;
        self.create_window = window;
        self
    }
}
