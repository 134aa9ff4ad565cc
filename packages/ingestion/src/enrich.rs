//! AI enrichment: quota-gated summarization and tagging with fallback.
//!
//! The external contract is that a bookmark never ends up with no summary
//! and no recorded attempt: every run terminates in `Completed` (model
//! success) or `Failed` with a heuristic fallback summary. Quota is charged
//! exactly once per model-backed completion and never for fallbacks.
//!
//! Concurrent triggers for one bookmark serialize on the store's
//! status-conditioned compare-and-swap into `Processing`; the loser returns
//! an in-flight result instead of racing.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ai::{build_prompt, parse_model_response, EnrichmentOutput, ModelVerdict};
use crate::error::{IngestError, Result};
use crate::extractor::detect_language;
use crate::limiter::{RatePolicy, SlidingWindowLimiter};
use crate::traits::{model::LanguageModel, store::BookmarkStore};
use crate::types::{BookmarkRecord, EnrichConfig, EnrichmentResult, EnrichmentStatus};

/// Quota-enforcing enrichment service.
pub struct EnrichmentService<S, M> {
    store: Arc<S>,
    model: Arc<M>,
    limiter: Arc<SlidingWindowLimiter>,
    config: EnrichConfig,
}

impl<S, M> EnrichmentService<S, M>
where
    S: BookmarkStore,
    M: LanguageModel,
{
    pub fn new(
        store: Arc<S>,
        model: Arc<M>,
        limiter: Arc<SlidingWindowLimiter>,
        config: EnrichConfig,
    ) -> Self {
        Self {
            store,
            model,
            limiter,
            config,
        }
    }

    /// The AI quota policy in effect.
    pub fn quota_policy(&self) -> RatePolicy {
        RatePolicy::ai_quota(self.config.daily_quota)
    }

    /// Run one enrichment pass; failures fall back immediately.
    pub async fn enrich(&self, bookmark_id: Uuid, owner_id: Uuid) -> Result<EnrichmentResult> {
        self.process(bookmark_id, owner_id, 0).await
    }

    /// Explicit retry: extra attempts with a cooperative wait between them.
    ///
    /// A quota-exceeded result aborts the loop immediately since retrying
    /// cannot help; all other failures are retried until attempts run out,
    /// then the fallback applies.
    pub async fn retry(&self, bookmark_id: Uuid, owner_id: Uuid) -> Result<EnrichmentResult> {
        self.process(bookmark_id, owner_id, self.config.retry_attempts)
            .await
    }

    async fn process(
        &self,
        bookmark_id: Uuid,
        owner_id: Uuid,
        extra_attempts: u32,
    ) -> Result<EnrichmentResult> {
        let record = self
            .store
            .get_bookmark(bookmark_id)
            .await?
            .filter(|r| r.owner_id == owner_id)
            .ok_or(IngestError::NotFound { id: bookmark_id })?;

        if record.status == EnrichmentStatus::Completed {
            debug!(bookmark = %bookmark_id, "already completed, skipping enrichment");
            let tags = self.tag_names(bookmark_id).await?;
            return Ok(EnrichmentResult {
                success: true,
                summary: record.ai_summary.clone(),
                tags,
                used_fallback: false,
                retry_count: 0,
            });
        }

        let policy = self.quota_policy();
        let subject = owner_id.to_string();
        let quota = self.limiter.peek(&subject, &policy);
        if !quota.allowed {
            return Err(IngestError::RateLimited {
                action: policy.action,
                limit: policy.limit,
                remaining: 0,
                reset_at: quota.reset_at,
            });
        }

        if !self.store.try_begin_processing(bookmark_id).await? {
            debug!(bookmark = %bookmark_id, "enrichment already in flight");
            return Ok(EnrichmentResult::in_flight());
        }

        let input = nonempty(record.description.as_deref())
            .or_else(|| nonempty(record.content.as_deref()))
            .or_else(|| nonempty(record.title.as_deref()))
            .map(String::from);

        let Some(input) = input else {
            // Nothing to summarize at all
            return self.apply_fallback(&record, 0).await;
        };

        let language = if record.language.is_known() {
            record.language
        } else {
            detect_language(&input)
        };
        let (system, user) = build_prompt(language, record.title.as_deref(), &input);

        let mut retries_used = 0u32;
        loop {
            match self.attempt(&system, &user).await {
                Ok(output) => {
                    return self.finish_success(&record, output, retries_used).await;
                }
                Err(reason) => {
                    warn!(
                        bookmark = %bookmark_id,
                        attempt = retries_used + 1,
                        error = %reason,
                        "model enrichment attempt failed"
                    );
                    if retries_used >= extra_attempts {
                        return self.apply_fallback(&record, retries_used).await;
                    }
                    retries_used += 1;
                    tokio::time::sleep(self.config.retry_delay).await;

                    let quota = self.limiter.peek(&subject, &policy);
                    if !quota.allowed {
                        // Release the advisory lock before surfacing
                        self.store
                            .update_status(bookmark_id, EnrichmentStatus::Failed, None)
                            .await?;
                        return Err(IngestError::RateLimited {
                            action: policy.action,
                            limit: policy.limit,
                            remaining: 0,
                            reset_at: quota.reset_at,
                        });
                    }
                }
            }
        }
    }

    /// One model call under the hard timeout, parsed and validated.
    ///
    /// Parse and validation failures collapse into the same error shape as
    /// transport failures.
    async fn attempt(&self, system: &str, user: &str) -> std::result::Result<EnrichmentOutput, String> {
        let raw = match tokio::time::timeout(
            self.config.model_timeout,
            self.model.complete(system, user),
        )
        .await
        {
            Err(_) => return Err("model call timed out".to_string()),
            Ok(Err(e)) => return Err(e.to_string()),
            Ok(Ok(raw)) => raw,
        };

        match parse_model_response(&raw) {
            ModelVerdict::Valid(output) => Ok(output),
            ModelVerdict::Invalid(reason) => Err(reason),
        }
    }

    async fn finish_success(
        &self,
        record: &BookmarkRecord,
        output: EnrichmentOutput,
        retries_used: u32,
    ) -> Result<EnrichmentResult> {
        let mut tag_ids = Vec::new();
        let mut tag_names = Vec::new();
        for name in &output.tags {
            let tag = self.store.upsert_tag(record.owner_id, name).await?;
            if !tag_ids.contains(&tag.id) {
                tag_ids.push(tag.id);
                tag_names.push(tag.name);
            }
        }
        self.store.replace_ai_tags(record.id, &tag_ids).await?;
        self.store
            .update_status(
                record.id,
                EnrichmentStatus::Completed,
                Some(output.summary.as_str()),
            )
            .await?;

        // The only place quota is charged
        self.limiter
            .commit(&record.owner_id.to_string(), &self.quota_policy());

        info!(
            bookmark = %record.id,
            tags = tag_names.len(),
            retries = retries_used,
            "enrichment completed"
        );
        Ok(EnrichmentResult::completed(output.summary, tag_names).with_retries(retries_used))
    }

    async fn apply_fallback(
        &self,
        record: &BookmarkRecord,
        retries_used: u32,
    ) -> Result<EnrichmentResult> {
        let summary = nonempty(record.description.as_deref())
            .or_else(|| nonempty(record.content.as_deref()))
            .map(|s| truncate_chars(s, self.config.fallback_truncate))
            .unwrap_or_default();

        self.store.replace_ai_tags(record.id, &[]).await?;
        self.store
            .update_status(record.id, EnrichmentStatus::Failed, Some(summary.as_str()))
            .await?;

        info!(
            bookmark = %record.id,
            retries = retries_used,
            summary_len = summary.chars().count(),
            "enrichment fell back to heuristic summary"
        );
        Ok(EnrichmentResult::fallback(summary).with_retries(retries_used))
    }

    async fn tag_names(&self, bookmark_id: Uuid) -> Result<Vec<String>> {
        Ok(self
            .store
            .tags_for_bookmark(bookmark_id)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect())
    }
}

fn nonempty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::MockModel;
    use std::time::Duration;

    const VALID_RESPONSE: &str = r#"{"summary": "A thorough summary of the saved page, long enough to pass validation.", "tags": ["rust", "testing"], "language": "en"}"#;

    fn service(
        store: Arc<MemoryStore>,
        model: MockModel,
        quota: u32,
    ) -> EnrichmentService<MemoryStore, MockModel> {
        EnrichmentService::new(
            store,
            Arc::new(model),
            Arc::new(SlidingWindowLimiter::new()),
            EnrichConfig::default()
                .with_daily_quota(quota)
                .with_retry_delay(Duration::from_millis(1)),
        )
    }

    async fn seeded_record(store: &MemoryStore, description: Option<&str>) -> BookmarkRecord {
        let mut record =
            BookmarkRecord::new(Uuid::new_v4(), "https://example.com/a", "example.com");
        record.title = Some("Example".to_string());
        record.description = description.map(String::from);
        store.insert_bookmark(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn model_success_completes_and_tags() {
        let store = Arc::new(MemoryStore::new());
        let record = seeded_record(&store, Some("About rust testing.")).await;
        let svc = service(Arc::clone(&store), MockModel::with_response(VALID_RESPONSE), 20);

        let result = svc.enrich(record.id, record.owner_id).await.unwrap();
        assert!(result.success);
        assert!(!result.used_fallback);
        assert_eq!(result.tags, vec!["rust", "testing"]);

        let stored = store.get_bookmark(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EnrichmentStatus::Completed);
        assert!(stored.ai_summary.is_some());
    }

    #[tokio::test]
    async fn model_failure_falls_back_but_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let description = "A description that should seed the fallback summary.";
        let record = seeded_record(&store, Some(description)).await;
        let svc = service(Arc::clone(&store), MockModel::failing(), 20);

        let result = svc.enrich(record.id, record.owner_id).await.unwrap();
        assert!(result.success);
        assert!(result.used_fallback);
        assert_eq!(result.summary.as_deref(), Some(description));
        assert!(result.tags.is_empty());

        let stored = store.get_bookmark(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EnrichmentStatus::Failed);
    }

    #[tokio::test]
    async fn invalid_output_is_treated_as_failure() {
        let store = Arc::new(MemoryStore::new());
        let record = seeded_record(&store, Some("Some description here.")).await;
        let svc = service(
            Arc::clone(&store),
            MockModel::with_response(r#"{"summary": "x", "tags": [], "language": "en"}"#),
            20,
        );

        let result = svc.enrich(record.id, record.owner_id).await.unwrap();
        assert!(result.used_fallback);
    }

    #[tokio::test]
    async fn no_content_at_all_yields_empty_fallback() {
        let store = Arc::new(MemoryStore::new());
        let mut record =
            BookmarkRecord::new(Uuid::new_v4(), "https://example.com/bare", "example.com");
        record.title = None;
        store.insert_bookmark(&record).await.unwrap();
        let svc = service(Arc::clone(&store), MockModel::with_response(VALID_RESPONSE), 20);

        let result = svc.enrich(record.id, record.owner_id).await.unwrap();
        assert!(result.success);
        assert!(result.used_fallback);
        assert_eq!(result.summary.as_deref(), Some(""));
        // The model was never called
        assert_eq!(svc.model.calls(), 0);
    }

    #[tokio::test]
    async fn quota_exceeded_returns_rate_limited_without_state_change() {
        let store = Arc::new(MemoryStore::new());
        let record = seeded_record(&store, Some("Some description here.")).await;
        let svc = service(Arc::clone(&store), MockModel::with_response(VALID_RESPONSE), 0);

        let err = svc.enrich(record.id, record.owner_id).await.unwrap_err();
        assert!(matches!(err, IngestError::RateLimited { .. }));

        let stored = store.get_bookmark(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EnrichmentStatus::Pending);
    }

    #[tokio::test]
    async fn quota_charged_once_per_model_success_and_never_on_fallback() {
        let store = Arc::new(MemoryStore::new());
        let limiter = Arc::new(SlidingWindowLimiter::new());
        let config = EnrichConfig::default().with_retry_delay(Duration::from_millis(1));

        let record = seeded_record(&store, Some("Some description here.")).await;
        let svc = EnrichmentService::new(
            Arc::clone(&store),
            Arc::new(MockModel::with_response(VALID_RESPONSE)),
            Arc::clone(&limiter),
            config.clone(),
        );
        svc.enrich(record.id, record.owner_id).await.unwrap();

        let subject = record.owner_id.to_string();
        assert_eq!(limiter.peek(&subject, &svc.quota_policy()).remaining, 19);

        // A fallback run on another bookmark of the same owner must not charge
        let mut other =
            BookmarkRecord::new(record.owner_id, "https://example.com/other", "example.com");
        other.description = Some("Another description.".to_string());
        store.insert_bookmark(&other).await.unwrap();

        let failing = EnrichmentService::new(
            Arc::clone(&store),
            Arc::new(MockModel::failing()),
            Arc::clone(&limiter),
            config,
        );
        failing.enrich(other.id, other.owner_id).await.unwrap();
        assert_eq!(limiter.peek(&subject, &svc.quota_policy()).remaining, 19);
    }

    #[tokio::test]
    async fn completed_bookmark_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let record = seeded_record(&store, Some("Some description here.")).await;
        store
            .update_status(record.id, EnrichmentStatus::Completed, Some("done"))
            .await
            .unwrap();

        let svc = service(Arc::clone(&store), MockModel::with_response(VALID_RESPONSE), 20);
        let result = svc.enrich(record.id, record.owner_id).await.unwrap();
        assert!(result.success);
        assert_eq!(result.summary.as_deref(), Some("done"));
        assert_eq!(svc.model.calls(), 0);
    }

    #[tokio::test]
    async fn retry_consumes_attempts_then_falls_back() {
        let store = Arc::new(MemoryStore::new());
        let record = seeded_record(&store, Some("Some description here.")).await;
        let svc = service(Arc::clone(&store), MockModel::failing(), 20);

        let result = svc.retry(record.id, record.owner_id).await.unwrap();
        assert!(result.used_fallback);
        assert_eq!(result.retry_count, 2);
        // 1 initial + 2 retries
        assert_eq!(svc.model.calls(), 3);
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failure() {
        let store = Arc::new(MemoryStore::new());
        let record = seeded_record(&store, Some("Some description here.")).await;
        let model = MockModel::failing_then(VALID_RESPONSE, 1);
        let svc = service(Arc::clone(&store), model, 20);

        let result = svc.retry(record.id, record.owner_id).await.unwrap();
        assert!(result.success);
        assert!(!result.used_fallback);
        assert_eq!(result.retry_count, 1);
    }

    #[tokio::test]
    async fn wrong_owner_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let record = seeded_record(&store, None).await;
        let svc = service(Arc::clone(&store), MockModel::with_response(VALID_RESPONSE), 20);

        let err = svc.enrich(record.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, IngestError::NotFound { .. }));
    }
}
