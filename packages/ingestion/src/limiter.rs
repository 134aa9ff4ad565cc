//! Keyed sliding-window rate limiter.
//!
//! Backs both bookmark-creation throttling and the daily AI quota. State is
//! process-local and resets on restart; limits here are a courtesy/cost
//! control, not a correctness guarantee.
//!
//! Three operations with distinct consumption semantics:
//! - [`SlidingWindowLimiter::check`] prunes, sums, and on admission appends
//!   a pre-accounted bucket -- the creation-throttle path.
//! - [`SlidingWindowLimiter::peek`] computes the same decision without
//!   consuming -- the quota-inspection path, since AI quota is charged only
//!   after a successful model-backed enrichment.
//! - [`SlidingWindowLimiter::commit`] records one unit of consumption --
//!   called exactly once per model-backed completion, never on fallback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A named limit over a sliding window.
#[derive(Debug, Clone)]
pub struct RatePolicy {
    pub action: &'static str,
    pub limit: u32,
    pub window: Duration,
}

impl RatePolicy {
    /// Bookmark creation throttle: 10 per minute.
    pub fn bookmark_create() -> Self {
        Self {
            action: "bookmark_create",
            limit: 10,
            window: Duration::from_secs(60),
        }
    }

    /// AI enrichment quota: `limit` per rolling 24 hours.
    pub fn ai_quota(limit: u32) -> Self {
        Self {
            action: "ai_quota",
            limit,
            window: Duration::from_secs(24 * 3600),
        }
    }
}

/// Outcome of a limiter check, machine-readable so callers can back off
/// and render countdowns.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Epoch seconds at which the oldest active bucket expires
    pub reset_at: i64,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    expires_at: DateTime<Utc>,
}

type Window = Arc<Mutex<Vec<Bucket>>>;

/// Process-wide sliding-window counters keyed by (subject, action).
///
/// Each key owns its own mutex so unrelated subjects never serialize; the
/// outer map lock is held only long enough to clone the window handle.
#[derive(Default)]
pub struct SlidingWindowLimiter {
    windows: RwLock<HashMap<(String, &'static str), Window>>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and, on admission, consume one unit.
    pub fn check(&self, subject: &str, policy: &RatePolicy) -> RateLimitDecision {
        self.check_at(subject, policy, Utc::now())
    }

    /// Compute the decision without consuming.
    pub fn peek(&self, subject: &str, policy: &RatePolicy) -> RateLimitDecision {
        self.peek_at(subject, policy, Utc::now())
    }

    /// Record one unit of consumption.
    pub fn commit(&self, subject: &str, policy: &RatePolicy) {
        self.commit_at(subject, policy, Utc::now())
    }

    /// Drop expired buckets and empty windows; returns removed window count.
    pub fn prune(&self) -> usize {
        let now = Utc::now();
        let mut windows = self.windows.write().unwrap();
        let before = windows.len();
        windows.retain(|_, window| {
            let mut buckets = window.lock().unwrap();
            buckets.retain(|b| b.expires_at > now);
            !buckets.is_empty()
        });
        before - windows.len()
    }

    fn window(&self, subject: &str, action: &'static str) -> Window {
        if let Some(window) = self.windows.read().unwrap().get(&(subject.to_string(), action)) {
            return Arc::clone(window);
        }
        let mut windows = self.windows.write().unwrap();
        Arc::clone(
            windows
                .entry((subject.to_string(), action))
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new()))),
        )
    }

    pub(crate) fn check_at(
        &self,
        subject: &str,
        policy: &RatePolicy,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let window = self.window(subject, policy.action);
        let mut buckets = window.lock().unwrap();
        buckets.retain(|b| b.expires_at > now);

        let used: u32 = buckets.iter().map(|b| b.count).sum();
        if used >= policy.limit {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: oldest_reset(&buckets, now),
            };
        }

        buckets.push(Bucket {
            count: 1,
            expires_at: now + window_duration(policy),
        });
        RateLimitDecision {
            allowed: true,
            // Pre-accounts the caller's imminent use
            remaining: policy.limit - used - 1,
            reset_at: oldest_reset(&buckets, now),
        }
    }

    pub(crate) fn peek_at(
        &self,
        subject: &str,
        policy: &RatePolicy,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let window = self.window(subject, policy.action);
        let mut buckets = window.lock().unwrap();
        buckets.retain(|b| b.expires_at > now);

        let used: u32 = buckets.iter().map(|b| b.count).sum();
        RateLimitDecision {
            allowed: used < policy.limit,
            remaining: policy.limit.saturating_sub(used),
            reset_at: oldest_reset(&buckets, now),
        }
    }

    pub(crate) fn commit_at(&self, subject: &str, policy: &RatePolicy, now: DateTime<Utc>) {
        let window = self.window(subject, policy.action);
        let mut buckets = window.lock().unwrap();
        buckets.retain(|b| b.expires_at > now);
        buckets.push(Bucket {
            count: 1,
            expires_at: now + window_duration(policy),
        });
    }
}

fn window_duration(policy: &RatePolicy) -> chrono::Duration {
    chrono::Duration::from_std(policy.window).unwrap_or_else(|_| chrono::Duration::zero())
}

fn oldest_reset(buckets: &[Bucket], now: DateTime<Utc>) -> i64 {
    buckets
        .iter()
        .map(|b| b.expires_at)
        .min()
        .unwrap_or(now)
        .timestamp()
}
