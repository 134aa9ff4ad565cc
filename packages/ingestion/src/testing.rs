//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the pipeline without
//! making real model or network calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use url::Url;

use crate::error::{FetchError, FetchResult, ModelError};
use crate::fetcher::extract_metadata;
use crate::traits::{fetch::PageFetcher, model::LanguageModel};
use crate::types::FetchedPage;

/// A mock language model with canned responses.
///
/// Queued responses are consumed first, then the default applies: a fixed
/// response, or a provider error for the failing variants.
pub struct MockModel {
    queue: Mutex<VecDeque<Result<String, ModelError>>>,
    default: Option<String>,
    calls: AtomicUsize,
}

impl MockModel {
    /// Always answer with `raw`.
    pub fn with_response(raw: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Some(raw.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with a provider error.
    pub fn failing() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail `failures` times, then answer with `raw`.
    pub fn failing_then(raw: impl Into<String>, failures: usize) -> Self {
        let mut queue = VecDeque::new();
        for _ in 0..failures {
            queue.push_back(Err(ModelError::Provider("mock failure".to_string())));
        }
        Self {
            queue: Mutex::new(queue),
            default: Some(raw.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(queued) = self.queue.lock().unwrap().pop_front() {
            return queued;
        }
        match &self.default {
            Some(raw) => Ok(raw.clone()),
            None => Err(ModelError::Provider("mock failure".to_string())),
        }
    }
}

/// A mock page fetcher serving canned HTML.
///
/// Pages are keyed by the exact URL string; unknown URLs 404. Use
/// [`MockFetcher::failing`] to simulate an unreachable upstream.
pub struct MockFetcher {
    pages: RwLock<HashMap<String, String>>,
    fail_with_timeout: bool,
    calls: RwLock<Vec<String>>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            fail_with_timeout: false,
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Every fetch times out.
    pub fn failing() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            fail_with_timeout: true,
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Serve `html` for `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), html.into());
        self
    }

    /// URLs fetched so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Number of fetches so far.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_page(&self, url: &Url) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());

        if self.fail_with_timeout {
            return Err(FetchError::Timeout {
                url: url.to_string(),
            });
        }

        let html = self
            .pages
            .read()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or(FetchError::Status { status: 404 })?;

        Ok(FetchedPage {
            metadata: extract_metadata(&html, url),
            html,
            final_url: url.clone(),
        })
    }
}

/// A realistic article page for tests.
pub fn sample_article_html() -> String {
    let body = "Rust gives you memory safety without garbage collection, and the \
        borrow checker enforces it at compile time. This article walks through \
        ownership, borrowing, and lifetimes with worked examples. "
        .repeat(4);
    format!(
        r#"<html lang="en"><head>
            <title>Understanding Ownership - Rust Blog</title>
            <meta property="og:title" content="Understanding Ownership">
            <meta property="og:description" content="A practical tour of Rust's ownership model.">
            <meta property="og:image" content="/images/ownership.png">
            <meta property="og:site_name" content="Rust Blog">
            <link rel="icon" href="/favicon.png">
        </head><body>
            <nav>Home Posts About</nav>
            <article><p>{}</p></article>
            <footer>Footer text</footer>
        </body></html>"#,
        body
    )
}
