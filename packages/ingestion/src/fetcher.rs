//! Bounded HTTP fetch with HTML metadata extraction.
//!
//! Every fetch runs under a hard wall-clock timeout, a redirect hop cap,
//! a content-type allow-list, and a size cap enforced on both the declared
//! Content-Length and the actual streamed byte count. Malformed HTML never
//! fails a fetch; the parser degrades to an empty document.

use async_trait::async_trait;
use reqwest::header;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetch::PageFetcher;
use crate::types::{FetchConfig, FetchedPage, Language, PageMetadata};

/// Content types the fetcher will parse.
const ALLOWED_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// HTTP metadata fetcher.
pub struct MetadataFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Default for MetadataFetcher {
    fn default() -> Self {
        Self::new(FetchConfig::default())
    }
}

impl MetadataFetcher {
    /// Create a fetcher with the given bounds.
    ///
    /// Redirects are capped by the client itself; only http(s) targets are
    /// ever followed.
    pub fn new(config: FetchConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.timeout)
                .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
                .build()
                .expect("Failed to create HTTP client"),
            config,
        }
    }

    /// Fetch a page and extract its metadata.
    pub async fn fetch(&self, url: &Url) -> FetchResult<FetchedPage> {
        debug!(url = %url, "metadata fetch starting");

        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, &self.config.user_agent)
            .header(header::ACCEPT_LANGUAGE, &self.config.accept_language)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();

        if let Some(content_type) = header_str(&response, header::CONTENT_TYPE) {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase();
            if !ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
                return Err(FetchError::UnsupportedContentType {
                    content_type: essence,
                });
            }
        }

        // Fast path on the declared length; the streamed count below guards
        // against missing or lying headers.
        if let Some(declared) = response.content_length() {
            if declared > self.config.max_content_bytes {
                return Err(FetchError::ContentTooLarge {
                    bytes: declared,
                    limit: self.config.max_content_bytes,
                });
            }
        }

        let body = self.read_capped(url, response).await?;
        let html = String::from_utf8_lossy(&body).into_owned();

        let metadata = extract_metadata(&html, &final_url);
        debug!(
            url = %url,
            final_url = %final_url,
            bytes = body.len(),
            title = metadata.title.as_deref().unwrap_or(""),
            "metadata fetch succeeded"
        );

        Ok(FetchedPage {
            metadata,
            html,
            final_url,
        })
    }

    async fn read_capped(&self, url: &Url, mut response: reqwest::Response) -> FetchResult<Vec<u8>> {
        let limit = self.config.max_content_bytes;
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| classify(url, e))? {
            if body.len() as u64 + chunk.len() as u64 > limit {
                warn!(url = %url, "response body exceeded size cap");
                return Err(FetchError::ContentTooLarge {
                    bytes: body.len() as u64 + chunk.len() as u64,
                    limit,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl PageFetcher for MetadataFetcher {
    async fn fetch_page(&self, url: &Url) -> FetchResult<FetchedPage> {
        self.fetch(url).await
    }
}

fn classify(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_redirect() {
        FetchError::TooManyRedirects {
            url: url.to_string(),
        }
    } else {
        FetchError::Network(Box::new(e))
    }
}

fn header_str(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap()
}

fn attr_content(doc: &Html, selector: &str, attr: &str) -> Option<String> {
    doc.select(&sel(selector))
        .filter_map(|e| e.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    attr_content(doc, selector, "content")
}

fn resolve(base: &Url, candidate: &str) -> Option<String> {
    base.join(candidate).ok().map(|u| u.to_string())
}

/// Extract metadata from an HTML document.
///
/// Field priority follows the usual social-card conventions: OpenGraph,
/// then Twitter card, then plain HTML. Relative asset URLs are resolved
/// against `final_url`.
pub fn extract_metadata(html: &str, final_url: &Url) -> PageMetadata {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, r#"meta[property="og:title"]"#)
        .or_else(|| meta_content(&doc, r#"meta[name="twitter:title"], meta[property="twitter:title"]"#))
        .or_else(|| {
            doc.select(&sel("title"))
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        });

    let description = meta_content(&doc, r#"meta[property="og:description"]"#)
        .or_else(|| {
            meta_content(
                &doc,
                r#"meta[name="twitter:description"], meta[property="twitter:description"]"#,
            )
        })
        .or_else(|| meta_content(&doc, r#"meta[name="description"]"#));

    let thumbnail_url = meta_content(&doc, r#"meta[property="og:image"]"#)
        .or_else(|| {
            meta_content(
                &doc,
                r#"meta[name="twitter:image"], meta[property="twitter:image"]"#,
            )
        })
        .and_then(|v| resolve(final_url, &v));

    let favicon_url = doc
        .select(&sel("link[rel][href]"))
        .find(|e| {
            e.value()
                .attr("rel")
                .map(|rel| rel.to_ascii_lowercase().contains("icon"))
                .unwrap_or(false)
        })
        .and_then(|e| e.value().attr("href"))
        .and_then(|href| resolve(final_url, href))
        .or_else(|| resolve(final_url, "/favicon.ico"));

    let language = doc
        .select(&sel("html"))
        .next()
        .and_then(|e| e.value().attr("lang"))
        .map(Language::from_tag)
        .filter(Language::is_known)
        .or_else(|| {
            meta_content(&doc, r#"meta[http-equiv="content-language" i]"#)
                .map(|v| Language::from_tag(&v))
        })
        .unwrap_or(Language::Unknown);

    let canonical_url = attr_content(&doc, r#"link[rel="canonical"]"#, "href")
        .and_then(|href| resolve(final_url, &href));

    let author = meta_content(&doc, r#"meta[name="author"]"#)
        .or_else(|| meta_content(&doc, r#"meta[property="article:author"]"#));

    let published_at = meta_content(&doc, r#"meta[property="article:published_time"]"#)
        .or_else(|| attr_content(&doc, "time[datetime]", "datetime"));

    let site_name = meta_content(&doc, r#"meta[property="og:site_name"]"#);

    PageMetadata {
        title,
        description,
        thumbnail_url,
        favicon_url,
        language,
        canonical_url,
        author,
        published_at,
        site_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/articles/post").unwrap()
    }

    #[test]
    fn og_fields_win_over_plain() {
        let html = r#"<html><head>
            <title>Plain Title</title>
            <meta property="og:title" content="OG Title">
            <meta name="description" content="plain desc">
            <meta property="og:description" content="og desc">
        </head></html>"#;

        let meta = extract_metadata(html, &base());
        assert_eq!(meta.title.as_deref(), Some("OG Title"));
        assert_eq!(meta.description.as_deref(), Some("og desc"));
    }

    #[test]
    fn twitter_fields_beat_plain_but_lose_to_og() {
        let html = r#"<html><head>
            <title>Plain Title</title>
            <meta name="twitter:title" content="Tweet Title">
        </head></html>"#;
        let meta = extract_metadata(html, &base());
        assert_eq!(meta.title.as_deref(), Some("Tweet Title"));
    }

    #[test]
    fn relative_image_resolved_against_final_url() {
        let html = r#"<html><head>
            <meta property="og:image" content="/img/cover.png">
        </head></html>"#;
        let meta = extract_metadata(html, &base());
        assert_eq!(
            meta.thumbnail_url.as_deref(),
            Some("https://example.com/img/cover.png")
        );
    }

    #[test]
    fn favicon_falls_back_to_well_known_path() {
        let meta = extract_metadata("<html></html>", &base());
        assert_eq!(
            meta.favicon_url.as_deref(),
            Some("https://example.com/favicon.ico")
        );

        let html = r#"<html><head>
            <link rel="shortcut icon" href="/assets/fav.png">
        </head></html>"#;
        let meta = extract_metadata(html, &base());
        assert_eq!(
            meta.favicon_url.as_deref(),
            Some("https://example.com/assets/fav.png")
        );
    }

    #[test]
    fn language_from_html_lang() {
        let meta = extract_metadata(r#"<html lang="zh-CN"></html>"#, &base());
        assert_eq!(meta.language, Language::Zh);

        let meta = extract_metadata(r#"<html lang="de"></html>"#, &base());
        assert_eq!(meta.language, Language::Unknown);
    }

    #[test]
    fn malformed_html_degrades_to_empty_metadata() {
        let meta = extract_metadata("<<<not <html at all", &base());
        assert!(meta.title.is_none());
        assert!(meta.description.is_none());
        // Favicon fallback still applies
        assert!(meta.favicon_url.is_some());
    }

    #[test]
    fn empty_meta_values_are_skipped() {
        let html = r#"<html><head>
            <meta property="og:title" content="  ">
            <title>Real Title</title>
        </head></html>"#;
        let meta = extract_metadata(html, &base());
        assert_eq!(meta.title.as_deref(), Some("Real Title"));
    }
}
