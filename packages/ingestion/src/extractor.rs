//! Readable-content extraction from raw HTML.
//!
//! Three strategies, tried in order: score likely article containers by
//! paragraph density, probe a fixed list of content selectors, and finally
//! strip chrome elements from the whole body. Output text is whitespace
//! normalized and truncated at a word boundary.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::types::{ExtractedContent, Language};

/// Character cap on extracted text.
pub const MAX_TEXT_CHARS: usize = 10_000;

/// Character cap on the excerpt.
const EXCERPT_CHARS: usize = 200;

/// Minimum text a fallback container must yield.
const MIN_CONTAINER_CHARS: usize = 100;

/// Minimum page text for the extractability gate.
const MIN_EXTRACTABLE_CHARS: usize = 50;

/// Elements that never contribute readable text.
const SKIP_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "aside"];

/// Container selectors probed when scoring finds nothing.
const CONTAINER_SELECTORS: &[&str] = &[
    "article",
    "main",
    r#"[role="main"]"#,
    ".post-content",
    ".article-content",
    ".entry-content",
    ".article-body",
    ".post-body",
    "#content",
    ".content",
];

/// Class/id fragments that mark boilerplate containers.
const NEGATIVE_HINTS: &[&str] = &[
    "nav", "footer", "header", "sidebar", "comment", "banner", "advert", "promo", "menu",
];

/// Phrases that mark error pages (with zh equivalents).
const ERROR_PHRASES: &[&str] = &[
    "404",
    "not found",
    "page not found",
    "access denied",
    "forbidden",
    "页面不存在",
    "找不到页面",
    "无法访问",
    "禁止访问",
    "访问被拒绝",
];

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap()
}

/// Extract readable content from a page.
pub fn extract(html: &str, source_url: &Url) -> ExtractedContent {
    let doc = Html::parse_document(html);

    let raw = isolate_main_content(&doc);
    let text = truncate_at_word(&normalize_whitespace(&raw), MAX_TEXT_CHARS);
    let language = detect_language(&text);

    let title = doc
        .select(&sel("title"))
        .next()
        .map(|e| normalize_whitespace(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let byline = attr_of(&doc, r#"meta[name="author"]"#, "content")
        .or_else(|| first_text(&doc, r#"[rel="author"], .byline"#));

    let site_name = attr_of(&doc, r#"meta[property="og:site_name"]"#, "content")
        .or_else(|| source_url.host_str().map(String::from));

    let excerpt = if text.is_empty() {
        None
    } else {
        Some(truncate_at_word(&text, EXCERPT_CHARS))
    };

    ExtractedContent {
        title,
        length: text.chars().count(),
        excerpt,
        byline,
        site_name,
        language,
        text,
    }
}

/// Gate cheap-to-detect junk before it reaches the model.
///
/// Rejects pages with almost no text and pages that look like error pages
/// (by title always, by body only when the body is short).
pub fn is_extractable(html: &str) -> bool {
    let doc = Html::parse_document(html);

    let body = normalize_whitespace(&visible_body_text(&doc));
    if body.chars().count() < MIN_EXTRACTABLE_CHARS {
        return false;
    }

    let title = doc
        .select(&sel("title"))
        .next()
        .map(|e| e.text().collect::<String>().to_lowercase())
        .unwrap_or_default();
    if ERROR_PHRASES.iter().any(|p| title.contains(p)) {
        return false;
    }

    if body.chars().count() < 300 {
        let lower = body.to_lowercase();
        if ERROR_PHRASES.iter().any(|p| lower.contains(p)) {
            return false;
        }
    }

    true
}

/// Character-class language heuristic.
///
/// Looks at the ratio of CJK ideographs to Latin letters among significant
/// characters; needs at least 10 of them to classify at all.
pub fn detect_language(text: &str) -> Language {
    let mut cjk = 0usize;
    let mut latin = 0usize;
    for c in text.chars() {
        if is_cjk(c) {
            cjk += 1;
        } else if c.is_ascii_alphabetic() {
            latin += 1;
        }
    }

    let significant = cjk + latin;
    if significant < 10 {
        return Language::Unknown;
    }

    let cjk_ratio = cjk as f64 / significant as f64;
    if cjk_ratio > 0.3 {
        Language::Zh
    } else if latin >= 50 && cjk_ratio < 0.1 {
        Language::En
    } else {
        Language::Unknown
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'   // CJK Unified Ideographs
        | '\u{3400}'..='\u{4DBF}' // Extension A
        | '\u{F900}'..='\u{FAFF}' // Compatibility Ideographs
    )
}

/// Pick the best candidate text using the three-stage strategy.
fn isolate_main_content(doc: &Html) -> String {
    // Primary: paragraph-density scoring over likely containers.
    if let Some(best) = best_scored_container(doc) {
        return best;
    }

    // Fallback: fixed selector probe.
    for selector in CONTAINER_SELECTORS {
        if let Some(el) = doc.select(&sel(selector)).next() {
            let text = clean_subtree_text(el);
            if normalize_whitespace(&text).chars().count() >= MIN_CONTAINER_CHARS {
                return text;
            }
        }
    }

    // Last resort: whole body minus chrome.
    visible_body_text(doc)
}

fn best_scored_container(doc: &Html) -> Option<String> {
    let candidates = sel("article, main, section, div");
    let paragraph = sel("p");

    let mut best: Option<(usize, String)> = None;
    for el in doc.select(&candidates) {
        if has_negative_hint(&el) {
            continue;
        }
        let score: usize = el
            .select(&paragraph)
            .map(|p| p.text().map(str::len).sum::<usize>())
            .sum();
        if score < MIN_CONTAINER_CHARS {
            continue;
        }
        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, clean_subtree_text(el)));
        }
    }
    best.map(|(_, text)| text)
}

fn has_negative_hint(el: &ElementRef) -> bool {
    let hints = el
        .value()
        .attr("class")
        .into_iter()
        .chain(el.value().attr("id"))
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    !hints.is_empty() && NEGATIVE_HINTS.iter().any(|h| hints.contains(h))
}

/// Collect text below `el`, skipping chrome subtrees.
fn clean_subtree_text(el: ElementRef) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out
}

fn visible_body_text(doc: &Html) -> String {
    doc.select(&sel("body"))
        .next()
        .map(clean_subtree_text)
        .unwrap_or_default()
}

fn collect_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !SKIP_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, out);
            }
        }
    }
}

/// Collapse whitespace runs and drop control characters.
fn normalize_whitespace(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let ws = Regex::new(r"\s+").unwrap();
    ws.replace_all(&cleaned, " ").trim().to_string()
}

/// Truncate to `limit` characters at a word boundary, never mid-word,
/// appending an ellipsis when anything was cut.
fn truncate_at_word(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let head: String = text.chars().take(limit).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &head[..pos],
        _ => head.as_str(),
    };
    format!("{}…", cut.trim_end())
}

fn attr_of(doc: &Html, selector: &str, attr: &str) -> Option<String> {
    doc.select(&sel(selector))
        .filter_map(|e| e.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    doc.select(&sel(selector))
        .map(|e| normalize_whitespace(&e.text().collect::<String>()))
        .find(|t| !t.is_empty())
}
