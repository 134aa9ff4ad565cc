//! Model prompting and response validation.
//!
//! The model is asked for a single structured JSON object; the response is
//! parsed permissively (a wrapping code fence is tolerated) and then
//! validated into a strict shape. Parse and validation failures are treated
//! identically to a model-call failure upstream.

pub mod openai;

use serde::Deserialize;

use crate::types::Language;

pub use openai::OpenAiModel;

/// Tag count cap on validated output.
pub const MAX_TAGS: usize = 5;

/// Minimum accepted summary length, in characters.
pub const MIN_SUMMARY_CHARS: usize = 10;

/// System prompt for English-language pages.
pub const ENRICH_SYSTEM_EN: &str = r#"You summarize saved web pages for a bookmark manager.

Given page text, respond with JSON only:
{
    "summary": "50-100 word summary of what the page is about",
    "tags": ["2-5 short topical tags, lowercase"],
    "language": "en"
}

Be factual. Only describe what the text states. No commentary outside the JSON."#;

/// System prompt for Chinese-language pages.
pub const ENRICH_SYSTEM_ZH: &str = r#"你是书签管理器的网页摘要助手。

根据页面文本，仅输出 JSON：
{
    "summary": "50-100 字的内容摘要",
    "tags": ["2-5 个简短的主题标签"],
    "language": "zh"
}

只描述文本中明确陈述的内容，不要输出 JSON 以外的任何文字。"#;

/// Validated model output.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentOutput {
    pub summary: String,
    pub tags: Vec<String>,
    pub language: Language,
}

/// Outcome of parse-then-validate over a raw model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelVerdict {
    Valid(EnrichmentOutput),
    Invalid(String),
}

/// Build the (system, user) prompt pair for a page.
///
/// The prompt mirrors the page's language so the summary comes back in the
/// language the user saved the page in.
pub fn build_prompt(language: Language, title: Option<&str>, text: &str) -> (String, String) {
    let system = match language {
        Language::Zh => ENRICH_SYSTEM_ZH,
        _ => ENRICH_SYSTEM_EN,
    };

    let user = match title {
        Some(title) if !title.is_empty() => format!("Title: {}\n\nContent:\n{}", title, text),
        _ => format!("Content:\n{}", text),
    };

    (system.to_string(), user)
}

#[derive(Deserialize)]
struct RawEnrichment {
    summary: String,
    #[serde(default)]
    tags: Vec<String>,
    language: Option<String>,
}

/// Parse a raw model response permissively, then validate strictly.
pub fn parse_model_response(raw: &str) -> ModelVerdict {
    let parsed: Result<RawEnrichment, _> = serde_json::from_str(raw).or_else(|_| {
        // Tolerate a wrapping markdown code fence
        let json_str = raw
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        serde_json::from_str(json_str)
    });

    let parsed = match parsed {
        Ok(p) => p,
        Err(e) => return ModelVerdict::Invalid(format!("unparseable response: {}", e)),
    };

    let summary = parsed.summary.trim().to_string();
    if summary.chars().count() < MIN_SUMMARY_CHARS {
        return ModelVerdict::Invalid(format!(
            "summary too short: {} chars",
            summary.chars().count()
        ));
    }

    let tags: Vec<String> = parsed
        .tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect();

    let language = match parsed.language.as_deref().map(Language::from_tag) {
        Some(lang) if lang.is_known() => lang,
        other => {
            return ModelVerdict::Invalid(format!("unsupported language tag: {:?}", other));
        }
    };

    ModelVerdict::Valid(EnrichmentOutput {
        summary,
        tags,
        language,
    })
}
