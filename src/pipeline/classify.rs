//! Segment classification: decide what each block of text *is* so the
//! narrator can skip page furniture and pause after headings.
//!
//! Three classifiers are provided:
//!
//! - [`RuleClassifier`]: layout and keyword heuristics. No network, no
//!   credentials, deterministic. The default.
//! - [`LlmClassifier`]: one chat call per page through `edgequake-llm`. Falls
//!   back to the rules when the reply cannot be used.
//! - [`DisabledClassifier`]: trusts OCR hints, labels everything else `Body`.

use crate::error::ServiceError;
use crate::output::{SegmentCategory, TextSegment};
use crate::prompts::{allowed_labels, classify_user_message, CLASSIFY_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// Page geometry the classifiers reason about, in rendered pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
}

/// Assigns one [`SegmentCategory`] per segment of a page.
pub trait SegmentClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Label `segments`, returning exactly one category per segment in order.
    fn classify<'a>(
        &'a self,
        page: &'a PageLayout,
        segments: &'a [TextSegment],
    ) -> BoxFuture<'a, Result<Vec<SegmentCategory>, ServiceError>>;
}

// ── Rules ───────────────────────────────────────────────────────────────────

/// Fraction of the page height, from either edge, where running headers and
/// footers live.
const FURNITURE_BAND: f32 = 0.06;

/// Fraction of the page height, from the bottom, where footnotes live.
const FOOTNOTE_BAND: f32 = 0.20;

const MAX_HEADING_CHARS: usize = 90;
const MAX_HEADING_WORDS: usize = 12;
const MAX_FURNITURE_CHARS: usize = 80;

static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:page\s+|p\.\s*|-\s*)?(?:\d{1,4}|[ivxlc]{1,7})(?:\s*(?:of|/)\s*\d{1,4})?(?:\s*-)?$")
        .unwrap()
});
static RE_CAPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:figure|fig\.|table|chart|plate|exhibit|listing)\s*[0-9IVX]+(?:\.\d+)*\s*[:.\-–]").unwrap()
});
static RE_FOOTNOTE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\[\d{1,3}\]|\d{1,2}[\).]?\s|[*†‡§]\s?)").unwrap());
static RE_BRACKET_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\d{1,3}\]\s").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-•*▪◦‣–]\s+").unwrap());
static RE_NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(?(?:\d{1,3}|[a-z]|[ivx]{1,4})[\.\)]\s+").unwrap());
static RE_SECTION_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+(?:\.\d+)*\.?|[IVX]+\.|[A-Z]\.)\s+\S").unwrap());

/// Deterministic layout and keyword heuristics.
///
/// Position-based rules only fire when the OCR engine reports bounding
/// boxes; without them the first and last segments of the page stand in
/// for the page edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    /// Label a page synchronously.
    pub fn label(&self, page: &PageLayout, segments: &[TextSegment]) -> Vec<SegmentCategory> {
        let last = segments.len().saturating_sub(1);
        segments
            .iter()
            .enumerate()
            .map(|(i, seg)| label_one(page, seg, i == 0 || i == last))
            .collect()
    }
}

/// Vertical centre of the segment as a fraction of page height.
fn vertical_position(page: &PageLayout, seg: &TextSegment) -> Option<f32> {
    let bbox = seg.bounding_box.as_ref()?;
    if bbox.vertices.is_empty() || page.height == 0 {
        return None;
    }
    Some(((bbox.top() + bbox.bottom()) / 2.0) / page.height as f32)
}

fn label_one(page: &PageLayout, seg: &TextSegment, at_edge: bool) -> SegmentCategory {
    let text = seg.text.trim();
    let pos = vertical_position(page, seg);
    let in_furniture_band = match pos {
        Some(p) => p <= FURNITURE_BAND || p >= 1.0 - FURNITURE_BAND,
        None => at_edge,
    };

    if RE_PAGE_NUMBER.is_match(text) && in_furniture_band {
        return SegmentCategory::PageFurniture;
    }
    // Running headers/footers: short text hugging the top or bottom edge.
    if pos.is_some() && in_furniture_band && text.chars().count() <= MAX_FURNITURE_CHARS {
        return SegmentCategory::PageFurniture;
    }

    if let Some(hint) = seg.hint {
        return hint;
    }

    if RE_CAPTION.is_match(text) {
        return SegmentCategory::Caption;
    }

    let in_footnote_band = pos.is_some_and(|p| p >= 1.0 - FOOTNOTE_BAND);
    if (in_footnote_band && RE_FOOTNOTE_MARKER.is_match(text))
        || (pos.is_none() && RE_BRACKET_NOTE.is_match(text))
    {
        return SegmentCategory::Footnote;
    }

    if looks_like_table(text) {
        return SegmentCategory::Table;
    }
    if RE_BULLET.is_match(text) {
        return SegmentCategory::ListItem;
    }
    if looks_like_heading(text) {
        return SegmentCategory::Heading;
    }
    if RE_NUMBERED_ITEM.is_match(text) {
        return SegmentCategory::ListItem;
    }
    SegmentCategory::Body
}

fn looks_like_table(text: &str) -> bool {
    text.lines().any(|l| l.matches('|').count() >= 2) || text.contains('\t')
}

fn looks_like_heading(text: &str) -> bool {
    if text.is_empty()
        || text.chars().count() > MAX_HEADING_CHARS
        || text.split_whitespace().count() > MAX_HEADING_WORDS
        || text.contains('\n')
    {
        return false;
    }
    if text.ends_with(['.', ',', ';', '!', '?', ':']) {
        return false;
    }
    if text.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()) {
        return false;
    }
    RE_SECTION_NUMBER.is_match(text) || text.chars().next().is_some_and(char::is_uppercase)
}

impl SegmentClassifier for RuleClassifier {
    fn name(&self) -> &str {
        "rules"
    }

    fn classify<'a>(
        &'a self,
        page: &'a PageLayout,
        segments: &'a [TextSegment],
    ) -> BoxFuture<'a, Result<Vec<SegmentCategory>, ServiceError>> {
        Box::pin(async move { Ok(self.label(page, segments)) })
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

/// Labels segments with one LLM chat call per page.
///
/// A reply that is not a JSON array of labels with one entry per segment is
/// a [`ServiceError::Decode`]; the page pipeline then labels the page with
/// [`RuleClassifier`].
pub struct LlmClassifier {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }
}

impl SegmentClassifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    fn classify<'a>(
        &'a self,
        page: &'a PageLayout,
        segments: &'a [TextSegment],
    ) -> BoxFuture<'a, Result<Vec<SegmentCategory>, ServiceError>> {
        Box::pin(async move {
            if segments.is_empty() {
                return Ok(Vec::new());
            }
            let messages = vec![
                ChatMessage::system(CLASSIFY_SYSTEM_PROMPT),
                ChatMessage::user(classify_user_message(segments, page.height)),
            ];
            let options = CompletionOptions {
                temperature: Some(self.temperature),
                max_tokens: Some(self.max_tokens),
                ..Default::default()
            };
            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| ServiceError::from_llm("classifier LLM", e))?;

            match parse_labels(&response.content, segments.len()) {
                Some(labels) => {
                    debug!("Page {}: {} labels from LLM", page.page_num, labels.len());
                    Ok(labels)
                }
                None => {
                    let reply: String = response.content.chars().take(120).collect();
                    Err(ServiceError::Decode {
                        service: "classifier LLM".to_string(),
                        detail: format!(
                            "expected {} labels from [{}], got: {}",
                            segments.len(),
                            allowed_labels(),
                            reply
                        ),
                    })
                }
            }
        })
    }
}

static RE_LABEL_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z_ \-]*[A-Za-z]").unwrap());

/// Parse a classifier reply into exactly `expected` labels.
///
/// Accepts a bare JSON array, one wrapped in code fences or prose, or as a
/// last resort a comma/newline separated list. Unknown labels read as
/// `Body`. Returns `None` when the count does not match.
pub fn parse_labels(reply: &str, expected: usize) -> Option<Vec<SegmentCategory>> {
    let raw: Vec<String> = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Vec<String>>(&reply[start..=end]).ok()?
        }
        _ => RE_LABEL_WORD
            .find_iter(reply)
            .map(|m| m.as_str().to_string())
            .collect(),
    };
    if raw.len() != expected {
        return None;
    }
    Some(
        raw.iter()
            .map(|l| SegmentCategory::from_label(l).unwrap_or(SegmentCategory::Body))
            .collect(),
    )
}

// ── Disabled ────────────────────────────────────────────────────────────────

/// No classification: OCR hints are kept, everything else is `Body`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClassifier;

impl SegmentClassifier for DisabledClassifier {
    fn name(&self) -> &str {
        "off"
    }

    fn classify<'a>(
        &'a self,
        _page: &'a PageLayout,
        segments: &'a [TextSegment],
    ) -> BoxFuture<'a, Result<Vec<SegmentCategory>, ServiceError>> {
        let labels = segments
            .iter()
            .map(|s| s.hint.unwrap_or(SegmentCategory::Body))
            .collect();
        Box::pin(async move { Ok(labels) })
    }
}
