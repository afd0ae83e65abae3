//! Utterance planning: split spoken segments into TTS-request-sized pieces.
//!
//! Cloud TTS services cap the size of one request (Google: 5000 bytes of
//! input including SSML markup; OpenAI: 4096 characters). Each segment is
//! cut at sentence boundaries first, then at word boundaries, and a single
//! word longer than the limit is cut between characters. Sizes are measured
//! on the XML-escaped text, so an utterance still fits after SSML rendering.

use crate::config::ConversionConfig;
use crate::output::{SegmentCategory, Transcript};
use crate::pipeline::speech::ssml::{self, MARKUP_OVERHEAD};
use crate::pipeline::textclean::speakable;
use serde::{Deserialize, Serialize};

/// The text of one synthesis request and the silence that should follow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub page_num: usize,
    /// Index of the source segment within its page.
    pub segment_index: usize,
    /// Position of this piece within its segment.
    pub chunk_index: usize,
    pub category: SegmentCategory,
    pub text: String,
    pub pause_after_ms: u32,
}

/// Plan utterances for every spoken segment, in reading order.
pub fn plan_utterances(transcript: &Transcript, config: &ConversionConfig) -> Vec<Utterance> {
    plan_utterances_within(transcript, config, config.max_chunk_bytes)
}

/// Like [`plan_utterances`], with a request limit tighter than
/// `config.max_chunk_bytes` (for engines with a smaller cap).
pub fn plan_utterances_within(
    transcript: &Transcript,
    config: &ConversionConfig,
    max_request_bytes: usize,
) -> Vec<Utterance> {
    let limit = max_request_bytes.min(config.max_chunk_bytes);
    let budget = if config.use_ssml {
        limit.saturating_sub(MARKUP_OVERHEAD)
    } else {
        limit
    }
    .max(1);

    let mut out = Vec::new();
    for page in transcript.pages.iter().filter(|p| p.error.is_none()) {
        let page_start = out.len();
        for seg in page.segments.iter().filter(|s| config.speaks(s.category)) {
            let text = speakable(&seg.segment.text);
            let pieces = split_to_fit(&text, budget);
            let n = pieces.len();
            for (chunk_index, piece) in pieces.into_iter().enumerate() {
                let pause_after_ms = if chunk_index + 1 < n {
                    0
                } else if seg.category == SegmentCategory::Heading {
                    config.heading_pause_ms
                } else {
                    config.segment_pause_ms
                };
                out.push(Utterance {
                    page_num: page.page_num,
                    segment_index: seg.segment.index,
                    chunk_index,
                    category: seg.category,
                    text: piece,
                    pause_after_ms,
                });
            }
        }
        if out.len() > page_start {
            if let Some(last) = out.last_mut() {
                last.pause_after_ms = last.pause_after_ms.max(config.page_pause_ms);
            }
        }
    }
    out
}

/// Bytes the text occupies once XML-escaped.
fn measure(text: &str) -> usize {
    ssml::escape(text).len()
}

/// Split `text` into pieces of at most `budget` escaped bytes.
pub fn split_to_fit(text: &str, budget: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if measure(text) <= budget {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    for sentence in split_sentences(text) {
        let len = measure(sentence);
        if len > budget {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            out.extend(split_words(sentence, budget));
            continue;
        }
        if cur.is_empty() {
            cur.push_str(sentence);
            cur_len = len;
        } else if cur_len + 1 + len <= budget {
            cur.push(' ');
            cur.push_str(sentence);
            cur_len += 1 + len;
        } else {
            out.push(std::mem::replace(&mut cur, sentence.to_string()));
            cur_len = len;
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Split after `.`, `!`, `?` or `…` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?' | '…') {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = i + c.len_utf8();
                    let s = text[start..end].trim();
                    if !s.is_empty() {
                        out.push(s);
                    }
                    start = end;
                }
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn split_words(sentence: &str, budget: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    for word in sentence.split_whitespace() {
        let len = measure(word);
        if len > budget {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            out.extend(split_chars(word, budget));
            continue;
        }
        if cur.is_empty() {
            cur.push_str(word);
            cur_len = len;
        } else if cur_len + 1 + len <= budget {
            cur.push(' ');
            cur.push_str(word);
            cur_len += 1 + len;
        } else {
            out.push(std::mem::replace(&mut cur, word.to_string()));
            cur_len = len;
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

fn split_chars(word: &str, budget: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    for c in word.chars() {
        let len = measure(c.encode_utf8(&mut [0u8; 4]));
        if cur_len + len > budget && !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        cur.push(c);
        cur_len += len;
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}
