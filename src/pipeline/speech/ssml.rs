//! SSML rendering for engines that accept it.

use crate::output::SegmentCategory;
use crate::pipeline::speech::chunk::Utterance;

/// Longest `<break>` the services accept.
pub const MAX_BREAK_MS: u32 = 10_000;

/// Upper bound on the markup [`render`] adds around the escaped text.
pub const MARKUP_OVERHEAD: usize = 80;

/// XML-escape text for use inside an SSML element.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap an utterance in `<speak>`.
///
/// Headings are spoken with moderate emphasis. When `emit_break` is set and
/// the utterance carries a pause, a trailing `<break>` realises it.
pub fn render(utterance: &Utterance, emit_break: bool) -> String {
    let body = escape(&utterance.text);
    let mut out = String::with_capacity(body.len() + MARKUP_OVERHEAD);
    out.push_str("<speak>");
    if utterance.category == SegmentCategory::Heading {
        out.push_str("<emphasis level=\"moderate\">");
        out.push_str(&body);
        out.push_str("</emphasis>");
    } else {
        out.push_str(&body);
    }
    if emit_break && utterance.pause_after_ms > 0 {
        out.push_str(&format!(
            "<break time=\"{}ms\"/>",
            utterance.pause_after_ms.min(MAX_BREAK_MS)
        ));
    }
    out.push_str("</speak>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utt(text: &str, category: SegmentCategory, pause: u32) -> Utterance {
        Utterance {
            page_num: 1,
            segment_index: 0,
            chunk_index: 0,
            category,
            text: text.to_string(),
            pause_after_ms: pause,
        }
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape(r#"a<b & "c" 'd'>"#), "a&lt;b &amp; &quot;c&quot; &apos;d&apos;&gt;");
    }

    #[test]
    fn body_with_break() {
        let s = render(&utt("Fish & chips", SegmentCategory::Body, 350), true);
        assert_eq!(s, "<speak>Fish &amp; chips<break time=\"350ms\"/></speak>");
    }

    #[test]
    fn heading_is_emphasised() {
        let s = render(&utt("Chapter 1", SegmentCategory::Heading, 700), false);
        assert_eq!(
            s,
            "<speak><emphasis level=\"moderate\">Chapter 1</emphasis></speak>"
        );
    }

    #[test]
    fn break_is_capped_and_overhead_holds() {
        let u = utt("x", SegmentCategory::Heading, 60_000);
        let s = render(&u, true);
        assert!(s.contains("<break time=\"10000ms\"/>"));
        assert!(s.len() <= escape(&u.text).len() + MARKUP_OVERHEAD);
    }
}
