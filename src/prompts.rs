//! Prompts for the LLM-backed stages: vision OCR and segment classification.
//!
//! Kept in one place so they can be inspected by unit tests and changed
//! without touching retry or parsing code.

use crate::output::{SegmentCategory, TextSegment};

/// System prompt for transcribing a page image into speakable text.
///
/// The output format is deliberately close to plain text: the reply is fed
/// to a speech engine, not rendered. Headings keep a `# ` prefix and table
/// rows keep pipes only so the classifier can recognise them.
pub const OCR_SYSTEM_PROMPT: &str = r##"You are a precise OCR engine. Transcribe the text of the page image.

Rules:
1. Transcribe ALL text exactly as printed, in the order a human would read it aloud.
   For multi-column layouts read each column top to bottom before the next.
2. Separate paragraphs, headings, list items, captions and footnotes with ONE blank line.
3. Inside a paragraph, join the printed lines into one line. Join words hyphenated across
   a line break.
4. Prefix headings with "# ". Prefix list items with "- ".
5. Write each table row on its own line as: | cell | cell |
6. Keep page numbers and running headers/footers as separate paragraphs; do not drop them.
7. Do not describe images. Do not add commentary. Do not wrap the output in code fences.
8. If the page has no text, reply with an empty message."##;

/// System prompt for labelling the segments of one page.
pub const CLASSIFY_SYSTEM_PROMPT: &str = r#"You label blocks of text extracted from one page of a document so the page can be read aloud.

Allowed labels:
- heading: a title or section heading
- body: ordinary running text
- list_item: an item of a bulleted or numbered list
- caption: a figure or table caption
- footnote: a footnote or endnote
- table: tabular data
- page_furniture: page numbers, running headers and footers, watermarks

Reply with ONLY a JSON array of labels, one per block, in the same order as the blocks.
Example reply for three blocks: ["heading", "body", "page_furniture"]"#;

/// Build the user message listing the segments of a page.
///
/// Each block is truncated so a page with very long paragraphs does not blow
/// the context window; the first few hundred characters decide the label.
pub fn classify_user_message(segments: &[TextSegment], page_height: u32) -> String {
    const MAX_BLOCK_CHARS: usize = 400;

    let mut msg = format!("The page has {} blocks.\n\n", segments.len());
    for (i, seg) in segments.iter().enumerate() {
        let text: String = seg.text.chars().take(MAX_BLOCK_CHARS).collect();
        let position = match (&seg.bounding_box, page_height) {
            (Some(b), h) if h > 0 && !b.vertices.is_empty() => {
                format!(" (vertical position {:.0}% from top)", b.top() / h as f32 * 100.0)
            }
            _ => String::new(),
        };
        msg.push_str(&format!("Block {}{}:\n\"\"\"{}\"\"\"\n\n", i + 1, position, text));
    }
    msg.push_str("Labels:");
    msg
}

/// Comma-separated list of the labels the model may use.
pub fn allowed_labels() -> String {
    SegmentCategory::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
