use crate::error::ServiceError;
use crate::output::{SegmentCategory, TextSegment};
use crate::pipeline::encode::EncodedPage;
use crate::pipeline::ocr::{OcrEngine, OcrPage};
use crate::pipeline::textclean::{
    clean_ocr_text, is_table_row, normalize_paragraph, split_paragraphs, strip_bullet_marker,
    strip_heading_marker,
};
use crate::prompts::OCR_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

/// OCR through a vision-capable LLM.
///
/// The model is asked for plain reading-order text with light Markdown
/// (`# ` headings, `- ` list items, `|` table rows); those markers become
/// segment hints and are removed from the text.
pub struct VisionLlmOcr {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl VisionLlmOcr {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

impl OcrEngine for VisionLlmOcr {
    fn name(&self) -> &str {
        "vision-llm"
    }

    fn recognize<'a>(&'a self, page: &'a EncodedPage) -> BoxFuture<'a, Result<OcrPage, ServiceError>> {
        Box::pin(async move {
            // The image carries the content; the user text only anchors the turn.
            let messages = vec![
                ChatMessage::system(OCR_SYSTEM_PROMPT),
                ChatMessage::user_with_images("Transcribe this page.", vec![page.to_image_data()]),
            ];
            let response = self
                .provider
                .chat(&messages, Some(&self.options()))
                .await
                .map_err(|e| ServiceError::from_llm("vision LLM", e))?;

            debug!(
                "Page {}: {} input tokens, {} output tokens",
                page.page_num, response.prompt_tokens, response.completion_tokens
            );
            Ok(OcrPage {
                segments: segments_from_text(page.page_num, &response.content),
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
            })
        })
    }
}

/// Split a plain-text page transcription into segments.
///
/// Paragraphs are separated by blank lines. A leading `# ` marks a heading,
/// a leading bullet marks a list item, and a block made only of `|` rows
/// is a table. The markers are stripped from the segment text.
pub fn segments_from_text(page_num: usize, text: &str) -> Vec<TextSegment> {
    let cleaned = clean_ocr_text(text);
    let mut segments = Vec::new();

    for para in split_paragraphs(&cleaned) {
        let (body, hint) = if para.lines().all(is_table_row) {
            (para.clone(), Some(SegmentCategory::Table))
        } else if let Some(rest) = strip_heading_marker(&para) {
            (rest.to_string(), Some(SegmentCategory::Heading))
        } else if let Some(rest) = strip_bullet_marker(&para) {
            (rest.to_string(), Some(SegmentCategory::ListItem))
        } else {
            (para.clone(), None)
        };

        let body = normalize_paragraph(&body);
        if body.is_empty() {
            continue;
        }
        let mut seg = TextSegment::new(page_num, segments.len(), body);
        seg.hint = hint;
        segments.push(seg);
    }
    segments
}
