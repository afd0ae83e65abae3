//! OCR: page image → text segments in reading order.
//!
//! Two engines ship with the crate:
//!
//! - [`CloudVisionOcr`]: Google Cloud Vision `DOCUMENT_TEXT_DETECTION`, one
//!   segment per detected paragraph, with bounding boxes and confidence.
//! - [`VisionLlmOcr`]: any vision-capable LLM reachable through
//!   `edgequake-llm`, prompted to transcribe the page as plain text.
//!
//! Callers can supply their own engine through
//! [`ConversionConfigBuilder::ocr_engine`](crate::config::ConversionConfigBuilder::ocr_engine).

mod cloud_vision;
mod vision_llm;

pub use cloud_vision::CloudVisionOcr;
pub use vision_llm::{segments_from_text, VisionLlmOcr};

use crate::error::ServiceError;
use crate::output::TextSegment;
use crate::pipeline::encode::EncodedPage;
use futures::future::BoxFuture;

/// Text recognised on one page.
#[derive(Debug, Clone, Default)]
pub struct OcrPage {
    /// Segments in reading order, `index` numbered from 0.
    pub segments: Vec<TextSegment>,
    /// Token usage, for LLM-backed engines.
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A service that turns a page image into text segments.
pub trait OcrEngine: Send + Sync {
    /// Short name used in logs and transcripts.
    fn name(&self) -> &str;

    /// Recognise the text of one page. Called once per attempt; retries are
    /// handled by the caller.
    fn recognize<'a>(&'a self, page: &'a EncodedPage) -> BoxFuture<'a, Result<OcrPage, ServiceError>>;
}
