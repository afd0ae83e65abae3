//! Data produced by the pipeline: segments, labelled transcripts, audio and stats.
//!
//! Everything here except the raw audio bytes is serialisable, so a run can
//! be dumped as JSON (`--json`, `--transcript`) and inspected or replayed.

use crate::config::AudioEncoding;
use crate::error::{PageError, Pdf2AudioError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document-level information read from the PDF without rendering it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}

/// A point in page-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
}

/// Polygon around a segment as reported by the OCR service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub vertices: Vec<Vertex>,
}

impl BoundingBox {
    /// Axis-aligned box from two corners.
    pub fn from_rect(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            vertices: vec![
                Vertex { x: left, y: top },
                Vertex { x: right, y: top },
                Vertex { x: right, y: bottom },
                Vertex { x: left, y: bottom },
            ],
        }
    }

    pub fn top(&self) -> f32 {
        self.vertices.iter().map(|v| v.y).fold(f32::INFINITY, f32::min)
    }

    pub fn bottom(&self) -> f32 {
        self.vertices.iter().map(|v| v.y).fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn left(&self) -> f32 {
        self.vertices.iter().map(|v| v.x).fold(f32::INFINITY, f32::min)
    }

    pub fn right(&self) -> f32 {
        self.vertices.iter().map(|v| v.x).fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn height(&self) -> f32 {
        if self.vertices.is_empty() {
            0.0
        } else {
            self.bottom() - self.top()
        }
    }
}

/// What a segment is, and therefore how (or whether) it is read aloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentCategory {
    Heading,
    Body,
    ListItem,
    Caption,
    Footnote,
    Table,
    /// Running headers, footers and page numbers.
    PageFurniture,
}

impl SegmentCategory {
    pub const ALL: [SegmentCategory; 7] = [
        SegmentCategory::Heading,
        SegmentCategory::Body,
        SegmentCategory::ListItem,
        SegmentCategory::Caption,
        SegmentCategory::Footnote,
        SegmentCategory::Table,
        SegmentCategory::PageFurniture,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentCategory::Heading => "heading",
            SegmentCategory::Body => "body",
            SegmentCategory::ListItem => "list_item",
            SegmentCategory::Caption => "caption",
            SegmentCategory::Footnote => "footnote",
            SegmentCategory::Table => "table",
            SegmentCategory::PageFurniture => "page_furniture",
        }
    }

    /// Lenient label parsing: case, separators and a few synonyms are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        let norm: String = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match norm.as_str() {
            "heading" | "title" | "header" | "section_heading" => Some(SegmentCategory::Heading),
            "body" | "paragraph" | "text" | "body_text" => Some(SegmentCategory::Body),
            "list_item" | "list" | "bullet" => Some(SegmentCategory::ListItem),
            "caption" | "figure_caption" => Some(SegmentCategory::Caption),
            "footnote" | "note" => Some(SegmentCategory::Footnote),
            "table" => Some(SegmentCategory::Table),
            "page_furniture" | "furniture" | "page_number" | "running_header" | "footer" => {
                Some(SegmentCategory::PageFurniture)
            }
            _ => None,
        }
    }
}

impl fmt::Display for SegmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block of recognised text, in reading order within its page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    /// 1-indexed page number.
    pub page_num: usize,
    /// 0-indexed position on the page.
    pub index: usize,
    pub text: String,
    /// OCR confidence in 0.0–1.0, when the engine reports one.
    pub confidence: Option<f32>,
    pub bounding_box: Option<BoundingBox>,
    /// Category suggested by the OCR engine itself (e.g. a table block).
    pub hint: Option<SegmentCategory>,
}

impl TextSegment {
    pub fn new(page_num: usize, index: usize, text: impl Into<String>) -> Self {
        Self {
            page_num,
            index,
            text: text.into(),
            confidence: None,
            bounding_box: None,
            hint: None,
        }
    }
}

/// A segment with its assigned category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSegment {
    #[serde(flatten)]
    pub segment: TextSegment,
    pub category: SegmentCategory,
}

/// Result of OCR + classification for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTranscript {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Rendered image width in pixels.
    pub width: u32,
    /// Rendered image height in pixels.
    pub height: u32,
    pub segments: Vec<LabeledSegment>,
    /// Name of the classifier that produced the labels.
    pub classified_by: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u32,
    pub error: Option<PageError>,
}

impl PageTranscript {
    /// Empty transcript for a page that failed.
    pub fn failed(page_num: usize, error: PageError) -> Self {
        Self {
            page_num,
            width: 0,
            height: 0,
            segments: Vec::new(),
            classified_by: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: Some(error),
        }
    }
}

/// OCR + classification output for a whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub metadata: DocumentMetadata,
    /// Sorted by page number.
    pub pages: Vec<PageTranscript>,
}

impl Transcript {
    /// Segments that will be read aloud, in reading order.
    pub fn spoken_segments<'a>(
        &'a self,
        skip: &'a [SegmentCategory],
    ) -> impl Iterator<Item = &'a LabeledSegment> + 'a {
        self.pages
            .iter()
            .filter(|p| p.error.is_none())
            .flat_map(|p| p.segments.iter())
            .filter(move |s| !skip.contains(&s.category))
    }

    /// The spoken text, one blank line between segments.
    pub fn to_plain_text(&self, skip: &[SegmentCategory]) -> String {
        let parts: Vec<&str> = self
            .spoken_segments(skip)
            .map(|s| s.segment.text.as_str())
            .collect();
        let mut out = parts.join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    pub fn segment_count(&self) -> usize {
        self.pages.iter().map(|p| p.segments.len()).sum()
    }
}

/// Merged audio.
#[derive(Clone, Serialize, Deserialize)]
pub struct AudioData {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub encoding: AudioEncoding,
    /// Exact for LINEAR16; `None` for MP3.
    pub duration_ms: Option<u64>,
}

impl fmt::Debug for AudioData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioData")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("encoding", &self.encoding)
            .field("duration_ms", &self.duration_ms)
            .finish()
    }
}

/// Counters from the speech half of the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrationStats {
    pub segments_spoken: usize,
    pub segments_skipped: usize,
    pub chunks_synthesized: usize,
    pub failed_chunks: usize,
    pub characters_synthesized: usize,
    pub tts_duration_ms: u64,
    pub first_error: Option<String>,
}

/// Counters for a whole conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    pub total_segments: usize,
    pub segments_spoken: usize,
    pub segments_skipped: usize,
    pub chunks_synthesized: usize,
    pub failed_chunks: usize,
    pub characters_synthesized: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub tts_duration_ms: u64,
    pub total_duration_ms: u64,
    pub audio_duration_ms: Option<u64>,
}

/// Everything a conversion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub audio: AudioData,
    pub transcript: Transcript,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Fail if any page or speech request failed.
    pub fn into_result(self) -> Result<Self, Pdf2AudioError> {
        if self.stats.failed_pages > 0 || self.stats.failed_chunks > 0 {
            Err(Pdf2AudioError::PartialFailure {
                failed_pages: self.stats.failed_pages,
                failed_chunks: self.stats.failed_chunks,
            })
        } else {
            Ok(self)
        }
    }
}
