//! # edgequake-pdf2audio
//!
//! Turn PDF documents into a single narrated audio file.
//!
//! The heavy lifting (OCR, speech synthesis) is done by cloud services; this
//! crate is the glue that renders pages, sends them to an OCR engine, works
//! out which text is worth reading aloud, feeds it to a text-to-speech
//! engine in request-sized pieces, and stitches the audio back together.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. OCR       Cloud Vision DOCUMENT_TEXT_DETECTION, or a vision LLM
//!  ├─ 4. Classify  body / heading / caption / footnote / page furniture …
//!  ├─ 5. Speak     Google Cloud TTS or OpenAI speech, SSML pauses
//!  └─ 6. Merge     one MP3 or WAV + transcript + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2audio::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Google credentials from GOOGLE_API_KEY or GOOGLE_APPLICATION_CREDENTIALS
//!     let config = ConversionConfig::default();
//!     let stats = convert_to_file("paper.pdf", "paper.mp3", &config).await?;
//!     eprintln!("{} segments spoken, {} skipped",
//!         stats.segments_spoken,
//!         stats.segments_skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Plugging in your own services
//!
//! Each vendor sits behind a trait: [`OcrEngine`], [`SegmentClassifier`]
//! and [`SpeechSynthesizer`]. Pass an `Arc` of your implementation to the
//! config builder to replace the built-in one.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2audio` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2audio = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod auth;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use auth::GoogleAuth;
pub use config::{
    AudioEncoding, ClassifierBackend, ConversionConfig, ConversionConfigBuilder, OcrBackend,
    PageSelection, TtsBackend, VoiceSettings,
};
pub use convert::{
    convert, convert_from_bytes, convert_sync, convert_to_file, inspect, inspect_with, narrate,
    transcribe, transcribe_pages,
};
pub use error::{PageError, Pdf2AudioError, ServiceError};
pub use output::{
    AudioData, BoundingBox, ConversionOutput, ConversionStats, DocumentMetadata, LabeledSegment,
    NarrationStats, PageTranscript, SegmentCategory, TextSegment, Transcript,
};
pub use pipeline::classify::{
    DisabledClassifier, LlmClassifier, PageLayout, RuleClassifier, SegmentClassifier,
};
pub use pipeline::ocr::{CloudVisionOcr, OcrEngine, OcrPage, VisionLlmOcr};
pub use pipeline::render::RenderedPage;
pub use pipeline::speech::{GoogleTts, OpenAiTts, SpeechSynthesizer, SynthesisRequest, Utterance};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{transcribe_stream, transcribe_stream_from_bytes, PageStream};
