//! Configuration types for PDF-to-audio conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every stage reads its knobs from the
//! same struct, so a config can be shared across tasks and logged as a whole.

use crate::error::Pdf2AudioError;
use crate::pipeline::classify::SegmentClassifier;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::speech::SpeechSynthesizer;
use crate::output::SegmentCategory;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default Cloud Vision endpoint.
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Default Cloud Text-to-Speech endpoint.
pub const DEFAULT_GOOGLE_TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Default OpenAI-compatible API base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for a PDF-to-audio conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2audio::{AudioEncoding, ConversionConfig, TtsBackend};
///
/// let config = ConversionConfig::builder()
///     .dpi(200)
///     .tts_backend(TtsBackend::OpenAi)
///     .audio_encoding(AudioEncoding::Linear16)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Cloud Vision rejects request bodies above ~20 MB; 2000 px PNGs of text
    /// pages stay far below that.
    pub max_rendered_pixels: u32,

    /// Pages in flight through OCR + classification. Default: 8.
    pub concurrency: usize,

    /// Text-to-speech requests in flight. Default: 4.
    ///
    /// Requests are issued in reading order and their results are kept in
    /// that order whatever the completion order.
    pub tts_concurrency: usize,

    // ── OCR ───────────────────────────────────────────────────────────────
    /// Which OCR service reads the page images. Default: [`OcrBackend::CloudVision`].
    pub ocr_backend: OcrBackend,

    /// Pre-constructed OCR engine. Takes precedence over `ocr_backend`.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// BCP-47 language hints forwarded to the OCR service.
    pub language_hints: Vec<String>,

    /// Segments whose OCR confidence is below this value are dropped. Default: 0.0 (keep all).
    ///
    /// Only applies when the engine reports a confidence.
    pub min_confidence: f32,

    // ── Classification ────────────────────────────────────────────────────
    /// Which classifier labels the segments. Default: [`ClassifierBackend::Rules`].
    pub classifier_backend: ClassifierBackend,

    /// Pre-constructed classifier. Takes precedence over `classifier_backend`.
    pub classifier: Option<Arc<dyn SegmentClassifier>>,

    /// Categories that are not read aloud. Default: page furniture.
    pub skip_categories: Vec<SegmentCategory>,

    // ── Speech ────────────────────────────────────────────────────────────
    /// Which TTS service speaks the text. Default: [`TtsBackend::Google`].
    pub tts_backend: TtsBackend,

    /// Pre-constructed synthesizer. Takes precedence over `tts_backend`.
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,

    /// Voice selection and prosody.
    pub voice: VoiceSettings,

    /// Container of the produced audio. Default: [`AudioEncoding::Mp3`].
    pub audio_encoding: AudioEncoding,

    /// Requested sample rate; `None` lets the service choose.
    pub sample_rate_hertz: Option<u32>,

    /// Send SSML (emphasis, breaks) to synthesizers that accept it. Default: true.
    pub use_ssml: bool,

    /// Silence after an ordinary segment, in ms. Default: 350.
    pub segment_pause_ms: u32,

    /// Silence after a heading, in ms. Default: 700.
    pub heading_pause_ms: u32,

    /// Silence after the last segment of a page, in ms. Default: 1200.
    pub page_pause_ms: u32,

    /// Upper bound on one TTS request's input, in bytes. Default: 4500.
    ///
    /// Google's limit is 5000 bytes of text or SSML; OpenAI's is 4096
    /// characters. The SSML envelope is included in the measurement.
    pub max_chunk_bytes: usize,

    /// TTS model for OpenAI-compatible speech endpoints. Default: "gpt-4o-mini-tts".
    pub tts_model: String,

    /// Voice name for OpenAI-compatible speech endpoints. Default: "alloy".
    pub openai_voice: String,

    /// Also write every synthesized chunk to this directory.
    pub segments_dir: Option<PathBuf>,

    // ── LLM (vision OCR and LLM classifier) ───────────────────────────────
    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for LLM calls. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 4096.
    pub max_tokens: usize,

    // ── Transport ─────────────────────────────────────────────────────────
    /// Maximum retry attempts on a transient failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-request timeout for every remote call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Cloud Vision `images:annotate` URL.
    pub vision_endpoint: String,

    /// Cloud Text-to-Speech `text:synthesize` URL.
    pub google_tts_endpoint: String,

    /// Base URL of the OpenAI-compatible speech API.
    pub openai_base_url: String,

    // ── Document ──────────────────────────────────────────────────────────
    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
            concurrency: 8,
            tts_concurrency: 4,
            ocr_backend: OcrBackend::default(),
            ocr_engine: None,
            language_hints: Vec::new(),
            min_confidence: 0.0,
            classifier_backend: ClassifierBackend::default(),
            classifier: None,
            skip_categories: vec![SegmentCategory::PageFurniture],
            tts_backend: TtsBackend::default(),
            synthesizer: None,
            voice: VoiceSettings::default(),
            audio_encoding: AudioEncoding::default(),
            sample_rate_hertz: None,
            use_ssml: true,
            segment_pause_ms: 350,
            heading_pause_ms: 700,
            page_pause_ms: 1200,
            max_chunk_bytes: 4500,
            tts_model: "gpt-4o-mini-tts".to_string(),
            openai_voice: "alloy".to_string(),
            segments_dir: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            vision_endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            google_tts_endpoint: DEFAULT_GOOGLE_TTS_ENDPOINT.to_string(),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            password: None,
            pages: PageSelection::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("tts_concurrency", &self.tts_concurrency)
            .field("ocr_backend", &self.ocr_backend)
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|e| e.name().to_string()))
            .field("language_hints", &self.language_hints)
            .field("min_confidence", &self.min_confidence)
            .field("classifier_backend", &self.classifier_backend)
            .field("classifier", &self.classifier.as_ref().map(|c| c.name().to_string()))
            .field("skip_categories", &self.skip_categories)
            .field("tts_backend", &self.tts_backend)
            .field("synthesizer", &self.synthesizer.as_ref().map(|s| s.name().to_string()))
            .field("voice", &self.voice)
            .field("audio_encoding", &self.audio_encoding)
            .field("use_ssml", &self.use_ssml)
            .field("max_chunk_bytes", &self.max_chunk_bytes)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_retries", &self.max_retries)
            .field("pages", &self.pages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether a segment of `category` is read aloud.
    pub fn speaks(&self, category: SegmentCategory) -> bool {
        !self.skip_categories.contains(&category)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn tts_concurrency(mut self, n: usize) -> Self {
        self.config.tts_concurrency = n.max(1);
        self
    }

    pub fn ocr_backend(mut self, backend: OcrBackend) -> Self {
        self.config.ocr_backend = backend;
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn language_hints(mut self, hints: Vec<String>) -> Self {
        self.config.language_hints = hints;
        self
    }

    pub fn min_confidence(mut self, c: f32) -> Self {
        self.config.min_confidence = c;
        self
    }

    pub fn classifier_backend(mut self, backend: ClassifierBackend) -> Self {
        self.config.classifier_backend = backend;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn SegmentClassifier>) -> Self {
        self.config.classifier = Some(classifier);
        self
    }

    pub fn skip_categories(mut self, categories: Vec<SegmentCategory>) -> Self {
        self.config.skip_categories = categories;
        self
    }

    pub fn tts_backend(mut self, backend: TtsBackend) -> Self {
        self.config.tts_backend = backend;
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.config.synthesizer = Some(synthesizer);
        self
    }

    pub fn voice(mut self, voice: VoiceSettings) -> Self {
        self.config.voice = voice;
        self
    }

    pub fn audio_encoding(mut self, encoding: AudioEncoding) -> Self {
        self.config.audio_encoding = encoding;
        self
    }

    pub fn sample_rate_hertz(mut self, hz: u32) -> Self {
        self.config.sample_rate_hertz = Some(hz);
        self
    }

    pub fn use_ssml(mut self, v: bool) -> Self {
        self.config.use_ssml = v;
        self
    }

    pub fn segment_pause_ms(mut self, ms: u32) -> Self {
        self.config.segment_pause_ms = ms;
        self
    }

    pub fn heading_pause_ms(mut self, ms: u32) -> Self {
        self.config.heading_pause_ms = ms;
        self
    }

    pub fn page_pause_ms(mut self, ms: u32) -> Self {
        self.config.page_pause_ms = ms;
        self
    }

    pub fn max_chunk_bytes(mut self, n: usize) -> Self {
        self.config.max_chunk_bytes = n;
        self
    }

    pub fn tts_model(mut self, model: impl Into<String>) -> Self {
        self.config.tts_model = model.into();
        self
    }

    pub fn openai_voice(mut self, voice: impl Into<String>) -> Self {
        self.config.openai_voice = voice.into();
        self
    }

    pub fn segments_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.segments_dir = Some(dir.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn vision_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.vision_endpoint = url.into();
        self
    }

    pub fn google_tts_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.google_tts_endpoint = url.into();
        self
    }

    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.openai_base_url = url.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2AudioError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Pdf2AudioError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 || c.tts_concurrency == 0 {
            return Err(Pdf2AudioError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        // Room for the <speak> envelope plus a few words of text.
        if c.max_chunk_bytes < 200 {
            return Err(Pdf2AudioError::InvalidConfig(format!(
                "max_chunk_bytes must be ≥ 200, got {}",
                c.max_chunk_bytes
            )));
        }
        if !(0.25..=4.0).contains(&c.voice.speaking_rate) {
            return Err(Pdf2AudioError::InvalidConfig(format!(
                "Speaking rate must be 0.25–4.0, got {}",
                c.voice.speaking_rate
            )));
        }
        if !(-20.0..=20.0).contains(&c.voice.pitch) {
            return Err(Pdf2AudioError::InvalidConfig(format!(
                "Pitch must be -20.0–20.0 semitones, got {}",
                c.voice.pitch
            )));
        }
        if !(0.0..=1.0).contains(&c.min_confidence) {
            return Err(Pdf2AudioError::InvalidConfig(format!(
                "min_confidence must be 0.0–1.0, got {}",
                c.min_confidence
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// OCR service used when no engine is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrBackend {
    /// Google Cloud Vision `DOCUMENT_TEXT_DETECTION`. (default)
    #[default]
    CloudVision,
    /// A vision-capable LLM transcribes the page.
    VisionLlm,
}

/// Segment classifier used when no classifier is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassifierBackend {
    /// Layout and keyword heuristics, no network. (default)
    #[default]
    Rules,
    /// One LLM call per page.
    Llm,
    /// Every segment is read as body text (OCR hints still apply).
    Disabled,
}

/// Text-to-speech service used when no synthesizer is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TtsBackend {
    /// Google Cloud Text-to-Speech. (default)
    #[default]
    Google,
    /// OpenAI-compatible `/audio/speech`.
    OpenAi,
}

/// Audio container produced by the synthesizer and the merge step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioEncoding {
    /// MPEG-1 Layer III. (default)
    #[default]
    Mp3,
    /// 16-bit signed PCM in a RIFF/WAVE container.
    Linear16,
}

impl AudioEncoding {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::Linear16 => "wav",
        }
    }

    /// MIME type of the container.
    pub fn mime_type(self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "audio/mpeg",
            AudioEncoding::Linear16 => "audio/wav",
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioEncoding::Mp3 => write!(f, "MP3"),
            AudioEncoding::Linear16 => write!(f, "LINEAR16"),
        }
    }
}

/// Voice selection and prosody.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// BCP-47 language code. Default: "en-US".
    pub language_code: String,
    /// Vendor voice name, e.g. "en-US-Neural2-F". None lets the service pick.
    pub name: Option<String>,
    /// 0.25–4.0, 1.0 is normal speed.
    pub speaking_rate: f32,
    /// Semitones, -20.0–20.0.
    pub pitch: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            name: None,
            speaking_rate: 1.0,
            pitch: 0.0,
        }
    }
}

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
