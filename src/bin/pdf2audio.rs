//! CLI binary for edgequake-pdf2audio.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig`, writes the audio and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2audio::{
    convert, inspect_with, narrate, transcribe, AudioEncoding, ClassifierBackend, ConversionConfig,
    ConversionProgressCallback, OcrBackend, PageSelection, ProgressCallback, SegmentCategory,
    Transcript, TtsBackend, VoiceSettings,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar for OCR pages, then the same bar reused for
/// speech chunks. Pages may complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, prefix: &'static str, unit: &str) {
        let progress_style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }

    fn page_elapsed(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages, "Reading", "pages");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, segments: usize) {
        let elapsed = self.page_elapsed(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{segments:>3} segments")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed = self.page_elapsed(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_synthesis_start(&self, total_chunks: usize) {
        self.activate_bar(total_chunks, "Speaking", "chunks");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Synthesizing {total_chunks} speech chunks…"))
        ));
    }

    fn on_chunk_complete(&self, done: usize, _total: usize) {
        self.bar.set_position(done as u64);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages read successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages read  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes paper.mp3 next to the input)
  pdf2audio paper.pdf

  # WAV output, British voice, slightly faster
  pdf2audio paper.pdf -o paper.wav --encoding wav --language en-GB --voice en-GB-Neural2-B --rate 1.15

  # Only pages 3-10, read headers and footers too
  pdf2audio --pages 3-10 --read-all book.pdf

  # Vision-LLM OCR and OpenAI speech (only OPENAI_API_KEY needed)
  pdf2audio --ocr vlm --tts openai --voice nova report.pdf

  # Check what would be read, without any speech synthesis
  pdf2audio --text-only paper.pdf

  # Save the transcript, edit it, then narrate the edited version
  pdf2audio --text-only --transcript paper.json paper.pdf
  pdf2audio --from-transcript paper.json -o paper.mp3

  # Inspect PDF metadata (no credentials needed)
  pdf2audio --inspect-only document.pdf

SEGMENT CATEGORIES (for --skip):
  body, heading, list_item, table, caption, footnote, page_furniture

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY                  API key for Cloud Vision and Cloud Text-to-Speech
  GOOGLE_OAUTH_ACCESS_TOKEN       Static OAuth access token (alternative to an API key)
  GOOGLE_APPLICATION_CREDENTIALS  authorized_user credential file (gcloud auth application-default login)
  OPENAI_API_KEY                  OpenAI key (speech, vision OCR, LLM classifier)
  OPENAI_BASE_URL                 OpenAI-compatible base URL for speech
  EDGEQUAKE_LLM_PROVIDER          LLM provider for --ocr vlm / --classifier llm
  EDGEQUAKE_MODEL                 LLM model ID
  PDFIUM_LIB_PATH                 Path to libpdfium (file or directory)
  RUST_LOG                        Log filter, overrides -v / -q
"#;

/// Turn PDF files and URLs into narrated audio.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2audio",
    version,
    about = "Turn PDF files and URLs into narrated audio",
    long_about = "Turn PDF documents (local files or URLs) into a single narrated audio file. \
Pages are read by a cloud OCR service, page furniture such as running headers and page \
numbers is filtered out, and the remaining text is spoken by Google Cloud Text-to-Speech or \
an OpenAI-compatible speech endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "from_transcript")]
    input: Option<String>,

    /// Audio output path. Default: input stem + .mp3/.wav.
    #[arg(short, long, env = "PDF2AUDIO_OUTPUT")]
    output: Option<PathBuf>,

    /// OCR engine.
    #[arg(long, env = "PDF2AUDIO_OCR", value_enum, default_value = "cloud-vision")]
    ocr: OcrArg,

    /// Segment classifier.
    #[arg(long, env = "PDF2AUDIO_CLASSIFIER", value_enum, default_value = "rules")]
    classifier: ClassifierArg,

    /// Text-to-speech engine.
    #[arg(long, env = "PDF2AUDIO_TTS", value_enum, default_value = "google")]
    tts: TtsArg,

    /// Voice name (e.g. en-US-Neural2-F for Google, nova for OpenAI).
    #[arg(long, env = "PDF2AUDIO_VOICE")]
    voice: Option<String>,

    /// BCP-47 language of the voice; also sent to OCR as a hint.
    #[arg(long, env = "PDF2AUDIO_LANGUAGE", default_value = "en-US")]
    language: String,

    /// Speaking rate (0.25–4.0).
    #[arg(long, env = "PDF2AUDIO_RATE", default_value_t = 1.0)]
    rate: f32,

    /// Pitch in semitones (-20.0–20.0, Google only).
    #[arg(long, env = "PDF2AUDIO_PITCH", default_value_t = 0.0, allow_hyphen_values = true)]
    pitch: f32,

    /// Audio container.
    #[arg(long, env = "PDF2AUDIO_ENCODING", value_enum, default_value = "mp3")]
    encoding: EncodingArg,

    /// Sample rate in Hz (service default if unset).
    #[arg(long, env = "PDF2AUDIO_SAMPLE_RATE")]
    sample_rate: Option<u32>,

    /// Send plain text instead of SSML.
    #[arg(long, env = "PDF2AUDIO_NO_SSML")]
    no_ssml: bool,

    /// Read page furniture (headers, footers, page numbers) too.
    #[arg(long, env = "PDF2AUDIO_READ_ALL", conflicts_with = "skip")]
    read_all: bool,

    /// Categories not to read, comma separated. Default: page_furniture.
    #[arg(long, env = "PDF2AUDIO_SKIP", value_delimiter = ',')]
    skip: Vec<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2AUDIO_PAGES", default_value = "all")]
    pages: String,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2AUDIO_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Pages processed concurrently (OCR + classification).
    #[arg(short, long, env = "PDF2AUDIO_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Speech requests in flight.
    #[arg(long, env = "PDF2AUDIO_TTS_CONCURRENCY", default_value_t = 4)]
    tts_concurrency: usize,

    /// LLM model ID for --ocr vlm / --classifier llm.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// TTS model for --tts openai.
    #[arg(long, env = "PDF2AUDIO_TTS_MODEL", default_value = "gpt-4o-mini-tts")]
    tts_model: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2AUDIO_PASSWORD")]
    password: Option<String>,

    /// Retries per remote call on transient failure.
    #[arg(long, env = "PDF2AUDIO_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Also write the labelled transcript as JSON to this path.
    #[arg(long, env = "PDF2AUDIO_TRANSCRIPT")]
    transcript: Option<PathBuf>,

    /// Narrate a transcript JSON file instead of reading a PDF.
    #[arg(long, conflicts_with_all = ["text_only", "inspect_only"])]
    from_transcript: Option<PathBuf>,

    /// Print the text that would be spoken; no speech synthesis.
    #[arg(long)]
    text_only: bool,

    /// Also write every synthesized chunk to this directory.
    #[arg(long, env = "PDF2AUDIO_SEGMENTS_DIR")]
    segments_dir: Option<PathBuf>,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Print structured JSON (stats, or the transcript with --text-only) to stdout.
    #[arg(long, env = "PDF2AUDIO_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2AUDIO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2AUDIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2AUDIO_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2AUDIO_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-request timeout for OCR, LLM and speech calls in seconds.
    #[arg(long, env = "PDF2AUDIO_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OcrArg {
    CloudVision,
    Vlm,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ClassifierArg {
    Rules,
    Llm,
    Off,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TtsArg {
    Google,
    Openai,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EncodingArg {
    Mp3,
    Wav,
}

impl From<OcrArg> for OcrBackend {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::CloudVision => OcrBackend::CloudVision,
            OcrArg::Vlm => OcrBackend::VisionLlm,
        }
    }
}

impl From<ClassifierArg> for ClassifierBackend {
    fn from(v: ClassifierArg) -> Self {
        match v {
            ClassifierArg::Rules => ClassifierBackend::Rules,
            ClassifierArg::Llm => ClassifierBackend::Llm,
            ClassifierArg::Off => ClassifierBackend::Disabled,
        }
    }
}

impl From<TtsArg> for TtsBackend {
    fn from(v: TtsArg) -> Self {
        match v {
            TtsArg::Google => TtsBackend::Google,
            TtsArg::Openai => TtsBackend::OpenAi,
        }
    }
}

impl From<EncodingArg> for AudioEncoding {
    fn from(v: EncodingArg) -> Self {
        match v {
            EncodingArg::Mp3 => AudioEncoding::Mp3,
            EncodingArg::Wav => AudioEncoding::Linear16,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so INFO logs
    // are suppressed while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let input = required_input(&cli)?;
        let meta = inspect_with(input, cli.password.as_deref(), cli.download_timeout)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            println!("Encrypted:    {}", meta.is_encrypted);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Text-only: transcribe and print ──────────────────────────────────
    if cli.text_only {
        let transcript = transcribe(required_input(&cli)?, &config)
            .await
            .context("Transcription failed")?;
        if let Some(ref path) = cli.transcript {
            write_transcript(path, &transcript).await?;
        }
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&transcript).context("Failed to serialise transcript")?
            );
        } else {
            let text = transcript.to_plain_text(&config.skip_categories);
            io::stdout()
                .lock()
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
        }
        return Ok(());
    }

    // ── Narrate a saved transcript ───────────────────────────────────────
    if let Some(ref path) = cli.from_transcript {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        let transcript: Transcript = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a transcript JSON file", path.display()))?;
        let output_path = output_path(&cli, &path.to_string_lossy(), config.audio_encoding);

        let (audio, stats) = narrate(&transcript, &config)
            .await
            .context("Narration failed")?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_complete(transcript.pages.len(), transcript.pages.len());
        }
        write_audio(&output_path, &audio.bytes).await?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {} segments  {} chunks  →  {}",
                if stats.failed_chunks == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.segments_spoken,
                stats.chunks_synthesized,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let input = required_input(&cli)?;
    let output_path = output_path(&cli, input, config.audio_encoding);
    let output = convert(input, &config).await.context("Conversion failed")?;

    write_audio(&output_path, &output.audio.bytes).await?;
    if let Some(ref path) = cli.transcript {
        write_transcript(path, &output.transcript).await?;
    }

    let stats = &output.stats;
    if cli.json {
        let json = serde_json::to_string_pretty(stats).context("Failed to serialise stats")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {}/{} pages  {} segments spoken  {} skipped  {}ms  →  {}",
            if stats.failed_pages == 0 && stats.failed_chunks == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.processed_pages,
            stats.processed_pages + stats.failed_pages,
            stats.segments_spoken,
            stats.segments_skipped,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if stats.failed_chunks > 0 {
            eprintln!(
                "   {} speech chunks failed and are missing from the audio",
                red(&stats.failed_chunks.to_string())
            );
        }
        let audio_len = stats
            .audio_duration_ms
            .map(|ms| format!("{:.1}s of audio", ms as f64 / 1000.0))
            .unwrap_or_else(|| format!("{} bytes", output.audio.bytes.len()));
        eprintln!(
            "   {} characters spoken  /  {}",
            dim(&stats.characters_synthesized.to_string()),
            dim(&audio_len),
        );
    }

    Ok(())
}

fn required_input(cli: &Cli) -> Result<&str> {
    cli.input
        .as_deref()
        .context("An input PDF path or URL is required")
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let pages = parse_pages(&cli.pages)?;
    let skip = if cli.read_all {
        Vec::new()
    } else if cli.skip.is_empty() {
        vec![SegmentCategory::PageFurniture]
    } else {
        parse_categories(&cli.skip)?
    };

    let mut builder = ConversionConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .tts_concurrency(cli.tts_concurrency)
        .pages(pages)
        .ocr_backend(cli.ocr.into())
        .language_hints(vec![cli.language.clone()])
        .classifier_backend(cli.classifier.into())
        .skip_categories(skip)
        .tts_backend(cli.tts.into())
        .voice(VoiceSettings {
            language_code: cli.language.clone(),
            name: cli.voice.clone(),
            speaking_rate: cli.rate,
            pitch: cli.pitch,
        })
        .audio_encoding(cli.encoding.into())
        .use_ssml(!cli.no_ssml)
        .tts_model(cli.tts_model.clone())
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(hz) = cli.sample_rate {
        builder = builder.sample_rate_hertz(hz);
    }
    if let Some(ref dir) = cli.segments_dir {
        builder = builder.segments_dir(dir.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `-o`, or the input's file stem with the encoding's extension.
fn output_path(cli: &Cli, input: &str, encoding: AudioEncoding) -> PathBuf {
    if let Some(ref p) = cli.output {
        return p.clone();
    }
    let last = input
        .split(['?', '#'])
        .next()
        .unwrap_or(input)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(input);
    let stem = Path::new(last)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{stem}.{}", encoding.extension()))
}

/// Write via `<path>.tmp` + rename so a failed run never leaves a truncated file.
async fn write_audio(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn write_transcript(path: &Path, transcript: &Transcript) -> Result<()> {
    let json = serde_json::to_string_pretty(transcript).context("Failed to serialise transcript")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write transcript to {}", path.display()))
}

/// Parse `--skip` values into categories.
fn parse_categories(values: &[String]) -> Result<Vec<SegmentCategory>> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| {
            SegmentCategory::from_label(v)
                .with_context(|| format!("Unknown segment category '{v}'"))
        })
        .collect()
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
