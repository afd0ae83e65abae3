//! Eager (full-document) conversion entry points.
//!
//! [`convert`] runs the whole pipeline and returns the merged audio with the
//! transcript it was spoken from. The two halves are also exposed on their
//! own: [`transcribe`] stops after classification and needs no TTS
//! credentials, [`narrate`] speaks a transcript produced earlier (possibly
//! edited, or loaded from a `--transcript` JSON file). Use
//! [`crate::stream::transcribe_stream`] to receive pages as they complete.

use crate::config::{AudioEncoding, ConversionConfig};
use crate::error::{PageError, Pdf2AudioError};
use crate::output::{
    AudioData, ConversionOutput, ConversionStats, DocumentMetadata, NarrationStats,
    PageTranscript, Transcript,
};
use crate::pipeline::audio::{self, AudioChunk};
use crate::pipeline::backends::{self, PageEngines};
use crate::pipeline::render::RenderedPage;
use crate::pipeline::retry::with_retry;
use crate::pipeline::speech::chunk::plan_utterances_within;
use crate::pipeline::speech::{ssml, SpeechSynthesizer, SynthesisRequest, Utterance};
use crate::pipeline::{input, page, render};
use futures::stream::{self, StreamExt};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF file or URL to a single audio file.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` : Local file path or HTTP/HTTPS URL to a PDF
/// * `config` : Conversion configuration
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some pages or speech requests
/// failed (check `stats.failed_pages` / `stats.failed_chunks`, or call
/// [`ConversionOutput::into_result`]).
///
/// # Errors
/// Returns `Err(Pdf2AudioError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - Missing credentials for a configured service
/// - All pages failed, nothing left to speak, or all speech requests failed
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2AudioError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // ── Step 2: Build engines before any page is rendered ────────────────
    let clients = backends::SharedClients::new(config)?;
    let engines = backends::page_engines(config, &clients)?;
    let synthesizer = backends::synthesizer(config, &clients)?;

    // ── Steps 3-6: Render, OCR and classify ──────────────────────────────
    let run = transcribe_document(resolved.path(), &engines, config).await?;
    let transcript = run.transcript;

    // ── Step 7: Synthesize and merge ─────────────────────────────────────
    let (audio, narration) = narrate_with(&transcript, synthesizer.as_ref(), config).await?;

    // ── Step 8: Compute stats ────────────────────────────────────────────
    let processed = transcript.pages.iter().filter(|p| p.error.is_none()).count();
    let failed = transcript.pages.len() - processed;
    let stats = ConversionStats {
        total_pages: transcript.metadata.page_count,
        processed_pages: processed,
        failed_pages: failed,
        total_segments: transcript.segment_count(),
        segments_spoken: narration.segments_spoken,
        segments_skipped: narration.segments_skipped,
        chunks_synthesized: narration.chunks_synthesized,
        failed_chunks: narration.failed_chunks,
        characters_synthesized: narration.characters_synthesized,
        total_input_tokens: transcript.pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: transcript.pages.iter().map(|p| p.output_tokens as u64).sum(),
        render_duration_ms: run.render_duration_ms,
        ocr_duration_ms: run.ocr_duration_ms,
        tts_duration_ms: narration.tts_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        audio_duration_ms: audio.duration_ms,
    };

    info!(
        "Conversion complete: {}/{} pages, {} chunks, {}ms total",
        processed,
        transcript.pages.len(),
        stats.chunks_synthesized,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(transcript.pages.len(), processed);
    }

    Ok(ConversionOutput {
        audio,
        transcript,
        stats,
    })
}

/// Convert a PDF and write the audio directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2AudioError> {
    let output = convert(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.audio.bytes).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2AudioError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2AudioError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Extract PDF metadata without converting content.
///
/// Needs no OCR or TTS credentials. Encrypted documents need
/// [`inspect_with`].
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, Pdf2AudioError> {
    inspect_with(input_str, None, 120).await
}

/// [`inspect`] with a document password and a download timeout for URLs.
pub async fn inspect_with(
    input_str: impl AsRef<str>,
    password: Option<&str>,
    download_timeout_secs: u64,
) -> Result<DocumentMetadata, Pdf2AudioError> {
    let resolved = input::resolve_input(input_str.as_ref(), download_timeout_secs).await?;
    render::extract_metadata(resolved.path(), password).await
}

/// Convert PDF bytes in memory to audio.
///
/// The bytes are written to a managed [`tempfile`] that is removed on
/// return or panic.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2audio::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::default();
/// let output = convert_from_bytes(&bytes, &config).await?;
/// std::fs::write("document.mp3", &output.audio.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2AudioError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| Pdf2AudioError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2AudioError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` is dropped (and the file deleted) when `convert` returns
    convert(&path, config).await
}

/// Render, OCR and classify a PDF without synthesizing speech.
///
/// Needs OCR credentials (and LLM credentials for the LLM classifier) but
/// none for text-to-speech.
///
/// # Errors
/// Fails like [`convert`] on input problems, and with
/// [`Pdf2AudioError::AllPagesFailed`] when no page could be read.
pub async fn transcribe(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<Transcript, Pdf2AudioError> {
    let input_str = input_str.as_ref();
    info!("Starting transcription: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let engines = backends::page_engines(config, &backends::SharedClients::new(config)?)?;
    let run = transcribe_document(resolved.path(), &engines, config).await?;

    if let Some(ref cb) = config.progress_callback {
        let ok = run.transcript.pages.iter().filter(|p| p.error.is_none()).count();
        cb.on_conversion_complete(run.transcript.pages.len(), ok);
    }
    Ok(run.transcript)
}

/// OCR and classify pages the caller has already rendered.
///
/// Pages are processed concurrently and returned sorted by page number. A
/// page that fails carries its [`PageError`]; this function only fails when
/// the engines cannot be built.
pub async fn transcribe_pages(
    pages: Vec<RenderedPage>,
    config: &ConversionConfig,
) -> Result<Vec<PageTranscript>, Pdf2AudioError> {
    let engines = backends::page_engines(config, &backends::SharedClients::new(config)?)?;
    Ok(process_pages(&engines, pages.into_iter().map(Ok).collect(), config).await)
}

/// Synthesize a transcript into one audio file.
///
/// Segments in `config.skip_categories` and failed pages are not spoken.
///
/// # Errors
/// [`Pdf2AudioError::NothingToSpeak`] when no segment is left,
/// [`Pdf2AudioError::AllChunksFailed`] when every speech request failed, and
/// merge or `segments_dir` write errors.
pub async fn narrate(
    transcript: &Transcript,
    config: &ConversionConfig,
) -> Result<(AudioData, NarrationStats), Pdf2AudioError> {
    let synthesizer = backends::synthesizer(config, &backends::SharedClients::new(config)?)?;
    narrate_with(transcript, synthesizer.as_ref(), config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct TranscriptionRun {
    transcript: Transcript,
    render_duration_ms: u64,
    ocr_duration_ms: u64,
}

/// Metadata, page selection, rendering, OCR and classification.
async fn transcribe_document(
    pdf_path: &Path,
    engines: &PageEngines,
    config: &ConversionConfig,
) -> Result<TranscriptionRun, Pdf2AudioError> {
    // ── Extract metadata ─────────────────────────────────────────────────
    let metadata = render::extract_metadata(pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    info!("PDF has {} pages", total_pages);

    // ── Compute page indices ─────────────────────────────────────────────
    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Pdf2AudioError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!("Selected {} pages for conversion", page_indices.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(page_indices.len());
    }

    // ── Rasterise pages ──────────────────────────────────────────────────
    let render_start = Instant::now();
    let rendered = render::render_pages(pdf_path, config, &page_indices).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", rendered.len(), render_duration_ms);

    // ── OCR + classify ───────────────────────────────────────────────────
    let ocr_start = Instant::now();
    let pages = process_pages(engines, rendered, config).await;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    let processed = pages.iter().filter(|p| p.error.is_none()).count();
    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| format!("{}", e))
            .unwrap_or_else(|| "Unknown error".to_string());

        return Err(Pdf2AudioError::AllPagesFailed {
            total: pages.len(),
            retries: config.max_retries,
            first_error,
        });
    }
    info!(
        "Recognised {}/{} pages in {}ms",
        processed,
        pages.len(),
        ocr_duration_ms
    );

    Ok(TranscriptionRun {
        transcript: Transcript { metadata, pages },
        render_duration_ms,
        ocr_duration_ms,
    })
}

/// Process pages concurrently, then sort by page number.
async fn process_pages(
    engines: &PageEngines,
    pages: Vec<Result<RenderedPage, PageError>>,
    config: &ConversionConfig,
) -> Vec<PageTranscript> {
    let total_pages = pages.len();
    let mut results: Vec<PageTranscript> = stream::iter(pages.into_iter().map(|rendered| async move {
        let page_num = match &rendered {
            Ok(p) => p.page_num,
            Err(e) => e.page(),
        };
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total_pages);
        }
        let result = match rendered {
            Ok(p) => page::transcribe_page(engines, p, config).await,
            Err(e) => {
                warn!("{}", e);
                PageTranscript::failed(page_num, e)
            }
        };
        if let Some(ref cb) = config.progress_callback {
            match &result.error {
                None => cb.on_page_complete(page_num, total_pages, result.segments.len()),
                Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
            }
        }
        result
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    results.sort_by_key(|p| p.page_num);
    results
}

/// Plan, synthesize and merge.
async fn narrate_with(
    transcript: &Transcript,
    synthesizer: &dyn SpeechSynthesizer,
    config: &ConversionConfig,
) -> Result<(AudioData, NarrationStats), Pdf2AudioError> {
    let tts_start = Instant::now();

    // ── Plan utterances ──────────────────────────────────────────────────
    let utterances = plan_utterances_within(transcript, config, synthesizer.max_request_bytes());
    let readable: usize = transcript
        .pages
        .iter()
        .filter(|p| p.error.is_none())
        .map(|p| p.segments.len())
        .sum();
    let segments_spoken = utterances.iter().filter(|u| u.chunk_index == 0).count();
    let segments_skipped = readable.saturating_sub(segments_spoken);
    if utterances.is_empty() {
        return Err(Pdf2AudioError::NothingToSpeak {
            skipped: segments_skipped,
        });
    }

    let requests = build_requests(&utterances, synthesizer, config);
    let total = requests.len();
    info!(
        "Synthesizing {} chunks from {} segments with {}",
        total,
        segments_spoken,
        synthesizer.name()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_synthesis_start(total);
    }

    // ── Synthesize, keeping reading order ────────────────────────────────
    let done = AtomicUsize::new(0);
    let done = &done;
    let attempts: Vec<_> = stream::iter(requests.iter().zip(&utterances).enumerate().map(
        |(i, (request, utterance))| async move {
            let label = format!(
                "Speech chunk {}/{} (page {}) via {}",
                i + 1,
                total,
                utterance.page_num,
                synthesizer.name()
            );
            let attempt = with_retry(&label, config.max_retries, config.retry_backoff_ms, || {
                synthesizer.synthesize(request)
            })
            .await;
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(ref cb) = config.progress_callback {
                cb.on_chunk_complete(n, total);
            }
            attempt
        },
    ))
    .buffered(config.tts_concurrency)
    .collect()
    .await;

    // ── Collect chunks ───────────────────────────────────────────────────
    if let Some(dir) = &config.segments_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Pdf2AudioError::OutputWriteFailed {
                path: dir.clone(),
                source: e,
            })?;
    }

    let mut chunks = Vec::with_capacity(total);
    let mut stats = NarrationStats {
        segments_spoken,
        segments_skipped,
        ..Default::default()
    };
    for (attempt, utterance) in attempts.into_iter().zip(&utterances) {
        match attempt.result {
            Ok(bytes) => {
                if let Some(dir) = &config.segments_dir {
                    let path = dir.join(segment_file_name(utterance, config.audio_encoding));
                    tokio::fs::write(&path, &bytes)
                        .await
                        .map_err(|e| Pdf2AudioError::OutputWriteFailed { path, source: e })?;
                }
                stats.chunks_synthesized += 1;
                stats.characters_synthesized += utterance.text.chars().count();
                chunks.push(AudioChunk {
                    bytes,
                    pause_after_ms: utterance.pause_after_ms,
                });
            }
            Err(e) => {
                warn!(
                    "Page {} segment {}: speech failed after {} retries: {}",
                    utterance.page_num, utterance.segment_index, attempt.retries, e
                );
                stats.failed_chunks += 1;
                stats.first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if chunks.is_empty() {
        return Err(Pdf2AudioError::AllChunksFailed {
            total,
            first_error: stats
                .first_error
                .unwrap_or_else(|| "Unknown error".to_string()),
        });
    }

    // ── Merge ────────────────────────────────────────────────────────────
    let audio = audio::merge(&chunks, config.audio_encoding)?;
    stats.tts_duration_ms = tts_start.elapsed().as_millis() as u64;
    info!(
        "Merged {} chunks into {} bytes of {} in {}ms",
        chunks.len(),
        audio.bytes.len(),
        audio.encoding,
        stats.tts_duration_ms
    );
    Ok((audio, stats))
}

/// One request per utterance.
///
/// SSML is sent when enabled and supported. Pauses become `<break>`s only
/// for MP3, where silence cannot be inserted at merge time; the last
/// utterance never gets one.
fn build_requests(
    utterances: &[Utterance],
    synthesizer: &dyn SpeechSynthesizer,
    config: &ConversionConfig,
) -> Vec<SynthesisRequest> {
    let use_ssml = config.use_ssml && synthesizer.supports_ssml();
    let breaks = config.audio_encoding == AudioEncoding::Mp3;
    let last = utterances.len().saturating_sub(1);
    utterances
        .iter()
        .enumerate()
        .map(|(i, u)| SynthesisRequest {
            text: u.text.clone(),
            ssml: use_ssml.then(|| ssml::render(u, breaks && i < last)),
            voice: config.voice.clone(),
            encoding: config.audio_encoding,
            sample_rate_hertz: config.sample_rate_hertz,
        })
        .collect()
}

fn segment_file_name(utterance: &Utterance, encoding: AudioEncoding) -> String {
    format!(
        "p{:04}_s{:03}_c{:02}.{}",
        utterance.page_num,
        utterance.segment_index,
        utterance.chunk_index,
        encoding.extension()
    )
}

/// `out.mp3` → `out.mp3.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write to `path.tmp`, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2AudioError> {
    let write_err = |e| Pdf2AudioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = temp_path(path);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SegmentCategory;

    fn utterance(page_num: usize, pause: u32) -> Utterance {
        Utterance {
            page_num,
            segment_index: 7,
            chunk_index: 2,
            category: SegmentCategory::Heading,
            text: "A & B".into(),
            pause_after_ms: pause,
        }
    }

    struct SsmlSynth(bool);

    impl SpeechSynthesizer for SsmlSynth {
        fn name(&self) -> &str {
            "ssml"
        }

        fn supports_ssml(&self) -> bool {
            self.0
        }

        fn synthesize<'a>(
            &'a self,
            _request: &'a SynthesisRequest,
        ) -> futures::future::BoxFuture<'a, Result<Vec<u8>, crate::error::ServiceError>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    #[test]
    fn segment_files_are_zero_padded() {
        assert_eq!(
            segment_file_name(&utterance(12, 0), AudioEncoding::Linear16),
            "p0012_s007_c02.wav"
        );
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(temp_path(Path::new("out/book.mp3")), PathBuf::from("out/book.mp3.tmp"));
    }

    #[test]
    fn mp3_requests_carry_breaks_except_the_last() {
        let utts = vec![utterance(1, 700), utterance(1, 1200)];
        let config = ConversionConfig::default();
        let reqs = build_requests(&utts, &SsmlSynth(true), &config);

        let first = reqs[0].ssml.as_deref().unwrap();
        assert!(first.contains("<break time=\"700ms\"/>"));
        assert!(first.contains("A &amp; B"));
        assert!(!reqs[1].ssml.as_deref().unwrap().contains("<break"));
        assert_eq!(reqs[0].text, "A & B");
    }

    #[test]
    fn wav_requests_leave_pauses_to_the_merge() {
        let utts = vec![utterance(1, 700), utterance(2, 0)];
        let config = ConversionConfig {
            audio_encoding: AudioEncoding::Linear16,
            ..Default::default()
        };
        let reqs = build_requests(&utts, &SsmlSynth(true), &config);
        assert!(reqs.iter().all(|r| !r.ssml.as_deref().unwrap().contains("<break")));
    }

    #[test]
    fn ssml_is_omitted_when_unsupported_or_disabled() {
        let utts = vec![utterance(1, 700)];
        let reqs = build_requests(&utts, &SsmlSynth(false), &ConversionConfig::default());
        assert!(reqs[0].ssml.is_none());

        let config = ConversionConfig {
            use_ssml: false,
            ..Default::default()
        };
        let reqs = build_requests(&utts, &SsmlSynth(true), &config);
        assert!(reqs[0].ssml.is_none());
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("book.wav");
        write_atomic(&path, b"RIFF").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn inspect_with_validates_input_before_opening() {
        let err = inspect_with("/no/such/dir/locked.pdf", Some("secret"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2AudioError::FileNotFound { .. }), "{err}");

        let mut notes = tempfile::NamedTempFile::new().unwrap();
        notes.write_all(b"hello, not a pdf").unwrap();
        let err = inspect_with(notes.path().to_str().unwrap(), Some("secret"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2AudioError::NotAPdf { .. }), "{err}");
    }
}
