//! Streaming transcription API: emit pages as they are recognised.
//!
//! Large documents take minutes to OCR. [`transcribe_stream`] yields each
//! [`PageTranscript`] as soon as its page is recognised and labelled, so
//! callers can show text early, narrate page by page, or write a transcript
//! incrementally. Pages arrive in completion order; sort by `page_num` if
//! order matters.

use crate::config::ConversionConfig;
use crate::error::{PageError, Pdf2AudioError};
use crate::output::PageTranscript;
use crate::pipeline::{backends, input, page, render};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page transcripts.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageTranscript, PageError>> + Send>>;

/// OCR and classify a PDF, streaming pages as they are ready.
///
/// Rendering happens before this returns; recognition happens as the stream
/// is polled, `config.concurrency` pages at a time.
///
/// # Returns
/// - `Ok(PageStream)`: a stream of `Result<PageTranscript, PageError>`
/// - `Err(Pdf2AudioError)`: fatal error (file not found, not a PDF, no
///   OCR credentials, etc.)
pub async fn transcribe_stream(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<PageStream, Pdf2AudioError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming transcription: {}", input_str);

    // ── Resolve input ────────────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    // ── Build engines ────────────────────────────────────────────────────
    let engines = backends::page_engines(config, &backends::SharedClients::new(config)?)?;

    // ── Extract metadata for page count ──────────────────────────────────
    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;

    // ── Compute page indices ─────────────────────────────────────────────
    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Pdf2AudioError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }

    // ── Render all pages ─────────────────────────────────────────────────
    // Images are owned by the stream, so the input file is no longer needed.
    let rendered = render::render_pages(&pdf_path, config, &page_indices).await?;

    // ── Build the stream ─────────────────────────────────────────────────
    let concurrency = config.concurrency;
    let config = config.clone();
    let s = stream::iter(rendered.into_iter().map(move |rendered| {
        let engines = engines.clone();
        let cfg = config.clone();
        async move {
            let mut transcript = page::transcribe_page(&engines, rendered?, &cfg).await;
            match transcript.error.take() {
                None => Ok(transcript),
                Some(e) => Err(e),
            }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

/// Streaming equivalent of [`crate::convert::convert_from_bytes`], stopping
/// after classification.
///
/// The bytes are written to a temporary file that is removed before this
/// returns; pages are already rendered by then.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2audio::{transcribe_stream_from_bytes, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::default();
/// let mut stream = transcribe_stream_from_bytes(&bytes, &config).await?;
/// while let Some(page) = stream.next().await {
///     match page {
///         Ok(p) => println!("Page {}: {} segments", p.page_num, p.segments.len()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn transcribe_stream_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<PageStream, Pdf2AudioError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| Pdf2AudioError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2AudioError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    let stream = transcribe_stream(&path, config).await?;
    drop(tmp);
    Ok(stream)
}
