//! End-to-end tests for edgequake-pdf2audio.
//!
//! These use real PDF files in `./test_cases/` and call the live OCR and
//! speech services. They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 DYLD_LIBRARY_PATH=. cargo test --test e2e -- --nocapture
//!
//! Google tests need GOOGLE_API_KEY or GOOGLE_APPLICATION_CREDENTIALS;
//! OpenAI tests need OPENAI_API_KEY.

use edgequake_pdf2audio::{
    convert, inspect, transcribe, transcribe_stream, AudioEncoding, ClassifierBackend,
    ConversionConfig, ConversionProgressCallback, OcrBackend, PageSelection, SegmentCategory,
    TtsBackend,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn has_env(var: &str) -> bool {
    std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false)
}

fn google_ready() -> bool {
    has_env("GOOGLE_API_KEY") || has_env("GOOGLE_APPLICATION_CREDENTIALS")
}

// ── Inspect (no network) ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_arxiv_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));

    let meta = inspect(path.to_str().unwrap())
        .await
        .expect("inspect() should succeed");

    assert_eq!(meta.page_count, 15, "Attention paper should have 15 pages");
    assert!(!meta.is_encrypted);
    assert!(!meta.pdf_version.is_empty());
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    assert!(inspect("/definitely/not/a/real/file.pdf").await.is_err());
}

// ── Transcription (OCR only) ─────────────────────────────────────────────────

#[tokio::test]
async fn test_transcribe_cloud_vision_page1() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    if !google_ready() {
        println!("SKIP: no Google credentials");
        return;
    }

    let config = ConversionConfig::builder()
        .ocr_backend(OcrBackend::CloudVision)
        .classifier_backend(ClassifierBackend::Rules)
        .pages(PageSelection::Single(1))
        .build()
        .expect("valid config");

    let transcript = transcribe(path.to_str().unwrap(), &config)
        .await
        .expect("transcription should succeed");

    assert_eq!(transcript.pages.len(), 1);
    let page = &transcript.pages[0];
    assert!(page.error.is_none(), "page failed: {:?}", page.error);
    assert!(page.segments.len() > 5, "expected several segments");
    assert!(page
        .segments
        .iter()
        .any(|s| s.category == SegmentCategory::Body));

    let text = transcript.to_plain_text(&config.skip_categories);
    assert!(text.to_lowercase().contains("attention"));
}

#[tokio::test]
async fn test_transcribe_vision_llm_stream() {
    use futures::StreamExt;

    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    if !has_env("OPENAI_API_KEY") {
        println!("SKIP: OPENAI_API_KEY not set");
        return;
    }

    let config = ConversionConfig::builder()
        .ocr_backend(OcrBackend::VisionLlm)
        .classifier_backend(ClassifierBackend::Llm)
        .provider_name("openai")
        .pages(PageSelection::Range(1, 2))
        .max_retries(2)
        .build()
        .expect("valid config");

    let mut stream = transcribe_stream(path.to_str().unwrap(), &config)
        .await
        .expect("stream creation should succeed");

    let mut pages = Vec::new();
    while let Some(result) = stream.next().await {
        match result {
            Ok(page) => pages.push(page),
            Err(e) => panic!("streaming page failed: {e}"),
        }
    }
    pages.sort_by_key(|p| p.page_num);

    assert_eq!(pages.iter().map(|p| p.page_num).collect::<Vec<_>>(), vec![1, 2]);
    for p in &pages {
        assert!(!p.segments.is_empty(), "page {} has no text", p.page_num);
        assert!(p.input_tokens > 0, "vision LLM should report token usage");
    }
}

// ── Full conversion ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_google_mp3() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    if !google_ready() {
        println!("SKIP: no Google credentials");
        return;
    }

    struct Counter(AtomicUsize);
    impl ConversionProgressCallback for Counter {
        fn on_chunk_complete(&self, done: usize, _total: usize) {
            self.0.fetch_max(done, Ordering::SeqCst);
        }
    }
    let counter = Arc::new(Counter(AtomicUsize::new(0)));

    let config = ConversionConfig::builder()
        .tts_backend(TtsBackend::Google)
        .pages(PageSelection::Single(1))
        .max_retries(2)
        .progress_callback(counter.clone())
        .build()
        .expect("valid config");

    let out = convert(path.to_str().unwrap(), &config)
        .await
        .expect("conversion should succeed");

    assert_eq!(out.stats.processed_pages, 1);
    assert_eq!(out.stats.failed_chunks, 0);
    assert!(out.stats.segments_spoken > 0);
    assert_eq!(out.audio.encoding, AudioEncoding::Mp3);
    assert!(out.audio.bytes.len() > 10_000, "audio suspiciously small");
    assert_eq!(
        counter.0.load(Ordering::SeqCst),
        out.stats.chunks_synthesized + out.stats.failed_chunks
    );

    let out_path = output_dir().join("arxiv_page1.mp3");
    std::fs::write(&out_path, &out.audio.bytes).ok();
    println!("[google-mp3] Saved to {}", out_path.display());
}

#[tokio::test]
async fn test_convert_openai_wav() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    if !has_env("OPENAI_API_KEY") {
        println!("SKIP: OPENAI_API_KEY not set");
        return;
    }

    let config = ConversionConfig::builder()
        .ocr_backend(OcrBackend::VisionLlm)
        .tts_backend(TtsBackend::OpenAi)
        .provider_name("openai")
        .audio_encoding(AudioEncoding::Linear16)
        .pages(PageSelection::Single(1))
        .build()
        .expect("valid config");

    let out = convert(path.to_str().unwrap(), &config)
        .await
        .expect("conversion should succeed");

    assert_eq!(&out.audio.bytes[..4], b"RIFF");
    let duration = out.audio.duration_ms.expect("WAV duration is exact");
    assert!(duration > 1_000, "expected more than a second of speech");
    assert_eq!(out.stats.audio_duration_ms, Some(duration));

    let json = serde_json::to_string(&out.transcript).expect("transcript serialises");
    assert!(json.contains("\"category\""));

    std::fs::write(output_dir().join("arxiv_page1.wav"), &out.audio.bytes).ok();
}
