//! Pipeline integration tests with in-process engines.
//!
//! OCR, classification and speech are replaced by mocks injected through the
//! config builder, so these run without pdfium, network or credentials.

use edgequake_pdf2audio::pipeline::encode::EncodedPage;
use edgequake_pdf2audio::{
    narrate, transcribe, transcribe_pages, AudioEncoding, BoundingBox, ConversionConfig,
    ConversionProgressCallback, LabeledSegment, OcrEngine, OcrPage, PageTranscript,
    Pdf2AudioError, RenderedPage, SegmentCategory, ServiceError, SpeechSynthesizer,
    SynthesisRequest, TextSegment, Transcript,
};
use futures::future::BoxFuture;
use image::{DynamicImage, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Mocks ────────────────────────────────────────────────────────────────────

/// Every page: a running header, one paragraph, a page number.
struct LayoutOcr;

impl OcrEngine for LayoutOcr {
    fn name(&self) -> &str {
        "layout"
    }

    fn recognize<'a>(&'a self, page: &'a EncodedPage) -> BoxFuture<'a, Result<OcrPage, ServiceError>> {
        Box::pin(async move {
            let n = page.page_num;
            // Later pages finish first, to exercise re-sorting.
            tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(5 * n as u64))).await;
            let w = page.width as f32;
            let h = page.height as f32;
            let seg = |i: usize, text: String, top: f32, bottom: f32| TextSegment {
                bounding_box: Some(BoundingBox::from_rect(0.05 * w, top * h, 0.95 * w, bottom * h)),
                confidence: Some(0.98),
                ..TextSegment::new(n, i, text)
            };
            Ok(OcrPage {
                segments: vec![
                    seg(0, "Journal of Integration Tests".into(), 0.01, 0.03),
                    seg(
                        1,
                        format!("Page {n} body text that goes on for a while and ends properly."),
                        0.40,
                        0.60,
                    ),
                    seg(2, n.to_string(), 0.97, 0.99),
                ],
                ..Default::default()
            })
        })
    }
}

/// Returns a 10 ms mono 8 kHz WAV whose samples are the request's first byte.
#[derive(Default)]
struct WavSynth {
    requests: Mutex<Vec<SynthesisRequest>>,
    fail_containing: Option<&'static str>,
    transient_failures: AtomicUsize,
}

const RATE: u32 = 8000;
const CHUNK_MS: u32 = 10;

fn wav_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// `ms` of mono 16-bit audio whose every sample is `fill` in both bytes.
fn wav(fill: u8, ms: u32) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut out, wav_spec()).unwrap();
    for _ in 0..RATE * ms / 1000 {
        writer.write_sample(i16::from_le_bytes([fill, fill])).unwrap();
    }
    writer.finalize().unwrap();
    out.into_inner()
}

fn samples(wav: &[u8]) -> Vec<i16> {
    let mut reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
    assert_eq!(reader.spec(), wav_spec());
    reader.samples::<i16>().map(Result::unwrap).collect()
}

impl SpeechSynthesizer for WavSynth {
    fn name(&self) -> &str {
        "wav"
    }

    fn supports_ssml(&self) -> bool {
        true
    }

    fn synthesize<'a>(&'a self, request: &'a SynthesisRequest) -> BoxFuture<'a, Result<Vec<u8>, ServiceError>> {
        Box::pin(async move {
            // Uneven latency so completion order differs from request order.
            let jitter = (request.text.len() % 3) as u64 * 7;
            tokio::time::sleep(Duration::from_millis(jitter)).await;

            if self
                .transient_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ServiceError::RateLimited {
                    service: "wav".into(),
                    retry_after_secs: Some(0),
                });
            }
            if let Some(marker) = self.fail_containing {
                if request.text.contains(marker) {
                    return Err(ServiceError::Http {
                        service: "wav".into(),
                        status: 400,
                        body: "rejected".into(),
                    });
                }
            }
            if let Ok(mut r) = self.requests.lock() {
                r.push(request.clone());
            }
            Ok(wav(request.text.as_bytes()[0], CHUNK_MS))
        })
    }
}

#[derive(Default)]
struct Counting {
    pages_done: AtomicUsize,
    chunks_total: AtomicUsize,
    chunks_done: AtomicUsize,
}

impl ConversionProgressCallback for Counting {
    fn on_page_complete(&self, _page: usize, _total: usize, _segments: usize) {
        self.pages_done.fetch_add(1, Ordering::SeqCst);
    }

    fn on_synthesis_start(&self, total_chunks: usize) {
        self.chunks_total.store(total_chunks, Ordering::SeqCst);
    }

    fn on_chunk_complete(&self, done: usize, _total: usize) {
        self.chunks_done.fetch_max(done, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rendered(page_num: usize) -> RenderedPage {
    RenderedPage {
        page_num,
        image: DynamicImage::ImageRgb8(RgbImage::new(100, 500)),
    }
}

fn labeled(page: usize, idx: usize, text: &str, category: SegmentCategory) -> LabeledSegment {
    LabeledSegment {
        segment: TextSegment::new(page, idx, text),
        category,
    }
}

fn page(page_num: usize, segments: Vec<LabeledSegment>) -> PageTranscript {
    PageTranscript {
        page_num,
        width: 100,
        height: 500,
        segments,
        classified_by: "test".into(),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 0,
        retries: 0,
        error: None,
    }
}

fn sample_transcript() -> Transcript {
    use SegmentCategory::*;
    Transcript {
        metadata: Default::default(),
        pages: vec![
            page(
                1,
                vec![
                    labeled(1, 0, "Intro", Heading),
                    labeled(1, 1, "Alpha text.", Body),
                    labeled(1, 2, "1", PageFurniture),
                ],
            ),
            page(2, vec![labeled(2, 0, "Beta text.", Body)]),
        ],
    }
}

fn wav_config(synth: Arc<WavSynth>) -> ConversionConfig {
    ConversionConfig::builder()
        .synthesizer(synth)
        .audio_encoding(AudioEncoding::Linear16)
        .segment_pause_ms(100)
        .heading_pause_ms(200)
        .page_pause_ms(500)
        .tts_concurrency(3)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

/// Samples per millisecond of the mock's audio.
const SAMPLES_PER_MS: usize = RATE as usize / 1000;

// ── transcribe_pages ─────────────────────────────────────────────────────────

#[tokio::test]
async fn transcribe_pages_sorts_and_labels_furniture() {
    let progress = Arc::new(Counting::default());
    let config = ConversionConfig::builder()
        .ocr_engine(Arc::new(LayoutOcr))
        .concurrency(3)
        .progress_callback(progress.clone())
        .build()
        .unwrap();

    let pages = transcribe_pages(vec![rendered(2), rendered(1), rendered(3)], &config)
        .await
        .expect("mock engines need no credentials");

    let order: Vec<usize> = pages.iter().map(|p| p.page_num).collect();
    assert_eq!(order, vec![1, 2, 3]);
    assert_eq!(progress.pages_done.load(Ordering::SeqCst), 3);

    for p in &pages {
        assert!(p.error.is_none());
        assert_eq!(p.classified_by, "rules");
        let cats: Vec<SegmentCategory> = p.segments.iter().map(|s| s.category).collect();
        assert_eq!(
            cats,
            vec![
                SegmentCategory::PageFurniture,
                SegmentCategory::Body,
                SegmentCategory::PageFurniture
            ],
            "page {}",
            p.page_num
        );
    }

    let transcript = Transcript {
        metadata: Default::default(),
        pages,
    };
    let text = transcript.to_plain_text(&config.skip_categories);
    assert!(text.starts_with("Page 1 body text"));
    assert!(!text.contains("Journal"));
}

// ── narrate ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn narrate_merges_wav_in_reading_order_with_pauses() {
    let synth = Arc::new(WavSynth::default());
    let progress = Arc::new(Counting::default());
    let config = ConversionConfig {
        progress_callback: Some(progress.clone() as Arc<dyn ConversionProgressCallback>),
        ..wav_config(synth.clone())
    };

    // Through JSON, as `--from-transcript` does.
    let json = serde_json::to_string(&sample_transcript()).unwrap();
    let transcript: Transcript = serde_json::from_str(&json).unwrap();

    let (audio, stats) = narrate(&transcript, &config).await.expect("narration succeeds");

    assert_eq!(stats.segments_spoken, 3);
    assert_eq!(stats.segments_skipped, 1);
    assert_eq!(stats.chunks_synthesized, 3);
    assert_eq!(stats.failed_chunks, 0);
    assert_eq!(stats.characters_synthesized, "Intro".len() + "Alpha text.".len() + "Beta text.".len());
    assert_eq!(progress.chunks_total.load(Ordering::SeqCst), 3);
    assert_eq!(progress.chunks_done.load(Ordering::SeqCst), 3);

    // 3 × 10 ms of speech + 200 ms after the heading + 500 ms page break.
    // Nothing follows the final chunk.
    assert_eq!(audio.encoding, AudioEncoding::Linear16);
    assert_eq!(audio.duration_ms, Some(3 * CHUNK_MS as u64 + 200 + 500));
    let pcm = samples(&audio.bytes);
    let chunk = CHUNK_MS as usize * SAMPLES_PER_MS;
    assert_eq!(pcm.len(), 3 * chunk + 700 * SAMPLES_PER_MS);
    assert_eq!(pcm[0], i16::from_le_bytes([b'I', b'I']));
    assert_eq!(pcm[chunk], 0, "silence after the heading");
    let alpha = chunk + 200 * SAMPLES_PER_MS;
    assert_eq!(pcm[alpha], i16::from_le_bytes([b'A', b'A']));
    let beta = alpha + chunk + 500 * SAMPLES_PER_MS;
    assert_eq!(pcm[beta], i16::from_le_bytes([b'B', b'B']));

    // WAV pauses are inserted at merge time, so no SSML breaks were sent.
    let requests = synth.requests.lock().unwrap();
    assert!(requests.iter().all(|r| !r.ssml.as_deref().unwrap_or("").contains("<break")));
    let heading = requests.iter().find(|r| r.text == "Intro").unwrap();
    assert!(heading.ssml.as_deref().unwrap().contains("<emphasis"));
}

#[tokio::test]
async fn transient_tts_errors_are_retried() {
    let synth = Arc::new(WavSynth {
        transient_failures: AtomicUsize::new(2),
        ..Default::default()
    });
    let (_, stats) = narrate(&sample_transcript(), &wav_config(synth.clone()))
        .await
        .expect("retries absorb rate limiting");
    assert_eq!(stats.chunks_synthesized, 3);
    assert_eq!(stats.failed_chunks, 0);
}

#[tokio::test]
async fn failed_chunks_are_left_out_of_the_audio() {
    let synth = Arc::new(WavSynth {
        fail_containing: Some("Alpha"),
        ..Default::default()
    });
    let (audio, stats) = narrate(&sample_transcript(), &wav_config(synth))
        .await
        .expect("partial failure still produces audio");

    assert_eq!(stats.chunks_synthesized, 2);
    assert_eq!(stats.failed_chunks, 1);
    assert!(stats.first_error.as_deref().unwrap().contains("400"));
    // Intro + 200 ms + Beta.
    assert_eq!(audio.duration_ms, Some(2 * CHUNK_MS as u64 + 200));
}

#[tokio::test]
async fn all_chunks_failing_is_fatal() {
    let synth = Arc::new(WavSynth {
        fail_containing: Some(""),
        ..Default::default()
    });
    let err = narrate(&sample_transcript(), &wav_config(synth)).await.unwrap_err();
    match err {
        Pdf2AudioError::AllChunksFailed { total, first_error } => {
            assert_eq!(total, 3);
            assert!(first_error.contains("rejected"));
        }
        other => panic!("expected AllChunksFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn only_skipped_segments_is_nothing_to_speak() {
    let transcript = Transcript {
        metadata: Default::default(),
        pages: vec![page(1, vec![labeled(1, 0, "7", SegmentCategory::PageFurniture)])],
    };
    let err = narrate(&transcript, &wav_config(Arc::new(WavSynth::default())))
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2AudioError::NothingToSpeak { skipped: 1 }));
}

#[tokio::test]
async fn read_all_speaks_page_furniture() {
    let synth = Arc::new(WavSynth::default());
    let config = ConversionConfig {
        skip_categories: Vec::new(),
        ..wav_config(synth)
    };
    let (_, stats) = narrate(&sample_transcript(), &config).await.unwrap();
    assert_eq!(stats.segments_spoken, 4);
    assert_eq!(stats.segments_skipped, 0);
}

#[tokio::test]
async fn segments_dir_receives_every_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let seg_dir = dir.path().join("chunks");
    let config = ConversionConfig {
        segments_dir: Some(seg_dir.clone()),
        ..wav_config(Arc::new(WavSynth::default()))
    };
    narrate(&sample_transcript(), &config).await.unwrap();

    let mut names: Vec<String> = std::fs::read_dir(&seg_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["p0001_s000_c00.wav", "p0001_s001_c00.wav", "p0002_s000_c00.wav"]
    );
    let first = std::fs::read(seg_dir.join("p0001_s000_c00.wav")).unwrap();
    assert_eq!(&first[..4], b"RIFF");
}

#[tokio::test]
async fn mp3_pauses_travel_as_ssml_breaks() {
    struct Mp3Synth(Mutex<Vec<SynthesisRequest>>);

    impl SpeechSynthesizer for Mp3Synth {
        fn name(&self) -> &str {
            "mp3"
        }

        fn supports_ssml(&self) -> bool {
            true
        }

        fn synthesize<'a>(&'a self, request: &'a SynthesisRequest) -> BoxFuture<'a, Result<Vec<u8>, ServiceError>> {
            Box::pin(async move {
                if let Ok(mut r) = self.0.lock() {
                    r.push(request.clone());
                }
                let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x02ab".to_vec();
                bytes.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64, 0x00]);
                Ok(bytes)
            })
        }
    }

    let synth = Arc::new(Mp3Synth(Mutex::new(Vec::new())));
    let config = ConversionConfig::builder()
        .synthesizer(synth.clone())
        .tts_concurrency(1)
        .build()
        .unwrap();
    let (audio, _) = narrate(&sample_transcript(), &config).await.unwrap();

    assert_eq!(audio.encoding, AudioEncoding::Mp3);
    assert_eq!(audio.duration_ms, None);
    assert_eq!(audio.bytes.windows(3).filter(|w| w == b"ID3").count(), 1);

    let requests = synth.0.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].ssml.as_deref().unwrap().contains(&format!(
        "<break time=\"{}ms\"/>",
        config.heading_pause_ms
    )));
    assert!(!requests[2].ssml.as_deref().unwrap().contains("<break"));
}

// ── Fatal input errors ───────────────────────────────────────────────────────

#[tokio::test]
async fn missing_file_is_fatal() {
    let config = ConversionConfig::builder()
        .ocr_engine(Arc::new(LayoutOcr))
        .build()
        .unwrap();
    let err = transcribe("/definitely/not/here.pdf", &config).await.unwrap_err();
    assert!(matches!(err, Pdf2AudioError::FileNotFound { .. }));
}

#[tokio::test]
async fn non_pdf_is_rejected_before_rendering() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut tmp, b"hello, not a pdf").unwrap();
    let config = ConversionConfig::builder()
        .ocr_engine(Arc::new(LayoutOcr))
        .build()
        .unwrap();
    let err = transcribe(tmp.path().to_str().unwrap(), &config).await.unwrap_err();
    assert!(matches!(err, Pdf2AudioError::NotAPdf { .. }));
}
