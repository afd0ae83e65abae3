//! OCR and classification of a single page.
//!
//! The page image is encoded, recognised with retries, filtered by
//! confidence and labelled. The image is dropped once encoded. A page whose
//! OCR fails for good comes back as a [`PageTranscript`] carrying a
//! [`PageError`]; a classifier failure only downgrades the labels to
//! [`RuleClassifier`]'s.

use crate::config::ConversionConfig;
use crate::error::PageError;
use crate::output::{LabeledSegment, PageTranscript, TextSegment};
use crate::pipeline::backends::PageEngines;
use crate::pipeline::classify::{PageLayout, RuleClassifier};
use crate::pipeline::encode;
use crate::pipeline::render::RenderedPage;
use crate::pipeline::retry::with_retry;
use std::time::Instant;
use tracing::{debug, warn};

/// Classifier name recorded when the configured one could not label a page.
pub const RULES_FALLBACK: &str = "rules (fallback)";

/// Recognise and label one rendered page.
pub async fn transcribe_page(
    engines: &PageEngines,
    page: RenderedPage,
    config: &ConversionConfig,
) -> PageTranscript {
    let start = Instant::now();
    let page_num = page.page_num;

    let encoded = match encode::encode_page(&page) {
        Ok(e) => e,
        Err(e) => {
            return PageTranscript::failed(
                page_num,
                PageError::RenderFailed {
                    page: page_num,
                    detail: format!("Image encoding failed: {}", e),
                },
            )
        }
    };
    drop(page);

    let label = format!("Page {} OCR ({})", page_num, engines.ocr.name());
    let ocr = with_retry(&label, config.max_retries, config.retry_backoff_ms, || {
        engines.ocr.recognize(&encoded)
    })
    .await;
    let mut retries = ocr.retries;
    let ocr_page = match ocr.result {
        Ok(p) => p,
        Err(e) => {
            warn!("Page {} OCR failed after {} retries: {}", page_num, retries, e);
            let mut failed = PageTranscript::failed(
                page_num,
                PageError::OcrFailed {
                    page: page_num,
                    retries,
                    detail: e.to_string(),
                },
            );
            failed.duration_ms = start.elapsed().as_millis() as u64;
            failed.retries = retries;
            return failed;
        }
    };

    let segments = keep_confident(ocr_page.segments, config.min_confidence);
    let layout = PageLayout {
        page_num,
        width: encoded.width,
        height: encoded.height,
    };

    let label = format!("Page {} classify ({})", page_num, engines.classifier.name());
    let classified = with_retry(&label, config.max_retries, config.retry_backoff_ms, || {
        engines.classifier.classify(&layout, &segments)
    })
    .await;
    retries += classified.retries;
    let (labels, classified_by) = match classified.result {
        Ok(labels) if labels.len() == segments.len() => {
            (labels, engines.classifier.name().to_string())
        }
        Ok(labels) => {
            warn!(
                "Page {}: classifier returned {} labels for {} segments, using rules",
                page_num,
                labels.len(),
                segments.len()
            );
            (RuleClassifier.label(&layout, &segments), RULES_FALLBACK.to_string())
        }
        Err(e) => {
            warn!("Page {}: classification failed, using rules: {}", page_num, e);
            (RuleClassifier.label(&layout, &segments), RULES_FALLBACK.to_string())
        }
    };

    let segments: Vec<LabeledSegment> = segments
        .into_iter()
        .zip(labels)
        .map(|(segment, category)| LabeledSegment { segment, category })
        .collect();
    debug!(
        "Page {}: {} segments labelled by {}",
        page_num,
        segments.len(),
        classified_by
    );

    PageTranscript {
        page_num,
        width: encoded.width,
        height: encoded.height,
        segments,
        classified_by,
        input_tokens: ocr_page.input_tokens,
        output_tokens: ocr_page.output_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
        retries,
        error: None,
    }
}

/// Drop segments the engine was unsure of, then renumber from 0.
fn keep_confident(segments: Vec<TextSegment>, min_confidence: f32) -> Vec<TextSegment> {
    segments
        .into_iter()
        .filter(|s| s.confidence.map_or(true, |c| c >= min_confidence))
        .enumerate()
        .map(|(index, s)| TextSegment { index, ..s })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::output::SegmentCategory;
    use crate::pipeline::classify::{LlmClassifier, SegmentClassifier};
    use crate::pipeline::encode::EncodedPage;
    use crate::pipeline::ocr::{OcrEngine, OcrPage};
    use futures::future::BoxFuture;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FixedOcr {
        texts: Vec<(&'static str, Option<f32>)>,
        fail_first: u32,
        calls: AtomicU32,
    }

    impl OcrEngine for FixedOcr {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize<'a>(&'a self, page: &'a EncodedPage) -> BoxFuture<'a, Result<OcrPage, ServiceError>> {
            Box::pin(async move {
                if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_first {
                    return Err(ServiceError::Timeout {
                        service: "fixed".into(),
                    });
                }
                let segments = self
                    .texts
                    .iter()
                    .enumerate()
                    .map(|(i, (t, c))| TextSegment {
                        confidence: *c,
                        ..TextSegment::new(page.page_num, i, *t)
                    })
                    .collect();
                Ok(OcrPage {
                    segments,
                    input_tokens: 10,
                    output_tokens: 5,
                })
            })
        }
    }

    struct ShortClassifier;

    impl SegmentClassifier for ShortClassifier {
        fn name(&self) -> &str {
            "short"
        }

        fn classify<'a>(
            &'a self,
            _page: &'a PageLayout,
            _segments: &'a [TextSegment],
        ) -> BoxFuture<'a, Result<Vec<SegmentCategory>, ServiceError>> {
            Box::pin(async { Ok(vec![SegmentCategory::Body]) })
        }
    }

    fn page(n: usize) -> RenderedPage {
        RenderedPage {
            page_num: n,
            image: DynamicImage::ImageRgb8(RgbImage::new(40, 60)),
        }
    }

    fn config() -> ConversionConfig {
        ConversionConfig {
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn low_confidence_segments_are_dropped_and_renumbered() {
        let engines = PageEngines {
            ocr: Arc::new(FixedOcr {
                texts: vec![("noise", Some(0.2)), ("Real text here.", Some(0.95)), ("No score", None)],
                fail_first: 0,
                calls: AtomicU32::new(0),
            }),
            classifier: Arc::new(RuleClassifier),
        };
        let config = ConversionConfig {
            min_confidence: 0.5,
            ..config()
        };
        let t = transcribe_page(&engines, page(3), &config).await;

        assert!(t.error.is_none());
        assert_eq!((t.width, t.height), (40, 60));
        let texts: Vec<_> = t.segments.iter().map(|s| s.segment.text.as_str()).collect();
        assert_eq!(texts, vec!["Real text here.", "No score"]);
        assert_eq!(t.segments[1].segment.index, 1);
        assert_eq!(t.classified_by, "rules");
        assert_eq!(t.input_tokens, 10);
    }

    #[tokio::test]
    async fn transient_ocr_errors_are_retried() {
        let engines = PageEngines {
            ocr: Arc::new(FixedOcr {
                texts: vec![("Hello.", None)],
                fail_first: 2,
                calls: AtomicU32::new(0),
            }),
            classifier: Arc::new(RuleClassifier),
        };
        let t = transcribe_page(&engines, page(1), &config()).await;
        assert!(t.error.is_none());
        assert_eq!(t.retries, 2);
    }

    #[tokio::test]
    async fn exhausted_ocr_retries_fail_the_page() {
        let engines = PageEngines {
            ocr: Arc::new(FixedOcr {
                texts: vec![],
                fail_first: u32::MAX,
                calls: AtomicU32::new(0),
            }),
            classifier: Arc::new(RuleClassifier),
        };
        let config = ConversionConfig {
            max_retries: 1,
            ..config()
        };
        let t = transcribe_page(&engines, page(2), &config).await;
        match t.error {
            Some(PageError::OcrFailed { page, retries, .. }) => {
                assert_eq!(page, 2);
                assert_eq!(retries, 1);
            }
            other => panic!("expected OcrFailed, got {other:?}"),
        }
        assert!(t.segments.is_empty());
    }

    #[tokio::test]
    async fn label_count_mismatch_falls_back_to_rules() {
        let engines = PageEngines {
            ocr: Arc::new(FixedOcr {
                texts: vec![("Figure 2: Results", None), ("- first point", None)],
                fail_first: 0,
                calls: AtomicU32::new(0),
            }),
            classifier: Arc::new(ShortClassifier),
        };
        let t = transcribe_page(&engines, page(1), &config()).await;
        assert_eq!(t.classified_by, RULES_FALLBACK);
        assert_eq!(t.segments[0].category, SegmentCategory::Caption);
        assert_eq!(t.segments[1].category, SegmentCategory::ListItem);
    }

    #[tokio::test]
    async fn unusable_llm_labels_are_recorded_as_rules_fallback() {
        let mock = edgequake_llm::MockProvider::new();
        mock.add_response(r#"["body"]"#).await;
        let engines = PageEngines {
            ocr: Arc::new(FixedOcr {
                texts: vec![("Figure 2: Results", None), ("- first point", None)],
                fail_first: 0,
                calls: AtomicU32::new(0),
            }),
            classifier: Arc::new(LlmClassifier::new(Arc::new(mock), 0.0, 256)),
        };
        let t = transcribe_page(&engines, page(1), &config()).await;

        assert!(t.error.is_none());
        assert_eq!(t.classified_by, RULES_FALLBACK);
        assert_eq!(t.retries, 0, "decode errors are not retried");
        assert_eq!(t.segments[0].category, SegmentCategory::Caption);
        assert_eq!(t.segments[1].category, SegmentCategory::ListItem);
    }
}
