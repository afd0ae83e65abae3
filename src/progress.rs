//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as pages are recognised and speech is synthesized. The CLI drives
//! its progress bar from these; library callers can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2audio::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     chunks: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, done: usize, total: usize) {
//!         self.chunks.store(done, Ordering::SeqCst);
//!         eprintln!("speech {done}/{total}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { chunks: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it works through a document.
///
/// Page events may arrive concurrently and out of page order; chunk events
/// arrive in reading order. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the page selection is known, before any page is rendered.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is sent to the OCR service.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been recognised and classified.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, segments: usize) {
        let _ = (page_num, total_pages, segments);
    }

    /// Called when a page fails after all retries are exhausted.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once before the first text-to-speech request.
    fn on_synthesis_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called after each text-to-speech request, successful or not.
    fn on_chunk_complete(&self, done: usize, total_chunks: usize) {
        let _ = (done, total_chunks);
    }

    /// Called once after the audio has been merged.
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
