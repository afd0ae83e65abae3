//! Pipeline stages for PDF-to-audio conversion.
//!
//! Each submodule implements one transformation step, so each can be tested
//! on its own and any vendor can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ ocr ──▶ classify ──▶ speech ──▶ audio
//! (URL/path) (pdfium)  (base64)  (Vision) (rules/LLM)  (TTS)    (merge)
//! ```
//!
//! 1. [`input`]    canonicalises the user-supplied path or URL to a local file
//! 2. [`render`]   rasterises selected pages in `spawn_blocking`, because
//!    pdfium is not async-safe
//! 3. [`encode`]   PNG-encodes and base64-wraps each page image
//! 4. [`ocr`]      turns an image into text segments (network)
//! 5. [`classify`] labels every segment so page furniture can be skipped
//! 6. [`speech`]   plans request-sized utterances and synthesizes them (network)
//! 7. [`audio`]    concatenates the synthesized chunks into one file
//!
//! [`page`] runs steps 3–5 for one page with retries; [`backends`] builds
//! the engines a [`ConversionConfig`](crate::config::ConversionConfig) asks for.

pub mod audio;
pub mod backends;
pub mod classify;
pub mod encode;
pub mod input;
pub mod ocr;
pub mod page;
pub mod pdfium;
pub mod render;
pub mod retry;
pub mod speech;
pub mod textclean;
