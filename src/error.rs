//! Error types for the edgequake-pdf2audio library.
//!
//! Three error types for three failure scopes:
//!
//! * [`Pdf2AudioError`] : **Fatal**. The conversion cannot proceed at all
//!   (bad input file, wrong password, no credentials, every page failed).
//!   Returned as `Err(Pdf2AudioError)` from the top-level `convert*` functions.
//!
//! * [`PageError`] : **Non-fatal**. A single page failed to render or OCR
//!   but the rest of the document is fine. Stored inside
//!   [`crate::output::PageTranscript`] so callers can inspect partial success.
//!
//! * [`ServiceError`] : the outcome of one remote call (Cloud Vision,
//!   Text-to-Speech, an LLM). It knows whether a retry could help; the
//!   pipeline turns it into one of the two types above once retries are spent.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2audio library.
#[derive(Debug, Error)]
pub enum Pdf2AudioError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// An LLM provider (vision OCR or classifier) is not initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// No usable credentials for a cloud service.
    #[error("No credentials for {service}.\n{hint}")]
    CredentialsMissing { service: String, hint: String },

    /// A credential file exists but could not be used.
    #[error("Invalid credential file '{path}': {detail}")]
    InvalidCredentials { path: PathBuf, detail: String },

    /// Every selected page failed OCR; there is nothing to narrate.
    #[error("All {total} pages failed after {retries} retries each.\nFirst error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    /// OCR succeeded but no segment is left to speak.
    #[error("No speakable text found in the selected pages ({skipped} segments skipped by category)")]
    NothingToSpeak { skipped: usize },

    /// Every text-to-speech request failed.
    #[error("All {total} speech requests failed.\nFirst error: {first_error}")]
    AllChunksFailed { total: usize, first_error: String },

    /// Some pages or speech requests failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any failure as an error.
    #[error("{failed_pages} pages and {failed_chunks} speech requests failed during conversion")]
    PartialFailure {
        failed_pages: usize,
        failed_chunks: usize,
    },

    // ── Audio errors ──────────────────────────────────────────────────────
    /// A synthesized chunk could not be parsed as the requested container.
    #[error("Invalid {encoding} audio in chunk {chunk}: {detail}")]
    InvalidAudio {
        encoding: String,
        chunk: usize,
        detail: String,
    },

    /// Synthesized chunks disagree on sample rate, channels or bit depth.
    #[error("Audio chunk {chunk} is {found}, expected {expected}; cannot concatenate without resampling")]
    AudioFormatMismatch {
        chunk: usize,
        expected: String,
        found: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, install pdfium system-wide,\n\
or place the library next to the executable.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation or PNG encoding failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// OCR call failed after retries.
    #[error("Page {page}: OCR failed after {retries} retries: {detail}")]
    OcrFailed {
        page: usize,
        retries: u32,
        detail: String,
    },
}

impl PageError {
    /// 1-indexed page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } | PageError::OcrFailed { page, .. } => *page,
        }
    }
}

/// Failure of a single remote call.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Non-success HTTP status (or an in-body error object).
    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: String,
        status: u16,
        body: String,
    },

    /// HTTP 429.
    #[error("{service} rate limit exceeded")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    /// The request did not complete in time.
    #[error("{service} request timed out")]
    Timeout { service: String },

    /// Connection, DNS or TLS failure.
    #[error("{service} transport error: {detail}")]
    Transport { service: String, detail: String },

    /// The response arrived but could not be understood.
    #[error("{service} returned an unexpected response: {detail}")]
    Decode { service: String, detail: String },

    /// Credentials were rejected or could not be obtained.
    #[error("{service} authentication failed: {detail}")]
    Auth { service: String, detail: String },
}

impl ServiceError {
    /// Whether sending the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Http { status, .. } => *status == 408 || *status >= 500,
            ServiceError::RateLimited { .. }
            | ServiceError::Timeout { .. }
            | ServiceError::Transport { .. } => true,
            ServiceError::Decode { .. } | ServiceError::Auth { .. } => false,
        }
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ServiceError::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    /// Map a `reqwest` failure for `service`.
    pub fn from_reqwest(service: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout {
                service: service.to_string(),
            }
        } else if err.is_decode() {
            ServiceError::Decode {
                service: service.to_string(),
                detail: err.to_string(),
            }
        } else {
            ServiceError::Transport {
                service: service.to_string(),
                detail: err.to_string(),
            }
        }
    }

    /// Map an `edgequake-llm` provider failure for `service`.
    ///
    /// Providers only expose a message, so the variant is inferred from it.
    /// Anything unrecognised counts as a transport error and is retried.
    pub fn from_llm(service: &str, err: impl std::fmt::Display) -> Self {
        let detail = err.to_string();
        let lower = detail.to_lowercase();
        let service = service.to_string();
        if lower.contains("429") || lower.contains("rate limit") {
            ServiceError::RateLimited {
                service,
                retry_after_secs: None,
            }
        } else if lower.contains("timed out") || lower.contains("timeout") {
            ServiceError::Timeout { service }
        } else if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("api key")
        {
            ServiceError::Auth { service, detail }
        } else {
            ServiceError::Transport { service, detail }
        }
    }

    /// Turn a non-success response into the matching variant.
    ///
    /// Reads (and truncates) the body so the message is useful in logs.
    pub async fn from_response(service: &str, response: reqwest::Response) -> Self {
        let status = response.status();
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(500)
            .collect();

        match status.as_u16() {
            429 => ServiceError::RateLimited {
                service: service.to_string(),
                retry_after_secs,
            },
            401 | 403 => ServiceError::Auth {
                service: service.to_string(),
                detail: format!("HTTP {}: {}", status.as_u16(), body),
            },
            code => ServiceError::Http {
                service: service.to_string(),
                status: code,
                body,
            },
        }
    }
}
