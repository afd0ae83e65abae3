//! Input resolution: turn a path or URL into a local PDF file pdfium can open.
//!
//! URLs are streamed into a `TempDir` that lives as long as the returned
//! [`ResolvedInput`]; dropping it removes the download. Both paths check the
//! `%PDF` magic before anything is rendered.

use crate::error::Pdf2AudioError;
use futures::StreamExt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF that is available on the local file system.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the `TempDir` keeps the download alive.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2AudioError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

/// `Err(magic)` when `head` does not start like a PDF.
fn check_magic(head: &[u8]) -> Result<(), [u8; 4]> {
    if head.len() < 4 {
        let mut magic = [0u8; 4];
        magic[..head.len()].copy_from_slice(head);
        return Err(magic);
    }
    if &head[..4] == PDF_MAGIC {
        Ok(())
    } else {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[..4]);
        Err(magic)
    }
}

fn resolve_local(path: &Path) -> Result<ResolvedInput, Pdf2AudioError> {
    let path = path.to_path_buf();
    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2AudioError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2AudioError::FileNotFound { path }),
    };

    let mut head = Vec::with_capacity(4);
    if let Err(e) = (&mut file).take(4).read_to_end(&mut head) {
        debug!("Could not read header of {}: {}", path.display(), e);
    }
    if let Err(magic) = check_magic(&head) {
        return Err(Pdf2AudioError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2AudioError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| Pdf2AudioError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let from_reqwest = |e: reqwest::Error| {
        if e.is_timeout() {
            Pdf2AudioError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(from_reqwest)?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| "downloaded.pdf".to_string());

    let temp_dir = TempDir::new().map_err(|e| Pdf2AudioError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);
    let mut file = tokio::fs::File::create(&file_path)
        .await
        .map_err(|e| Pdf2AudioError::Internal(format!("Failed to create temp file: {}", e)))?;

    let mut head: Vec<u8> = Vec::with_capacity(4);
    let mut written: u64 = 0;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(from_reqwest)?;
        if head.len() < 4 {
            let take = (4 - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| Pdf2AudioError::Internal(format!("Failed to write temp file: {}", e)))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| Pdf2AudioError::Internal(format!("Failed to write temp file: {}", e)))?;

    if let Err(magic) = check_magic(&head) {
        return Err(Pdf2AudioError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    info!("Downloaded {} bytes to: {}", written, file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// `attachment; filename="report.pdf"` → `report.pdf`.
fn filename_from_disposition(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"'))
        .and_then(sanitize_filename)
}

fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.contains('.') {
        sanitize_filename(last)
    } else {
        None
    }
}

/// Keep only the final path component; reject empty or dot names.
fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_check() {
        assert!(check_magic(b"%PDF-1.7").is_ok());
        assert_eq!(check_magic(b"PK\x03\x04zip"), Err(*b"PK\x03\x04"));
        assert_eq!(check_magic(b"%P"), Err([b'%', b'P', 0, 0]));
    }

    #[test]
    fn local_missing_file() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf"))
            .err()
            .expect("missing file must fail");
        assert!(matches!(err, Pdf2AudioError::FileNotFound { .. }));
    }

    #[test]
    fn local_non_pdf_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = resolve_local(f.path()).err().expect("not a pdf");
        assert!(matches!(err, Pdf2AudioError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn local_pdf_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4\n%rest").unwrap();
        let resolved = resolve_local(f.path()).expect("valid pdf header");
        assert_eq!(resolved.path(), f.path());
    }

    #[test]
    fn filenames_from_headers_and_urls() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"report.pdf\""),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"../../etc/passwd\""),
            Some("passwd".to_string())
        );
        assert_eq!(filename_from_disposition("inline"), None);
        assert_eq!(
            filename_from_url("https://arxiv.org/pdf/paper.v2.pdf?x=1"),
            Some("paper.v2.pdf".to_string())
        );
        assert_eq!(filename_from_url("https://arxiv.org/pdf/1706.03762"), Some("1706.03762".to_string()));
        assert_eq!(filename_from_url("https://example.com/"), None);
    }
}
