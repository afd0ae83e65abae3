//! Locate and bind the pdfium shared library.
//!
//! Lookup order: `PDFIUM_LIB_PATH` (a file or a directory containing the
//! platform library), the directory of the running executable, the current
//! directory, then the system library search path.

use crate::error::Pdf2AudioError;
use pdfium_render::prelude::Pdfium;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bind pdfium for the calling thread.
///
/// Binding is cheap once the library is loaded by the OS, so render and
/// metadata tasks each bind their own instance inside `spawn_blocking`.
pub fn bind() -> Result<Pdfium, Pdf2AudioError> {
    let mut attempts: Vec<String> = Vec::new();

    for candidate in candidate_paths() {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(Pdf2AudioError::PdfiumBindingFailed(attempts.join("; ")))
        }
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut out: Vec<PathBuf> = Vec::new();

    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(p);
        if p.is_file() {
            out.push(p);
        } else {
            dirs.push(p);
        }
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }

    out.extend(
        dirs.iter()
            .map(|d| Pdfium::pdfium_platform_library_name_at_path(d))
            .filter(|p| p.exists()),
    );
    out
}
