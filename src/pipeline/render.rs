//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! pdfium is not async-safe, so every call here runs inside
//! `tokio::task::spawn_blocking`. The document is opened once per call and
//! each selected page is rendered at `dpi`, capped at `max_rendered_pixels`
//! on its longest edge.

use crate::config::ConversionConfig;
use crate::error::{PageError, Pdf2AudioError};
use crate::output::DocumentMetadata;
use crate::pipeline::pdfium;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A rasterised page, ready for OCR.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-indexed page number.
    pub page_num: usize,
    pub image: DynamicImage,
}

/// Rasterise the selected pages (0-indexed) of a PDF.
///
/// Opening the document is fatal on failure; a page that fails to render is
/// reported as a [`PageError`] in its slot so the rest of the document can
/// still be narrated.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ConversionConfig,
    page_indices: &[usize],
) -> Result<Vec<Result<RenderedPage, PageError>>, Pdf2AudioError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, dpi, max_pixels, password.as_deref(), &indices)
    })
    .await
    .map_err(|e| Pdf2AudioError::Internal(format!("Render task panicked: {}", e)))?
}

fn open_error(pdf_path: &Path, password: Option<&str>, err: PdfiumError) -> Pdf2AudioError {
    let detail = format!("{:?}", err);
    let path = pdf_path.to_path_buf();
    if detail.to_lowercase().contains("password") {
        if password.is_some() {
            Pdf2AudioError::WrongPassword { path }
        } else {
            Pdf2AudioError::PasswordRequired { path }
        }
    } else {
        Pdf2AudioError::CorruptPdf { path, detail }
    }
}

fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<Result<RenderedPage, PageError>>, Pdf2AudioError> {
    let pdfium = pdfium::bind()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    // PDF user space is 72 units per inch.
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let results = page_indices
        .iter()
        .map(|&idx| {
            let page_num = idx + 1;
            if idx >= total_pages {
                return Err(PageError::RenderFailed {
                    page: page_num,
                    detail: format!("out of range (document has {} pages)", total_pages),
                });
            }
            let render = || -> Result<DynamicImage, PdfiumError> {
                let page = pages.get(idx as u16)?;
                let bitmap = page.render_with_config(&render_config)?;
                Ok(bitmap.as_image())
            };
            match render() {
                Ok(image) => {
                    debug!(
                        "Rendered page {} → {}x{} px",
                        page_num,
                        image.width(),
                        image.height()
                    );
                    Ok(RenderedPage { page_num, image })
                }
                Err(e) => Err(PageError::RenderFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                }),
            }
        })
        .collect();

    Ok(results)
}

/// Extract document metadata from a PDF without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2AudioError> {
    let path: PathBuf = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| Pdf2AudioError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2AudioError> {
    let pdfium = pdfium::bind()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
        is_encrypted: password.is_some(),
    })
}
