//! Image encoding: `DynamicImage` → base64 PNG.
//!
//! Both OCR backends take the page as base64 in a JSON body: Cloud Vision as
//! `image.content`, vision LLMs as an `ImageData` attachment. PNG keeps glyph
//! edges intact; JPEG artefacts around text cost recognition accuracy.

use crate::pipeline::render::RenderedPage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A page image in the form the OCR services accept.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    /// 1-indexed page number.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    pub png_base64: String,
}

impl EncodedPage {
    /// Attachment for a vision-LLM message, at full tile detail.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.png_base64.clone(), "image/png").with_detail("high")
    }
}

/// PNG-encode and base64-wrap a rendered page.
pub fn encode_page(page: &RenderedPage) -> Result<EncodedPage, image::ImageError> {
    let png_base64 = encode_png_base64(&page.image)?;
    debug!(
        "Encoded page {} → {} bytes base64",
        page.page_num,
        png_base64.len()
    );
    Ok(EncodedPage {
        page_num: page.page_num,
        width: page.image.width(),
        height: page.image.height(),
        png_base64,
    })
}

fn encode_png_base64(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(STANDARD.encode(&buf))
}
