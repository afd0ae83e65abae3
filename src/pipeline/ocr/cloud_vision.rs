use crate::auth::GoogleAuth;
use crate::error::ServiceError;
use crate::output::{BoundingBox, SegmentCategory, TextSegment, Vertex};
use crate::pipeline::encode::EncodedPage;
use crate::pipeline::ocr::{OcrEngine, OcrPage};
use crate::pipeline::textclean::collapse_spaces;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const SERVICE: &str = "Cloud Vision";

/// Google Cloud Vision document text detection.
pub struct CloudVisionOcr {
    client: reqwest::Client,
    endpoint: String,
    auth: GoogleAuth,
    language_hints: Vec<String>,
}

impl CloudVisionOcr {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        auth: GoogleAuth,
        language_hints: Vec<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            auth,
            language_hints,
        }
    }

    fn request_body(&self, page: &EncodedPage) -> serde_json::Value {
        let mut request = json!({
            "image": { "content": page.png_base64 },
            "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
        });
        if !self.language_hints.is_empty() {
            request["imageContext"] = json!({ "languageHints": self.language_hints });
        }
        json!({ "requests": [request] })
    }
}

impl std::fmt::Debug for CloudVisionOcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudVisionOcr")
            .field("endpoint", &self.endpoint)
            .field("auth", &self.auth)
            .field("language_hints", &self.language_hints)
            .finish_non_exhaustive()
    }
}

impl OcrEngine for CloudVisionOcr {
    fn name(&self) -> &str {
        "cloud-vision"
    }

    fn recognize<'a>(&'a self, page: &'a EncodedPage) -> BoxFuture<'a, Result<OcrPage, ServiceError>> {
        Box::pin(async move {
            let request = self
                .auth
                .authorize(self.client.post(&self.endpoint))
                .await?
                .json(&self.request_body(page));
            let resp = request
                .send()
                .await
                .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
            if !resp.status().is_success() {
                return Err(ServiceError::from_response(SERVICE, resp).await);
            }

            let parsed: AnnotateResponse = resp.json().await.map_err(|e| ServiceError::Decode {
                service: SERVICE.to_string(),
                detail: e.to_string(),
            })?;
            let segments = parse_annotation(page.page_num, parsed)?;
            debug!("Page {}: {} paragraphs from Cloud Vision", page.page_num, segments.len());
            Ok(OcrPage {
                segments,
                ..Default::default()
            })
        })
    }
}

// ── Response model (only the fields we read) ────────────────────────────────

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    pages: Vec<VisionPage>,
}

#[derive(Debug, Deserialize)]
struct VisionPage {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Block {
    block_type: Option<String>,
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paragraph {
    bounding_box: Option<BoundingPoly>,
    confidence: Option<f32>,
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
struct Word {
    #[serde(default)]
    symbols: Vec<Symbol>,
}

#[derive(Debug, Deserialize)]
struct Symbol {
    #[serde(default)]
    text: String,
    property: Option<TextProperty>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextProperty {
    detected_break: Option<DetectedBreak>,
}

#[derive(Debug, Deserialize)]
struct DetectedBreak {
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<VisionVertex>,
}

// Vision omits zero coordinates.
#[derive(Debug, Deserialize)]
struct VisionVertex {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

/// Map a per-image `error` (google.rpc.Status) onto a retry decision.
fn status_error(status: Status) -> ServiceError {
    match status.code {
        // RESOURCE_EXHAUSTED
        8 => ServiceError::RateLimited {
            service: SERVICE.to_string(),
            retry_after_secs: None,
        },
        // DEADLINE_EXCEEDED, INTERNAL, UNAVAILABLE
        4 | 13 | 14 => ServiceError::Http {
            service: SERVICE.to_string(),
            status: 503,
            body: status.message,
        },
        // UNAUTHENTICATED, PERMISSION_DENIED
        16 | 7 => ServiceError::Auth {
            service: SERVICE.to_string(),
            detail: status.message,
        },
        code => ServiceError::Http {
            service: SERVICE.to_string(),
            status: 400,
            body: format!("code {}: {}", code, status.message),
        },
    }
}

fn parse_annotation(page_num: usize, resp: AnnotateResponse) -> Result<Vec<TextSegment>, ServiceError> {
    let Some(first) = resp.responses.into_iter().next() else {
        return Ok(Vec::new());
    };
    if let Some(status) = first.error {
        return Err(status_error(status));
    }
    // A blank page has no annotation at all.
    let Some(annotation) = first.full_text_annotation else {
        return Ok(Vec::new());
    };

    let mut segments = Vec::new();
    for block in annotation.pages.iter().flat_map(|p| p.blocks.iter()) {
        let is_table = block.block_type.as_deref() == Some("TABLE");
        for para in &block.paragraphs {
            let text = paragraph_text(para);
            if text.is_empty() {
                continue;
            }
            let mut seg = TextSegment::new(page_num, segments.len(), text);
            seg.confidence = para.confidence;
            seg.bounding_box = para.bounding_box.as_ref().map(|b| BoundingBox {
                vertices: b.vertices.iter().map(|v| Vertex { x: v.x, y: v.y }).collect(),
            });
            if is_table {
                seg.hint = Some(SegmentCategory::Table);
            }
            segments.push(seg);
        }
    }
    Ok(segments)
}

/// Rebuild paragraph text from symbols and their detected breaks.
fn paragraph_text(para: &Paragraph) -> String {
    let mut out = String::new();
    for symbol in para.words.iter().flat_map(|w| w.symbols.iter()) {
        out.push_str(&symbol.text);
        let brk = symbol
            .property
            .as_ref()
            .and_then(|p| p.detected_break.as_ref())
            .map(|b| b.kind.as_str());
        match brk {
            Some("SPACE" | "SURE_SPACE" | "EOL_SURE_SPACE" | "LINE_BREAK") => out.push(' '),
            // HYPHEN: the hyphen is not in the symbol text and the halves join.
            _ => {}
        }
    }
    collapse_spaces(&out).trim().to_string()
}
