use crate::config::AudioEncoding;
use crate::error::ServiceError;
use crate::pipeline::speech::{SpeechSynthesizer, SynthesisRequest};
use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

const SERVICE: &str = "OpenAI speech";

/// Longest `input` the endpoint accepts, in characters.
const MAX_INPUT_CHARS: usize = 4096;

/// OpenAI-compatible `POST {base}/audio/speech`.
///
/// The voice is an OpenAI voice name (`alloy`, `nova`, …); the language is
/// inferred by the model from the text. SSML is not supported.
pub struct OpenAiTts {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    voice: String,
}

impl OpenAiTts {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            voice: voice.into(),
        }
    }

    fn request_body(&self, request: &SynthesisRequest) -> serde_json::Value {
        let format = match request.encoding {
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::Linear16 => "wav",
        };
        json!({
            "model": self.model,
            "input": request.text,
            "voice": request.voice.name.as_deref().unwrap_or(&self.voice),
            "response_format": format,
            "speed": request.voice.speaking_rate.clamp(0.25, 4.0),
        })
    }
}

impl std::fmt::Debug for OpenAiTts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTts")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

impl SpeechSynthesizer for OpenAiTts {
    fn name(&self) -> &str {
        "openai"
    }

    fn supports_ssml(&self) -> bool {
        false
    }

    // Characters, but bytes are never fewer.
    fn max_request_bytes(&self) -> usize {
        MAX_INPUT_CHARS
    }

    fn synthesize<'a>(
        &'a self,
        request: &'a SynthesisRequest,
    ) -> BoxFuture<'a, Result<Vec<u8>, ServiceError>> {
        Box::pin(async move {
            let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&self.request_body(request))
                .send()
                .await
                .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
            if !resp.status().is_success() {
                return Err(ServiceError::from_response(SERVICE, resp).await);
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
            if bytes.is_empty() {
                return Err(ServiceError::Decode {
                    service: SERVICE.to_string(),
                    detail: "empty audio body".to_string(),
                });
            }
            debug!("Synthesized {} chars → {} bytes", request.text.len(), bytes.len());
            Ok(bytes.to_vec())
        })
    }
}
