use crate::auth::GoogleAuth;
use crate::error::ServiceError;
use crate::pipeline::speech::{SpeechSynthesizer, SynthesisRequest};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const SERVICE: &str = "Cloud Text-to-Speech";

/// Input limit of `text:synthesize`, SSML markup included.
const MAX_INPUT_BYTES: usize = 5000;

/// Google Cloud Text-to-Speech `text:synthesize`.
pub struct GoogleTts {
    client: reqwest::Client,
    endpoint: String,
    auth: GoogleAuth,
}

impl GoogleTts {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, auth: GoogleAuth) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            auth,
        }
    }

    fn request_body(request: &SynthesisRequest) -> serde_json::Value {
        let input = match &request.ssml {
            Some(ssml) => json!({ "ssml": ssml }),
            None => json!({ "text": request.text }),
        };
        let mut voice = json!({ "languageCode": request.voice.language_code });
        if let Some(name) = &request.voice.name {
            voice["name"] = json!(name);
        }
        let mut audio_config = json!({
            "audioEncoding": request.encoding.to_string(),
            "speakingRate": request.voice.speaking_rate,
            "pitch": request.voice.pitch,
        });
        if let Some(hz) = request.sample_rate_hertz {
            audio_config["sampleRateHertz"] = json!(hz);
        }
        json!({ "input": input, "voice": voice, "audioConfig": audio_config })
    }
}

impl std::fmt::Debug for GoogleTts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTts")
            .field("endpoint", &self.endpoint)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

impl SpeechSynthesizer for GoogleTts {
    fn name(&self) -> &str {
        "google"
    }

    fn supports_ssml(&self) -> bool {
        true
    }

    fn max_request_bytes(&self) -> usize {
        MAX_INPUT_BYTES
    }

    fn synthesize<'a>(
        &'a self,
        request: &'a SynthesisRequest,
    ) -> BoxFuture<'a, Result<Vec<u8>, ServiceError>> {
        Box::pin(async move {
            let resp = self
                .auth
                .authorize(self.client.post(&self.endpoint))
                .await?
                .json(&Self::request_body(request))
                .send()
                .await
                .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
            if !resp.status().is_success() {
                return Err(ServiceError::from_response(SERVICE, resp).await);
            }

            let decode = |detail: String| ServiceError::Decode {
                service: SERVICE.to_string(),
                detail,
            };
            let parsed: SynthesizeResponse =
                resp.json().await.map_err(|e| decode(e.to_string()))?;
            if parsed.audio_content.is_empty() {
                return Err(decode("response has no audioContent".to_string()));
            }
            let bytes = STANDARD
                .decode(parsed.audio_content.as_bytes())
                .map_err(|e| decode(format!("audioContent is not base64: {e}")))?;
            debug!("Synthesized {} chars → {} bytes", request.text.len(), bytes.len());
            Ok(bytes)
        })
    }
}
