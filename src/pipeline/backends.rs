//! Build the OCR engine, classifier and synthesizer a config asks for.
//!
//! An engine injected through the builder always wins. Otherwise the
//! backend enum picks a built-in implementation, which is constructed from
//! environment credentials here so that a missing key fails before any page
//! is rendered.

use crate::auth::GoogleAuth;
use crate::config::{ClassifierBackend, ConversionConfig, OcrBackend, TtsBackend};
use crate::error::Pdf2AudioError;
use crate::pipeline::classify::{DisabledClassifier, LlmClassifier, RuleClassifier, SegmentClassifier};
use crate::pipeline::ocr::{CloudVisionOcr, OcrEngine, VisionLlmOcr};
use crate::pipeline::speech::{GoogleTts, OpenAiTts, SpeechSynthesizer};
use edgequake_llm::{LLMProvider, ProviderFactory};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_LLM_MODEL: &str = "gpt-4.1-nano";

/// The two per-page services.
#[derive(Clone)]
pub struct PageEngines {
    pub ocr: Arc<dyn OcrEngine>,
    pub classifier: Arc<dyn SegmentClassifier>,
}

/// HTTP client shared by the vendor clients of one conversion.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, Pdf2AudioError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("edgequake-pdf2audio/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Pdf2AudioError::Internal(format!("HTTP client: {e}")))
}

/// HTTP client and Google credentials shared by the vendor clients of one
/// conversion.
///
/// Google credentials are resolved on first use, so a run that never calls
/// Google needs none. Cloud Vision and Google TTS get clones of the same
/// [`GoogleAuth`] and so refresh one OAuth token between them.
#[derive(Clone)]
pub struct SharedClients {
    http: reqwest::Client,
    google: Arc<OnceCell<GoogleAuth>>,
}

impl SharedClients {
    pub fn new(config: &ConversionConfig) -> Result<Self, Pdf2AudioError> {
        Ok(Self {
            http: http_client(config.api_timeout_secs)?,
            google: Arc::default(),
        })
    }

    fn google_auth(&self, service: &str) -> Result<GoogleAuth, Pdf2AudioError> {
        self.google
            .get_or_try_init(|| GoogleAuth::from_env(self.http.clone()))
            .cloned()
            .map_err(|e| match e {
                Pdf2AudioError::CredentialsMissing { hint, .. } => Pdf2AudioError::CredentialsMissing {
                    service: service.to_string(),
                    hint,
                },
                other => other,
            })
    }
}

/// OCR engine and classifier for `config`.
///
/// The LLM provider is resolved at most once, and only when a backend
/// needs it.
pub fn page_engines(
    config: &ConversionConfig,
    clients: &SharedClients,
) -> Result<PageEngines, Pdf2AudioError> {
    let mut provider: Option<Arc<dyn LLMProvider>> = None;
    let mut llm = |config: &ConversionConfig| -> Result<Arc<dyn LLMProvider>, Pdf2AudioError> {
        if let Some(p) = &provider {
            return Ok(Arc::clone(p));
        }
        let p = resolve_provider(config)?;
        provider = Some(Arc::clone(&p));
        Ok(p)
    };

    let ocr: Arc<dyn OcrEngine> = match (&config.ocr_engine, config.ocr_backend) {
        (Some(engine), _) => Arc::clone(engine),
        (None, OcrBackend::CloudVision) => Arc::new(CloudVisionOcr::new(
            clients.http.clone(),
            config.vision_endpoint.clone(),
            clients.google_auth("Cloud Vision OCR")?,
            config.language_hints.clone(),
        )),
        (None, OcrBackend::VisionLlm) => Arc::new(VisionLlmOcr::new(
            llm(config)?,
            config.temperature,
            config.max_tokens,
        )),
    };

    let classifier: Arc<dyn SegmentClassifier> = match (&config.classifier, config.classifier_backend) {
        (Some(c), _) => Arc::clone(c),
        (None, ClassifierBackend::Rules) => Arc::new(RuleClassifier),
        (None, ClassifierBackend::Disabled) => Arc::new(DisabledClassifier),
        (None, ClassifierBackend::Llm) => Arc::new(LlmClassifier::new(
            llm(config)?,
            config.temperature,
            config.max_tokens,
        )),
    };

    debug!("OCR engine: {}, classifier: {}", ocr.name(), classifier.name());
    Ok(PageEngines { ocr, classifier })
}

/// Speech synthesizer for `config`.
pub fn synthesizer(
    config: &ConversionConfig,
    clients: &SharedClients,
) -> Result<Arc<dyn SpeechSynthesizer>, Pdf2AudioError> {
    if let Some(s) = &config.synthesizer {
        return Ok(Arc::clone(s));
    }
    let client = clients.http.clone();
    let synth: Arc<dyn SpeechSynthesizer> = match config.tts_backend {
        TtsBackend::Google => Arc::new(GoogleTts::new(
            client,
            config.google_tts_endpoint.clone(),
            clients.google_auth("Google Text-to-Speech")?,
        )),
        TtsBackend::OpenAi => {
            let key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| Pdf2AudioError::CredentialsMissing {
                    service: "OpenAI speech".to_string(),
                    hint: "Set OPENAI_API_KEY (and OPENAI_BASE_URL for a compatible server)."
                        .to_string(),
                })?;
            Arc::new(OpenAiTts::new(
                client,
                key,
                config.openai_base_url.clone(),
                config.tts_model.clone(),
                config.openai_voice.clone(),
            ))
        }
    };
    debug!("Synthesizer: {}", synth.name());
    Ok(synth)
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2AudioError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2AudioError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. a pre-built provider (`config.provider`);
/// 2. a provider name plus optional model (`config.provider_name`);
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set;
/// 4. OpenAI, when `OPENAI_API_KEY` is set;
/// 5. whatever [`ProviderFactory::from_env`] detects.
pub fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Pdf2AudioError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // With several keys present, OpenAI wins unless another provider is named.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2AudioError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_engines_and_rules_need_no_credentials() {
        let config = ConversionConfig::builder()
            .ocr_engine(Arc::new(StubOcr))
            .build()
            .unwrap();
        let clients = SharedClients::new(&config).unwrap();
        let engines = page_engines(&config, &clients).expect("no network credentials needed");
        assert_eq!(engines.ocr.name(), "stub");
        assert_eq!(engines.classifier.name(), "rules");

        let config = ConversionConfig {
            classifier_backend: ClassifierBackend::Disabled,
            ..config
        };
        assert_eq!(page_engines(&config, &clients).unwrap().classifier.name(), "off");
    }

    struct StubOcr;

    impl OcrEngine for StubOcr {
        fn name(&self) -> &str {
            "stub"
        }

        fn recognize<'a>(
            &'a self,
            _page: &'a crate::pipeline::encode::EncodedPage,
        ) -> futures::future::BoxFuture<'a, Result<crate::pipeline::ocr::OcrPage, crate::error::ServiceError>> {
            Box::pin(async { Ok(Default::default()) })
        }
    }

    #[test]
    fn client_builds() {
        assert!(http_client(5).is_ok());
    }

    #[test]
    fn vision_and_tts_share_google_credentials() {
        let clients = SharedClients::new(&ConversionConfig::default()).unwrap();
        let creds = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            creds.path(),
            r#"{"type":"authorized_user","client_id":"c","client_secret":"s","refresh_token":"r"}"#,
        )
        .unwrap();
        let auth = GoogleAuth::from_credentials_file(creds.path(), clients.http.clone()).unwrap();
        assert!(clients.google.set(auth).is_ok());

        let config = ConversionConfig {
            ocr_backend: OcrBackend::CloudVision,
            tts_backend: TtsBackend::Google,
            ..ConversionConfig::default()
        };
        page_engines(&config, &clients).expect("credentials already resolved");
        synthesizer(&config, &clients.clone()).expect("credentials already resolved");

        let (GoogleAuth::AuthorizedUser(a), GoogleAuth::AuthorizedUser(b)) = (
            clients.google_auth("Cloud Vision OCR").unwrap(),
            clients.google_auth("Google Text-to-Speech").unwrap(),
        ) else {
            panic!("expected authorized_user credentials");
        };
        assert!(Arc::ptr_eq(&a, &b));
    }
}
