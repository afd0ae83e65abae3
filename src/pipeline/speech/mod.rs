//! Text-to-speech: plan utterances from a transcript and synthesize them.
//!
//! [`chunk::plan_utterances`] turns the spoken segments of a transcript into
//! request-sized [`Utterance`]s, [`ssml::render`] optionally wraps each one in
//! SSML, and a [`SpeechSynthesizer`] turns the request into audio bytes.
//! Merging the bytes into one file is [`crate::pipeline::audio`]'s job.

pub mod chunk;
mod google;
mod openai;
pub mod ssml;

pub use chunk::{plan_utterances, Utterance};
pub use google::GoogleTts;
pub use openai::OpenAiTts;

use crate::config::{AudioEncoding, VoiceSettings};
use crate::error::ServiceError;
use futures::future::BoxFuture;

/// One synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Plain text to speak. Always set, even when `ssml` is.
    pub text: String,
    /// SSML document; used instead of `text` by engines that support it.
    pub ssml: Option<String>,
    pub voice: VoiceSettings,
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: Option<u32>,
}

/// A text-to-speech service.
pub trait SpeechSynthesizer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether [`SynthesisRequest::ssml`] is honoured.
    fn supports_ssml(&self) -> bool;

    /// Largest request input the service accepts, in bytes.
    fn max_request_bytes(&self) -> usize {
        usize::MAX
    }

    /// Synthesize one request into a complete audio file (`encoding`
    /// container). Called once per attempt; retries are handled by the caller.
    fn synthesize<'a>(
        &'a self,
        request: &'a SynthesisRequest,
    ) -> BoxFuture<'a, Result<Vec<u8>, ServiceError>>;
}
