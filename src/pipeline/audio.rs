//! Audio assembly: concatenate synthesized chunks into one file.
//!
//! ## LINEAR16 (WAV)
//!
//! Each chunk is a complete RIFF/WAVE file, decoded with `hound`. The samples
//! of every chunk are written out under one header, with digital silence
//! inserted after each chunk for its `pause_after_ms`. All chunks must share
//! channel count, sample rate and bit depth; there is no resampling.
//!
//! ## MP3
//!
//! MP3 frames are self-delimiting, so files concatenate byte-wise once the
//! tag blocks are out of the way: the ID3v2 header is kept on the first
//! chunk only and ID3v1 trailers are dropped from all of them. Pauses must
//! already be in the audio (SSML `<break>`); no silence is inserted.

use crate::config::AudioEncoding;
use crate::error::Pdf2AudioError;
use crate::output::AudioData;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{self, Cursor};
use tracing::{debug, warn};

/// One synthesized utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub bytes: Vec<u8>,
    /// Silence to follow this chunk (LINEAR16 only).
    pub pause_after_ms: u32,
}

/// Concatenate `chunks` into a single file of `encoding`.
pub fn merge(chunks: &[AudioChunk], encoding: AudioEncoding) -> Result<AudioData, Pdf2AudioError> {
    if chunks.is_empty() {
        return Err(invalid(encoding, 0, "no audio chunks to merge"));
    }
    match encoding {
        AudioEncoding::Linear16 => merge_wav(chunks),
        AudioEncoding::Mp3 => merge_mp3(chunks),
    }
}

fn invalid(encoding: AudioEncoding, chunk: usize, detail: impl Into<String>) -> Pdf2AudioError {
    Pdf2AudioError::InvalidAudio {
        encoding: encoding.to_string(),
        chunk,
        detail: detail.into(),
    }
}

// ── WAV ─────────────────────────────────────────────────────────────────────

/// Upper bounds a TTS chunk can plausibly have; anything beyond is a broken
/// header, and honouring it would make silence padding allocate gigabytes.
const MAX_CHANNELS: u16 = 8;
const MAX_SAMPLE_RATE: u32 = 384_000;

fn describe(spec: &WavSpec) -> String {
    format!(
        "{} Hz, {} ch, {} bit",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    )
}

/// Decode one RIFF/WAVE chunk into its spec and interleaved integer samples.
///
/// A `data` size larger than the file (streaming writers emit `0xFFFFFFFF`)
/// ends at the last complete frame actually present.
pub fn read_wav(bytes: &[u8], chunk: usize) -> Result<(WavSpec, Vec<i32>), Pdf2AudioError> {
    let bad = |detail: String| invalid(AudioEncoding::Linear16, chunk, detail);

    let mut reader = WavReader::new(Cursor::new(bytes)).map_err(|e| bad(e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int {
        return Err(bad("floating-point samples are not LINEAR16".to_string()));
    }
    if spec.channels == 0 || spec.channels > MAX_CHANNELS {
        return Err(bad(format!("unsupported channel count {}", spec.channels)));
    }
    if spec.sample_rate == 0 || spec.sample_rate > MAX_SAMPLE_RATE {
        return Err(bad(format!("unsupported sample rate {}", spec.sample_rate)));
    }

    let mut samples = Vec::with_capacity(reader.len().min(bytes.len() as u32) as usize);
    for sample in reader.samples::<i32>() {
        match sample {
            Ok(s) => samples.push(s),
            Err(hound::Error::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(bad(e.to_string())),
        }
    }
    // Drop a trailing partial frame so the next chunk stays frame-aligned.
    samples.truncate(samples.len() - samples.len() % usize::from(spec.channels));
    Ok((spec, samples))
}

fn merge_wav(chunks: &[AudioChunk]) -> Result<AudioData, Pdf2AudioError> {
    let mut format: Option<WavSpec> = None;
    let mut samples: Vec<i32> = Vec::new();

    for (i, chunk) in chunks.iter().enumerate() {
        let (spec, pcm) = read_wav(&chunk.bytes, i)?;
        match format {
            None => format = Some(spec),
            Some(first) if first != spec => {
                return Err(Pdf2AudioError::AudioFormatMismatch {
                    chunk: i,
                    expected: describe(&first),
                    found: describe(&spec),
                })
            }
            Some(_) => {}
        }
        samples.extend_from_slice(&pcm);

        if i + 1 < chunks.len() && chunk.pause_after_ms > 0 {
            let frames = u64::from(chunk.pause_after_ms) * u64::from(spec.sample_rate) / 1000;
            let silence = frames * u64::from(spec.channels);
            samples.resize(samples.len() + silence as usize, 0);
        }
    }

    let spec = format.ok_or_else(|| invalid(AudioEncoding::Linear16, 0, "no audio chunks to merge"))?;
    let last = chunks.len() - 1;
    let write_err = |e: hound::Error| invalid(AudioEncoding::Linear16, last, format!("writing merged WAV: {e}"));

    let mut out = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut out, spec).map_err(write_err)?;
        for &s in &samples {
            writer.write_sample(s).map_err(write_err)?;
        }
        writer.finalize().map_err(write_err)?;
    }
    let bytes = out.into_inner();

    let frames = samples.len() as u64 / u64::from(spec.channels);
    let duration_ms = frames * 1000 / u64::from(spec.sample_rate);
    debug!(
        "Merged {} WAV chunks: {} frames, {} ms ({})",
        chunks.len(),
        frames,
        duration_ms,
        describe(&spec)
    );
    Ok(AudioData {
        bytes,
        encoding: AudioEncoding::Linear16,
        duration_ms: Some(duration_ms),
    })
}

// ── MP3 ─────────────────────────────────────────────────────────────────────

/// Length of a leading ID3v2 tag, header and optional footer included.
fn id3v2_len(bytes: &[u8]) -> usize {
    if bytes.len() < 10 || &bytes[0..3] != b"ID3" {
        return 0;
    }
    // Sizes are 28-bit "syncsafe" integers: 7 bits per byte.
    let size = bytes[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F));
    let footer = if bytes[5] & 0x10 != 0 { 10 } else { 0 };
    (10 + size + footer).min(bytes.len())
}

fn strip_id3v1(bytes: &[u8]) -> &[u8] {
    if bytes.len() >= 128 && &bytes[bytes.len() - 128..bytes.len() - 125] == b"TAG" {
        &bytes[..bytes.len() - 128]
    } else {
        bytes
    }
}

fn merge_mp3(chunks: &[AudioChunk]) -> Result<AudioData, Pdf2AudioError> {
    let mut bytes = Vec::with_capacity(chunks.iter().map(|c| c.bytes.len()).sum());
    for (i, chunk) in chunks.iter().enumerate() {
        let body = strip_id3v1(&chunk.bytes);
        let start = if i == 0 { 0 } else { id3v2_len(body) };
        let frames = &body[start..];
        let audio_start = if i == 0 { id3v2_len(body) } else { 0 };
        if frames.len() <= audio_start {
            return Err(invalid(AudioEncoding::Mp3, i, "chunk contains no audio frames"));
        }
        let first = &frames[audio_start..];
        if first.len() < 2 || first[0] != 0xFF || first[1] & 0xE0 != 0xE0 {
            warn!("MP3 chunk {} does not start with a frame sync", i);
        }
        bytes.extend_from_slice(frames);
    }
    debug!("Merged {} MP3 chunks: {} bytes", chunks.len(), bytes.len());
    Ok(AudioData {
        bytes,
        encoding: AudioEncoding::Mp3,
        duration_ms: None,
    })
}
