//! Narration audio helpers
//!
//! Gemini speech models return headerless little-endian PCM16
//! (`audio/L16;codec=pcm;rate=24000`). Players expect a container, so raw
//! PCM is wrapped in a minimal RIFF/WAVE header before it is written out.

use crate::models::NarrationAudio;

pub const DEFAULT_PCM_SAMPLE_RATE: u32 = 24_000;
const PCM16_BITS_PER_SAMPLE: u16 = 16;

/// Sample rate declared in a `audio/L16;...;rate=N` MIME type.
pub fn pcm_sample_rate(mime_type: &str) -> Option<u32> {
    let mut params = mime_type.split(';').map(str::trim);
    let essence = params.next()?;
    if !essence.eq_ignore_ascii_case("audio/L16") && !essence.eq_ignore_ascii_case("audio/pcm") {
        return None;
    }

    let rate = params
        .filter_map(|p| p.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.parse().ok());

    Some(rate.unwrap_or(DEFAULT_PCM_SAMPLE_RATE))
}

/// Wrap mono PCM16 samples in a WAV container.
pub fn wav_from_pcm16(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let channels: u16 = 1;
    let block_align = channels * PCM16_BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&PCM16_BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

/// Bytes suitable for writing to disk, plus a matching file extension.
pub fn playable(audio: &NarrationAudio) -> (Vec<u8>, &'static str) {
    if let Some(rate) = pcm_sample_rate(&audio.mime_type) {
        return (wav_from_pcm16(&audio.data, rate), "wav");
    }

    let essence = audio
        .mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let extension = match essence.as_str() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/opus" => "ogg",
        _ => "bin",
    };
    (audio.data.clone(), extension)
}
