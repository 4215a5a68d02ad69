//! WAV input loading.
//!
//! The pipeline consumes raw mono 16 kHz samples; decoding other
//! formats and resampling are a collaborator's job, so anything else is
//! rejected with a clear message rather than silently converted.

use std::path::Path;

use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader};

use crate::transcribe::TARGET_SAMPLE_RATE;

/// Load a WAV file into f32 samples suitable for transcription.
///
/// Accepts 16-bit integer and 32-bit float formats; requires mono at
/// 16 kHz.
pub fn load_wav(path: impl AsRef<Path>) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let spec = reader.spec();

    if spec.channels != 1 {
        bail!(
            "{}: expected mono audio, got {} channels. Downmix before running the pipeline.",
            path.display(),
            spec.channels
        );
    }
    if spec.sample_rate != TARGET_SAMPLE_RATE {
        bail!(
            "{}: expected {} Hz audio, got {} Hz. Resample before running the pipeline.",
            path.display(),
            TARGET_SAMPLE_RATE,
            spec.sample_rate
        );
    }

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / f32::from(i16::MAX)))
            .collect::<Result<Vec<f32>, _>>()
            .context("Failed to decode 16-bit samples")?,
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .context("Failed to decode float samples")?,
        (format, bits) => bail!(
            "{}: unsupported sample format {:?}/{} bits (use 16-bit int or 32-bit float)",
            path.display(),
            format,
            bits
        ),
    };

    Ok(samples)
}

#[cfg(test)]
#[path = "audio_test.rs"]
mod tests;
