//! Speech-to-text transcription stage.
//!
//! This module provides a trait abstraction for transcription backends
//! and the pipeline stage that drives one of them with timing.

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

use crate::error::PipelineError;

mod whisper;

pub use whisper::WhisperTranscriber;

/// Sample rate every transcription backend expects. Resampling is the
/// caller's responsibility.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Speech-to-text transcriber.
///
/// Implementations convert audio samples to text.
pub trait Transcriber: Send {
    /// Transcribe audio samples to text.
    ///
    /// # Arguments
    /// * `audio` - Audio samples as f32, expected to be 16kHz mono
    /// * `sample_rate` - Sample rate of the audio in Hz (must be 16000)
    ///
    /// # Returns
    /// The transcribed text, or an error if transcription failed.
    fn transcribe(&mut self, audio: &[f32], sample_rate: u32) -> Result<String>;
}

impl std::fmt::Debug for dyn Transcriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Transcriber")
    }
}

/// Shared handle to a loaded transcriber. The mutex serializes
/// inference calls; the model is not proven safe for concurrent use.
pub type SharedTranscriber = Arc<Mutex<Box<dyn Transcriber>>>;

/// Transcript of one audio input plus the inference wall-clock time.
///
/// Owned by the pipeline invocation that produced it; model-load time
/// is never included in `duration_seconds`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub duration_seconds: f64,
}

/// Run the transcription stage on one audio input.
///
/// Rejects empty input before touching the model. The inference call is
/// CPU-bound and runs on the blocking pool.
pub async fn run_transcription(
    transcriber: SharedTranscriber,
    samples: Vec<f32>,
) -> Result<Transcript, PipelineError> {
    if samples.is_empty() {
        return Err(PipelineError::TranscriptionFailed(
            "empty audio input".to_string(),
        ));
    }

    let result = tokio::task::spawn_blocking(move || {
        let mut model = transcriber
            .lock()
            .map_err(|_| anyhow::anyhow!("transcriber mutex poisoned"))?;
        let start = Instant::now();
        let text = model.transcribe(&samples, TARGET_SAMPLE_RATE)?;
        Ok::<_, anyhow::Error>(Transcript {
            text,
            duration_seconds: start.elapsed().as_secs_f64(),
        })
    })
    .await
    .map_err(|e| PipelineError::TranscriptionFailed(format!("transcription task panicked: {e}")))?
    .map_err(|e| PipelineError::TranscriptionFailed(format!("{e:#}")))?;

    if result.text.is_empty() {
        return Err(PipelineError::TranscriptionFailed(
            "model produced no text".to_string(),
        ));
    }

    debug!(
        chars = result.text.len(),
        duration_s = result.duration_seconds,
        "Transcription stage complete"
    );

    Ok(result)
}

#[cfg(test)]
#[path = "transcribe_test.rs"]
mod tests;
