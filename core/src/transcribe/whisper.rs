//! Whisper transcription backend.
//!
//! Uses whisper.cpp via whisper-rs for speech-to-text.

use super::{TARGET_SAMPLE_RATE, Transcriber};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
};

use crate::config::Device;

/// Whisper speech-to-text transcriber.
///
/// The `WhisperState` holds its own reference to the loaded model, so
/// dropping the transcriber (as the registry does on eviction) releases
/// the model memory.
pub struct WhisperTranscriber {
    state: WhisperState,
    language: Option<String>,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber.
    ///
    /// # Arguments
    /// * `model_path` - Path to the Whisper GGML model file
    /// * `language` - Language code (e.g., "en", "de") or None for auto-detect
    /// * `device` - Compute device used for inference
    pub fn new(
        model_path: impl AsRef<Path>,
        language: Option<String>,
        device: Device,
    ) -> Result<Self> {
        info!(
            path = %model_path.as_ref().display(),
            language = ?language,
            device = ?device,
            "Loading Whisper model"
        );

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(matches!(device, Device::Gpu));

        let ctx = WhisperContext::new_with_params(
            model_path.as_ref().to_str().context("Invalid model path")?,
            ctx_params,
        )
        .context("Failed to load Whisper model")?;

        // The state keeps the model alive on its own, so the context
        // handle can go out of scope here.
        let state = ctx
            .create_state()
            .context("Failed to create Whisper state")?;

        info!("Whisper model and state loaded successfully");

        Ok(Self { state, language })
    }

    /// Get the configured language.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&mut self, audio: &[f32], sample_rate: u32) -> Result<String> {
        debug!(
            samples = audio.len(),
            sample_rate = sample_rate,
            duration_secs = audio.len() as f32 / sample_rate as f32,
            "Transcribing audio with Whisper"
        );

        // Whisper expects 16kHz audio
        if sample_rate != TARGET_SAMPLE_RATE {
            anyhow::bail!(
                "Whisper expects {}Hz audio, got {}Hz. Resample before calling transcribe.",
                TARGET_SAMPLE_RATE,
                sample_rate
            );
        }

        // Greedy decoding keeps output deterministic for a fixed input.
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // Configure language
        if let Some(ref lang) = self.language {
            params.set_language(Some(lang));
        } else {
            params.set_language(None); // Auto-detect
        }

        // Disable printing to stdout
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        // Commentary clips are short; single segment keeps latency down
        params.set_single_segment(true);

        // Run inference using the pre-created state
        self.state
            .full(params, audio)
            .context("Whisper inference failed")?;

        // Collect all segments
        let num_segments = self.state.full_n_segments();
        let mut result = String::new();

        for i in 0..num_segments {
            if let Some(segment) = self.state.get_segment(i) {
                if let Ok(text) = segment.to_str_lossy() {
                    result.push_str(&text);
                }
            }
        }

        debug!(text_len = result.len(), "Transcription complete");

        Ok(result.trim().to_string())
    }
}
