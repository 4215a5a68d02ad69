//! Pipeline orchestration for one audio input.
//!
//! Sequences transcription, extraction and normalization with per-stage
//! timing. Stage failures never propagate past this boundary: every
//! invocation returns exactly one of `Quote` or `Error`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::{ErrorRecord, PartialTiming, PipelineError, Stage};
use crate::extract::{
    ExtractionRequest, ExtractionStrategy, LlmExtractor, RuleExtractor, resolve_method,
};
use crate::normalize::{Normalizer, NormalizerPolicy};
use crate::quote::{CanonicalQuote, ExtractionMethod, Timing};
use crate::registry::{ModelRegistry, ModelSpec};
use crate::repair;
use crate::transcribe::run_transcription;

/// Result of one pipeline invocation: a complete record or a single
/// typed error, never a partial shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PipelineOutcome {
    Quote(CanonicalQuote),
    Error(ErrorRecord),
}

impl PipelineOutcome {
    pub fn is_quote(&self) -> bool {
        matches!(self, PipelineOutcome::Quote(_))
    }

    pub fn quote(&self) -> Option<&CanonicalQuote> {
        match self {
            PipelineOutcome::Quote(q) => Some(q),
            PipelineOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match self {
            PipelineOutcome::Quote(_) => None,
            PipelineOutcome::Error(e) => Some(e),
        }
    }
}

/// Runs the transcription → extraction → normalization sequence for one
/// input.
pub struct PipelineRunner {
    registry: Arc<ModelRegistry>,
    config: Config,
    normalizer: Normalizer,
}

impl PipelineRunner {
    pub fn new(registry: Arc<ModelRegistry>, config: Config) -> Self {
        let normalizer = Normalizer::new(NormalizerPolicy {
            duplicate_value_guard: config.normalizer.duplicate_value_guard,
            ..NormalizerPolicy::default()
        });
        Self {
            registry,
            config,
            normalizer,
        }
    }

    /// Process one audio input end to end.
    #[instrument(skip_all, fields(samples = samples.len(), mode = %request.mode))]
    pub async fn run(&self, samples: Vec<f32>, request: &ExtractionRequest) -> PipelineOutcome {
        let total_start = Instant::now();

        // Mode resolution is pure and happens before any model resource
        // is touched; configuration errors are rejected here.
        let method = match resolve_method(request) {
            Ok(method) => method,
            Err(e) => {
                return failed(Stage::Configuration, &e, PartialTiming::default());
            }
        };

        let spec = ModelSpec::transcription(
            self.config.model.transcription.as_str(),
            self.config.model.device,
        );
        let transcriber = match self.registry.acquire_transcriber(&spec).await {
            Ok(handle) => handle,
            Err(e) => {
                let timing = PartialTiming {
                    total_s: total_start.elapsed().as_secs_f64(),
                    ..PartialTiming::default()
                };
                return failed(Stage::Transcription, &e, timing);
            }
        };

        let stage_start = Instant::now();
        let transcript = match run_transcription(transcriber, samples).await {
            Ok(transcript) => transcript,
            Err(e) => {
                // The failed stage still gets a timing entry
                let timing = PartialTiming {
                    transcription_s: Some(stage_start.elapsed().as_secs_f64()),
                    extraction_s: None,
                    total_s: total_start.elapsed().as_secs_f64(),
                };
                return failed(Stage::Transcription, &e, timing);
            }
        };

        let text = repair::clean_transcript(&transcript.text);

        let strategy: Box<dyn ExtractionStrategy> = match self.build_strategy(method, request).await
        {
            Ok(strategy) => strategy,
            Err(e) => {
                let timing = PartialTiming {
                    transcription_s: Some(transcript.duration_seconds),
                    extraction_s: None,
                    total_s: total_start.elapsed().as_secs_f64(),
                };
                return failed(Stage::Extraction, &e, timing);
            }
        };

        let stage_start = Instant::now();
        let raw = match strategy.extract(&text).await {
            Ok(raw) => raw,
            Err(e) => {
                let timing = PartialTiming {
                    transcription_s: Some(transcript.duration_seconds),
                    extraction_s: Some(stage_start.elapsed().as_secs_f64()),
                    total_s: total_start.elapsed().as_secs_f64(),
                };
                return failed(Stage::Extraction, &e, timing);
            }
        };
        let extraction_s = stage_start.elapsed().as_secs_f64();

        // Normalization never fails; unparseable fields degrade to null
        let normalized = self.normalizer.normalize(&raw);

        let quote = CanonicalQuote {
            full_transcription: text,
            standardized_quote: normalized.standardized_quote,
            index_name: normalized.index_name,
            quote_analysis: normalized.analysis,
            timing: Timing {
                transcription_s: transcript.duration_seconds,
                extraction_s,
                total_s: total_start.elapsed().as_secs_f64(),
            },
            extraction_method: method,
            low_confidence: normalized.low_confidence,
        };

        info!(
            method = %quote.extraction_method,
            index = ?quote.index_name,
            low_confidence = quote.low_confidence,
            total_s = quote.timing.total_s,
            "Pipeline complete"
        );

        PipelineOutcome::Quote(quote)
    }

    /// Like `run`, with a caller-imposed deadline over the whole
    /// invocation. There is no kill primitive for in-flight inference;
    /// on expiry the underlying model call is left to finish in the
    /// background and the item is reported as timed out.
    pub async fn run_with_timeout(
        &self,
        samples: Vec<f32>,
        request: &ExtractionRequest,
        deadline: Duration,
    ) -> PipelineOutcome {
        match tokio::time::timeout(deadline, self.run(samples, request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let e = PipelineError::Timeout(deadline.as_secs_f64());
                let timing = PartialTiming {
                    total_s: deadline.as_secs_f64(),
                    ..PartialTiming::default()
                };
                failed(Stage::Pipeline, &e, timing)
            }
        }
    }

    async fn build_strategy(
        &self,
        method: ExtractionMethod,
        request: &ExtractionRequest,
    ) -> Result<Box<dyn ExtractionStrategy>, PipelineError> {
        match method {
            ExtractionMethod::Regex => Ok(Box::new(RuleExtractor)),
            ExtractionMethod::Llm => {
                let identifier = request
                    .model
                    .clone()
                    .unwrap_or_else(|| self.config.extraction.llm_model.clone());
                let spec = ModelSpec::extraction_llm(identifier);
                let session = self.registry.acquire_chat_model(&spec).await?;
                // Resolution already guaranteed the prompt is present
                let prompt = request.prompt.clone().unwrap_or_default();
                Ok(Box::new(LlmExtractor::new(
                    session,
                    prompt,
                    self.config.extraction.max_output_tokens,
                )))
            }
        }
    }
}

fn failed(stage: Stage, error: &PipelineError, timing: PartialTiming) -> PipelineOutcome {
    tracing::warn!(?stage, error = %error, "Pipeline stage failed");
    PipelineOutcome::Error(ErrorRecord::new(stage, error, timing))
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
