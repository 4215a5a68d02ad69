//! Pipeline error taxonomy.
//!
//! Every fatal per-item failure is one of the `PipelineError` variants.
//! Failures never propagate past the pipeline boundary: `PipelineRunner`
//! converts them into `ErrorRecord` data that batch callers receive as-is.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors a single pipeline invocation can produce.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The requested model could not be resolved or loaded.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Audio could not be transcribed (empty/corrupt input or inference error).
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// LLM extraction was requested without an instruction prompt.
    #[error("llm extraction requires a non-empty prompt")]
    PromptRequired,

    /// The extraction backend returned output that could not be parsed.
    #[error("extraction output could not be parsed: {0}")]
    ExtractionParseFailed(String),

    /// The caller-imposed deadline expired before the pipeline finished.
    #[error("pipeline timed out after {0:.1}s")]
    Timeout(f64),
}

impl PipelineError {
    /// The serializable kind tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            PipelineError::TranscriptionFailed(_) => ErrorKind::TranscriptionFailed,
            PipelineError::PromptRequired => ErrorKind::PromptRequired,
            PipelineError::ExtractionParseFailed(_) => ErrorKind::ExtractionParseFailed,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// Wire-friendly mirror of the `PipelineError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModelUnavailable,
    TranscriptionFailed,
    PromptRequired,
    ExtractionParseFailed,
    Timeout,
}

/// Pipeline stage in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Configuration,
    Transcription,
    Extraction,
    Normalization,
    /// Whole-invocation failures that cannot be pinned to one stage,
    /// such as a deadline expiring mid-flight.
    Pipeline,
}

/// Durations of the stages that ran before a failure.
///
/// A failed stage still gets a timing entry; stages that never executed
/// are omitted from the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialTiming {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_s: Option<f64>,
    pub total_s: f64,
}

/// A captured per-item failure, returned as data instead of raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
    pub timing: PartialTiming,
}

impl ErrorRecord {
    pub fn new(stage: Stage, error: &PipelineError, timing: PartialTiming) -> Self {
        Self {
            stage,
            kind: error.kind(),
            message: error.to_string(),
            timing,
        }
    }
}
