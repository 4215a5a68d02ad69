//! Extraction strategies: transcript text to raw quote fields.
//!
//! Two interchangeable backends share one contract: the deterministic
//! rule engine and the LLM backend. Both emit `RawExtraction`, the only
//! loosely-typed value in the pipeline; the normalizer is the sole
//! consumer allowed to coerce it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;
use crate::quote::ExtractionMethod;

mod llm;
mod rules;

pub use llm::{ChatModel, LlmExtractor, OllamaChat};
pub use rules::RuleExtractor;

/// Caller-facing extraction configuration for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionRequest {
    pub mode: ExtractionMode,
    /// Instruction prompt; mandatory for llm mode.
    pub prompt: Option<String>,
    /// LLM model identifier override, if any.
    pub model: Option<String>,
}

/// Extraction mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    Regex,
    Llm,
    #[default]
    Auto,
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Regex => write!(f, "regex"),
            ExtractionMode::Llm => write!(f, "llm"),
            ExtractionMode::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regex" => Ok(ExtractionMode::Regex),
            "llm" => Ok(ExtractionMode::Llm),
            "auto" => Ok(ExtractionMode::Auto),
            _ => Err(format!("Unknown mode: {}. Use 'regex', 'llm' or 'auto'", s)),
        }
    }
}

/// Resolve the requested mode to a concrete backend.
///
/// Pure function, evaluated once before the pipeline starts: `auto`
/// becomes `llm` when a non-empty prompt is supplied, else `regex`.
/// `llm` without a prompt is a configuration error rejected here,
/// before any model resource is touched.
pub fn resolve_method(request: &ExtractionRequest) -> Result<ExtractionMethod, PipelineError> {
    let has_prompt = request
        .prompt
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty());

    match request.mode {
        ExtractionMode::Regex => Ok(ExtractionMethod::Regex),
        ExtractionMode::Llm if has_prompt => Ok(ExtractionMethod::Llm),
        ExtractionMode::Llm => Err(PipelineError::PromptRequired),
        ExtractionMode::Auto if has_prompt => Ok(ExtractionMethod::Llm),
        ExtractionMode::Auto => Ok(ExtractionMethod::Regex),
    }
}

/// Raw field strings captured by the rule engine. Everything stays a
/// string until the normalizer coerces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleMatches {
    pub index_name: Option<String>,
    pub current_price: Option<String>,
    pub change_points: Option<String>,
    pub change_percent: Option<String>,
    pub intraday_high: Option<String>,
    pub intraday_low: Option<String>,
    pub market_direction: Option<String>,
    pub session_context: Option<String>,
}

/// Backend-specific intermediate payload. Only the normalizer looks
/// inside; everything downstream sees `CanonicalQuote`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawExtraction {
    Rules(RuleMatches),
    Llm(serde_json::Value),
}

/// Polymorphic extraction backend interface.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Which backend this is, recorded in the final quote.
    fn method(&self) -> ExtractionMethod;

    /// Turn transcript text into raw extracted fields.
    async fn extract(&self, transcript: &str) -> Result<RawExtraction, PipelineError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
