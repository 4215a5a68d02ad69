//! Canonical output schema.
//!
//! Every extraction backend normalizes into these types; numeric fields
//! are numbers or null, never strings, and the enums are closed sets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which extraction backend produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Regex,
    Llm,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Regex => write!(f, "regex"),
            ExtractionMethod::Llm => write!(f, "llm"),
        }
    }
}

/// Direction the market moved in the quoted commentary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketDirection {
    Up,
    Down,
    Flat,
}

impl MarketDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketDirection::Up => "up",
            MarketDirection::Down => "down",
            MarketDirection::Flat => "flat",
        }
    }
}

/// Trading-session phase associated with a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionContext {
    Opening,
    Midday,
    Closing,
    Premarket,
    Afterhours,
}

impl SessionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionContext::Opening => "opening",
            SessionContext::Midday => "midday",
            SessionContext::Closing => "closing",
            SessionContext::Premarket => "premarket",
            SessionContext::Afterhours => "afterhours",
        }
    }
}

/// Fully-shaped numeric/enum analysis block. Missing or unparseable
/// fields degrade to null rather than erroring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteAnalysis {
    pub current_price: Option<f64>,
    pub change_points: Option<f64>,
    pub change_percent: Option<f64>,
    pub intraday_high: Option<f64>,
    pub intraday_low: Option<f64>,
    pub market_direction: Option<MarketDirection>,
    pub session_context: Option<SessionContext>,
}

/// Per-stage wall-clock durations for a completed invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub transcription_s: f64,
    pub extraction_s: f64,
    pub total_s: f64,
}

/// The single output schema, invariant across extraction backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalQuote {
    pub full_transcription: String,
    pub standardized_quote: String,
    pub index_name: Option<String>,
    pub quote_analysis: QuoteAnalysis,
    pub timing: Timing,
    pub extraction_method: ExtractionMethod,
    /// Set when the normalizer distrusts the extraction (duplicate
    /// values across distinct fields, instruction text echoed back).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub low_confidence: bool,
}
