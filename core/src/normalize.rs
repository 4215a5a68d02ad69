//! Normalization of raw extraction output into the canonical schema.
//!
//! The normalizer is the only place in the pipeline allowed to coerce
//! types. It never fails: unparseable or missing fields degrade to
//! null, off-whitelist enum phrases become null, and suspect
//! extractions are flagged low-confidence instead of rejected.

use serde_json::Value;
use tracing::warn;

use crate::extract::{RawExtraction, RuleMatches};
use crate::quote::{MarketDirection, QuoteAnalysis, SessionContext};

/// Phrase whitelists and guard thresholds. The exact tables are policy,
/// not contract; callers may substitute their own.
#[derive(Debug, Clone)]
pub struct NormalizerPolicy {
    /// Substring synonyms mapped onto the direction enum, in match order.
    pub direction_synonyms: Vec<(String, MarketDirection)>,
    /// Substring synonyms mapped onto the session enum, in match order.
    /// Compound phrases must precede the bare words they contain.
    pub session_synonyms: Vec<(String, SessionContext)>,
    /// Flag extractions where price, intraday high and intraday low all
    /// carry one identical value.
    pub duplicate_value_guard: bool,
    /// Number of instruction-echo fields that marks an extraction
    /// low-confidence.
    pub placeholder_tolerance: usize,
}

fn synonyms<T: Copy>(words: &[&str], target: T) -> Vec<(String, T)> {
    words.iter().map(|w| (w.to_string(), target)).collect()
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        let mut direction_synonyms = synonyms(
            &[
                "up", "higher", "gaining", "advancing", "rallying", "positive", "rose", "climbed",
            ],
            MarketDirection::Up,
        );
        direction_synonyms.extend(synonyms(
            &[
                "down", "lower", "falling", "declining", "negative", "fell", "dropped", "lost",
            ],
            MarketDirection::Down,
        ));
        direction_synonyms.extend(synonyms(
            &["flat", "unchanged", "little changed", "barely"],
            MarketDirection::Flat,
        ));

        let mut session_synonyms = synonyms(
            &[
                "after hours",
                "afterhours",
                "after-hours",
                "after the close",
                "after the bell",
                "extended trading",
            ],
            SessionContext::Afterhours,
        );
        session_synonyms.extend(synonyms(
            &["premarket", "pre-market", "before the bell", "before the open"],
            SessionContext::Premarket,
        ));
        session_synonyms.extend(synonyms(
            &["midday", "mid-day", "noon"],
            SessionContext::Midday,
        ));
        session_synonyms.extend(synonyms(&["opening", "open"], SessionContext::Opening));
        session_synonyms.extend(synonyms(&["closing", "close"], SessionContext::Closing));

        Self {
            direction_synonyms,
            session_synonyms,
            duplicate_value_guard: true,
            placeholder_tolerance: 2,
        }
    }
}

/// Output of the normalization stage: everything the pipeline needs to
/// assemble a `CanonicalQuote` besides transcript and timing.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuote {
    pub index_name: Option<String>,
    pub analysis: QuoteAnalysis,
    pub standardized_quote: String,
    pub low_confidence: bool,
}

/// Validates and coerces raw extraction payloads into the canonical
/// analysis block.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    policy: NormalizerPolicy,
}

impl Normalizer {
    pub fn new(policy: NormalizerPolicy) -> Self {
        Self { policy }
    }

    /// Normalize one raw extraction. Always returns a fully-shaped
    /// result; this function has no failure path.
    pub fn normalize(&self, raw: &RawExtraction) -> NormalizedQuote {
        let (index_name, analysis, placeholder_fields) = match raw {
            RawExtraction::Rules(matches) => {
                let (index, analysis) = self.from_rules(matches);
                (index, analysis, 0)
            }
            RawExtraction::Llm(value) => self.from_llm(value),
        };

        let mut low_confidence = false;

        if placeholder_fields >= self.policy.placeholder_tolerance {
            warn!(
                fields = placeholder_fields,
                "Extraction echoed instruction text; flagging low confidence"
            );
            low_confidence = true;
        }

        if self.policy.duplicate_value_guard && has_duplicate_values(&analysis) {
            warn!(
                price = ?analysis.current_price,
                "Price, intraday high and intraday low are identical; flagging low confidence"
            );
            low_confidence = true;
        }

        let standardized_quote = synthesize_quote(index_name.as_deref(), &analysis);

        NormalizedQuote {
            index_name,
            analysis,
            standardized_quote,
            low_confidence,
        }
    }

    fn from_rules(&self, matches: &RuleMatches) -> (Option<String>, QuoteAnalysis) {
        let analysis = QuoteAnalysis {
            current_price: matches.current_price.as_deref().and_then(parse_numeric),
            change_points: matches.change_points.as_deref().and_then(parse_numeric),
            change_percent: matches.change_percent.as_deref().and_then(parse_numeric),
            intraday_high: matches.intraday_high.as_deref().and_then(parse_numeric),
            intraday_low: matches.intraday_low.as_deref().and_then(parse_numeric),
            market_direction: matches
                .market_direction
                .as_deref()
                .and_then(|v| self.map_direction(v)),
            session_context: matches
                .session_context
                .as_deref()
                .and_then(|v| self.map_session(v)),
        };
        let index = matches.index_name.as_deref().and_then(normalize_index_name);
        (index, analysis)
    }

    /// Accepts both the nested `{"quote_analysis": {...}}` shape the
    /// prompt asks for and a flat object, since models produce either.
    fn from_llm(&self, value: &Value) -> (Option<String>, QuoteAnalysis, usize) {
        let nested = value.get("quote_analysis").filter(|v| v.is_object());
        let field = |name: &str| -> Option<Value> {
            nested
                .and_then(|obj| obj.get(name))
                .or_else(|| value.get(name))
                .cloned()
        };

        let mut placeholder_fields = 0;
        let mut screened = |name: &str| -> Option<Value> {
            let v = field(name)?;
            if is_placeholder(&v) {
                warn!(field = name, "Dropping placeholder value from LLM output");
                placeholder_fields += 1;
                None
            } else {
                Some(v)
            }
        };

        let analysis = QuoteAnalysis {
            current_price: screened("current_price").and_then(|v| coerce_number(&v)),
            change_points: screened("change_points")
                .or_else(|| screened("change"))
                .and_then(|v| coerce_number(&v)),
            change_percent: screened("change_percent").and_then(|v| coerce_number(&v)),
            intraday_high: screened("intraday_high").and_then(|v| coerce_number(&v)),
            intraday_low: screened("intraday_low").and_then(|v| coerce_number(&v)),
            market_direction: screened("market_direction")
                .and_then(|v| v.as_str().map(str::to_string))
                .and_then(|v| self.map_direction(&v)),
            session_context: screened("session_context")
                .or_else(|| screened("session"))
                .and_then(|v| v.as_str().map(str::to_string))
                .and_then(|v| self.map_session(&v)),
        };

        let index = screened("index_name")
            .or_else(|| screened("index"))
            .and_then(|v| v.as_str().map(str::to_string))
            .as_deref()
            .and_then(normalize_index_name);

        (index, analysis, placeholder_fields)
    }

    /// Whitelist mapping; anything off-list becomes null, never an error.
    fn map_direction(&self, value: &str) -> Option<MarketDirection> {
        let lower = value.trim().to_lowercase();
        self.policy
            .direction_synonyms
            .iter()
            .find(|(word, _)| lower.contains(word.as_str()))
            .map(|(_, direction)| *direction)
    }

    fn map_session(&self, value: &str) -> Option<SessionContext> {
        let lower = value.trim().to_lowercase();
        self.policy
            .session_synonyms
            .iter()
            .find(|(word, _)| lower.contains(word.as_str()))
            .map(|(_, session)| *session)
    }
}

/// Coerce a numeric-looking string into a signed number.
///
/// Handles thousands separators, leading sign characters and percent
/// suffixes; placeholder words and anything unparseable become None.
pub fn parse_numeric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if matches!(
        trimmed.to_lowercase().as_str(),
        "none" | "null" | "n/a" | "na"
    ) {
        return None;
    }

    let cleaned: String = trimmed
        .trim_end_matches('%')
        .trim_end_matches(" percent")
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let cleaned = cleaned.trim_start_matches('+');

    cleaned.trim().parse::<f64>().ok()
}

/// Coerce a loosely-typed JSON value into a number or null.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric(s),
        _ => None,
    }
}

fn normalize_index_name(value: &str) -> Option<String> {
    let upper = value.trim().to_uppercase();
    if upper.is_empty() || matches!(upper.as_str(), "NONE" | "NULL" | "N/A" | "NA") {
        return None;
    }
    Some(upper)
}

/// Instruction keywords that show up when a model copies its prompt
/// back instead of extracting real values.
const INSTRUCTION_KEYWORDS: &[&str] = &["MENTIONED", "TRANSCRIPT", "EXTRACT", "INFORMATION", "CONTEXT"];

fn is_placeholder(value: &Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let upper = s.to_uppercase();
    let keyword_hits = INSTRUCTION_KEYWORDS
        .iter()
        .filter(|k| upper.contains(*k))
        .count();
    if keyword_hits >= 2 {
        return true;
    }
    // Long sentence-like values are instruction text, not data
    upper.len() > 30
        && ["THE ", "FROM ", "MENTIONED", "EXTRACT"]
            .iter()
            .any(|k| upper.contains(k))
}

/// A known LLM failure mode is copying one field's value into the
/// others; identical price/high/low is vanishingly unlikely in real
/// commentary.
fn has_duplicate_values(analysis: &QuoteAnalysis) -> bool {
    match (
        analysis.current_price,
        analysis.intraday_high,
        analysis.intraday_low,
    ) {
        (Some(price), Some(high), Some(low)) => price == high && price == low,
        _ => false,
    }
}

fn format_value(n: f64) -> String {
    // Minimal representation: 4212 not 4212.0
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn format_signed(n: f64) -> String {
    if n >= 0.0 {
        format!("+{}", format_value(n))
    } else {
        format!("-{}", format_value(n.abs()))
    }
}

/// Deterministic standardized quote line, built from normalized fields
/// only: index, price, signed change, signed percent, session; each
/// piece included only when present.
fn synthesize_quote(index_name: Option<&str>, analysis: &QuoteAnalysis) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(index) = index_name {
        parts.push(index.to_string());
    }
    if let Some(price) = analysis.current_price {
        parts.push(format!("@ {}", format_value(price)));
    }
    if let Some(change) = analysis.change_points {
        parts.push(format_signed(change));
    }
    if let Some(percent) = analysis.change_percent {
        parts.push(format!("({}%)", format_signed(percent)));
    }
    if let Some(session) = analysis.session_context {
        parts.push(format!("[{}]", session.as_str()));
    }
    parts.join(" ")
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
