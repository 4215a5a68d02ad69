//! Deterministic pattern extraction.
//!
//! Ordered rule tables locate index name, price, signed change, signed
//! percentage, intraday range and session keyword in transcript text.
//! Fields are extracted independently; the first matching rule in
//! priority order wins per field. No model dependency, always available.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{ExtractionStrategy, RawExtraction, RuleMatches};
use crate::error::PipelineError;
use crate::quote::ExtractionMethod;

/// A number with optional thousands separators and decimals.
const NUM: &str = r"[0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]+)?|[0-9]+(?:\.[0-9]+)?";

/// An index-name pattern with its canonical spelling.
struct IndexRule {
    regex: Regex,
    canonical: &'static str,
}

static INDEX_RULES: LazyLock<Vec<IndexRule>> = LazyLock::new(|| {
    [
        (r"(?i)\bS\s*&\s*P\s*500\b|\bS&P\b", "S&P 500"),
        (r"(?i)\bnasdaq(?:\s+composite)?\b", "NASDAQ"),
        (r"(?i)\bdow(?:\s+jones)?(?:\s+industrial(?:\s+average)?)?\b", "DOW"),
        (r"(?i)\brussell(?:\s*2000)?\b", "RUSSELL 2000"),
        (r"(?i)\bdax\b", "DAX"),
        (r"(?i)\bftse(?:\s*100)?\b", "FTSE 100"),
        (r"(?i)\bnikkei(?:\s*225)?\b", "NIKKEI"),
        (r"(?i)\bvix\b", "VIX"),
    ]
    .into_iter()
    .map(|(pattern, canonical)| IndexRule {
        regex: Regex::new(pattern).expect("invalid index pattern"),
        canonical,
    })
    .collect()
});

/// Words that flip an adjacent magnitude negative.
const NEGATIVE_WORDS: &[&str] = &[
    "down", "lower", "lost", "losing", "fell", "falling", "dropped", "dropping", "shed",
    "shedding", "declined", "declining", "off",
];

static PRICE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:\b(?:at|to|reaching|touching|hitting)\s+|@\s*)({NUM})\b"
    ))
    .expect("invalid price pattern")
});

static ANY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)({NUM})")).expect("invalid number pattern"));

static CHANGE_POINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b([a-z]+)\s+(?:about\s+|nearly\s+|some\s+)?({NUM})\s+points?\b"
    ))
    .expect("invalid change pattern")
});

static SIGNED_POINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"([+-](?:{NUM}))\s+points?\b")).expect("invalid signed change pattern")
});

static PERCENT_LEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b([a-z]+)\s+(?:about\s+|nearly\s+|some\s+)?({NUM})\s*(?:%|percent)"
    ))
    .expect("invalid percent pattern")
});

static PERCENT_TRAILING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b([+-]?(?:{NUM}))\s*(?:%|percent)\s+(higher|lower|up|down)\b"
    ))
    .expect("invalid percent pattern")
});

static PERCENT_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)([+-]?(?:{NUM}))\s*(?:%|percent)")).expect("invalid percent pattern")
});

static INTRADAY_HIGH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:session|intraday|day(?:'s)?)\s+high\s+(?:of\s+|at\s+)?({NUM})"
    ))
    .expect("invalid high pattern")
});

static INTRADAY_LOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:session|intraday|day(?:'s)?)\s+low\s+(?:of\s+|at\s+)?({NUM})"
    ))
    .expect("invalid low pattern")
});

static DIRECTION_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b(?:up|higher|gained|gaining|advanced|advancing|rallied|rallying|rose|rising|climbed|climbing|positive)\b",
            "up",
        ),
        (
            r"(?i)\b(?:down|lower|lost|losing|fell|falling|declined|declining|dropped|dropping|shed|shedding|negative)\b",
            "down",
        ),
        (
            r"(?i)\bflat\b|\bunchanged\b|\blittle changed\b|\bbarely moved\b",
            "flat",
        ),
    ]
    .into_iter()
    .map(|(pattern, word)| (Regex::new(pattern).expect("invalid direction pattern"), word))
    .collect()
});

// Compound phrases (after/before the close/open) must outrank the bare
// closing/opening rules, so afterhours and premarket come first.
static SESSION_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"(?i)\bafter[\s-]?hours\b|\bafter the (?:bell|close)\b|\bextended trading\b",
            "afterhours",
        ),
        (
            r"(?i)\bpre[\s-]?market\b|\bbefore the (?:bell|open)\b",
            "premarket",
        ),
        (
            r"(?i)\bclosing\b|\bclosed\b|\bat the close\b|\bfinal bell\b|\bend of (?:the )?day\b",
            "closing",
        ),
        (
            r"(?i)\bopening\b|\bopened\b|\bat the open\b|\bstart of trading\b",
            "opening",
        ),
        (r"(?i)\bmid[\s-]?day\b|\bnoon\b|\blunchtime\b", "midday"),
    ]
    .into_iter()
    .map(|(pattern, word)| (Regex::new(pattern).expect("invalid session pattern"), word))
    .collect()
});

/// Regex-rule extraction backend.
#[derive(Debug, Default, Clone)]
pub struct RuleExtractor;

impl RuleExtractor {
    /// Apply every field's rule table to a transcript. Fields are
    /// independent; a miss on one never blocks another.
    pub fn apply(&self, text: &str) -> RuleMatches {
        let matches = RuleMatches {
            index_name: extract_index(text),
            current_price: extract_price(text),
            change_points: extract_change_points(text),
            change_percent: extract_change_percent(text),
            intraday_high: INTRADAY_HIGH
                .captures(text)
                .map(|c| c[1].to_string()),
            intraday_low: INTRADAY_LOW.captures(text).map(|c| c[1].to_string()),
            market_direction: first_rule_match(&DIRECTION_RULES, text),
            session_context: first_rule_match(&SESSION_RULES, text),
        };
        debug!(?matches, "Rule extraction complete");
        matches
    }
}

#[async_trait]
impl ExtractionStrategy for RuleExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Regex
    }

    async fn extract(&self, transcript: &str) -> Result<RawExtraction, PipelineError> {
        Ok(RawExtraction::Rules(self.apply(transcript)))
    }
}

fn first_rule_match(rules: &[(Regex, &'static str)], text: &str) -> Option<String> {
    rules
        .iter()
        .find(|(regex, _)| regex.is_match(text))
        .map(|(_, word)| word.to_string())
}

fn extract_index(text: &str) -> Option<String> {
    INDEX_RULES
        .iter()
        .find(|rule| rule.regex.is_match(text))
        .map(|rule| rule.canonical.to_string())
}

/// Spans already claimed by other fields, so the price fallback cannot
/// re-report an index numeral ("S&P 500", "Russell 2000") or an
/// intraday high/low magnitude as the current price.
fn claimed_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = INDEX_RULES
        .iter()
        .find_map(|rule| rule.regex.find(text))
        .map(|m| (m.start(), m.end()))
        .into_iter()
        .collect();
    for rule in [&*INTRADAY_HIGH, &*INTRADAY_LOW] {
        for caps in rule.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                spans.push((m.start(), m.end()));
            }
        }
    }
    spans
}

fn extract_price(text: &str) -> Option<String> {
    if let Some(caps) = PRICE_ANCHOR.captures(text) {
        return Some(caps[1].to_string());
    }

    // Fallback: the last standalone number that is not a points/percent
    // magnitude and not claimed by another field.
    let claimed = claimed_spans(text);
    let mut candidate = None;
    for m in ANY_NUMBER.find_iter(text) {
        if claimed
            .iter()
            .any(|&(start, end)| m.start() >= start && m.end() <= end)
        {
            continue;
        }
        let tail = text[m.end()..].trim_start();
        let tail_lower = tail.to_lowercase();
        if tail_lower.starts_with('%')
            || tail_lower.starts_with("percent")
            || tail_lower.starts_with("point")
        {
            continue;
        }
        candidate = Some(m.as_str().to_string());
    }
    candidate
}

fn signed(word: &str, magnitude: &str) -> String {
    if magnitude.starts_with('+') || magnitude.starts_with('-') {
        // Explicit sign beats the direction word
        magnitude.to_string()
    } else if NEGATIVE_WORDS.contains(&word.to_lowercase().as_str()) {
        format!("-{}", magnitude)
    } else {
        magnitude.to_string()
    }
}

fn is_move_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    NEGATIVE_WORDS.contains(&lower.as_str())
        || matches!(
            lower.as_str(),
            "up" | "higher"
                | "gained"
                | "gaining"
                | "added"
                | "adding"
                | "rose"
                | "rising"
                | "climbed"
                | "climbing"
                | "advanced"
                | "advancing"
        )
}

fn extract_change_points(text: &str) -> Option<String> {
    for caps in CHANGE_POINTS.captures_iter(text) {
        if is_move_word(&caps[1]) {
            return Some(signed(&caps[1], &caps[2]));
        }
    }
    SIGNED_POINTS.captures(text).map(|c| c[1].to_string())
}

fn extract_change_percent(text: &str) -> Option<String> {
    for caps in PERCENT_LEADING.captures_iter(text) {
        if is_move_word(&caps[1]) {
            return Some(signed(&caps[1], &caps[2]));
        }
    }
    if let Some(caps) = PERCENT_TRAILING.captures(text) {
        return Some(signed(&caps[2], &caps[1]));
    }
    PERCENT_BARE.captures(text).map(|c| c[1].to_string())
}

#[cfg(test)]
#[path = "rules_test.rs"]
mod tests;
