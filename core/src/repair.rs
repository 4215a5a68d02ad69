//! Transcript repair for common STT mishearings of market vocabulary.
//!
//! Whisper reliably garbles ticker jargon ("SNP" for S&P, "Tau Jones"
//! for Dow Jones) and glues direction words to magnitudes. The repair
//! pass runs between transcription and extraction so both backends see
//! the corrected text.

use std::sync::LazyLock;

use regex::Regex;

/// A compiled mishearing pattern and its replacement.
struct RepairRule {
    regex: Regex,
    replacement: &'static str,
}

fn rule(pattern: &str, replacement: &'static str) -> RepairRule {
    RepairRule {
        regex: Regex::new(pattern).expect("invalid repair pattern"),
        replacement,
    }
}

static REPAIR_RULES: LazyLock<Vec<RepairRule>> = LazyLock::new(|| {
    vec![
        // Index-name mishearings
        rule(r"(?i)\bSNP\s*500\b", "S&P 500"),
        rule(r"(?i)\bSNP\s*five\s*hundred\b", "S&P 500"),
        rule(r"(?i)\bSNP\b", "S&P"),
        rule(r"(?i)\bTau\s+Jones\b", "Dow Jones"),
        rule(r"(?i)\bnot\s+stack\b", "NASDAQ"),
        rule(r"(?i)\bDucks\b", "DAX"),
        rule(r"(?i)\bVicks\b", "VIX"),
        // Glued direction words: "up15" -> "up 15"
        rule(r"(?i)\bup(\d+)\b", "up $1"),
        rule(r"(?i)\bdown(\d+)\b", "down $1"),
        // "fifty" misheard as "50,000,000": strip the absurd magnitude
        rule(r"(?i)\bup\s+(\d{1,2}),\d{3,}(?:,\d{3})*\b", "up $1"),
        rule(r"(?i)\bdown\s+(\d{1,2}),\d{3,}(?:,\d{3})*\b", "down $1"),
        // "app 2%" -> "up 2%"
        rule(r"(?i)\bapp\s+(\d+)\s*%", "up $1%"),
        // Session vocabulary
        rule(r"(?i)\bSession\s+Law\b", "session low"),
    ]
});

/// Apply the full repair table to a transcript.
pub fn clean_transcript(text: &str) -> String {
    let mut repaired = text.to_string();
    for rule in REPAIR_RULES.iter() {
        repaired = rule
            .regex
            .replace_all(&repaired, rule.replacement)
            .into_owned();
    }
    repaired
}

#[cfg(test)]
#[path = "repair_test.rs"]
mod tests;
