use super::*;
use serde_json::json;

use crate::extract::RuleExtractor;

fn normalizer() -> Normalizer {
    Normalizer::default()
}

fn normalize_rules(text: &str) -> NormalizedQuote {
    let matches = RuleExtractor.apply(text);
    normalizer().normalize(&RawExtraction::Rules(matches))
}

fn normalize_llm(value: serde_json::Value) -> NormalizedQuote {
    normalizer().normalize(&RawExtraction::Llm(value))
}

#[test]
fn test_parse_numeric() {
    assert_eq!(parse_numeric("4212"), Some(4212.0));
    assert_eq!(parse_numeric("34,020"), Some(34020.0));
    assert_eq!(parse_numeric("-58"), Some(-58.0));
    assert_eq!(parse_numeric("+23"), Some(23.0));
    assert_eq!(parse_numeric("0.5%"), Some(0.5));
    assert_eq!(parse_numeric("1.2 percent"), Some(1.2));
    assert_eq!(parse_numeric("  4180  "), Some(4180.0));
}

#[test]
fn test_parse_numeric_rejects_non_numbers() {
    assert_eq!(parse_numeric(""), None);
    assert_eq!(parse_numeric("none"), None);
    assert_eq!(parse_numeric("N/A"), None);
    assert_eq!(parse_numeric("null"), None);
    assert_eq!(parse_numeric("twenty"), None);
    assert_eq!(parse_numeric("4212 points"), None);
}

#[test]
fn test_coerce_number() {
    assert_eq!(coerce_number(&json!(42)), Some(42.0));
    assert_eq!(coerce_number(&json!(-0.5)), Some(-0.5));
    assert_eq!(coerce_number(&json!("34,020")), Some(34020.0));
    assert_eq!(coerce_number(&json!(null)), None);
    assert_eq!(coerce_number(&json!(["4212"])), None);
}

#[test]
fn test_sp500_gain_end_to_end() {
    let quote = normalize_rules("The S&P 500 is up 23 points, 0.5% higher at 4212.");

    assert_eq!(quote.index_name.as_deref(), Some("S&P 500"));
    assert_eq!(quote.analysis.current_price, Some(4212.0));
    assert_eq!(quote.analysis.change_points, Some(23.0));
    assert_eq!(quote.analysis.change_percent, Some(0.5));
    assert_eq!(quote.analysis.market_direction, Some(MarketDirection::Up));
    assert!(quote.analysis.session_context.is_none());
    assert!(!quote.low_confidence);
    assert_eq!(quote.standardized_quote, "S&P 500 @ 4212 +23 (+0.5%)");
}

#[test]
fn test_dow_loss_end_to_end() {
    let quote = normalize_rules("Dow Jones closing down 58 points at 34,020.");

    assert_eq!(quote.index_name.as_deref(), Some("DOW"));
    assert_eq!(quote.analysis.current_price, Some(34020.0));
    assert_eq!(quote.analysis.change_points, Some(-58.0));
    assert!(quote.analysis.change_percent.is_none());
    assert_eq!(quote.analysis.market_direction, Some(MarketDirection::Down));
    assert_eq!(quote.analysis.session_context, Some(SessionContext::Closing));
    assert_eq!(quote.standardized_quote, "DOW @ 34020 -58 [closing]");
}

#[test]
fn test_missing_fields_degrade_to_null() {
    let quote = normalize_rules("markets were quiet today");

    assert!(quote.index_name.is_none());
    assert_eq!(quote.analysis, QuoteAnalysis::default());
    assert_eq!(quote.standardized_quote, "");
    assert!(!quote.low_confidence);
}

#[test]
fn test_llm_nested_shape() {
    let quote = normalize_llm(json!({
        "index_name": "NASDAQ",
        "quote_analysis": {
            "current_price": 13_200.5,
            "change_points": "-85",
            "change_percent": -0.6,
            "market_direction": "down",
            "session_context": "closing"
        }
    }));

    assert_eq!(quote.index_name.as_deref(), Some("NASDAQ"));
    assert_eq!(quote.analysis.current_price, Some(13200.5));
    assert_eq!(quote.analysis.change_points, Some(-85.0));
    assert_eq!(quote.analysis.market_direction, Some(MarketDirection::Down));
    assert_eq!(quote.analysis.session_context, Some(SessionContext::Closing));
    assert_eq!(
        quote.standardized_quote,
        "NASDAQ @ 13200.5 -85 (-0.6%) [closing]"
    );
}

#[test]
fn test_llm_flat_shape_and_alternate_keys() {
    let quote = normalize_llm(json!({
        "index": "dow",
        "current_price": "34,020",
        "change": -58,
        "session": "at the close"
    }));

    assert_eq!(quote.index_name.as_deref(), Some("DOW"));
    assert_eq!(quote.analysis.current_price, Some(34020.0));
    assert_eq!(quote.analysis.change_points, Some(-58.0));
    assert_eq!(quote.analysis.session_context, Some(SessionContext::Closing));
}

#[test]
fn test_off_whitelist_enums_become_null() {
    let quote = normalize_llm(json!({
        "market_direction": "sideways-ish",
        "session_context": "brunch"
    }));

    assert!(quote.analysis.market_direction.is_none());
    assert!(quote.analysis.session_context.is_none());
}

#[test]
fn test_compound_session_phrase_beats_bare_word() {
    let quote = normalize_llm(json!({ "session_context": "after the close" }));
    assert_eq!(
        quote.analysis.session_context,
        Some(SessionContext::Afterhours)
    );
}

#[test]
fn test_index_placeholder_words_become_null() {
    let quote = normalize_llm(json!({ "index_name": "none" }));
    assert!(quote.index_name.is_none());

    let quote = normalize_llm(json!({ "index_name": "N/A" }));
    assert!(quote.index_name.is_none());
}

#[test]
fn test_instruction_echo_flags_low_confidence() {
    let quote = normalize_llm(json!({
        "index_name": "the index mentioned in the transcript",
        "current_price": "extract the price information from the transcript",
        "change_points": 23
    }));

    // Echoed fields are dropped and the extraction flagged
    assert!(quote.index_name.is_none());
    assert!(quote.analysis.current_price.is_none());
    assert_eq!(quote.analysis.change_points, Some(23.0));
    assert!(quote.low_confidence);
}

#[test]
fn test_single_echo_field_is_dropped_but_not_flagged() {
    let quote = normalize_llm(json!({
        "index_name": "DOW",
        "current_price": "extract the price information from the transcript"
    }));

    assert!(quote.analysis.current_price.is_none());
    assert!(!quote.low_confidence);
}

#[test]
fn test_duplicate_value_guard() {
    let quote = normalize_llm(json!({
        "index_name": "DOW",
        "current_price": 34020,
        "intraday_high": 34020,
        "intraday_low": 34020
    }));
    assert!(quote.low_confidence);

    // A real range is not flagged
    let quote = normalize_llm(json!({
        "index_name": "DOW",
        "current_price": 34020,
        "intraday_high": 34150,
        "intraday_low": 33980
    }));
    assert!(!quote.low_confidence);
}

#[test]
fn test_duplicate_value_guard_can_be_disabled() {
    let normalizer = Normalizer::new(NormalizerPolicy {
        duplicate_value_guard: false,
        ..NormalizerPolicy::default()
    });
    let quote = normalizer.normalize(&RawExtraction::Llm(json!({
        "current_price": 100, "intraday_high": 100, "intraday_low": 100
    })));
    assert!(!quote.low_confidence);
}

#[test]
fn test_normalizing_normalized_output_is_identity() {
    let first = normalize_llm(json!({
        "index_name": "S&P 500",
        "current_price": "4,212",
        "change_points": "+23",
        "change_percent": "0.5%",
        "market_direction": "up"
    }));

    // Feed the already-normalized analysis back through
    let mut roundtrip = serde_json::to_value(&first.analysis).unwrap();
    roundtrip["index_name"] = json!(first.index_name);
    let second = normalize_llm(roundtrip);

    assert_eq!(second.index_name, first.index_name);
    assert_eq!(second.analysis, first.analysis);
    assert_eq!(second.standardized_quote, first.standardized_quote);
}

#[test]
fn test_normalization_is_deterministic() {
    let raw = RawExtraction::Llm(json!({
        "index_name": "VIX",
        "current_price": 18.4,
        "market_direction": "up"
    }));
    let normalizer = normalizer();
    assert_eq!(normalizer.normalize(&raw), normalizer.normalize(&raw));
}
