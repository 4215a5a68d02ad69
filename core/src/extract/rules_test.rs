use super::*;

fn apply(text: &str) -> RuleMatches {
    RuleExtractor.apply(text)
}

#[test]
fn test_sp500_gain_transcript() {
    let matches = apply("The S&P 500 is up 23 points, 0.5% higher at 4212.");

    assert_eq!(matches.index_name.as_deref(), Some("S&P 500"));
    assert_eq!(matches.current_price.as_deref(), Some("4212"));
    assert_eq!(matches.change_points.as_deref(), Some("23"));
    assert_eq!(matches.change_percent.as_deref(), Some("0.5"));
    assert_eq!(matches.market_direction.as_deref(), Some("up"));
    assert!(matches.session_context.is_none());
}

#[test]
fn test_dow_loss_transcript() {
    let matches = apply("Dow Jones closing down 58 points at 34,020.");

    assert_eq!(matches.index_name.as_deref(), Some("DOW"));
    assert_eq!(matches.current_price.as_deref(), Some("34,020"));
    assert_eq!(matches.change_points.as_deref(), Some("-58"));
    assert!(matches.change_percent.is_none());
    assert_eq!(matches.market_direction.as_deref(), Some("down"));
    assert_eq!(matches.session_context.as_deref(), Some("closing"));
}

#[test]
fn test_index_canonicalization() {
    assert_eq!(
        apply("the Nasdaq Composite rallied").index_name.as_deref(),
        Some("NASDAQ")
    );
    assert_eq!(
        apply("the Dow Industrial Average slipped").index_name.as_deref(),
        Some("DOW")
    );
    assert_eq!(
        apply("the Russell fell sharply").index_name.as_deref(),
        Some("RUSSELL 2000")
    );
    assert_eq!(apply("the FTSE edged up").index_name.as_deref(), Some("FTSE 100"));
    assert!(apply("shares of Acme Corp rose").index_name.is_none());
}

#[test]
fn test_price_fallback_skips_index_numerals() {
    // No "at"-style anchor; the 500 in the index name must not be
    // mistaken for a price, nor the points magnitude.
    let matches = apply("S&P 500 gained 12 points to finish near 4180");
    assert_eq!(matches.current_price.as_deref(), Some("4180"));
}

#[test]
fn test_price_at_sign_anchor() {
    let matches = apply("S&P 500 @ 4212");
    assert_eq!(matches.current_price.as_deref(), Some("4212"));
}

#[test]
fn test_price_fallback_ignores_percent_magnitudes() {
    let matches = apply("the Nasdaq dropped 1.2 percent");
    assert!(matches.current_price.is_none());
    assert_eq!(matches.change_percent.as_deref(), Some("-1.2"));
}

#[test]
fn test_price_fallback_skips_intraday_magnitudes() {
    // Without an anchor the range numbers must not stand in for the
    // current price.
    let matches =
        apply("S&P 500 trading between a session high of 4250 and a session low of 4190");
    assert_eq!(matches.intraday_high.as_deref(), Some("4250"));
    assert_eq!(matches.intraday_low.as_deref(), Some("4190"));
    assert!(matches.current_price.is_none());

    // An anchored price next to a range still comes through
    let matches = apply("the Dow at 34,020 after a session low of 33,900");
    assert_eq!(matches.current_price.as_deref(), Some("34,020"));
    assert_eq!(matches.intraday_low.as_deref(), Some("33,900"));
}

#[test]
fn test_bare_percent_is_case_insensitive() {
    let matches = apply("THE NASDAQ HOVERING NEAR 2 PERCENT");
    assert_eq!(matches.change_percent.as_deref(), Some("2"));
}

#[test]
fn test_negative_words_flip_sign() {
    assert_eq!(
        apply("the Dow fell 120 points").change_points.as_deref(),
        Some("-120")
    );
    assert_eq!(
        apply("the Dow shed 42 points").change_points.as_deref(),
        Some("-42")
    );
    assert_eq!(
        apply("the Dow gained 42 points").change_points.as_deref(),
        Some("42")
    );
}

#[test]
fn test_explicit_sign_wins_over_direction_word() {
    let matches = apply("showing -15 points on the day, down again");
    assert_eq!(matches.change_points.as_deref(), Some("-15"));
}

#[test]
fn test_percent_trailing_direction() {
    assert_eq!(
        apply("trading 1.4% lower at midday").change_percent.as_deref(),
        Some("-1.4")
    );
    assert_eq!(
        apply("trading 2% higher").change_percent.as_deref(),
        Some("2")
    );
}

#[test]
fn test_qualifier_words_between_verb_and_magnitude() {
    assert_eq!(
        apply("the Dow lost nearly 300 points").change_points.as_deref(),
        Some("-300")
    );
    assert_eq!(
        apply("up about 0.8 percent").change_percent.as_deref(),
        Some("0.8")
    );
}

#[test]
fn test_intraday_range() {
    let matches = apply("off its session high of 4250 after a session low of 4190");
    assert_eq!(matches.intraday_high.as_deref(), Some("4250"));
    assert_eq!(matches.intraday_low.as_deref(), Some("4190"));
}

#[test]
fn test_session_keywords() {
    assert_eq!(
        apply("stocks opened higher").session_context.as_deref(),
        Some("opening")
    );
    assert_eq!(
        apply("little changed at midday").session_context.as_deref(),
        Some("midday")
    );
    // Compound phrases outrank the bare closing/opening words
    assert_eq!(
        apply("moving after the close").session_context.as_deref(),
        Some("afterhours")
    );
    assert_eq!(
        apply("futures fell before the open").session_context.as_deref(),
        Some("premarket")
    );
}

#[test]
fn test_direction_priority_and_flat() {
    assert_eq!(
        apply("the VIX was flat on the day").market_direction.as_deref(),
        Some("flat")
    );
    assert!(apply("markets were quiet").market_direction.is_none());
}

#[test]
fn test_empty_transcript_yields_all_none() {
    assert_eq!(apply(""), RuleMatches::default());
}

#[tokio::test]
async fn test_strategy_contract() {
    let extractor = RuleExtractor;
    assert_eq!(extractor.method(), ExtractionMethod::Regex);

    let raw = extractor.extract("Dow down 10 points").await.unwrap();
    match raw {
        RawExtraction::Rules(matches) => {
            assert_eq!(matches.change_points.as_deref(), Some("-10"));
        }
        RawExtraction::Llm(_) => panic!("rule extractor must emit rule matches"),
    }
}
