/*!
 * Tests for span protection across extraction, masking and unmasking
 */

use std::sync::Arc;

use docxlate::masking::{
    EntityLabel, ProviderEntityDetector, SpanExtractor, SpanKind, find_user_term_spans, mask, unmask,
};
use docxlate::providers::mock::MockProvider;

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

/// Test that masked text restores exactly after a translation moves tokens
#[test]
fn test_mask_then_unmask_withReorderedTokens_shouldRestoreTerms() {
    let text = "Ask Acme Corp about the Widget Pro today";
    let spans = find_user_term_spans(text, &terms(&["widget pro", "Acme Corp"]));
    let masked = mask(text, &spans);

    assert_eq!(masked.text, "Ask <<UT0>> about the <<UT1>> today");
    assert_eq!(masked.token_map.get("<<UT1>>"), Some("Widget Pro"));

    let translated = "Pregunta hoy a <<UT0>> por el <<UT1>>";
    assert_eq!(unmask(translated, &masked.token_map), "Pregunta hoy a Acme Corp por el Widget Pro");
}

/// Test that detected entities join retain terms with their own numbering
#[tokio::test]
async fn test_extract_withDetector_shouldAddAllowedEntities() {
    let detector = ProviderEntityDetector::new(Arc::new(MockProvider::fixed(
        r#"[{"text": "Marie Curie", "label": "PERSON"}, {"text": "Paris", "label": "GPE"}, {"text": "Acme", "label": "ORG"}]"#,
    )));
    let extractor = SpanExtractor::with_detector(Arc::new(detector), vec![EntityLabel::Person, EntityLabel::Org]);

    let text = "Marie Curie visited Paris for Acme";
    let spans = extractor.extract(text, &terms(&["Acme"])).await;

    let kinds: Vec<(&str, SpanKind)> = spans.iter().map(|s| (s.text.as_str(), s.kind)).collect();
    assert_eq!(
        kinds,
        vec![("Marie Curie", SpanKind::NamedEntity), ("Acme", SpanKind::UserTerm)]
    );

    let masked = mask(text, &spans);
    assert_eq!(masked.text, "<<NE0>> visited Paris for <<UT0>>");
}

/// Test that a failing detector leaves only the retain terms
#[tokio::test]
async fn test_extract_withFailingDetector_shouldKeepUserTerms() {
    let detector = ProviderEntityDetector::new(Arc::new(MockProvider::failing()));
    let extractor = SpanExtractor::with_detector(Arc::new(detector), EntityLabel::ALL.to_vec());

    let spans = extractor.extract("Call Bob at Acme", &terms(&["Acme"])).await;
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, "Acme");
    assert_eq!(spans[0].kind, SpanKind::UserTerm);
}

/// Test that empty input yields no spans at all
#[test]
fn test_extract_withEmptyText_shouldReturnNothing() {
    let extractor = SpanExtractor::new();
    let spans = tokio_test::block_on(extractor.extract("", &terms(&["Acme"])));
    assert!(spans.is_empty());
}
