/*!
 * Tests for language utility functions
 */

use docxlate::language_utils::{
    get_language_name, is_language_code, language_codes_match, normalize_to_part2t, resolve_language_name,
};

/// Test normalization of language codes to ISO 639-2/T format
#[test]
fn test_normalize_to_part2t_withValidCodes_shouldNormalizeCorrectly() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("fr").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("fra").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");

    // Case insensitivity and whitespace
    assert_eq!(normalize_to_part2t(" EN ").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("FRE").unwrap(), "fra");
}

/// Test that invalid codes are rejected
#[test]
fn test_normalize_to_part2t_withInvalidCodes_shouldFail() {
    assert!(normalize_to_part2t("xx").is_err());
    assert!(normalize_to_part2t("e").is_err());
    assert!(normalize_to_part2t("Spanish").is_err());
    assert!(!is_language_code("123"));
    assert!(is_language_code("es"));
}

/// Test language name lookup
#[test]
fn test_get_language_name_withValidCodes_shouldReturnEnglishName() {
    assert_eq!(get_language_name("es").unwrap(), "Spanish");
    assert_eq!(get_language_name("deu").unwrap(), "German");
    assert!(get_language_name("zz").is_err());
}

/// Test that target languages resolve to the name used in prompts
#[test]
fn test_resolve_language_name_withCodesAndNames_shouldReturnName() {
    assert_eq!(resolve_language_name("fr").unwrap(), "French");
    assert_eq!(resolve_language_name("  Brazilian Portuguese ").unwrap(), "Brazilian Portuguese");
    assert!(resolve_language_name("   ").is_err());
}

/// Test matching across code families
#[test]
fn test_language_codes_match_withEquivalentCodes_shouldMatch() {
    assert!(language_codes_match("fr", "fre"));
    assert!(language_codes_match("de", "deu"));
    assert!(!language_codes_match("fr", "de"));
    assert!(!language_codes_match("fr", "French"));
}
