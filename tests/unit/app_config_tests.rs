/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use std::time::Duration;

use docxlate::app_config::{Config, LogLevel, TranslationProvider};
use docxlate::masking::EntityLabel;
use docxlate::translation::{RetryPolicy, SchedulerLimits};
use crate::common;

fn local_config() -> Config {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Ollama;
    config
}

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.target_language, "fr");
    assert_eq!(config.translation.provider, TranslationProvider::OpenAI);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.segmentation.prefix_pattern.starts_with('^'));

    let ollama = config
        .translation
        .get_provider_config(&TranslationProvider::Ollama)
        .expect("Ollama provider config should exist");
    assert_eq!(ollama.model, "llama3.2:3b");
    assert_eq!(ollama.rate_limit, None);
}

/// Test configuration validation of the retry settings
#[test]
fn test_config_validation_withOutOfRangeRetrySettings_shouldFail() {
    let mut config = local_config();
    assert!(config.validate().is_ok());

    config.translation.common.quality_threshold = 41;
    assert!(config.validate().is_err());
    config.translation.common.quality_threshold = 40;
    assert!(config.validate().is_ok());

    config.translation.common.max_retries = 0;
    assert!(config.validate().is_err());
}

/// Test that a local provider needs no API key
#[test]
fn test_config_validation_withOllamaAndNoKey_shouldPass() {
    let mut config = local_config();
    config.target_language = "es".to_string();
    assert_eq!(config.translation.get_api_key(), "");
    assert!(config.validate().is_ok());
}

/// Test that a hosted provider with a configured key passes
#[test]
fn test_config_validation_withAnthropicKey_shouldPass() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Anthropic;
    config.translation.active_provider_config_mut().api_key = "sk-ant-test".to_string();

    assert!(config.validate().is_ok());
    assert_eq!(config.translation.get_model(), "claude-3-5-haiku-latest");
}

/// Test that a saved configuration loads back with its edits
#[test]
fn test_load_or_create_withEditedFile_shouldLoadEdits() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let mut config = local_config();
    config.target_language = "German".to_string();
    config.masking.detect_entities = true;
    config.masking.entity_labels = vec![EntityLabel::Person, EntityLabel::Org];
    config.translation.active_provider_config_mut().concurrent_requests = 3;
    std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;

    let loaded = Config::load_or_create(&path)?;
    assert_eq!(loaded.target_language, "German");
    assert_eq!(loaded.translation.provider, TranslationProvider::Ollama);
    assert_eq!(loaded.translation.get_concurrent_requests(), 3);
    assert!(loaded.masking.detect_entities);
    assert_eq!(loaded.masking.entity_labels, vec![EntityLabel::Person, EntityLabel::Org]);
    Ok(())
}

/// Test that a malformed file is reported instead of replaced
#[test]
fn test_load_or_create_withMalformedFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    assert_eq!(std::fs::read_to_string(&path)?, "{ not json");
    Ok(())
}

/// Test that retry and scheduling settings are derived from the config
#[test]
fn test_runtime_settings_fromConfig_shouldMirrorValues() {
    let mut config = Config::default();
    config.translation.common.retry_backoff_ms = 250;
    config.translation.common.retry_jitter_ms = 0;
    config.translation.active_provider_config_mut().rate_limit = Some(120);

    let policy = RetryPolicy::from_config(&config.translation.common);
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.quality_threshold, 30);
    assert_eq!(policy.base_delay(2), Duration::from_millis(1000));
    assert_eq!(policy.backoff_delay(0), Duration::from_millis(250));

    let limits = SchedulerLimits::from_config(&config.translation);
    assert_eq!(limits.max_concurrent, 10);
    assert_eq!(limits.post_delay(), Duration::from_millis(500));
}
