/*!
 * Translation quality scoring.
 *
 * The assessor asks a provider for a 0-40 score (four 0-10 criteria summed).
 * It never fails: transport errors and unreadable answers yield the fallback score.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::providers::{CompletionRequest, Provider};
use crate::translation::prompts::quality_prompt;

/// Highest score on the quality scale
pub const MAX_QUALITY_SCORE: u32 = 40;

/// First run of digits in a scoring answer
static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+").unwrap()
});

/// Pull the first integer out of a scoring answer and clamp it to 0..=40
pub fn parse_score(answer: &str) -> Option<u32> {
    let digits = FIRST_INTEGER.find(answer)?.as_str();
    // Digit runs too long for u64 are still far above the scale
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(value.min(MAX_QUALITY_SCORE as u64) as u32)
}

/// Scores candidate translations through a provider
#[derive(Debug, Clone)]
pub struct QualityAssessor {
    provider: Arc<dyn Provider>,
    model: Option<String>,
    max_tokens: u32,
    fallback_score: u32,
}

impl QualityAssessor {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            model: None,
            max_tokens: 10,
            fallback_score: 20,
        }
    }

    /// Score with a model other than the provider's default
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Score reported whenever assessment fails
    pub fn with_fallback_score(mut self, score: u32) -> Self {
        self.fallback_score = score.min(MAX_QUALITY_SCORE);
        self
    }

    pub fn fallback_score(&self) -> u32 {
        self.fallback_score
    }

    /// Score `translated` against `original`, in 0..=40
    pub async fn assess(&self, original: &str, translated: &str, target_language: &str) -> u32 {
        let mut request = CompletionRequest::new(quality_prompt(original, translated, target_language))
            .temperature(0.0)
            .max_tokens(self.max_tokens);
        if let Some(model) = &self.model {
            request = request.model(model.clone());
        }

        match self.provider.complete(request).await {
            Ok(response) => parse_score(response.text.trim()).unwrap_or_else(|| {
                debug!("Unreadable quality answer {:?}, using fallback score", response.text);
                self.fallback_score
            }),
            Err(e) => {
                debug!("Quality request failed ({}), using fallback score", e);
                self.fallback_score
            }
        }
    }
}
