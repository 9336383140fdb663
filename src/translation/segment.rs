/*!
 * Quality-gated translation of a single segment.
 *
 * Each segment moves through an explicit retry state machine:
 *
 * ```text
 * Attempting(0) -> Attempting(1) -> ... -> Attempting(max - 1)
 *        \               \                        \
 *         +--> Accepted   +--> Accepted            +--> Accepted | Exhausted
 * ```
 *
 * An attempt masks the protected spans, asks the provider for a translation,
 * restores the spans and scores the result. Provider failures and empty answers
 * count as failed attempts. Nothing escapes this module as an error: the worst
 * outcome is the original text with a score of zero.
 */

use log::{debug, warn};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::TranslationCommonConfig;
use crate::masking::{SpanExtractor, mask, unmask};
use crate::providers::{CompletionRequest, Provider};
use crate::translation::prompts::TranslationPromptBuilder;
use crate::translation::quality::QualityAssessor;

/// Retry loop settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per segment, including the first
    pub max_attempts: u32,
    /// Score at or above which a translation is accepted
    pub quality_threshold: u32,
    /// Backoff before the second attempt; doubles for each later one
    pub base_backoff: Duration,
    /// Upper bound of the random jitter added to every backoff
    pub max_jitter: Duration,
    /// Temperature of the first attempt
    pub temperature: f32,
    /// Temperature of every later attempt
    pub retry_temperature: f32,
    /// Token budget of a translation answer
    pub max_tokens: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TranslationCommonConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TranslationCommonConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            quality_threshold: config.quality_threshold,
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_jitter: Duration::from_millis(config.retry_jitter_ms),
            temperature: config.temperature,
            retry_temperature: config.retry_temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Temperature for the zero-based `attempt`
    pub fn temperature_for(&self, attempt: u32) -> f32 {
        if attempt == 0 { self.temperature } else { self.retry_temperature }
    }

    /// Deterministic part of the wait after the failed zero-based `attempt`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Full wait after the failed zero-based `attempt`, jitter included
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        self.base_delay(attempt) + jitter
    }
}

/// What one attempt produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    /// A non-empty translation with its quality score
    Scored(u32),
    /// The restored translation was empty
    Empty,
    /// The translation request failed
    Failed,
}

/// Retry state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// About to run the zero-based attempt `n`
    Attempting(u32),
    /// A translation met the quality threshold
    Accepted,
    /// Attempts ran out; the last attempt decides the output
    Exhausted,
}

impl AttemptState {
    /// State following `result` of the current attempt
    pub fn advance(self, result: AttemptResult, policy: &RetryPolicy) -> AttemptState {
        let AttemptState::Attempting(n) = self else {
            return self;
        };
        let last = n + 1 >= policy.max_attempts;

        match result {
            AttemptResult::Scored(score) if score >= policy.quality_threshold => AttemptState::Accepted,
            _ if last => AttemptState::Exhausted,
            _ => AttemptState::Attempting(n + 1),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptState::Attempting(_))
    }
}

/// Final result of translating one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOutcome {
    /// Translation, or the original text when every attempt failed
    pub text: String,
    /// Quality score in 0..=40; zero for the original-text fallback
    pub score: u32,
    /// Attempts actually made
    pub attempts: u32,
    /// Terminal state: `Accepted` or `Exhausted`
    pub state: AttemptState,
    /// The original text was returned because the last attempt produced nothing
    pub fell_back: bool,
}

/// Drives one segment through translate, assess, accept or retry
#[derive(Debug, Clone)]
pub struct SegmentTranslator {
    provider: Arc<dyn Provider>,
    assessor: QualityAssessor,
    extractor: Arc<SpanExtractor>,
    policy: RetryPolicy,
    model: Option<String>,
}

impl SegmentTranslator {
    pub fn new(provider: Arc<dyn Provider>, assessor: QualityAssessor) -> Self {
        Self {
            provider,
            assessor,
            extractor: Arc::new(SpanExtractor::new()),
            policy: RetryPolicy::default(),
            model: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<SpanExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Translate with a model other than the provider's default
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Translate `text`; never fails
    pub async fn translate(&self, text: &str, target_language: &str, retain_terms: &[String]) -> SegmentOutcome {
        let spans = self.extractor.extract(text, retain_terms).await;

        let mut state = AttemptState::Attempting(0);
        let mut attempts = 0;
        let mut candidate = None;

        while let AttemptState::Attempting(attempt) = state {
            attempts = attempt + 1;
            let masked = mask(text, &spans);
            let system = TranslationPromptBuilder::new(target_language)
                .with_retain_terms(retain_terms)
                .with_attempt(attempt)
                .build();

            let mut request = CompletionRequest::new(masked.text)
                .system(system)
                .temperature(self.policy.temperature_for(attempt))
                .max_tokens(self.policy.max_tokens);
            if let Some(model) = &self.model {
                request = request.model(model.clone());
            }

            let result = match self.provider.complete(request).await {
                Ok(response) => {
                    let restored = unmask(response.text.trim(), &masked.token_map);
                    if restored.is_empty() {
                        debug!("Attempt {} returned an empty translation", attempts);
                        AttemptResult::Empty
                    } else {
                        let score = self.assessor.assess(text, &restored, target_language).await;
                        candidate = Some((restored, score));
                        AttemptResult::Scored(score)
                    }
                }
                Err(e) => {
                    warn!("Translation attempt {} failed: {}", attempts, e);
                    AttemptResult::Failed
                }
            };

            state = state.advance(result, &self.policy);

            match (state, result) {
                (AttemptState::Attempting(_), AttemptResult::Scored(score)) => {
                    warn!(
                        "Quality score {} below threshold {}, retrying",
                        score, self.policy.quality_threshold
                    );
                }
                (AttemptState::Exhausted, AttemptResult::Empty | AttemptResult::Failed) => {
                    // The final attempt decides; an earlier scored candidate is not reused
                    candidate = None;
                }
                _ => {}
            }

            if let AttemptState::Attempting(_) = state {
                tokio::time::sleep(self.policy.backoff_delay(attempt)).await;
            }
        }

        let fell_back = candidate.is_none();
        let (text, score) = candidate.unwrap_or_else(|| (text.to_string(), 0));
        SegmentOutcome {
            text,
            score,
            attempts,
            state,
            fell_back,
        }
    }
}
