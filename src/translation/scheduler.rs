/*!
 * Concurrent segment scheduling.
 *
 * Runs the segment translator over many segments at once. A semaphore is the
 * only admission gate: every segment future is polled, but at most
 * `max_concurrent` hold a permit. Each segment keeps its permit for a short
 * pause after finishing so the aggregate request rate stays under the provider's
 * requests-per-minute limit. Progress comes out in completion order.
 */

use futures::stream::{self, BoxStream, StreamExt};
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::app_config::TranslationConfig;
use crate::translation::segment::{SegmentOutcome, SegmentTranslator};

/// Admission and throttling limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerLimits {
    /// Segments translated at the same time
    pub max_concurrent: usize,
    /// Requests per minute; `None` disables the post-segment pause
    pub requests_per_minute: Option<u32>,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            requests_per_minute: Some(950),
        }
    }
}

impl SchedulerLimits {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_concurrent: config.get_concurrent_requests(),
            requests_per_minute: config.get_rate_limit(),
        }
    }

    /// Pause taken inside the admission gate after every segment
    pub fn post_delay(&self) -> Duration {
        match self.requests_per_minute {
            Some(rpm) if rpm > 0 => Duration::from_secs_f64(60.0 / rpm as f64),
            _ => Duration::ZERO,
        }
    }
}

/// One completed segment
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Segments finished so far, this one included
    pub completed: usize,
    /// Segments submitted
    pub total: usize,
    /// Mean score of every finished segment
    pub average_quality: f64,
    /// Source text of the segment
    pub segment: String,
    /// Outcome of the segment
    pub outcome: SegmentOutcome,
}

impl ProgressEvent {
    /// Completion in 0..=1
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    /// Completion in 0..=100
    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }
}

/// Running totals folded over completed segments
#[derive(Debug, Default)]
struct Tally {
    completed: usize,
    score_sum: u64,
}

/// Fans segment translations out under `SchedulerLimits`
#[derive(Debug, Clone)]
pub struct Scheduler {
    translator: Arc<SegmentTranslator>,
    limits: SchedulerLimits,
}

impl Scheduler {
    pub fn new(translator: Arc<SegmentTranslator>, limits: SchedulerLimits) -> Self {
        Self { translator, limits }
    }

    pub fn limits(&self) -> SchedulerLimits {
        self.limits
    }

    /// Translate every segment, yielding one event per segment as it finishes
    ///
    /// The stream is lazy: nothing is sent until it is polled, and dropping it
    /// abandons every unfinished segment.
    pub fn run(
        &self,
        segments: Vec<String>,
        target_language: &str,
        retain_terms: &[String],
    ) -> BoxStream<'static, ProgressEvent> {
        let total = segments.len();
        if total == 0 {
            return stream::empty().boxed();
        }

        let max_concurrent = self.limits.max_concurrent.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let post_delay = self.limits.post_delay();
        let target_language: Arc<str> = Arc::from(target_language);
        let retain_terms: Arc<[String]> = Arc::from(retain_terms);
        let translator = self.translator.clone();

        debug!(
            "Scheduling {} segments, {} at a time, {:?} pause",
            total, max_concurrent, post_delay
        );

        stream::iter(segments)
            .map(move |segment| {
                let semaphore = semaphore.clone();
                let translator = translator.clone();
                let target_language = target_language.clone();
                let retain_terms = retain_terms.clone();

                async move {
                    // Acquire a permit; the semaphore is never closed
                    let _permit = semaphore.acquire().await.ok();

                    let outcome = translator.translate(&segment, &target_language, &retain_terms).await;

                    if !post_delay.is_zero() {
                        tokio::time::sleep(post_delay).await;
                    }

                    (segment, outcome)
                }
            })
            // Waiting segments park on the semaphore, which admits them in order
            .buffer_unordered(total)
            .scan(Tally::default(), move |tally, (segment, outcome)| {
                tally.completed += 1;
                tally.score_sum += outcome.score as u64;
                let event = ProgressEvent {
                    completed: tally.completed,
                    total,
                    average_quality: tally.score_sum as f64 / tally.completed as f64,
                    segment,
                    outcome,
                };
                futures::future::ready(Some(event))
            })
            .boxed()
    }
}
