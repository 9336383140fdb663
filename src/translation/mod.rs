/*!
 * Segment translation through AI providers.
 *
 * This module contains the quality-controlled translation core. It is split
 * into several submodules:
 *
 * - `prompts`: System prompt and scoring prompt templates
 * - `quality`: Quality assessment of candidate translations
 * - `segment`: Per-segment retry state machine
 * - `scheduler`: Bounded-concurrency, rate-limited fan-out with progress events
 */

pub use self::prompts::TranslationPromptBuilder;
pub use self::quality::{MAX_QUALITY_SCORE, QualityAssessor, parse_score};
pub use self::scheduler::{ProgressEvent, Scheduler, SchedulerLimits};
pub use self::segment::{AttemptResult, AttemptState, RetryPolicy, SegmentOutcome, SegmentTranslator};

pub mod prompts;
pub mod quality;
pub mod scheduler;
pub mod segment;
