/*!
 * End-to-end document translation.
 *
 * `TranslationPipeline::translate_document` opens a `.docx`, extracts the distinct
 * segments, runs them through the scheduler and, once every segment is back,
 * rewrites the paragraphs and saves the result. The run is exposed as a stream
 * of progress items that ends only after the destination file is written.
 */

use anyhow::{Context, Result};
use futures::channel::mpsc;
use futures::stream::{Stream, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll, ready};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app_config::Config;
use crate::document::{DocxDocument, Segmenter};
use crate::errors::{DocumentError, PipelineError};
use crate::language_utils::resolve_language_name;
use crate::masking::{ProviderEntityDetector, SpanExtractor};
use crate::providers;
use crate::translation::{QualityAssessor, RetryPolicy, Scheduler, SchedulerLimits, SegmentTranslator};

/// Progress of a running pipeline, emitted once per finished segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineProgress {
    /// Distinct segments finished so far
    pub completed: usize,
    /// Distinct segments in the document
    pub total: usize,
    /// `completed / total` in 0..=100
    pub percent: f64,
    /// Mean quality score of the finished segments, 0..=40
    pub average_quality: f64,
}

/// Requests cancellation of a running pipeline
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                sender: Arc::new(sender),
            },
            receiver,
        )
    }

    /// Stop the run; the destination file is not written
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Live, non-restartable stream of a pipeline run
///
/// Yields `Ok(progress)` per finished segment. A fatal error or a cancellation
/// is yielded as a single terminal `Err`. `None` means the document was saved.
pub struct PipelineRun {
    receiver: mpsc::UnboundedReceiver<Result<PipelineProgress, PipelineError>>,
    cancel: CancelHandle,
    handle: Option<JoinHandle<()>>,
}

impl PipelineRun {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle that can cancel this run from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl std::fmt::Debug for PipelineRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRun")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl Stream for PipelineRun {
    type Item = Result<PipelineProgress, PipelineError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(item) = ready!(this.receiver.poll_next_unpin(cx)) {
            return Poll::Ready(Some(item));
        }

        // Channel closed: the task is done; surface a panic instead of a silent end
        if let Some(handle) = this.handle.as_mut() {
            let joined = ready!(Pin::new(handle).poll(cx));
            this.handle = None;
            if let Err(e) = joined {
                return Poll::Ready(Some(Err(PipelineError::Task(e.to_string()))));
            }
        }
        Poll::Ready(None)
    }
}

/// Document translation pipeline
#[derive(Debug, Clone)]
pub struct TranslationPipeline {
    translator: Arc<SegmentTranslator>,
    limits: SchedulerLimits,
    segmenter: Segmenter,
}

impl TranslationPipeline {
    pub fn new(translator: Arc<SegmentTranslator>, limits: SchedulerLimits, segmenter: Segmenter) -> Self {
        Self {
            translator,
            limits,
            segmenter,
        }
    }

    /// Wire providers, assessor, masking and limits from the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let translation = &config.translation;
        let common = &translation.common;
        let provider = providers::from_config(translation);

        let assessor = QualityAssessor::new(provider.clone())
            .with_model(translation.get_quality_model())
            .with_max_tokens(common.quality_max_tokens)
            .with_fallback_score(common.fallback_quality_score);

        let extractor = if config.masking.detect_entities {
            let detector = ProviderEntityDetector::new(provider.clone()).with_model(translation.get_model());
            SpanExtractor::with_detector(Arc::new(detector), config.masking.entity_labels.clone())
        } else {
            SpanExtractor::new()
        };

        let translator = SegmentTranslator::new(provider, assessor)
            .with_policy(RetryPolicy::from_config(common))
            .with_extractor(Arc::new(extractor))
            .with_model(translation.get_model());

        let segmenter = Segmenter::new(&config.segmentation.prefix_pattern)
            .with_context(|| format!("Invalid prefix pattern: {}", config.segmentation.prefix_pattern))?;

        Ok(Self::new(
            Arc::new(translator),
            SchedulerLimits::from_config(translation),
            segmenter,
        ))
    }

    pub fn limits(&self) -> SchedulerLimits {
        self.limits
    }

    /// Translate `source` into `dest`
    ///
    /// `target_language` may be an ISO code or a language name; prompts get the name.
    /// Must be called inside a tokio runtime; the work runs on a spawned task.
    pub fn translate_document(
        &self,
        source: &Path,
        dest: &Path,
        target_language: &str,
        retain_terms: &[String],
    ) -> PipelineRun {
        let (sender, receiver) = mpsc::unbounded();
        let (cancel, cancelled) = CancelHandle::new();

        let job = PipelineJob {
            pipeline: self.clone(),
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            target_language: resolve_language_name(target_language)
                .unwrap_or_else(|_| target_language.to_string()),
            retain_terms: retain_terms.to_vec(),
            sender,
        };
        let handle = tokio::spawn(job.run(cancelled));

        PipelineRun {
            receiver,
            cancel,
            handle: Some(handle),
        }
    }
}

struct PipelineJob {
    pipeline: TranslationPipeline,
    source: PathBuf,
    dest: PathBuf,
    target_language: String,
    retain_terms: Vec<String>,
    sender: mpsc::UnboundedSender<Result<PipelineProgress, PipelineError>>,
}

impl PipelineJob {
    async fn run(self, mut cancelled: watch::Receiver<bool>) {
        let translated = tokio::select! {
            biased;
            _ = wait_for_cancel(&mut cancelled) => Err(PipelineError::Cancelled),
            result = self.translate() => result,
        };

        // Past this point the run either saves completely or not at all
        let result = match translated {
            Ok(_) if *cancelled.borrow() => Err(PipelineError::Cancelled),
            Ok((doc, translations)) => self.save(doc, translations).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {}
            Err(PipelineError::Cancelled) => {
                info!("Translation of {:?} cancelled", self.source);
                let _ = self.sender.unbounded_send(Err(PipelineError::Cancelled));
            }
            Err(e) => {
                warn!("Translation of {:?} failed: {}", self.source, e);
                let _ = self.sender.unbounded_send(Err(e));
            }
        }
    }

    /// Load, segment and translate; returns the document and the segment translations
    async fn translate(&self) -> Result<(DocxDocument, HashMap<String, String>), PipelineError> {
        let source = self.source.clone();
        let doc = tokio::task::spawn_blocking(move || DocxDocument::open(&source))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;

        let segments = self.pipeline.segmenter.segment(&doc);
        info!("Found {} unique text segments in {:?}", segments.len(), self.source);

        let mut translations = HashMap::with_capacity(segments.len());
        if segments.is_empty() {
            return Ok((doc, translations));
        }

        info!("Translating to {} with quality control", self.target_language);
        let scheduler = Scheduler::new(self.pipeline.translator.clone(), self.pipeline.limits);
        let mut events = scheduler.run(segments.cores(), &self.target_language, &self.retain_terms);

        let mut average_quality = 0.0;
        while let Some(event) = events.next().await {
            average_quality = event.average_quality;
            let progress = PipelineProgress {
                completed: event.completed,
                total: event.total,
                percent: event.percent(),
                average_quality: event.average_quality,
            };
            translations.insert(event.segment, event.outcome.text);

            if self.sender.unbounded_send(Ok(progress)).is_err() {
                debug!("Progress receiver dropped, stopping");
                return Err(PipelineError::Cancelled);
            }
        }

        info!("Translation complete. Average quality: {:.1}/40", average_quality);
        Ok((doc, translations))
    }

    async fn save(&self, mut doc: DocxDocument, translations: HashMap<String, String>) -> Result<(), PipelineError> {
        let segmenter = self.pipeline.segmenter.clone();
        let dest = self.dest.clone();

        tokio::task::spawn_blocking(move || -> Result<(), DocumentError> {
            segmenter.reassemble(&mut doc, &translations)?;
            doc.save(&dest)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        info!("Translated document saved to {:?}", self.dest);
        Ok(())
    }
}

/// Resolves once cancellation is requested or every handle is gone
async fn wait_for_cancel(cancelled: &mut watch::Receiver<bool>) {
    while !*cancelled.borrow_and_update() {
        if cancelled.changed().await.is_err() {
            return;
        }
    }
}

/// Translate one document with the providers and limits of `config`
pub fn translate_document(
    config: &Config,
    source: &Path,
    dest: &Path,
    target_language: &str,
    retain_terms: &[String],
) -> Result<PipelineRun> {
    let pipeline = TranslationPipeline::from_config(config)?;
    Ok(pipeline.translate_document(source, dest, target_language, retain_terms))
}
