/*!
 * End-to-end tests for document translation through the pipeline.
 *
 * Every test writes a real `.docx` to a temporary directory, runs the
 * pipeline against mock providers and inspects the saved document.
 */

use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use docxlate::errors::{DocumentError, PipelineError};
use docxlate::pipeline::PipelineProgress;
use docxlate::providers::mock::MockProvider;
use docxlate::translation::{AttemptState, QualityAssessor, RetryPolicy, Scheduler, SchedulerLimits, SegmentTranslator};

use crate::common;

async fn collect_progress(
    run: docxlate::PipelineRun,
) -> (Vec<PipelineProgress>, Option<PipelineError>) {
    let mut progress = Vec::new();
    let mut failure = None;
    let items: Vec<_> = run.collect().await;
    for item in items {
        match item {
            Ok(p) => progress.push(p),
            Err(e) => failure = Some(e),
        }
    }
    (progress, failure)
}

/// A numbered paragraph keeps its marker and only the core text is sent out
#[tokio::test]
async fn test_translate_document_withNumberedParagraph_shouldKeepPrefix() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_docx(temp_dir.path(), "quiz.docx", &["(3) The cat sat.", "Plain text here"])?;
    let dest = temp_dir.path().join("quiz_es_enhanced.docx");

    let translator = Arc::new(MockProvider::custom(|req| {
        Ok(match req.user.as_str() {
            "The cat sat." => "El gato se sentó.".to_string(),
            other => format!("ES {}", other),
        })
    }));
    let pipeline = common::mock_pipeline(
        translator.clone(),
        Arc::new(MockProvider::fixed("36")),
        common::fast_policy(3),
        2,
    );

    let run = pipeline.translate_document(&source, &dest, "Spanish", &[]);
    let (progress, failure) = collect_progress(run).await;

    assert!(failure.is_none());
    assert_eq!(progress.len(), 2);
    assert_eq!(
        common::read_paragraphs(&dest),
        vec!["(3) El gato se sentó.", "ES Plain text here"]
    );

    let mut sent = common::translation_requests(&translator);
    sent.sort();
    assert_eq!(sent, vec!["Plain text here", "The cat sat."]);
    Ok(())
}

/// Paragraphs with nothing translatable produce no events and are saved untouched
#[tokio::test]
async fn test_translate_document_withNoSegments_shouldSaveUnchanged() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_docx(temp_dir.path(), "numbers.docx", &["1.", "2024", "   ", "(a) 42"])?;
    let dest = temp_dir.path().join("numbers_out.docx");

    let (pipeline, translator) = common::spanish_pipeline();
    let run = pipeline.translate_document(&source, &dest, "es", &[]);
    let (progress, failure) = collect_progress(run).await;

    assert!(progress.is_empty());
    assert!(failure.is_none());
    assert_eq!(translator.request_count(), 0);
    assert_eq!(common::read_paragraphs(&dest), common::read_paragraphs(&source));
    Ok(())
}

/// Identical core texts are translated once and written back everywhere
#[tokio::test]
async fn test_translate_document_withRepeatedText_shouldSubmitEachCoreOnce() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_docx(
        temp_dir.path(),
        "repeat.docx",
        &["Hello world", "1. Hello world", "Goodbye", "Hello world", "b) Goodbye"],
    )?;
    let dest = temp_dir.path().join("repeat_out.docx");

    let (pipeline, translator) = common::spanish_pipeline();
    let run = pipeline.translate_document(&source, &dest, "Spanish", &[]);
    let (progress, failure) = collect_progress(run).await;

    assert!(failure.is_none());
    assert_eq!(progress.last().map(|p| p.total), Some(3));

    let mut sent = common::translation_requests(&translator);
    sent.sort();
    assert_eq!(sent, vec!["Goodbye", "Hello world", "b) Goodbye"]);

    assert_eq!(
        common::read_paragraphs(&dest),
        vec!["ES Hello world", "1. ES Hello world", "ES Goodbye", "ES Hello world", "ES b) Goodbye"]
    );
    Ok(())
}

/// When every attempt fails the original text is kept with a score of zero
#[tokio::test(start_paused = true)]
async fn test_translate_document_withFailingProvider_shouldFallBackToOriginal() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_docx(temp_dir.path(), "fail.docx", &["Keep me as I am."])?;
    let dest = temp_dir.path().join("fail_out.docx");

    let translator = Arc::new(MockProvider::failing());
    let pipeline = common::mock_pipeline(
        translator.clone(),
        Arc::new(MockProvider::fixed("40")),
        RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        },
        1,
    );

    let run = pipeline.translate_document(&source, &dest, "French", &[]);
    let (progress, failure) = collect_progress(run).await;

    assert!(failure.is_none());
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].average_quality, 0.0);
    assert_eq!(translator.request_count(), 3);
    assert_eq!(common::read_paragraphs(&dest), vec!["Keep me as I am."]);
    Ok(())
}

/// Progress counts up by one per segment and finishes at 100%
#[tokio::test]
async fn test_translate_document_withManySegments_shouldReportMonotonicProgress() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let paragraphs = ["Alpha one", "Beta two", "Gamma three", "Delta four", "Epsilon five"];
    let source = common::create_test_docx(temp_dir.path(), "many.docx", &paragraphs)?;
    let dest = temp_dir.path().join("many_out.docx");

    let translator = Arc::new(
        MockProvider::custom(|req| Ok(format!("ES {}", req.user)))
            .with_delay_by(|req| (req.user.len() as u64 % 3) * 5),
    );
    let pipeline = common::mock_pipeline(
        translator,
        Arc::new(MockProvider::fixed("32")),
        common::fast_policy(2),
        3,
    );

    let run = pipeline.translate_document(&source, &dest, "Spanish", &[]);
    let (progress, failure) = collect_progress(run).await;

    assert!(failure.is_none());
    assert_eq!(progress.len(), paragraphs.len());
    for (i, p) in progress.iter().enumerate() {
        assert_eq!(p.completed, i + 1);
        assert_eq!(p.total, paragraphs.len());
        assert!(p.percent > 0.0 && p.percent <= 100.0);
        assert_eq!(p.average_quality, 32.0);
    }
    assert!(progress.windows(2).all(|w| w[0].percent < w[1].percent));
    assert_eq!(progress.last().map(|p| p.percent), Some(100.0));
    assert!(dest.exists());
    Ok(())
}

/// Cancelling mid-run ends the stream with `Cancelled` and writes nothing
#[tokio::test]
async fn test_translate_document_whenCancelled_shouldLeaveDestinationUnwritten() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_docx(temp_dir.path(), "slow.docx", &["This takes forever"])?;
    let dest = temp_dir.path().join("slow_out.docx");

    let translator = Arc::new(MockProvider::working().with_delay(3_600_000));
    let pipeline = common::mock_pipeline(translator, Arc::new(MockProvider::fixed("35")), common::fast_policy(1), 1);

    let mut run = pipeline.translate_document(&source, &dest, "German", &[]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    run.cancel();

    let mut items = Vec::new();
    while let Some(item) = run.next().await {
        items.push(item);
    }

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(PipelineError::Cancelled)));
    assert!(!dest.exists());
    Ok(())
}

/// A corrupt source fails the run with a document error
#[tokio::test]
async fn test_translate_document_withCorruptSource_shouldFailWithDocumentError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_file(temp_dir.path(), "broken.docx", "not a zip archive")?;
    let dest = temp_dir.path().join("broken_out.docx");

    let (pipeline, _) = common::spanish_pipeline();
    let run = pipeline.translate_document(&source, &dest, "Spanish", &[]);
    let (progress, failure) = collect_progress(run).await;

    assert!(progress.is_empty());
    assert!(matches!(failure, Some(PipelineError::Document(DocumentError::Archive(_)))));
    assert!(!dest.exists());
    Ok(())
}

/// Retain terms reach the model as placeholders and come back verbatim
#[tokio::test]
async fn test_translate_document_withRetainTerms_shouldProtectThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_docx(temp_dir.path(), "terms.docx", &["Install Acme Widget today"])?;
    let dest = temp_dir.path().join("terms_out.docx");

    let translator = Arc::new(MockProvider::custom(|req| {
        Ok(req.user.replace("Install", "Instala").replace("today", "hoy"))
    }));
    let pipeline = common::mock_pipeline(
        translator.clone(),
        Arc::new(MockProvider::fixed("35")),
        common::fast_policy(3),
        1,
    );

    let terms = vec!["Acme Widget".to_string()];
    let run = pipeline.translate_document(&source, &dest, "Spanish", &terms);
    let (_, failure) = collect_progress(run).await;

    assert!(failure.is_none());
    assert_eq!(common::translation_requests(&translator), vec!["Install <<UT0>> today"]);
    assert_eq!(common::read_paragraphs(&dest), vec!["Instala Acme Widget hoy"]);
    Ok(())
}

/// A first answer at the threshold is accepted without any backoff
#[tokio::test(start_paused = true)]
async fn test_scheduler_withGoodFirstAnswer_shouldNotWait() {
    let translator = Arc::new(MockProvider::working());
    let assessor = QualityAssessor::new(Arc::new(MockProvider::fixed("30")));
    let scheduler = Scheduler::new(
        Arc::new(SegmentTranslator::new(translator.clone(), assessor)),
        SchedulerLimits {
            max_concurrent: 2,
            requests_per_minute: None,
        },
    );

    let start = tokio::time::Instant::now();
    let events: Vec<_> = scheduler
        .run(vec!["One".to_string(), "Two".to_string()], "French", &[])
        .collect()
        .await;

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.outcome.attempts == 1 && e.outcome.state == AttemptState::Accepted));
    assert_eq!(translator.request_count(), 2);
}

/// A low score waits out the base backoff before the retry
#[tokio::test(start_paused = true)]
async fn test_scheduler_withLowFirstScore_shouldBackOffOnce() {
    let translator = Arc::new(MockProvider::working());
    let scorer = Arc::new(MockProvider::scripted(vec![Ok("12".to_string()), Ok("34".to_string())]));
    let policy = RetryPolicy {
        max_jitter: Duration::ZERO,
        ..RetryPolicy::default()
    };
    let scheduler = Scheduler::new(
        Arc::new(SegmentTranslator::new(translator.clone(), QualityAssessor::new(scorer)).with_policy(policy)),
        SchedulerLimits {
            max_concurrent: 1,
            requests_per_minute: None,
        },
    );

    let start = tokio::time::Instant::now();
    let events: Vec<_> = scheduler.run(vec!["Retry me".to_string()], "French", &[]).collect().await;

    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(1000) && waited < Duration::from_millis(1100));
    assert_eq!(events[0].outcome.attempts, 2);
    assert_eq!(events[0].outcome.score, 34);
    assert_eq!(events[0].average_quality, 34.0);
}
