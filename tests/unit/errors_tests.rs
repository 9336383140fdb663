/*!
 * Tests for error types and their conversions
 */

use std::path::PathBuf;

use docxlate::errors::{AppError, DocumentError, PipelineError, ProviderError};

/// Test that HTTP statuses map onto provider error variants
#[test]
fn test_from_status_withKnownStatuses_shouldPickVariant() {
    assert!(matches!(ProviderError::from_status(401, "bad key"), ProviderError::AuthenticationError(_)));
    assert!(matches!(ProviderError::from_status(403, "forbidden"), ProviderError::AuthenticationError(_)));
    assert!(matches!(ProviderError::from_status(429, "slow down"), ProviderError::RateLimitExceeded(_)));
    assert!(matches!(
        ProviderError::from_status(503, "unavailable"),
        ProviderError::ApiError { status_code: 503, .. }
    ));
}

/// Test that document errors surface through the pipeline and app errors
#[test]
fn test_document_error_conversions_shouldKeepMessage() {
    let document_error = DocumentError::MissingPart("word/document.xml".to_string());
    let pipeline_error = PipelineError::from(document_error);
    assert!(!pipeline_error.is_cancelled());
    assert_eq!(
        pipeline_error.to_string(),
        "Document error: Document is missing required part: word/document.xml"
    );

    let app_error = AppError::from(pipeline_error);
    assert!(app_error.to_string().starts_with("Pipeline error: "));
}

/// Test that open failures name the path
#[test]
fn test_open_error_display_shouldIncludePath() {
    let error = DocumentError::Open {
        path: PathBuf::from("/data/in.docx"),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
    };
    let message = error.to_string();
    assert!(message.contains("/data/in.docx"));
    assert!(message.contains("no such file"));
}

/// Test that cancellation is distinguishable from failures
#[test]
fn test_cancelled_shouldBeRecognized() {
    assert!(PipelineError::Cancelled.is_cancelled());
    assert!(!PipelineError::Task("panicked".to_string()).is_cancelled());
    assert_eq!(PipelineError::Cancelled.to_string(), "Translation cancelled");
}
