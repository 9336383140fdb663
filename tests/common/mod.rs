/*!
 * Common test utilities for the docxlate test suite
 *
 * Documents are built in memory with `zip` so the suite needs no binary
 * fixtures. Translation collaborators are `MockProvider`s from the library.
 */

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use docxlate::document::{DocxDocument, Segmenter};
use docxlate::pipeline::TranslationPipeline;
use docxlate::providers::mock::MockProvider;
use docxlate::translation::{QualityAssessor, RetryPolicy, SchedulerLimits, SegmentTranslator};

/// WordprocessingML namespace declaration
pub const W_NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

/// Route library logs to the test output; `RUST_LOG` picks the level
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// One bold run holding `text`
pub fn paragraph_xml(text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Normal"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        text
    )
}

/// `word/document.xml` with one paragraph per entry
pub fn document_xml(paragraphs: &[&str]) -> String {
    let body: String = paragraphs.iter().map(|p| paragraph_xml(p)).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {}><w:body>{}<w:sectPr/></w:body></w:document>"#,
        W_NS, body
    )
}

/// Zip the given parts into `.docx` bytes
pub fn docx_bytes(parts: &[(&str, String)]) -> Vec<u8> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        zout.start_file(*name, SimpleFileOptions::default()).unwrap();
        zout.write_all(body.as_bytes()).unwrap();
    }
    zout.finish().unwrap().into_inner()
}

/// A minimal document whose body holds `paragraphs`
pub fn simple_docx(paragraphs: &[&str]) -> Vec<u8> {
    docx_bytes(&[
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("word/document.xml", document_xml(paragraphs)),
    ])
}

/// Write a minimal document to `dir/filename`
pub fn create_test_docx(dir: &Path, filename: &str, paragraphs: &[&str]) -> Result<PathBuf> {
    let path = dir.join(filename);
    fs::write(&path, simple_docx(paragraphs))?;
    Ok(path)
}

/// Paragraph texts of a document on disk, in document order
pub fn read_paragraphs(path: &Path) -> Vec<String> {
    let doc = DocxDocument::open(path).unwrap();
    doc.paragraphs()
        .iter()
        .map(|p| doc.paragraph_text(p).unwrap_or_default())
        .collect()
}

/// Translation requests carry a system prompt; scoring requests do not
pub fn translation_requests(provider: &MockProvider) -> Vec<String> {
    provider
        .requests()
        .into_iter()
        .filter(|r| r.system.is_some())
        .map(|r| r.user)
        .collect()
}

/// Retry policy without waits, for tests that do not run on a paused clock
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_backoff: Duration::ZERO,
        max_jitter: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

/// Pipeline translating with `translator` and scoring with `scorer`
pub fn mock_pipeline(
    translator: Arc<MockProvider>,
    scorer: Arc<MockProvider>,
    policy: RetryPolicy,
    max_concurrent: usize,
) -> TranslationPipeline {
    let assessor = QualityAssessor::new(scorer);
    let segment_translator = SegmentTranslator::new(translator, assessor).with_policy(policy);
    TranslationPipeline::new(
        Arc::new(segment_translator),
        SchedulerLimits {
            max_concurrent,
            requests_per_minute: None,
        },
        Segmenter::default(),
    )
}

/// Pipeline that prefixes every segment with `ES ` and scores 35
pub fn spanish_pipeline() -> (TranslationPipeline, Arc<MockProvider>) {
    let translator = Arc::new(MockProvider::custom(|req| Ok(format!("ES {}", req.user))));
    let pipeline = mock_pipeline(translator.clone(), Arc::new(MockProvider::fixed("35")), fast_policy(3), 4);
    (pipeline, translator)
}
