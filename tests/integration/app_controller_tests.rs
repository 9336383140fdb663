/*!
 * Controller tests for single-file and folder runs
 */

use anyhow::Result;
use std::fs;

use docxlate::app_config::Config;
use docxlate::app_controller::{Controller, FileOutcome};

use crate::common;

fn controller() -> Controller {
    let (pipeline, _) = common::spanish_pipeline();
    Controller::with_pipeline(Config::default(), pipeline)
}

/// Without an output argument the translation lands next to the input
#[tokio::test]
async fn test_run_withDefaultOutput_shouldWriteNextToInput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_docx(temp_dir.path(), "lesson.docx", &["a. Read the text", "Answer below"])?;
    let controller = controller();
    assert!(controller.is_initialized());

    let outcome = controller.run(input.clone(), None, &[], false).await?;
    let expected = temp_dir.path().join("lesson_fr_enhanced.docx");
    assert_eq!(
        outcome,
        FileOutcome::Translated {
            output: expected.clone(),
            average_quality: 35.0,
            segments: 2,
        }
    );
    assert_eq!(
        common::read_paragraphs(&expected),
        vec!["a. ES Read the text", "ES Answer below"]
    );

    // A second run leaves the existing translation alone unless forced
    let again = controller.run(input.clone(), None, &[], false).await?;
    assert_eq!(again, FileOutcome::Skipped(expected.clone()));
    let forced = controller.run(input, None, &[], true).await?;
    assert!(matches!(forced, FileOutcome::Translated { .. }));
    Ok(())
}

/// An existing directory as output receives the generated file name
#[tokio::test]
async fn test_run_withOutputDirectory_shouldUseGeneratedName() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_docx(temp_dir.path(), "memo.docx", &["Hello team"])?;
    let out_dir = temp_dir.path().join("out");
    fs::create_dir_all(&out_dir)?;

    let outcome = controller().run(input, Some(out_dir.clone()), &[], false).await?;
    assert!(matches!(outcome, FileOutcome::Translated { ref output, .. } if *output == out_dir.join("memo_fr_enhanced.docx")));
    Ok(())
}

/// Unsupported inputs are rejected before any work starts
#[tokio::test]
async fn test_run_withNonDocxInput_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "notes.txt", "Hello")?;

    assert!(controller().run(input, None, &[], false).await.is_err());
    assert!(controller().run(temp_dir.path().join("missing.docx"), None, &[], false).await.is_err());
    Ok(())
}

/// The output may never replace its own input
#[tokio::test]
async fn test_run_withOutputEqualToInput_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_docx(temp_dir.path(), "self.docx", &["Hello"])?;

    assert!(controller().run(input.clone(), Some(input), &[], true).await.is_err());
    Ok(())
}

/// Folder mode translates every source and skips earlier outputs
#[tokio::test]
async fn test_run_folder_withNestedDocuments_shouldTranslateEach() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("unit2");
    fs::create_dir_all(&nested)?;
    common::create_test_docx(temp_dir.path(), "one.docx", &["First file"])?;
    common::create_test_docx(&nested, "two.docx", &["Second file"])?;
    common::create_test_docx(temp_dir.path(), "old_fr_enhanced.docx", &["Already done"])?;

    controller().run_folder(temp_dir.path().to_path_buf(), &[], false).await?;

    assert_eq!(
        common::read_paragraphs(&temp_dir.path().join("one_fr_enhanced.docx")),
        vec!["ES First file"]
    );
    assert_eq!(
        common::read_paragraphs(&nested.join("two_fr_enhanced.docx")),
        vec!["ES Second file"]
    );
    assert!(!temp_dir.path().join("old_fr_enhanced_fr_enhanced.docx").exists());

    let log = fs::read_to_string(temp_dir.path().join("docxlate.issues.log"))?;
    assert!(log.contains("2 processed, 0 skipped, 0 errors"));
    Ok(())
}

/// Folder mode refuses a directory without documents
#[tokio::test]
async fn test_run_folder_withoutDocuments_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "readme.txt", "nothing here")?;

    assert!(controller().run_folder(temp_dir.path().to_path_buf(), &[], false).await.is_err());
    Ok(())
}
