/*!
 * Tests for file utility functions
 */

use std::fs;
use std::path::Path;
use anyhow::Result;
use docxlate::file_utils::FileManager;
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "test_file_exists.tmp", "test content")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path()));
    Ok(())
}

/// Test that file_exists returns false for non-existent files
#[test]
fn test_file_exists_withNonExistentFile_shouldReturnFalse() {
    assert!(!FileManager::file_exists("non_existent_file.tmp"));
}

/// Test that dir_exists tells directories from files
#[test]
fn test_dir_exists_withExistingDir_shouldReturnTrue() {
    assert!(FileManager::dir_exists("."));
    assert!(!FileManager::dir_exists("./non_existent_directory_12345"));
}

/// Test that generate_output_path tags the language before the extension
#[test]
fn test_generate_output_path_withValidInputs_shouldCreateCorrectPath() {
    let output_path = FileManager::generate_output_path(
        Path::new("/tmp/input/Chapter 1.docx"),
        Path::new("/tmp/output"),
        "es",
    );

    assert_eq!(output_path, Path::new("/tmp/output/Chapter 1_es_enhanced.docx"));
    assert!(FileManager::is_translated_output(&output_path));
    assert!(!FileManager::is_translated_output("/tmp/input/Chapter 1.docx"));
}

/// Test that ensure_dir creates nested directories
#[test]
fn test_ensure_dir_withNestedPath_shouldCreateAll() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("a").join("b").join("c");

    FileManager::ensure_dir(&nested)?;
    assert!(nested.is_dir());

    // Existing directories are fine
    FileManager::ensure_dir(&nested)?;
    Ok(())
}

/// Test that find_documents only returns source documents
#[test]
fn test_find_documents_withMixedFiles_shouldSkipLockFilesAndOutputs() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    for name in ["b.docx", "a.DOCX", "~$a.docx", "a_de_enhanced.docx", "c.doc", "d.txt"] {
        common::create_test_file(dir, name, "x")?;
    }

    let found = FileManager::find_documents(dir)?;
    assert_eq!(found, vec![dir.join("a.DOCX"), dir.join("b.docx")]);

    let all_docx = FileManager::find_files(dir, ".docx")?;
    assert_eq!(all_docx.len(), 4);
    Ok(())
}

/// Test that retain terms can be read from a file
#[test]
fn test_read_retain_terms_withMixedSeparators_shouldSplitAll() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "terms.txt", "Acme Corp\nWidget, Gizmo\r\n\n")?;

    assert_eq!(FileManager::read_retain_terms(&path)?, vec!["Acme Corp", "Widget", "Gizmo"]);
    assert!(FileManager::read_retain_terms(temp_dir.path().join("missing.txt")).is_err());
    Ok(())
}

/// Test that log entries are appended with a timestamp
#[test]
fn test_append_to_log_file_withTwoEntries_shouldKeepBoth() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let log_path = temp_dir.path().join("logs").join("run.log");

    FileManager::append_to_log_file(&log_path, "first")?;
    FileManager::append_to_log_file(&log_path, "second")?;

    let content = fs::read_to_string(&log_path)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('[') && lines[0].ends_with("] first"));
    assert!(lines[1].ends_with("] second"));
    Ok(())
}
