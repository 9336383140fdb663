/*!
 * Tests for reading, segmenting and rewriting Word documents
 */

use anyhow::Result;
use std::collections::HashMap;
use std::io::Cursor;

use docxlate::document::{DocxDocument, DocxPackage, Segmenter};
use crate::common;

fn open(parts: &[(&str, String)]) -> DocxDocument {
    let package = DocxPackage::from_reader(Cursor::new(common::docx_bytes(parts))).unwrap();
    DocxDocument::from_package(package).unwrap()
}

fn texts(doc: &DocxDocument) -> Vec<String> {
    doc.paragraphs().iter().map(|p| doc.paragraph_text(p).unwrap()).collect()
}

/// Test that segments cover body, tables and headers and are deduplicated
#[test]
fn test_segment_withHeaderAndTable_shouldCollectDistinctCores() {
    let body = format!(
        r#"<w:document {ns}><w:body>{}{}<w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl></w:body></w:document>"#,
        common::paragraph_xml("1. Choose one"),
        common::paragraph_xml("42"),
        common::paragraph_xml("(b) Choose one"),
        ns = common::W_NS,
    );
    let header = format!(r#"<w:hdr {}>{}</w:hdr>"#, common::W_NS, common::paragraph_xml("Unit test"));
    let doc = open(&[("word/document.xml", body), ("word/header1.xml", header)]);

    let segments = Segmenter::default().segment(&doc);
    assert_eq!(segments.cores(), vec!["Choose one", "Unit test"]);

    let first = segments.get("Choose one").unwrap();
    assert_eq!(first.prefix, "1. ");
    assert_eq!(first.original, "1. Choose one");
}

/// Test that reassembly keeps paragraph properties and the basic run style
#[test]
fn test_reassemble_withTranslations_shouldKeepFormatting() -> Result<()> {
    let doc_xml = common::document_xml(&["a. First", "Second", "Untouched 1"]);
    let mut doc = open(&[("word/document.xml", doc_xml)]);

    let translations: HashMap<String, String> = [
        ("First".to_string(), "Premier".to_string()),
        ("Second".to_string(), "Deuxième\tpartie".to_string()),
    ]
    .into_iter()
    .collect();
    let rewritten = Segmenter::default().reassemble(&mut doc, &translations)?;

    assert_eq!(rewritten, 2);
    assert_eq!(texts(&doc), vec!["a. Premier", "Deuxième\tpartie", "Untouched 1"]);

    let saved = String::from_utf8(
        DocxPackage::from_reader(Cursor::new(doc.to_bytes()?))?
            .part("word/document.xml")
            .unwrap()
            .to_vec(),
    )?;
    assert_eq!(saved.matches(r#"<w:pStyle w:val="Normal"/>"#).count(), 3);
    assert_eq!(saved.matches("<w:b/>").count(), 3);
    assert!(saved.contains("<w:tab/>"));
    Ok(())
}

/// Test that a custom prefix pattern is honored
#[test]
fn test_segmenter_withCustomPattern_shouldSplitOnIt() -> Result<()> {
    let segmenter = Segmenter::new(r"Q\d+:\s*")?;

    assert_eq!(segmenter.split("Q12: What is this?"), ("Q12: ", "What is this?"));
    assert_eq!(segmenter.split("See Q12: later"), ("", "See Q12: later"));
    assert!(Segmenter::new("(").is_err());
    Ok(())
}

/// Test that saving writes a document that opens again with the edits
#[test]
fn test_save_withEditedParagraph_shouldRoundTripThroughDisk() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_docx(temp_dir.path(), "in.docx", &["Hello", "World"])?;
    let dest = temp_dir.path().join("out.docx");

    let mut doc = DocxDocument::open(&source)?;
    let first = doc.paragraphs()[0].clone();
    doc.set_paragraph_text(&first, "Hola")?;
    doc.save(&dest)?;

    assert_eq!(common::read_paragraphs(&dest), vec!["Hola", "World"]);
    assert_eq!(common::read_paragraphs(&source), vec!["Hello", "World"]);

    let package = DocxPackage::read(&dest)?;
    assert!(package.part("[Content_Types].xml").is_some());
    Ok(())
}
