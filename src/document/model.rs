/*!
 * Paragraph-level view of a `.docx` document.
 *
 * `DocxDocument` loads the main document part and every header and footer part,
 * exposes their paragraphs in reading order, and rewrites paragraph text while
 * keeping paragraph properties and the basic character style of the first run.
 *
 * Parts are located through the package relationships. Packages without
 * relationship files fall back to the conventional `word/document.xml`,
 * `word/headerN.xml` and `word/footerN.xml` names.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use log::debug;

use crate::document::package::{DocxPackage, MAIN_DOCUMENT_PART};
use crate::document::xml::{XmlDocument, XmlElement, XmlNode};
use crate::errors::DocumentError;

static HEADER_FOOTER_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^word/(header|footer)(\d*)\.xml$").unwrap()
});

static PART_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.xml$").unwrap());

const PACKAGE_RELS_PART: &str = "_rels/.rels";

/// Run content anchored in a paragraph but not part of its text
const EMBEDDED_OBJECTS: &[&str] = &["w:drawing", "w:pict", "w:object", "w:txbxContent", "mc:AlternateContent"];

/// Run properties carried over to a rewritten paragraph, in schema order
const KEPT_RUN_PROPERTIES: &[&str] = &["w:rStyle", "w:rFonts", "w:b", "w:i", "w:color", "w:sz", "w:szCs", "w:u"];

/// Location of one paragraph: the loaded part and the child-index path from its root element
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParagraphRef {
    part: usize,
    path: Vec<usize>,
}

impl ParagraphRef {
    /// Index of the loaded part holding the paragraph (0 is the main document)
    pub fn part(&self) -> usize {
        self.part
    }
}

#[derive(Debug, Clone)]
struct LoadedPart {
    name: String,
    xml: XmlDocument,
    modified: bool,
}

/// An opened document
#[derive(Debug, Clone)]
pub struct DocxDocument {
    package: DocxPackage,
    parts: Vec<LoadedPart>,
}

impl DocxDocument {
    /// Open and parse the document at `path`
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        debug!("Opening document {:?}", path);
        Self::from_package(DocxPackage::read(path)?)
    }

    /// Parse the text-bearing parts of an already-read package
    pub fn from_package(package: DocxPackage) -> Result<Self, DocumentError> {
        let main_name = main_document_part(&package)?;
        let main = package
            .part(&main_name)
            .ok_or_else(|| DocumentError::MissingPart(main_name.clone()))?;
        let mut parts = vec![LoadedPart {
            xml: XmlDocument::parse(&main_name, main)?,
            name: main_name.clone(),
            modified: false,
        }];

        // header1, footer1, header2, footer2, ...
        let mut sections = header_footer_parts(&package, &main_name)?;
        sections.sort();
        sections.dedup();

        for (_, _, name) in sections {
            let Some(bytes) = package.part(&name) else {
                debug!("Skipping missing part {}", name);
                continue;
            };
            let xml = XmlDocument::parse(&name, bytes)?;
            parts.push(LoadedPart {
                name,
                xml,
                modified: false,
            });
        }

        debug!("Loaded {} text parts", parts.len());
        Ok(Self { package, parts })
    }

    /// Names of the parsed parts, main document first
    pub fn part_names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.name.as_str()).collect()
    }

    /// Every paragraph-bearing region in reading order
    ///
    /// Body paragraphs come first, then the paragraphs of body table cells
    /// (nested tables included), then each header and footer the same way.
    pub fn paragraphs(&self) -> Vec<ParagraphRef> {
        let mut refs = Vec::new();

        for (index, part) in self.parts.iter().enumerate() {
            let Some(root) = part.xml.root() else {
                continue;
            };

            let mut paths = Vec::new();
            if index == 0 {
                if let Some(body_index) = root
                    .children
                    .iter()
                    .position(|n| n.as_element().is_some_and(|el| el.is("w:body")))
                {
                    if let Some(body) = root.children[body_index].as_element() {
                        collect_container(body, &mut vec![body_index], &mut paths);
                    }
                }
            } else {
                collect_container(root, &mut Vec::new(), &mut paths);
            }

            refs.extend(paths.into_iter().map(|path| ParagraphRef { part: index, path }));
        }

        refs
    }

    /// Plain text of a paragraph; tabs and line breaks become `\t` and `\n`
    pub fn paragraph_text(&self, paragraph: &ParagraphRef) -> Option<String> {
        let el = self.element(paragraph)?;
        let mut text = String::new();
        collect_text(el, &mut text);
        Some(text)
    }

    /// Replace the content of a paragraph with a single run holding `text`
    ///
    /// Paragraph properties are kept. The new run takes the named style, bold,
    /// italic, underline, font, size and explicit color of the old first run.
    pub fn set_paragraph_text(&mut self, paragraph: &ParagraphRef, text: &str) -> Result<(), DocumentError> {
        let part = self
            .parts
            .get_mut(paragraph.part)
            .ok_or_else(|| DocumentError::MissingPart(format!("part #{}", paragraph.part)))?;
        let part_name = part.name.clone();
        let el = part
            .xml
            .root_mut()
            .and_then(|root| element_at_mut(root, &paragraph.path))
            .ok_or_else(|| DocumentError::Xml {
                part: part_name,
                message: format!("no paragraph at {:?}", paragraph.path),
            })?;

        let style = first_run(el).and_then(|run| run.child("w:rPr")).and_then(kept_run_properties);
        let properties = el.child("w:pPr").cloned();
        let mut anchors = Vec::new();
        collect_anchors(el, &mut anchors);

        let mut run = XmlElement::new("w:r");
        if let Some(style) = style {
            run = run.with_child(style);
        }
        append_text_nodes(&mut run, text);

        el.children.clear();
        if let Some(properties) = properties {
            el.children.push(XmlNode::Element(properties));
        }
        el.children.push(XmlNode::Element(run));
        el.children.extend(anchors.into_iter().map(XmlNode::Element));

        part.modified = true;
        Ok(())
    }

    /// Serialize the full package with every edited part
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let replacements = self.replacements()?;
        let cursor = self
            .package
            .write_with_replacements(std::io::Cursor::new(Vec::new()), &replacements)?;
        Ok(cursor.into_inner())
    }

    /// Write the document to `dest`
    ///
    /// The package is written to a temporary file in the destination directory
    /// and moved into place, so `dest` is either the complete new document or untouched.
    pub fn save(&self, dest: &Path) -> Result<(), DocumentError> {
        let save_error = |message: String| DocumentError::Save {
            path: dest.to_path_buf(),
            message,
        };

        let replacements = self.replacements()?;
        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| save_error(e.to_string()))?;
        self.package
            .write_with_replacements(tmp.as_file_mut(), &replacements)
            .map_err(|e| save_error(e.to_string()))?;
        tmp.as_file().sync_all().map_err(|e| save_error(e.to_string()))?;
        tmp.persist(dest).map_err(|e| save_error(e.error.to_string()))?;

        debug!("Saved document to {:?} ({} parts rewritten)", dest, replacements.len());
        Ok(())
    }

    fn replacements(&self) -> Result<HashMap<String, Vec<u8>>, DocumentError> {
        self.parts
            .iter()
            .filter(|p| p.modified)
            .map(|p| Ok((p.name.clone(), p.xml.to_bytes()?)))
            .collect()
    }

    fn element(&self, paragraph: &ParagraphRef) -> Option<&XmlElement> {
        let root = self.parts.get(paragraph.part)?.xml.root()?;
        element_at(root, &paragraph.path)
    }
}

fn element_at<'a>(root: &'a XmlElement, path: &[usize]) -> Option<&'a XmlElement> {
    path.iter()
        .try_fold(root, |el, &index| el.children.get(index)?.as_element())
}

fn element_at_mut<'a>(root: &'a mut XmlElement, path: &[usize]) -> Option<&'a mut XmlElement> {
    let mut el = root;
    for &index in path {
        el = el.children.get_mut(index)?.as_element_mut()?;
    }
    Some(el)
}

/// Paragraphs of a body-like container: its own paragraphs, then its tables
fn collect_container(container: &XmlElement, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (index, node) in container.children.iter().enumerate() {
        if node.as_element().is_some_and(|el| el.is("w:p")) {
            path.push(index);
            out.push(path.clone());
            path.pop();
        }
    }

    for (index, node) in container.children.iter().enumerate() {
        if let Some(table) = node.as_element().filter(|el| el.is("w:tbl")) {
            path.push(index);
            collect_table(table, path, out);
            path.pop();
        }
    }
}

fn collect_table(table: &XmlElement, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (row_index, row) in table.children.iter().enumerate() {
        let Some(row) = row.as_element().filter(|el| el.is("w:tr")) else {
            continue;
        };
        path.push(row_index);

        for (cell_index, cell) in row.children.iter().enumerate() {
            let Some(cell) = cell.as_element().filter(|el| el.is("w:tc")) else {
                continue;
            };
            path.push(cell_index);

            for (index, node) in cell.children.iter().enumerate() {
                match node.as_element() {
                    Some(el) if el.is("w:p") => {
                        path.push(index);
                        out.push(path.clone());
                        path.pop();
                    }
                    Some(el) if el.is("w:tbl") => {
                        path.push(index);
                        collect_table(el, path, out);
                        path.pop();
                    }
                    _ => {}
                }
            }

            path.pop();
        }

        path.pop();
    }
}

fn collect_text(el: &XmlElement, out: &mut String) {
    for child in el.elements() {
        match child.name.as_str() {
            "w:t" => out.push_str(&child.text()),
            "w:tab" => out.push('\t'),
            "w:br" | "w:cr" => out.push('\n'),
            "w:pPr" | "w:rPr" | "w:del" | "w:delText" | "w:instrText" => {}
            _ if is_embedded_object(child) => {}
            _ => collect_text(child, out),
        }
    }
}

fn is_embedded_object(el: &XmlElement) -> bool {
    EMBEDDED_OBJECTS.contains(&el.name.as_str())
}

/// Drawings, text boxes and other objects of a paragraph, each wrapped in a bare run
fn collect_anchors(el: &XmlElement, out: &mut Vec<XmlElement>) {
    for child in el.elements() {
        if child.is("w:pPr") || child.is("w:del") {
            continue;
        }
        if child.is("w:r") {
            let objects: Vec<XmlNode> = child
                .elements()
                .filter(|c| is_embedded_object(c))
                .map(|c| XmlNode::Element(c.clone()))
                .collect();
            if !objects.is_empty() {
                let mut run = XmlElement::new("w:r");
                run.children = objects;
                out.push(run);
            }
        } else if is_embedded_object(child) {
            out.push(child.clone());
        } else {
            collect_anchors(child, out);
        }
    }
}

/// Name of the main document part from `_rels/.rels`
fn main_document_part(package: &DocxPackage) -> Result<String, DocumentError> {
    let found = relationships(package, PACKAGE_RELS_PART)?.and_then(|rels| {
        rels.into_iter()
            .find(|(kind, _)| kind.ends_with("/officeDocument"))
            .map(|(_, target)| resolve_target("", &target))
    });
    Ok(found.unwrap_or_else(|| MAIN_DOCUMENT_PART.to_string()))
}

/// Header and footer parts of `main` as `(number, kind, name)`, header before footer
fn header_footer_parts(package: &DocxPackage, main: &str) -> Result<Vec<(u32, u8, String)>, DocumentError> {
    let (dir, file) = main.rsplit_once('/').unwrap_or(("", main));
    let rels_name = if dir.is_empty() {
        format!("_rels/{}.rels", file)
    } else {
        format!("{}/_rels/{}.rels", dir, file)
    };

    let Some(rels) = relationships(package, &rels_name)? else {
        return Ok(package
            .part_names()
            .filter_map(|name| {
                let caps = HEADER_FOOTER_PART.captures(name)?;
                let number = caps[2].parse().unwrap_or(0);
                let kind = if &caps[1] == "header" { 0 } else { 1 };
                Some((number, kind, name.to_string()))
            })
            .collect());
    };

    Ok(rels
        .into_iter()
        .filter_map(|(kind, target)| {
            let kind = match kind.rsplit('/').next() {
                Some("header") => 0,
                Some("footer") => 1,
                _ => return None,
            };
            let name = resolve_target(dir, &target);
            let number = PART_NUMBER
                .captures(&name)
                .and_then(|caps| caps[1].parse().ok())
                .unwrap_or(0);
            Some((number, kind, name))
        })
        .collect())
}

/// Internal `(Type, Target)` pairs of a relationships part, `None` when the part is absent
fn relationships(package: &DocxPackage, rels_name: &str) -> Result<Option<Vec<(String, String)>>, DocumentError> {
    let Some(bytes) = package.part(rels_name) else {
        return Ok(None);
    };
    let xml = XmlDocument::parse(rels_name, bytes)?;
    let Some(root) = xml.root() else {
        return Ok(Some(Vec::new()));
    };

    Ok(Some(
        root.elements()
            .filter(|rel| rel.is("Relationship"))
            .filter(|rel| rel.attr("TargetMode") != Some("External"))
            .filter_map(|rel| Some((rel.attr("Type")?.to_string(), rel.attr("Target")?.to_string())))
            .collect(),
    ))
}

/// Package path of `target` relative to the directory `base`
fn resolve_target(base: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base.is_empty() => target.to_string(),
        None => format!("{}/{}", base, target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// First run of a paragraph, looking inside hyperlinks and tracked insertions
fn first_run(el: &XmlElement) -> Option<&XmlElement> {
    el.elements().find_map(|child| match child.name.as_str() {
        "w:r" => Some(child),
        "w:pPr" | "w:del" => None,
        _ if is_embedded_object(child) => None,
        _ => first_run(child),
    })
}

fn kept_run_properties(rpr: &XmlElement) -> Option<XmlElement> {
    let mut kept = XmlElement::new("w:rPr");
    for name in KEPT_RUN_PROPERTIES {
        let Some(prop) = rpr.child(name) else {
            continue;
        };
        if prop.is("w:color") && prop.attr("w:val").is_none_or(|v| v.eq_ignore_ascii_case("auto")) {
            continue;
        }
        kept.children.push(XmlNode::Element(prop.clone()));
    }

    if kept.children.is_empty() { None } else { Some(kept) }
}

fn append_text_nodes(run: &mut XmlElement, text: &str) {
    let mut pending = String::new();
    let flush = |run: &mut XmlElement, pending: &mut String| {
        if !pending.is_empty() {
            let t = XmlElement::new("w:t")
                .with_attr("xml:space", "preserve")
                .with_text(std::mem::take(pending));
            run.children.push(XmlNode::Element(t));
        }
    };

    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(run, &mut pending);
                run.children.push(XmlNode::Element(XmlElement::new("w:tab")));
            }
            '\n' => {
                flush(run, &mut pending);
                run.children.push(XmlNode::Element(XmlElement::new("w:br")));
            }
            '\r' => {}
            _ => pending.push(ch),
        }
    }
    flush(run, &mut pending);
}
