/*!
 * Segment extraction and reassembly.
 *
 * Splits each paragraph into an ordinal prefix (`1. `, `(2) `, `a. `, `(b) `) and
 * a core text, collects the distinct translatable core texts, and later writes
 * `prefix + translation` back into every paragraph whose core was translated.
 */

use log::debug;
use regex::Regex;
use std::collections::HashMap;

use crate::app_config::default_prefix_pattern;
use crate::document::model::{DocxDocument, ParagraphRef};
use crate::errors::DocumentError;

/// One distinct translatable text
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    /// Text sent for translation
    pub core: String,
    /// Ordinal marker stripped from the first paragraph carrying this core
    pub prefix: String,
    /// Full text of that paragraph
    pub original: String,
    /// That paragraph
    pub paragraph: ParagraphRef,
}

/// Distinct segments of a document in first-seen order
#[derive(Debug, Clone, Default)]
pub struct SegmentSet {
    segments: Vec<TextSegment>,
    index: HashMap<String, usize>,
}

impl SegmentSet {
    /// Add a segment unless its core text is already present; returns whether it was added
    pub fn insert(&mut self, segment: TextSegment) -> bool {
        if self.index.contains_key(&segment.core) {
            return false;
        }
        self.index.insert(segment.core.clone(), self.segments.len());
        self.segments.push(segment);
        true
    }

    pub fn get(&self, core: &str) -> Option<&TextSegment> {
        self.index.get(core).map(|&i| &self.segments[i])
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextSegment> {
        self.segments.iter()
    }

    /// Core texts to submit for translation
    pub fn cores(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.core.clone()).collect()
    }
}

/// Prefix-aware segmenter and reassembler
#[derive(Debug, Clone)]
pub struct Segmenter {
    prefix: Regex,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            prefix: Regex::new(&default_prefix_pattern()).unwrap(),
        }
    }
}

impl Segmenter {
    /// Build a segmenter with a custom prefix pattern
    ///
    /// The pattern is only honored at the start of the text; a leading `^` is optional.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let anchored = if pattern.starts_with('^') {
            pattern.to_string()
        } else {
            format!("^(?:{})", pattern)
        };
        Ok(Self {
            prefix: Regex::new(&anchored)?,
        })
    }

    /// Split `text` into `(prefix, core)`
    pub fn split<'a>(&self, text: &'a str) -> (&'a str, &'a str) {
        match self.prefix.find(text) {
            Some(m) if m.start() == 0 => text.split_at(m.end()),
            _ => ("", text),
        }
    }

    /// Whether a core text is worth translating
    pub fn is_translatable(core: &str) -> bool {
        !core.trim().is_empty() && core.chars().any(char::is_alphabetic)
    }

    /// Collect the distinct translatable core texts of `doc`
    pub fn segment(&self, doc: &DocxDocument) -> SegmentSet {
        let mut set = SegmentSet::default();
        let mut paragraphs = 0usize;

        for paragraph in doc.paragraphs() {
            paragraphs += 1;
            let Some(text) = doc.paragraph_text(&paragraph) else {
                continue;
            };
            let (prefix, core) = self.split(&text);
            if !Self::is_translatable(core) {
                continue;
            }
            set.insert(TextSegment {
                core: core.to_string(),
                prefix: prefix.to_string(),
                original: text.clone(),
                paragraph,
            });
        }

        debug!("Found {} distinct segments in {} paragraphs", set.len(), paragraphs);
        set
    }

    /// Rewrite every paragraph whose core text has a translation; returns the number rewritten
    pub fn reassemble(
        &self,
        doc: &mut DocxDocument,
        translations: &HashMap<String, String>,
    ) -> Result<usize, DocumentError> {
        let mut rewritten = 0;

        for paragraph in doc.paragraphs() {
            let Some(text) = doc.paragraph_text(&paragraph) else {
                continue;
            };
            let (prefix, core) = self.split(&text);
            if let Some(translation) = translations.get(core) {
                let final_text = format!("{}{}", prefix, translation);
                doc.set_paragraph_text(&paragraph, &final_text)?;
                rewritten += 1;
            }
        }

        debug!("Rewrote {} paragraphs", rewritten);
        Ok(rewritten)
    }
}
