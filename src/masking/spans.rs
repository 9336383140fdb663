/*!
 * Protected span extraction.
 *
 * Retain terms are matched case-insensitively, longest term first. A term
 * prefers occurrences that sit on word boundaries and only falls back to bare
 * substring hits when no bounded occurrence exists. Once a position is claimed
 * no later term may claim it. Detected entities are added afterwards and are
 * dropped outright if they touch any retain-term span.
 */

use std::sync::Arc;

use log::debug;
use regex::{Regex, RegexBuilder};

use super::entities::{DetectedEntity, EntityDetector, EntityLabel};
use super::{ProtectedSpan, SpanKind};

/// Finds the protected spans of one segment
#[derive(Clone, Default)]
pub struct SpanExtractor {
    /// Optional entity detector; `None` means entity protection is off
    detector: Option<Arc<dyn EntityDetector>>,

    /// Entity labels worth protecting
    allowed_labels: Vec<EntityLabel>,
}

impl std::fmt::Debug for SpanExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanExtractor")
            .field("detector", &self.detector.is_some())
            .field("allowed_labels", &self.allowed_labels)
            .finish()
    }
}

impl SpanExtractor {
    /// Extractor that only protects retain terms
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor that also protects entities reported by `detector`
    pub fn with_detector(detector: Arc<dyn EntityDetector>, allowed_labels: Vec<EntityLabel>) -> Self {
        Self {
            detector: Some(detector),
            allowed_labels,
        }
    }

    /// Compute the final, non-overlapping span list for `text`, sorted by start
    pub async fn extract(&self, text: &str, retain_terms: &[String]) -> Vec<ProtectedSpan> {
        if text.is_empty() {
            return Vec::new();
        }

        let user_spans = find_user_term_spans(text, retain_terms);

        let entities = match &self.detector {
            Some(detector) => match detector.detect(text).await {
                Ok(entities) => entities
                    .into_iter()
                    .filter(|e| self.allowed_labels.contains(&e.label))
                    .collect(),
                Err(e) => {
                    debug!("Entity detection unavailable, continuing without it: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        merge_entity_spans(text, user_spans, entities)
    }
}

/// Locate retain-term spans in `text`
pub fn find_user_term_spans(text: &str, terms: &[String]) -> Vec<ProtectedSpan> {
    if text.is_empty() || terms.is_empty() {
        return Vec::new();
    }

    let mut unique: Vec<&str> = terms
        .iter()
        .map(String::as_str)
        .filter(|t| !t.trim().is_empty())
        .collect();
    unique.sort_unstable();
    unique.dedup();
    // Stable sort keeps the alphabetical order among equal lengths
    unique.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));

    let mut claimed = vec![false; text.len()];
    let mut spans = Vec::new();

    for term in unique {
        let pattern = match RegexBuilder::new(&regex::escape(term))
            .case_insensitive(true)
            .build()
        {
            Ok(pattern) => pattern,
            Err(e) => {
                debug!("Skipping retain term {:?}: {}", term, e);
                continue;
            }
        };

        let mut matches = bounded_matches(&pattern, text);
        if matches.is_empty() {
            matches = pattern
                .find_iter(text)
                .map(|m| (m.start(), m.end()))
                .collect();
        }

        for (start, end) in matches {
            if claimed[start..end].iter().any(|&c| c) {
                continue;
            }
            if let Some(span) = ProtectedSpan::new(text, start, end, SpanKind::UserTerm) {
                claimed[start..end].iter_mut().for_each(|c| *c = true);
                spans.push(span);
            }
        }
    }

    spans.sort_by_key(|s| s.start);
    spans
}

/// Combine retain-term spans with detected entities
///
/// Entities intersecting a retain-term span are discarded whole, as are
/// entities overlapping an earlier accepted entity or carrying an invalid range.
pub fn merge_entity_spans(
    text: &str,
    user_spans: Vec<ProtectedSpan>,
    mut entities: Vec<DetectedEntity>,
) -> Vec<ProtectedSpan> {
    entities.sort_by_key(|e| (e.start, std::cmp::Reverse(e.end)));

    let mut combined = user_spans;
    let user_count = combined.len();

    for entity in entities {
        if combined.iter().any(|s| s.overlaps(entity.start, entity.end)) {
            if combined[..user_count].iter().any(|s| s.overlaps(entity.start, entity.end)) {
                debug!(
                    "Dropping entity {:?} at {}..{}: intersects a retain term",
                    entity.label, entity.start, entity.end
                );
            }
            continue;
        }
        if let Some(span) = ProtectedSpan::new(text, entity.start, entity.end, SpanKind::NamedEntity) {
            combined.push(span);
        }
    }

    combined.sort_by_key(|s| s.start);
    combined
}

/// Occurrences with no word character directly before or after them
fn bounded_matches(pattern: &Regex, text: &str) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut pos = 0;

    while pos <= text.len() {
        let Some(m) = pattern.find_at(text, pos) else {
            break;
        };
        if on_word_boundary(text, m.start(), m.end()) {
            found.push((m.start(), m.end()));
            pos = m.end();
        } else {
            // Retry from the next character so overlapping candidates are not missed
            pos = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
        }
    }

    found
}

fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
