/*!
 * Span protection for translation requests.
 *
 * Protected spans are sub-ranges of a segment that must come back from the
 * language model untouched: caller-supplied retain terms and, when a detector
 * is available, named entities. They are swapped for placeholder tokens before
 * the request and restored afterwards.
 *
 * - `spans`: locating retain terms and merging detected entities
 * - `entities`: pluggable named-entity detection
 * - `codec`: placeholder masking and unmasking
 *
 * All offsets are byte offsets into the segment and always fall on `char`
 * boundaries.
 */

pub use self::codec::{MaskedText, TokenMap, mask, unmask};
pub use self::entities::{
    DetectedEntity, EntityDetector, EntityLabel, NoEntityDetector, ProviderEntityDetector,
};
pub use self::spans::{SpanExtractor, find_user_term_spans, merge_entity_spans};

pub mod codec;
pub mod entities;
pub mod spans;

/// Origin of a protected span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Taken from the caller's retain list
    UserTerm,
    /// Reported by the entity detector
    NamedEntity,
}

impl SpanKind {
    /// Tag used inside placeholder tokens for this kind
    pub fn token_tag(self) -> &'static str {
        match self {
            Self::UserTerm => "UT",
            Self::NamedEntity => "NE",
        }
    }
}

/// A half-open `[start, end)` range of a segment that must not be translated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedSpan {
    pub start: usize,
    pub end: usize,
    /// The exact source substring covered by the range
    pub text: String,
    pub kind: SpanKind,
}

impl ProtectedSpan {
    /// Build a span over `source[start..end]`, or `None` if the range is not valid there
    pub fn new(source: &str, start: usize, end: usize, kind: SpanKind) -> Option<Self> {
        if start >= end {
            return None;
        }
        source.get(start..end).map(|covered| Self {
            start,
            end,
            text: covered.to_string(),
            kind,
        })
    }

    /// Whether the two ranges share at least one position
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}
