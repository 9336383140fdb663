/*!
 * Placeholder masking.
 *
 * `mask` swaps every protected span for a token such as `<<UT0>>` or `<<NE2>>`;
 * retain terms and entities are numbered independently from zero. `unmask`
 * substitutes the originals back, longest token first.
 */

use super::{ProtectedSpan, SpanKind};

/// Token to original-text mapping produced by one `mask` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMap {
    entries: Vec<(String, String)>,
}

impl TokenMap {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Original text behind `token`
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, original)| original.as_str())
    }

    /// Tokens in the order they were issued
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    fn insert(&mut self, token: String, original: String) {
        self.entries.push((token, original));
    }
}

/// Result of masking a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedText {
    pub text: String,
    pub token_map: TokenMap,
}

/// Placeholder for the `index`-th span of `kind`
pub fn placeholder(kind: SpanKind, index: usize) -> String {
    format!("<<{}{}>>", kind.token_tag(), index)
}

/// Replace protected spans with placeholder tokens
///
/// Spans are visited in ascending start order; a span starting before the end
/// of the previous one, or not addressing a valid range of `text`, is skipped.
pub fn mask(text: &str, spans: &[ProtectedSpan]) -> MaskedText {
    if spans.is_empty() {
        return MaskedText {
            text: text.to_string(),
            token_map: TokenMap::default(),
        };
    }

    let mut ordered: Vec<&ProtectedSpan> = spans.iter().collect();
    ordered.sort_by_key(|s| s.start);

    let mut masked = String::with_capacity(text.len());
    let mut token_map = TokenMap::default();
    let mut cursor = 0;
    let mut user_index = 0;
    let mut entity_index = 0;

    for span in ordered {
        if span.start < cursor {
            continue;
        }
        let (Some(literal), Some(original)) = (text.get(cursor..span.start), text.get(span.start..span.end))
        else {
            continue;
        };
        if original.is_empty() {
            continue;
        }

        let counter = match span.kind {
            SpanKind::UserTerm => &mut user_index,
            SpanKind::NamedEntity => &mut entity_index,
        };
        let token = placeholder(span.kind, *counter);
        *counter += 1;

        masked.push_str(literal);
        masked.push_str(&token);
        token_map.insert(token, original.to_string());
        cursor = span.end;
    }

    masked.push_str(&text[cursor..]);

    MaskedText {
        text: masked,
        token_map,
    }
}

/// Restore original span text in a (possibly translated) masked string
pub fn unmask(text: &str, token_map: &TokenMap) -> String {
    if token_map.is_empty() || text.is_empty() {
        return text.to_string();
    }

    let mut by_length: Vec<&(String, String)> = token_map.entries.iter().collect();
    by_length.sort_by_key(|(token, _)| std::cmp::Reverse(token.len()));

    by_length
        .into_iter()
        .fold(text.to_string(), |acc, (token, original)| acc.replace(token.as_str(), original))
}
