/*!
 * Named-entity detection.
 *
 * Detection is optional. A pipeline without a detector, or one whose detector
 * fails, simply protects no entities.
 */

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, Provider};

/// Entity categories eligible for protection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
    Person,
    Org,
    /// Countries, cities, states
    Gpe,
    /// Non-political locations
    Loc,
    /// Buildings, airports, bridges
    Fac,
    /// Nationalities, religious or political groups
    Norp,
    Product,
    Event,
    WorkOfArt,
    Law,
    Language,
}

impl EntityLabel {
    pub const ALL: [EntityLabel; 11] = [
        Self::Person,
        Self::Org,
        Self::Gpe,
        Self::Loc,
        Self::Fac,
        Self::Norp,
        Self::Product,
        Self::Event,
        Self::WorkOfArt,
        Self::Law,
        Self::Language,
    ];

    /// Parse a detector tag, accepting the common long-form spellings
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized = tag.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        let label = match normalized.as_str() {
            "PERSON" | "PER" => Self::Person,
            "ORG" | "ORGANIZATION" | "ORGANISATION" => Self::Org,
            "GPE" | "PLACE" | "COUNTRY" | "CITY" => Self::Gpe,
            "LOC" | "LOCATION" => Self::Loc,
            "FAC" | "FACILITY" => Self::Fac,
            "NORP" | "NATIONALITY" | "GROUP" => Self::Norp,
            "PRODUCT" => Self::Product,
            "EVENT" => Self::Event,
            "WORK_OF_ART" | "WORK" => Self::WorkOfArt,
            "LAW" => Self::Law,
            "LANGUAGE" => Self::Language,
            _ => return None,
        };
        Some(label)
    }
}

/// One entity occurrence as reported by a detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedEntity {
    pub start: usize,
    pub end: usize,
    pub label: EntityLabel,
}

/// Pluggable named-entity recognition
#[async_trait]
pub trait EntityDetector: Send + Sync {
    /// Report entity occurrences in `text` as byte ranges
    async fn detect(&self, text: &str) -> Result<Vec<DetectedEntity>, ProviderError>;
}

/// Detector used when no recognition capability is available
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEntityDetector;

#[async_trait]
impl EntityDetector for NoEntityDetector {
    async fn detect(&self, _text: &str) -> Result<Vec<DetectedEntity>, ProviderError> {
        Ok(Vec::new())
    }
}

const ENTITY_PROMPT: &str = r#"You are a named-entity recognizer. List every named entity in the user's text.
Use only these labels: PERSON, ORG, GPE, LOC, FAC, NORP, PRODUCT, EVENT, WORK_OF_ART, LAW, LANGUAGE.
Answer with a JSON array only, for example: [{"text": "Marie Curie", "label": "PERSON"}].
Copy each entity's text exactly as it appears. Answer [] when there are none."#;

#[derive(Debug, Deserialize)]
struct RawEntity {
    text: String,
    label: String,
}

/// Entity detector backed by a language model
///
/// The model names entities and their labels; offsets are recovered by
/// locating each name in the source text.
#[derive(Debug, Clone)]
pub struct ProviderEntityDetector {
    provider: Arc<dyn Provider>,
    model: Option<String>,
    max_tokens: u32,
}

impl ProviderEntityDetector {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            model: None,
            max_tokens: 1000,
        }
    }

    /// Use a specific model for detection requests
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[async_trait]
impl EntityDetector for ProviderEntityDetector {
    async fn detect(&self, text: &str) -> Result<Vec<DetectedEntity>, ProviderError> {
        let mut request = CompletionRequest::new(text)
            .system(ENTITY_PROMPT)
            .temperature(0.0)
            .max_tokens(self.max_tokens);
        if let Some(model) = &self.model {
            request = request.model(model.clone());
        }

        let response = self.provider.complete(request).await?;
        let raw = parse_entity_list(&response.text)?;

        let mut found = Vec::new();
        for entity in raw {
            let Some(label) = EntityLabel::from_tag(&entity.label) else {
                debug!("Ignoring entity with unknown label {:?}", entity.label);
                continue;
            };
            found.extend(
                locate(text, &entity.text)
                    .into_iter()
                    .map(|(start, end)| DetectedEntity { start, end, label }),
            );
        }
        Ok(found)
    }
}

fn parse_entity_list(answer: &str) -> Result<Vec<RawEntity>, ProviderError> {
    let start = answer.find('[');
    let end = answer.rfind(']');
    match (start, end) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&answer[start..=end])
            .map_err(|e| ProviderError::ParseError(format!("entity list: {}", e))),
        _ => Err(ProviderError::ParseError(format!(
            "entity list: no JSON array in {:?}",
            answer.chars().take(80).collect::<String>()
        ))),
    }
}

/// Every exact occurrence of `needle` that does not sit inside a longer word
fn locate(text: &str, needle: &str) -> Vec<(usize, usize)> {
    let needle = needle.trim();
    if needle.is_empty() {
        return Vec::new();
    }

    text.match_indices(needle)
        .map(|(start, m)| (start, start + m.len()))
        .filter(|&(start, end)| {
            let before = text[..start].chars().next_back();
            let after = text[end..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
        .collect()
}
