/*!
 * Provider implementations for different completion services.
 *
 * This module contains client implementations for various LLM providers:
 * - OpenAI: OpenAI chat completions API
 * - Anthropic: Anthropic messages API
 * - Ollama: Local LLM server
 * - Mock: scripted provider for tests
 *
 * Every translation, quality and entity request in the pipeline goes through
 * the object-safe `Provider` trait so collaborators can be swapped freely.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

/// A single completion request: optional system instructions plus user text
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instructions
    pub system: Option<String>,

    /// User message content
    pub user: String,

    /// Sampling temperature; 0.0 asks for deterministic output
    pub temperature: f32,

    /// Upper bound on generated tokens
    pub max_tokens: u32,

    /// Model override; the provider's configured model is used when absent
    pub model: Option<String>,
}

impl CompletionRequest {
    /// Create a deterministic request for `user`
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            temperature: 0.0,
            max_tokens: 4000,
            model: None,
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum number of generated tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the model for this request
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Text returned by a provider, with token accounting when available
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl CompletionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the translation pipeline.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection (and credentials) of the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Build the configured provider client
pub fn from_config(config: &TranslationConfig) -> Arc<dyn Provider> {
    let api_key = config.get_api_key();
    let endpoint = config.get_endpoint();
    let model = config.get_model();
    let timeout_secs = config.get_timeout_secs();

    match config.provider {
        TranslationProvider::OpenAI => Arc::new(openai::OpenAI::new(api_key, endpoint, model, timeout_secs)),
        TranslationProvider::Anthropic => {
            Arc::new(anthropic::Anthropic::new(api_key, endpoint, model, timeout_secs))
        }
        TranslationProvider::Ollama => Arc::new(ollama::Ollama::new(endpoint, model, timeout_secs)),
    }
}

/// Shorten a response body for error messages
pub(crate) fn truncate_for_log(text: &str) -> String {
    if text.chars().count() > 500 {
        text.chars().take(500).collect::<String>()
    } else {
        text.to_string()
    }
}

pub mod anthropic;
pub mod key_cache;
pub mod mock;
pub mod ollama;
pub mod openai;
