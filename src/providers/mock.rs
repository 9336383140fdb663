/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds, echoing the user text as a translation
 * - `MockProvider::fixed(text)` - Always answers with the same text (handy for scores)
 * - `MockProvider::scripted(answers)` - Replays a queue of answers in order
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::empty()` - Succeeds with an empty completion
 *
 * Every mock records the requests it receives and the peak number of requests
 * in flight, so scheduling and retry behavior can be asserted.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, CompletionResponse, Provider};

/// Custom answer generator
pub type Responder = Arc<dyn Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync>;

/// Per-request latency in milliseconds
pub type DelayFn = Arc<dyn Fn(&CompletionRequest) -> u64 + Send + Sync>;

/// Behavior mode for the mock provider
#[derive(Clone)]
pub enum MockBehavior {
    /// Always succeeds with `[TRANSLATED] <user text>`
    Working,
    /// Always answers with the given text
    Fixed(String),
    /// Pops the next scripted answer; fails once the script runs out
    Scripted,
    /// Answer computed from the request
    Custom(Responder),
    /// Always fails with an error
    Failing,
    /// Returns an empty completion
    Empty,
}

impl std::fmt::Debug for MockBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Working => write!(f, "Working"),
            Self::Fixed(text) => write!(f, "Fixed({:?})", text),
            Self::Scripted => write!(f, "Scripted"),
            Self::Custom(_) => write!(f, "Custom"),
            Self::Failing => write!(f, "Failing"),
            Self::Empty => write!(f, "Empty"),
        }
    }
}

/// Mock provider for testing translation behavior
#[derive(Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Remaining scripted answers
    script: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Requests currently being answered
    in_flight: Arc<AtomicUsize>,
    /// Highest value `in_flight` has reached
    peak_in_flight: Arc<AtomicUsize>,
    /// Simulated latency per request
    delay_ms: u64,
    /// Latency computed from the request, overriding `delay_ms`
    delay_by: Option<DelayFn>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("behavior", &self.behavior)
            .field("requests", &self.request_count())
            .field("delay_ms", &self.delay_ms)
            .finish()
    }
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            delay_ms: 0,
            delay_by: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that always answers `text`
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fixed(text.into()))
    }

    /// Create a mock that replays `answers` in order
    pub fn scripted(answers: Vec<Result<String, ProviderError>>) -> Self {
        let provider = Self::new(MockBehavior::Scripted);
        provider.script.lock().extend(answers);
        provider
    }

    /// Create a mock whose answer is computed from each request
    pub fn custom<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self::new(MockBehavior::Custom(Arc::new(responder)))
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Delay every answer by `delay_ms` (honors tokio's paused clock)
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Delay each answer by an amount derived from its request
    pub fn with_delay_by<F>(mut self, delay_by: F) -> Self
    where
        F: Fn(&CompletionRequest) -> u64 + Send + Sync + 'static,
    {
        self.delay_by = Some(Arc::new(delay_by));
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Snapshot of the requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Highest number of concurrently outstanding requests observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        match &self.behavior {
            MockBehavior::Working => Ok(format!("[TRANSLATED] {}", request.user)),
            MockBehavior::Fixed(text) => Ok(text.clone()),
            MockBehavior::Scripted => self
                .script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::RequestFailed("mock script exhausted".to_string()))),
            MockBehavior::Custom(responder) => responder(request),
            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),
            MockBehavior::Empty => Ok(String::new()),
        }
    }
}

/// Releases an in-flight slot, also when the request future is dropped mid-delay
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.requests.lock().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlightGuard(self.in_flight.clone());

        let delay_ms = self.delay_by.as_ref().map_or(self.delay_ms, |delay_by| delay_by(&request));
        if delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
        }

        let result = self.answer(&request);

        result.map(|text| CompletionResponse {
            prompt_tokens: Some(request.user.len() as u64),
            completion_tokens: Some(text.len() as u64),
            text,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::AuthenticationError("Simulated invalid key".to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
