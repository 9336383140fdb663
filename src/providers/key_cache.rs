/*!
 * API-key validation cache.
 *
 * Checking a key costs a round trip to the provider, so verdicts are kept for a
 * bounded time. The cache is an ordinary value that callers create and share;
 * there is no process-wide instance.
 */

use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::providers::Provider;

/// Outcome of one key check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVerdict {
    /// Whether the provider accepted the key
    pub valid: bool,
    /// Provider error text when the key was rejected or unreachable
    pub reason: Option<String>,
    /// When the check ran
    pub checked_at: Instant,
}

/// TTL-bounded map from API key to its last validation verdict
#[derive(Debug)]
pub struct KeyValidationCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, KeyVerdict>>,
}

impl KeyValidationCache {
    /// Default freshness window
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached verdict for `key`, if still fresh
    pub fn get(&self, key: &str) -> Option<KeyVerdict> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|verdict| verdict.checked_at.elapsed() < self.ttl)
            .cloned()
    }

    /// Validate `key` against `provider`, reusing a fresh cached verdict
    pub async fn validate(&self, key: &str, provider: &dyn Provider) -> KeyVerdict {
        if let Some(verdict) = self.get(key) {
            debug!("Using cached key verdict for {} (valid: {})", provider.name(), verdict.valid);
            return verdict;
        }

        let verdict = match provider.test_connection().await {
            Ok(()) => KeyVerdict {
                valid: true,
                reason: None,
                checked_at: Instant::now(),
            },
            Err(e) => KeyVerdict {
                valid: false,
                reason: Some(e.to_string()),
                checked_at: Instant::now(),
            },
        };

        self.entries.lock().insert(key.to_string(), verdict.clone());
        verdict
    }

    /// Forget every verdict
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop verdicts older than the TTL
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.lock().retain(|_, verdict| verdict.checked_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for KeyValidationCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
