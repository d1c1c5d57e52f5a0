//! Single-text classification with bounded retry

use songci_core::{RateLimiter, RetryPolicy, retry_with_backoff};

use crate::client::ChatBackend;
use crate::model::ClassificationResult;
use crate::prompt::{build_prompt, parse_reply, truncate_chars};

/// Classifies one poem at a time through a [`ChatBackend`].
///
/// Shared by reference across all workers; holds no per-call state.
pub struct SentimentClassifier<B> {
    backend: B,
    policy: RetryPolicy,
    max_chars: usize,
}

impl<B: ChatBackend> SentimentClassifier<B> {
    pub fn new(backend: B, policy: RetryPolicy, max_chars: usize) -> Self {
        Self {
            backend,
            policy,
            max_chars,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Classify `text`, never failing past this boundary.
    ///
    /// Every attempt, retries included, takes one rate-limiter grant. After
    /// `policy.max_attempts` failures the error sentinel is returned.
    pub fn classify(&self, text: &str, limiter: &RateLimiter) -> ClassificationResult {
        let prompt = build_prompt(&truncate_chars(text, self.max_chars));
        let label = format!("classify[{}]", preview(text));

        let outcome = retry_with_backoff(&label, &self.policy, |_attempt| {
            limiter.acquire();
            self.backend
                .chat(&prompt)
                .and_then(|content| parse_reply(&content))
        });

        match outcome {
            Ok(result) => result,
            Err(e) => {
                log::warn!(
                    "{label}: giving up after {} attempts: {e}",
                    self.policy.max_attempts
                );
                ClassificationResult::retries_exhausted()
            }
        }
    }
}

/// First few characters of a poem for log lines
fn preview(text: &str) -> String {
    let head: String = text.trim().chars().take(8).collect();
    if text.trim().chars().count() > 8 {
        format!("{head}…")
    } else {
        head
    }
}
