//! LLM Backend trait and implementations.
//!
//! This module defines the abstraction layer over LLM providers and the
//! shared rate-limit retry policy. A scripted mock backend is available for
//! tests behind the `testing` feature.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::types::{CompletionRequest, CompletionResponse};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only rate-limit errors, at most `max_retries` times. The delay
/// doubles after every attempt and never undercuts a provider-supplied
/// `retry-after`. Any other error is returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = e.retry_after().map_or(backoff, |after| after.max(backoff));
                attempt += 1;
                tracing::warn!(
                    backend = backend_name,
                    attempt,
                    max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    error = %e,
                    "Rate limited, retrying"
                );
                tokio::time::sleep(delay).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for LLM backend providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Check if the backend is properly configured.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::MockBackend;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use super::*;
    use crate::error::LlmError;
    use crate::types::{ContentBlock, StopReason, Usage};
    use parking_lot::Mutex;

    /// A mock backend for testing purposes.
    ///
    /// Returns pre-configured outcomes in order. Running out of outcomes is
    /// reported as a backend error.
    #[derive(Debug, Default)]
    pub struct MockBackend {
        outcomes: Mutex<Vec<Result<CompletionResponse>>>,
        request_log: Mutex<Vec<CompletionRequest>>,
    }

    impl MockBackend {
        /// Create a mock backend with the given responses.
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            Self {
                outcomes: Mutex::new(responses.into_iter().map(Ok).collect()),
                request_log: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock backend with a single text response.
        pub fn with_text(text: impl Into<String>) -> Self {
            Self::with_texts([text.into()])
        }

        /// Create a mock backend returning each text in turn.
        pub fn with_texts<I, S>(texts: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self::new(
                texts
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| text_response(i, text.into()))
                    .collect(),
            )
        }

        /// Queue an error as the next outcome.
        pub fn push_error(&self, error: LlmError) {
            self.outcomes.lock().push(Err(error));
        }

        /// Queue a text reply as the next outcome.
        pub fn push_text(&self, text: impl Into<String>) {
            let mut outcomes = self.outcomes.lock();
            let index = outcomes.len();
            outcomes.push(Ok(text_response(index, text.into())));
        }

        /// Get all requests that were made to this backend.
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.request_log.lock().clone()
        }

        /// Get the number of requests made.
        pub fn request_count(&self) -> usize {
            self.request_log.lock().len()
        }
    }

    fn text_response(index: usize, text: String) -> CompletionResponse {
        CompletionResponse::new(
            format!("mock_msg_{}", index + 1),
            "mock-model",
            vec![ContentBlock::text(text)],
            StopReason::EndTurn,
            Usage::new(10, 20),
        )
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            self.request_log.lock().push(request);

            let mut outcomes = self.outcomes.lock();
            if outcomes.is_empty() {
                return Err(LlmError::Backend(
                    "MockBackend: no more responses available".to_string(),
                ));
            }
            outcomes.remove(0)
        }

        fn name(&self) -> &str {
            "mock"
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
