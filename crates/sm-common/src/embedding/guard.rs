use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use tracing::warn;

use super::{EmbeddingConfig, EmbeddingError, EmbeddingProvider};

/// Wraps a provider with a per-call timeout and a cap on in-flight calls.
/// Blank input is rejected here without touching the provider.
pub struct GuardedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    permits: Semaphore,
    timeout: Duration,
}

impl GuardedEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration, max_concurrency: usize) -> Self {
        Self {
            provider,
            permits: Semaphore::new(max_concurrency.max(1)),
            timeout,
        }
    }

    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self::new(provider, config.timeout, config.max_concurrency)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        // The semaphore is never closed.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EmbeddingError::InvalidResponse("embedding limiter closed".into()))?;

        match tokio::time::timeout(self.timeout, self.provider.embed(text)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    provider = self.provider.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "embedding call timed out"
                );
                Err(EmbeddingError::Timeout(self.timeout))
            }
        }
    }
}
