pub mod config;
pub mod gemini;
pub mod guard;
pub mod hash_provider;
pub mod text;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use config::{EmbeddingConfig, ProviderKind};
pub use gemini::GeminiProvider;
pub use guard::GuardedEmbedder;
pub use hash_provider::HashProvider;
pub use text::{listing_text, profile_text};

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding input is empty")]
    EmptyInput,
    #[error("embedding provider credentials are not configured: {0}")]
    MissingCredentials(&'static str),
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("embedding request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("embedding response was malformed: {0}")]
    InvalidResponse(String),
}

/// Text → dense vector. Implementations may fail or stall; callers go
/// through [`GuardedEmbedder`] for the timeout and concurrency cap.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name recorded in logs ("gemini", "hash").
    fn name(&self) -> &'static str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider {
        ProviderKind::Gemini => Ok(Arc::new(GeminiProvider::new(config)?)),
        ProviderKind::Hash => Ok(Arc::new(HashProvider::new(config.dimension))),
    }
}
