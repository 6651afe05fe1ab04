use std::time::Duration;

use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    Gemini,
    Hash,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL of the Generative Language API.
    pub endpoint: String,
    /// Per-call timeout; a timeout counts as a provider failure.
    pub timeout: Duration,
    /// Maximum in-flight provider calls.
    pub max_concurrency: usize,
    /// Output dimension of the hash provider.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_key: None,
            model: "text-embedding-004".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(15),
            max_concurrency: 4,
            dimension: 768,
        }
    }
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            provider: env("EMBEDDING_PROVIDER")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.provider),
            api_key: env("GEMINI_API_KEY"),
            model: env("EMBEDDING_MODEL").unwrap_or(defaults.model),
            endpoint: env("EMBEDDING_ENDPOINT")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoint),
            timeout: env("EMBEDDING_TIMEOUT_SECONDS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_concurrency: env("EMBEDDING_MAX_CONCURRENCY")
                .and_then(|v| v.parse::<usize>().ok())
                .map(|n| n.max(1))
                .unwrap_or(defaults.max_concurrency),
            dimension: env("EMBEDDING_DIMENSION")
                .and_then(|v| v.parse::<usize>().ok())
                .map(|n| n.max(1))
                .unwrap_or(defaults.dimension),
        }
    }
}
