use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingConfig, EmbeddingError, EmbeddingProvider};

/// Google Generative Language `embedContent` client.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Option<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(EmbeddingError::MissingCredentials("GEMINI_API_KEY"))?;

        // The guard owns the per-call timeout; this one only bounds a
        // connection that never completes.
        let client = reqwest::Client::builder()
            .timeout(config.timeout * 2)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:embedContent", self.endpoint, self.model)
    }
}

fn parse_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let parsed: EmbedResponse = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

    match parsed.embedding {
        Some(EmbeddingValues { values }) if !values.is_empty() => Ok(values),
        _ => Err(EmbeddingError::InvalidResponse(
            "response has no embedding values".to_string(),
        )),
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let request = EmbedRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        let values = parse_response(&body)?;
        debug!(model = %self.model, dimension = values.len(), "gemini embedding received");
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(&EmbeddingConfig {
            api_key: Some("test-key".into()),
            ..EmbeddingConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn builds_embed_content_url() {
        assert_eq!(
            provider().url(),
            "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent"
        );
    }

    #[test]
    fn request_body_shape() {
        let request = EmbedRequest {
            model: "models/text-embedding-004".into(),
            content: Content {
                parts: vec![Part { text: "hello" }],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "models/text-embedding-004");
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
    }

    #[test]
    fn parses_values_and_rejects_empty_payloads() {
        let values = parse_response(r#"{"embedding":{"values":[0.1,0.2,0.3]}}"#).unwrap();
        assert_eq!(values, vec![0.1, 0.2, 0.3]);

        assert!(matches!(
            parse_response(r#"{"embedding":{"values":[]}}"#),
            Err(EmbeddingError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(r#"{"error":"quota"}"#),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn empty_text_never_reaches_the_network() {
        assert!(matches!(
            provider().embed("").await,
            Err(EmbeddingError::EmptyInput)
        ));
    }
}
