//! Gemini embedding provider
//!
//! Calls the `embedContent` endpoint of Google's Generative Language API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::services::provider::{EmbeddingError, EmbeddingProvider};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROVIDER_NAME: &str = "gemini";

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

pub struct GeminiEmbeddingProvider {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl GeminiEmbeddingProvider {
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| EmbeddingError::MissingApiKey {
                provider: PROVIDER_NAME.to_string(),
            })?;

        let base_url = base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            base_url,
            model,
            timeout,
            http_client,
        })
    }

    /// Model name without the `models/` prefix the API sometimes echoes back.
    pub fn api_model_name(&self) -> &str {
        self.model.strip_prefix("models/").unwrap_or(&self.model)
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:embedContent",
            self.base_url,
            self.api_model_name()
        )
    }

    fn parse_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response: EmbedContentResponse =
            serde_json::from_str(body).map_err(|e| EmbeddingError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })?;
        Ok(response.embedding.values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let payload = serde_json::json!({
            "content": { "parts": [{ "text": text }] }
        });

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EmbeddingError::Status {
                provider: PROVIDER_NAME.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let values = Self::parse_response(&body)?;
        if values.is_empty() {
            return Err(EmbeddingError::EmptyEmbedding);
        }
        Ok(values)
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }
}
