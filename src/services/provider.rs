use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("No API key configured for {provider}")]
    MissingApiKey { provider: String },

    #[error("Embedding provider returned an empty vector")]
    EmptyEmbedding,
}

/// Turns text into a dense vector.
///
/// Implementations report failures as errors; turning a failure into
/// "no embedding" is the caller's decision (see `EmbeddingGenerator`).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Short identifier, e.g. "gemini".
    fn provider_name(&self) -> &str;

    /// Model identifier; part of the cache key.
    fn model(&self) -> &str;
}
