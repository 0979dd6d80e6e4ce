//! Offline embedding provider with deterministic output.

use async_trait::async_trait;

use crate::services::provider::{EmbeddingError, EmbeddingProvider};

pub const NULL_EMBEDDING_DIMENSIONS: usize = 384;

/// Returns a fixed-size vector derived from the input text. Equal texts give
/// equal vectors, which is enough for dry runs and tests.
pub struct NullEmbeddingProvider;

impl NullEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let hash = blake3::hash(text.as_bytes());
        let bytes = hash.as_bytes();

        let vector = (0..NULL_EMBEDDING_DIMENSIONS)
            .map(|i| {
                let byte = bytes[i % bytes.len()] as f32 / 255.0;
                let variation = ((i as f32) * 0.01).sin() * 0.1;
                (byte + variation).clamp(0.0, 1.0)
            })
            .collect();

        Ok(vector)
    }

    fn provider_name(&self) -> &str {
        "null"
    }

    fn model(&self) -> &str {
        "null-test"
    }
}
