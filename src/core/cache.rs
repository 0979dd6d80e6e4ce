use crate::core::vector::Embedding;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Embedding cache keyed by model and summary text.
///
/// Lookups hit memory first, then the optional on-disk sled tree; disk hits
/// are promoted into memory.
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, Embedding>>,
    store: Option<sled::Db>,
}

impl EmbeddingCache {
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let store = sled::open(path)?;
        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            store: Some(store),
        })
    }

    pub fn key(model: &str, text: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(model.as_bytes());
        hasher.update(b"\n");
        hasher.update(text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    pub async fn get(&self, key: &str) -> Result<Option<Embedding>, CacheError> {
        if let Some(hit) = self.entries.read().await.get(key) {
            return Ok(Some(hit.clone()));
        }

        let Some(store) = &self.store else {
            return Ok(None);
        };

        match store.get(key)? {
            Some(bytes) => {
                let embedding: Embedding = serde_json::from_slice(&bytes)?;
                self.entries
                    .write()
                    .await
                    .insert(key.to_string(), embedding.clone());
                Ok(Some(embedding))
            }
            None => Ok(None),
        }
    }

    pub async fn insert(&self, key: &str, embedding: &[f32]) -> Result<(), CacheError> {
        if let Some(store) = &self.store {
            let bytes = serde_json::to_vec(embedding)?;
            store.insert(key, bytes)?;
        }
        self.entries
            .write()
            .await
            .insert(key.to_string(), embedding.to_vec());
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn flush(&self) -> Result<(), CacheError> {
        if let Some(store) = &self.store {
            store.flush()?;
        }
        Ok(())
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::in_memory()
    }
}
