use crate::core::analysis::{ImageId, RoomAnalysis, SizeClass};
use crate::core::cache::{CacheError, EmbeddingCache};
use crate::core::vector::{is_zero_vector, Embedding};
use crate::services::provider::EmbeddingProvider;
use crate::services::scheduler::RequestScheduler;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Describe a room in one paragraph for the embedding model.
pub fn room_summary(analysis: &RoomAnalysis) -> String {
    let mut parts = vec![
        format!("Room type: {}.", analysis.room_type.trim()),
        format!("Flooring: {}.", analysis.flooring.trim()),
        format!("Windows: {}.", analysis.windows),
    ];

    let lighting = analysis.lighting.trim();
    if !lighting.is_empty() {
        parts.push(format!("Lighting: {}.", lighting));
    }

    let features: Vec<&str> = analysis
        .features
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect();
    if !features.is_empty() {
        parts.push(format!("Features: {}.", features.join(", ")));
    }

    let dimensions = &analysis.dimensions;
    let mut size = Vec::new();
    if let Some(size_class) = &dimensions.size_class {
        let label = match size_class {
            SizeClass::Other(other) => other.trim().to_string(),
            known => String::from(known.clone()),
        };
        if !label.is_empty() {
            size.push(format!("{} size", label));
        }
    }
    if let Some(height) = dimensions.ceiling_height {
        size.push(format!("{} ft ceiling", height));
    }
    if let Some(sqft) = dimensions.square_footage {
        match (sqft.min, sqft.max) {
            (Some(min), Some(max)) => size.push(format!("{}-{} sq ft", min, max)),
            (Some(min), None) => size.push(format!("at least {} sq ft", min)),
            (None, Some(max)) => size.push(format!("up to {} sq ft", max)),
            (None, None) => {}
        }
    }
    if !size.is_empty() {
        parts.push(format!("Dimensions: {}.", size.join(", ")));
    }

    parts.join(" ")
}

/// Produces one embedding per room analysis.
///
/// Failures never propagate: a provider error or an unusable vector yields
/// an empty vector, which the scorer treats as "no embedding".
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    scheduler: Arc<RequestScheduler>,
    cache: Option<Arc<EmbeddingCache>>,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            scheduler: Arc::new(RequestScheduler::default()),
            cache: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<RequestScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn flush_cache(&self) -> Result<(), CacheError> {
        match &self.cache {
            Some(cache) => cache.flush(),
            None => Ok(()),
        }
    }

    pub async fn generate(&self, analysis: &RoomAnalysis) -> Embedding {
        let text = room_summary(analysis);
        let key = EmbeddingCache::key(self.provider.model(), &text);

        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(hit)) => {
                    log::debug!("Embedding cache hit for {}", analysis.image_id);
                    return hit;
                }
                Ok(None) => {}
                Err(e) => log::warn!("Embedding cache read failed for {}: {}", analysis.image_id, e),
            }
        }

        let result = self
            .scheduler
            .run(|| self.provider.embed(&text))
            .await;

        let embedding = match result {
            Ok(embedding) if !is_zero_vector(&embedding) => embedding,
            Ok(_) => {
                log::warn!(
                    "{} returned an unusable embedding for {}",
                    self.provider.provider_name(),
                    analysis.image_id
                );
                return Vec::new();
            }
            Err(e) => {
                log::warn!(
                    "Embedding generation failed for {}: {}",
                    analysis.image_id,
                    e
                );
                return Vec::new();
            }
        };

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.insert(&key, &embedding).await {
                log::warn!("Embedding cache write failed for {}: {}", analysis.image_id, e);
            }
        }

        embedding
    }

    /// Generate embeddings for every analysis concurrently and wait for all
    /// of them to settle. Repeated image ids are embedded once.
    pub async fn generate_all(&self, analyses: &[RoomAnalysis]) -> HashMap<ImageId, Embedding> {
        let mut seen = HashSet::new();
        let unique: Vec<&RoomAnalysis> = analyses
            .iter()
            .filter(|analysis| seen.insert(analysis.image_id.as_str()))
            .collect();

        let embeddings = join_all(unique.iter().map(|analysis| async move {
            (analysis.image_id.clone(), self.generate(analysis).await)
        }))
        .await;

        let available = embeddings.iter().filter(|(_, e)| !e.is_empty()).count();
        log::info!(
            "Generated {}/{} embeddings via {}",
            available,
            embeddings.len(),
            self.provider.provider_name()
        );

        embeddings.into_iter().collect()
    }
}
