use crate::core::analysis::{ImageId, RoomAnalysis};
use crate::core::embedding::EmbeddingGenerator;
use crate::core::similarity::{SignalWeights, SimilarityScorer};
use crate::core::vector::Embedding;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Reported similarity for a group with a single member.
pub const SINGLETON_SIMILARITY: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Feature overlap must exceed this for the basic verdict.
    pub feature_gate: f64,
    /// Maximum window-count difference for the basic verdict.
    pub window_tolerance: u32,
    /// Window difference at which the weighted window term reaches 0.
    pub window_decay: f64,
    /// Weighted score at or above this joins the founder's group.
    pub match_threshold: f64,
    pub weights: SignalWeights,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            feature_gate: 0.6,
            window_tolerance: 1,
            window_decay: 3.0,
            match_threshold: 0.65,
            weights: SignalWeights::default(),
        }
    }
}

/// A set of images judged to show the same physical room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomGroup {
    /// Founder first, then members in input order.
    pub image_ids: Vec<ImageId>,
    pub room_type: String,
    /// The acceptance threshold for multi-member groups, 1.0 for singletons.
    /// Not a measured pairwise score.
    pub similarity: f64,
}

impl RoomGroup {
    pub fn len(&self) -> usize {
        self.image_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_ids.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.image_ids.len() == 1
    }

    pub fn founder(&self) -> Option<&str> {
        self.image_ids.first().map(String::as_str)
    }
}

/// Greedy founder-only grouping.
///
/// One left-to-right pass: each unprocessed image founds a group, then every
/// later unprocessed image is compared against the founder only (never
/// against other members) and joins on a match. Membership is never
/// revisited, so the result depends on input order and is not the
/// transitive closure of the pairwise matches.
#[derive(Debug, Clone)]
pub struct RoomGrouper {
    config: GroupingConfig,
    scorer: SimilarityScorer,
}

impl RoomGrouper {
    pub fn new() -> Self {
        Self::with_config(GroupingConfig::default())
    }

    pub fn with_config(config: GroupingConfig) -> Self {
        let scorer = SimilarityScorer::from_config(&config);
        Self { config, scorer }
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Basic path: feature gate, exact flooring and window tolerance.
    pub fn group(&self, analyses: &[RoomAnalysis]) -> Vec<RoomGroup> {
        let groups = self.partition(analyses, self.config.feature_gate, |founder, candidate| {
            self.scorer.is_same_room(founder, candidate)
        });
        log::info!(
            "Grouped {} images into {} rooms (feature overlap)",
            analyses.len(),
            groups.len()
        );
        groups
    }

    /// Weighted path over embeddings that were already generated. Images
    /// missing from `embeddings` are scored without the embedding term.
    pub fn group_with_embeddings(
        &self,
        analyses: &[RoomAnalysis],
        embeddings: &HashMap<ImageId, Embedding>,
    ) -> Vec<RoomGroup> {
        let threshold = self.config.match_threshold;
        let groups = self.partition(analyses, threshold, |founder, candidate| {
            let embedding_a = lookup(embeddings, &founder.image_id);
            let embedding_b = lookup(embeddings, &candidate.image_id);
            let score = self
                .scorer
                .weighted_score(founder, candidate, embedding_a, embedding_b);
            log::debug!(
                "{} vs {}: {:.3}",
                founder.image_id,
                candidate.image_id,
                score
            );
            score >= threshold
        });
        log::info!(
            "Grouped {} images into {} rooms (weighted, threshold {:.2})",
            analyses.len(),
            groups.len(),
            threshold
        );
        groups
    }

    /// Weighted path: generate every embedding first, then group. The
    /// rayon scan runs on tokio's blocking pool, off the async workers.
    pub async fn group_with_generator(
        &self,
        analyses: &[RoomAnalysis],
        generator: &EmbeddingGenerator,
    ) -> Vec<RoomGroup> {
        let embeddings = Arc::new(generator.generate_all(analyses).await);

        let grouper = self.clone();
        let owned = analyses.to_vec();
        let shared = Arc::clone(&embeddings);
        let scan = tokio::task::spawn_blocking(move || grouper.group_with_embeddings(&owned, &shared));

        match scan.await {
            Ok(groups) => groups,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                log::warn!("Blocking grouping task did not run ({}), grouping inline", e);
                self.group_with_embeddings(analyses, &embeddings)
            }
        }
    }

    fn partition<F>(&self, analyses: &[RoomAnalysis], threshold: f64, matches: F) -> Vec<RoomGroup>
    where
        F: Fn(&RoomAnalysis, &RoomAnalysis) -> bool + Sync,
    {
        let analyses = unique_by_id(analyses);
        let mut processed = vec![false; analyses.len()];
        let mut groups = Vec::new();

        for i in 0..analyses.len() {
            if processed[i] {
                continue;
            }
            processed[i] = true;
            let founder = analyses[i];

            let candidates: Vec<usize> = ((i + 1)..analyses.len())
                .filter(|&j| !processed[j])
                .collect();

            // Each candidate is judged against the founder alone, so the
            // scores are independent of one another.
            let joined: Vec<bool> = candidates
                .par_iter()
                .map(|&j| matches(founder, analyses[j]))
                .collect();

            let mut image_ids = vec![founder.image_id.clone()];
            for (&j, is_match) in candidates.iter().zip(joined) {
                if is_match {
                    processed[j] = true;
                    image_ids.push(analyses[j].image_id.clone());
                }
            }

            let similarity = if image_ids.len() > 1 {
                threshold
            } else {
                SINGLETON_SIMILARITY
            };

            groups.push(RoomGroup {
                image_ids,
                room_type: founder.room_type.clone(),
                similarity,
            });
        }

        groups
    }
}

impl Default for RoomGrouper {
    fn default() -> Self {
        Self::new()
    }
}

/// Group with the basic feature/flooring/window verdict and default settings.
pub fn group_rooms(analyses: &[RoomAnalysis]) -> Vec<RoomGroup> {
    RoomGrouper::new().group(analyses)
}

/// Group with the weighted scorer, generating embeddings through `generator`.
/// Embedding failures degrade to the non-embedding signals.
pub async fn group_rooms_with_embeddings(
    analyses: &[RoomAnalysis],
    generator: &EmbeddingGenerator,
) -> Vec<RoomGroup> {
    RoomGrouper::new()
        .group_with_generator(analyses, generator)
        .await
}

fn lookup<'a>(embeddings: &'a HashMap<ImageId, Embedding>, image_id: &str) -> &'a [f32] {
    embeddings
        .get(image_id)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn unique_by_id(analyses: &[RoomAnalysis]) -> Vec<&RoomAnalysis> {
    let mut seen = HashSet::new();
    analyses
        .iter()
        .filter(|analysis| {
            let first = seen.insert(analysis.image_id.as_str());
            if !first {
                log::warn!("Skipping duplicate analysis for image {}", analysis.image_id);
            }
            first
        })
        .collect()
}
