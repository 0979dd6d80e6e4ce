use crate::core::analysis::RoomAnalysis;
use crate::core::grouping::GroupingConfig;
use crate::core::vector::cosine_similarity;
use serde::{Deserialize, Serialize};

/// Relative weight of each signal in the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub flooring: f64,
    pub windows: f64,
    pub features: f64,
    pub embedding: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            flooring: 0.30,
            windows: 0.25,
            features: 0.25,
            embedding: 0.20,
        }
    }
}

impl SignalWeights {
    pub fn total(&self) -> f64 {
        self.flooring + self.windows + self.features + self.embedding
    }
}

/// Per-signal view of one pair, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityBreakdown {
    pub room_type_match: bool,
    pub flooring: f64,
    pub windows: f64,
    pub features: f64,
    /// `None` when the embedding term was excluded from the score.
    pub embedding: Option<f64>,
    /// Informational only, never part of `score`.
    pub lighting_match: bool,
    pub score: f64,
}

/// Pairwise room scorer.
///
/// Two modes share the same inputs:
/// - `is_same_room`: room-type gate, feature-overlap gate, then exact
///   flooring and a window-count tolerance.
/// - `weighted_score`: room-type gate, then a weighted mean of the
///   available signals. A signal that cannot be computed drops out of both
///   numerator and denominator.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    feature_gate: f64,
    window_tolerance: u32,
    window_decay: f64,
    weights: SignalWeights,
}

impl SimilarityScorer {
    pub fn new() -> Self {
        Self::from_config(&GroupingConfig::default())
    }

    pub fn from_config(config: &GroupingConfig) -> Self {
        Self {
            feature_gate: config.feature_gate,
            window_tolerance: config.window_tolerance,
            window_decay: config.window_decay,
            weights: config.weights,
        }
    }

    pub fn weights(&self) -> &SignalWeights {
        &self.weights
    }

    /// Jaccard overlap of the lower-cased feature tags; 0 when both are empty.
    pub fn feature_overlap(&self, a: &RoomAnalysis, b: &RoomAnalysis) -> f64 {
        let features_a = a.feature_set();
        let features_b = b.feature_set();

        let common = features_a.intersection(&features_b).count();
        let total = features_a.union(&features_b).count();

        if total == 0 {
            0.0
        } else {
            common as f64 / total as f64
        }
    }

    /// Linear decay from 1 at equal counts to 0 at `window_decay` apart.
    pub fn window_closeness(&self, a: &RoomAnalysis, b: &RoomAnalysis) -> f64 {
        if self.window_decay <= 0.0 {
            return if a.windows == b.windows { 1.0 } else { 0.0 };
        }
        let diff = a.windows.abs_diff(b.windows) as f64;
        (1.0 - diff / self.window_decay).max(0.0)
    }

    pub fn flooring_match(&self, a: &RoomAnalysis, b: &RoomAnalysis) -> f64 {
        if a.flooring == b.flooring {
            1.0
        } else {
            0.0
        }
    }

    /// Basic same-room verdict used when no embeddings are available.
    pub fn is_same_room(&self, a: &RoomAnalysis, b: &RoomAnalysis) -> bool {
        if a.room_type != b.room_type {
            return false;
        }

        if self.feature_overlap(a, b) <= self.feature_gate {
            return false;
        }

        a.flooring == b.flooring && a.windows.abs_diff(b.windows) <= self.window_tolerance
    }

    /// Weighted multi-signal score. In [-0.2, 1] with default weights;
    /// negative only when the raw cosine term is negative. Pass empty slices
    /// when embeddings are not available.
    pub fn weighted_score(
        &self,
        a: &RoomAnalysis,
        b: &RoomAnalysis,
        embedding_a: &[f32],
        embedding_b: &[f32],
    ) -> f64 {
        self.breakdown(a, b, embedding_a, embedding_b).score
    }

    pub fn breakdown(
        &self,
        a: &RoomAnalysis,
        b: &RoomAnalysis,
        embedding_a: &[f32],
        embedding_b: &[f32],
    ) -> SimilarityBreakdown {
        let flooring = self.flooring_match(a, b);
        let windows = self.window_closeness(a, b);
        let features = self.feature_overlap(a, b);
        let embedding = cosine_similarity(embedding_a, embedding_b);
        let lighting_match = a.lighting.trim().eq_ignore_ascii_case(b.lighting.trim());
        let room_type_match = a.room_type == b.room_type;

        let score = if room_type_match {
            let mut weighted_sum = self.weights.flooring * flooring
                + self.weights.windows * windows
                + self.weights.features * features;
            let mut total_weight = self.weights.flooring + self.weights.windows + self.weights.features;

            if let Some(cosine) = embedding {
                weighted_sum += self.weights.embedding * cosine;
                total_weight += self.weights.embedding;
            }

            if total_weight > 0.0 {
                weighted_sum / total_weight
            } else {
                0.0
            }
        } else {
            0.0
        };

        SimilarityBreakdown {
            room_type_match,
            flooring,
            windows,
            features,
            embedding,
            lighting_match,
            score,
        }
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new()
    }
}
