use async_trait::async_trait;
use stagers::core::grouping::RoomGrouper;
use stagers::services::{EmbeddingError, EmbeddingProvider, NullEmbeddingProvider, RequestScheduler};
use stagers::{
    group_rooms, group_rooms_with_embeddings, EmbeddingGenerator, RoomAnalysis, RoomGroup,
    SimilarityScorer,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct FailingProvider;

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::InvalidResponse {
            provider: "failing".to_string(),
            message: "quota exceeded".to_string(),
        })
    }

    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model(&self) -> &str {
        "failing-1"
    }
}

fn generator(provider: Arc<dyn EmbeddingProvider>) -> EmbeddingGenerator {
    EmbeddingGenerator::new(provider).with_scheduler(Arc::new(RequestScheduler::unthrottled()))
}

fn living_room(id: &str, windows: u32, features: &[&str]) -> RoomAnalysis {
    RoomAnalysis::new(id, "Living Room", "hardwood")
        .with_windows(windows)
        .with_features(features.iter().copied())
}

fn ids(group: &RoomGroup) -> Vec<&str> {
    group.image_ids.iter().map(String::as_str).collect()
}

/// Small deterministic generator so the partition checks need no extra crates.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn random_analyses(seed: u64, count: usize) -> Vec<RoomAnalysis> {
    let room_types = ["Living Room", "Kitchen", "Bedroom"];
    let floorings = ["hardwood", "tile", "carpet"];
    let tags = ["fireplace", "island", "bay window", "crown molding", "ceiling fan", "closet"];
    let mut rng = Lcg(seed);

    (0..count)
        .map(|i| {
            let features: Vec<&str> = tags
                .iter()
                .copied()
                .filter(|_| rng.next(2) == 0)
                .collect();
            RoomAnalysis::new(
                format!("img{}", i),
                room_types[rng.next(room_types.len() as u64) as usize],
                floorings[rng.next(floorings.len() as u64) as usize],
            )
            .with_windows(rng.next(5) as u32)
            .with_features(features)
        })
        .collect()
}

fn assert_partition(analyses: &[RoomAnalysis], groups: &[RoomGroup]) {
    let expected: HashSet<&str> = analyses.iter().map(|a| a.image_id.as_str()).collect();
    let grouped: Vec<&str> = groups.iter().flat_map(|g| ids(g)).collect();
    let unique: HashSet<&str> = grouped.iter().copied().collect();

    assert_eq!(grouped.len(), unique.len(), "an image landed in two groups");
    assert_eq!(unique, expected);

    let room_types: HashMap<&str, &str> = analyses
        .iter()
        .map(|a| (a.image_id.as_str(), a.room_type.as_str()))
        .collect();
    for group in groups {
        assert!(!group.is_empty());
        assert!(group
            .image_ids
            .iter()
            .all(|id| room_types[id.as_str()] == group.room_type));
    }
}

#[test]
fn test_scenario_a_matching_living_rooms() {
    let a = living_room("a", 2, &["fireplace", "bay window"]);
    let b = living_room("b", 2, &["fireplace", "bay window", "crown molding"]);

    assert!(SimilarityScorer::new().is_same_room(&a, &b));

    let groups = group_rooms(&[a, b]);
    assert_eq!(groups.len(), 1);
    assert_eq!(ids(&groups[0]), vec!["a", "b"]);
    assert_eq!(groups[0].similarity, 0.6);
}

#[test]
fn test_scenario_b_window_difference_splits() {
    let a = living_room("a", 2, &["fireplace", "bay window"]);
    let b = living_room("b", 4, &["fireplace", "bay window", "crown molding"]);

    let scorer = SimilarityScorer::new();
    assert!(scorer.feature_overlap(&a, &b) > 0.6);
    assert!(!scorer.is_same_room(&a, &b));

    let groups = group_rooms(&[a, b]);
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|g| g.similarity == 1.0));
}

#[test]
fn test_scenario_c_founder_only_is_not_transitive() {
    let kitchen = |id: &str, windows: u32, features: &[&str]| {
        RoomAnalysis::new(id, "Kitchen", "hardwood")
            .with_windows(windows)
            .with_features(features.iter().copied())
    };
    let analyses = vec![
        kitchen("image1", 0, &["a", "b"]),
        kitchen("image2", 1, &["a", "b", "c", "d"]),
        kitchen("image3", 2, &["c", "d"]),
    ];

    let scorer = SimilarityScorer::new();
    let score_12 = scorer.weighted_score(&analyses[0], &analyses[1], &[], &[]);
    let score_23 = scorer.weighted_score(&analyses[1], &analyses[2], &[], &[]);
    let score_13 = scorer.weighted_score(&analyses[0], &analyses[2], &[], &[]);
    assert!(score_12 >= 0.65, "image1/image2 scored {}", score_12);
    assert!(score_23 >= 0.65, "image2/image3 scored {}", score_23);
    assert!(score_13 < 0.65, "image1/image3 scored {}", score_13);

    let groups = RoomGrouper::new().group_with_embeddings(&analyses, &HashMap::new());
    assert_eq!(groups.len(), 2);
    assert_eq!(ids(&groups[0]), vec!["image1", "image2"]);
    assert_eq!(groups[0].similarity, 0.65);
    assert_eq!(ids(&groups[1]), vec!["image3"]);
    assert_eq!(groups[1].similarity, 1.0);
}

#[test]
fn test_scenario_d_room_types_never_mix() {
    let analyses = vec![
        living_room("r1", 2, &["fireplace", "bay window"]),
        RoomAnalysis::new("b1", "Bedroom", "carpet")
            .with_windows(1)
            .with_features(["closet"]),
        living_room("r2", 2, &["fireplace", "bay window", "crown molding"]),
        RoomAnalysis::new("b2", "Bedroom", "carpet")
            .with_windows(1)
            .with_features(["closet", "ceiling fan"]),
        RoomAnalysis::new("r3", "Living Room", "tile")
            .with_windows(2)
            .with_features(["fireplace", "bay window"]),
    ];

    let groups = group_rooms(&analyses);
    assert_partition(&analyses, &groups);

    let layout: Vec<Vec<&str>> = groups.iter().map(ids).collect();
    assert_eq!(
        layout,
        vec![vec!["r1", "r2"], vec!["b1"], vec!["b2"], vec!["r3"]]
    );
    for group in groups.iter().filter(|g| g.is_singleton()) {
        assert_eq!(group.similarity, 1.0);
    }
}

#[test]
fn test_partition_completeness_basic() {
    for seed in [1, 7, 42, 1234] {
        let analyses = random_analyses(seed, 40);
        let groups = group_rooms(&analyses);
        assert_partition(&analyses, &groups);
    }
}

#[tokio::test]
async fn test_partition_completeness_weighted() {
    let generator = generator(Arc::new(NullEmbeddingProvider::new()));

    for seed in [3, 99] {
        let analyses = random_analyses(seed, 30);
        let groups = group_rooms_with_embeddings(&analyses, &generator).await;
        assert_partition(&analyses, &groups);
        for group in &groups {
            let expected = if group.is_singleton() { 1.0 } else { 0.65 };
            assert_eq!(group.similarity, expected);
        }
    }
}

#[test]
fn test_repeated_image_id_keeps_first() {
    let analyses = vec![
        living_room("a", 2, &["fireplace"]),
        RoomAnalysis::new("a", "Kitchen", "tile"),
        living_room("b", 2, &["fireplace"]),
    ];

    let groups = group_rooms(&analyses);
    assert_eq!(groups.len(), 1);
    assert_eq!(ids(&groups[0]), vec!["a", "b"]);
    assert_eq!(groups[0].room_type, "Living Room");
}

#[test]
fn test_empty_input_yields_no_groups() {
    assert!(group_rooms(&[]).is_empty());
}

#[tokio::test]
async fn test_failed_embeddings_fall_back_to_other_signals() {
    let analyses = vec![
        living_room("a", 2, &["fireplace", "bay window"]),
        living_room("b", 3, &["fireplace", "bay window", "crown molding"]),
        RoomAnalysis::new("c", "Living Room", "carpet").with_windows(0),
    ];

    let generator = generator(Arc::new(FailingProvider));
    let with_failures = group_rooms_with_embeddings(&analyses, &generator).await;
    let without_embeddings = RoomGrouper::new().group_with_embeddings(&analyses, &HashMap::new());

    assert_eq!(with_failures, without_embeddings);
    assert_eq!(ids(&with_failures[0]), vec!["a", "b"]);
    assert_eq!(ids(&with_failures[1]), vec!["c"]);
}
