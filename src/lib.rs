pub mod config;
pub mod core;
pub mod database;
pub mod services;

pub use crate::core::analysis::{RoomAnalysis, RoomDimensions, SizeClass, SquareFootage};
pub use crate::core::embedding::EmbeddingGenerator;
pub use crate::core::grouping::{group_rooms, group_rooms_with_embeddings, RoomGroup, RoomGrouper};
pub use crate::core::similarity::{SimilarityBreakdown, SimilarityScorer};
