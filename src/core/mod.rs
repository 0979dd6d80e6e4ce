// Room grouping core
// - analysis records as produced by the vision step
// - pairwise scoring (basic gate and weighted multi-signal)
// - founder-only greedy grouping
// - embedding generation, caching and vector math

pub mod analysis;
pub mod cache;
pub mod embedding;
pub mod grouping;
pub mod similarity;
pub mod vector;
