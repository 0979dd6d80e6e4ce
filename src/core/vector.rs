/// A dense embedding. Empty means "no embedding available".
pub type Embedding = Vec<f32>;

/// Cosine similarity of two vectors, or `None` when the pair cannot be
/// compared: either side empty, lengths differ, or either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }

    let similarity = dot / denom;
    similarity.is_finite().then_some(similarity)
}

/// Returns `true` if every element is `0.0` (including the empty vector).
pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|f| *f == 0.0)
}
