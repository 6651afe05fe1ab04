/// Cosine similarity between two embedding vectors, in [-1, 1].
///
/// Returns `None` when the similarity is not computable: either vector is
/// empty or the lengths differ. A zero-norm vector yields `Some(0.0)` rather
/// than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        tracing::debug!(
            a_len = a.len(),
            b_len = b.len(),
            "embedding dimension mismatch; similarity not computable"
        );
        return None;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }

    Some((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Cosine over optional embeddings; a missing side is not computable.
pub fn cosine_opt(a: Option<&[f32]>, b: Option<&[f32]>) -> Option<f32> {
    cosine_similarity(a?, b?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn opposite_vectors_score_minus_one() {
        let sim = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn length_mismatch_is_not_computable() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 1.0]), None);
        assert_eq!(cosine_similarity(&[], &[]), None);
    }

    #[test]
    fn zero_vector_returns_zero_not_nan() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), Some(0.0));
    }

    #[test]
    fn missing_embedding_is_not_computable() {
        let v = vec![1.0, 0.0];
        assert_eq!(cosine_opt(None, Some(v.as_slice())), None);
        assert_eq!(cosine_opt(Some(v.as_slice()), Some(v.as_slice())), Some(1.0));
    }
}
