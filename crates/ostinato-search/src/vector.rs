//! Vector arithmetic shared by the builder, the index, and the engine.

/// Euclidean (L2) norm.
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place.
///
/// A zero vector has no direction and is left as is; returns `false` in
/// that case.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Squared Euclidean distance. For unit vectors this equals `2 − 2·cos θ`.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Cosine similarity in `[-1, 1]`; zero when either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        assert!(l2_normalize(&mut v));
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_untouched() {
        let mut v = vec![0.0; 4];
        assert!(!l2_normalize(&mut v));
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn test_squared_l2_of_unit_vectors_tracks_cosine() {
        let mut a = vec![1.0, 2.0, 3.0];
        let mut b = vec![-2.0, 0.5, 1.0];
        l2_normalize(&mut a);
        l2_normalize(&mut b);

        let expected = 2.0 - 2.0 * cosine_similarity(&a, &b);
        assert!((squared_l2(&a, &b) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
