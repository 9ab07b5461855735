//! Vector norms, similarity and pooling.
//!
//! Sums run in `f64` so that finite `f32` inputs near either end of the
//! range neither underflow to zero nor overflow to infinity.

fn sum_sq(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum()
}

/// Compute the L2 (Euclidean) norm of a vector.
#[allow(clippy::cast_possible_truncation)]
pub fn l2_norm(v: &[f32]) -> f32 {
    sum_sq(v).sqrt() as f32
}

/// L2-normalize a vector in-place. Zero vectors remain zero.
#[allow(clippy::cast_possible_truncation)]
pub fn l2_normalize(v: &mut [f32]) {
    let norm = sum_sq(v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (f64::from(*x) / norm) as f32;
        }
    }
}

/// Cosine similarity: `dot(a, b) / (‖a‖·‖b‖)`, clamped to `[-1, 1]`.
///
/// Returns `None` when the lengths differ. A zero vector on either side
/// scores `0.0`.
#[allow(clippy::cast_possible_truncation)]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    let norm_a = sum_sq(a).sqrt();
    let norm_b = sum_sq(b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some((dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32)
}

/// Masked mean pooling over token embeddings.
///
/// `hidden` is a flat `[batch, seq_len, dim]` buffer and `mask` a flat
/// `[batch, seq_len]` attention mask. Padding positions are excluded; an
/// item with no unmasked tokens pools to zeros.
pub fn mean_pool(
    hidden: &[f32],
    mask: &[i64],
    batch: usize,
    seq_len: usize,
    dim: usize,
) -> Vec<Vec<f32>> {
    (0..batch)
        .map(|i| {
            let mut pooled = vec![0.0_f32; dim];
            let mut count = 0_usize;
            for j in 0..seq_len {
                if mask.get(i * seq_len + j).copied().unwrap_or(0) == 0 {
                    continue;
                }
                let base = (i * seq_len + j) * dim;
                let Some(token) = hidden.get(base..base + dim) else {
                    break;
                };
                for (acc, x) in pooled.iter_mut().zip(token) {
                    *acc += x;
                }
                count += 1;
            }
            if count > 0 {
                let n = count as f32;
                for x in &mut pooled {
                    *x /= n;
                }
            }
            pooled
        })
        .collect()
}
