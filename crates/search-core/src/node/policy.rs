//! Move-distribution helpers: visit-count policies, softmax, entropy and the
//! exported training sample.

use serde::Serialize;

/// Convert child visit counts into a probability distribution over the
/// legal-move index space, temperature-scaled by `tau`.
///
/// - `tau == 0`: greedy. All children tied at the maximum count (unexpanded
///   children count as 0) share the probability mass equally.
/// - `tau == 1`: proportional. An all-zero count vector is returned as-is
///   (degenerate, not an error).
/// - otherwise: counts are raised to `1/tau` before normalization.
pub fn visit_count_policy(counts: &[u32], tau: f64) -> Vec<f32> {
    let n = counts.len();
    if n == 0 {
        return Vec::new();
    }

    if tau == 0.0 {
        let max = counts.iter().copied().max().unwrap_or(0);
        let ties = counts.iter().filter(|&&c| c == max).count();
        let share = 1.0 / ties as f32;
        return counts
            .iter()
            .map(|&c| if c == max { share } else { 0.0 })
            .collect();
    }

    let weights: Vec<f64> = if tau == 1.0 {
        counts.iter().map(|&c| f64::from(c)).collect()
    } else {
        let exponent = 1.0 / tau;
        counts.iter().map(|&c| f64::from(c).powf(exponent)).collect()
    };

    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        // All counts zero: leave the zero vector unnormalized.
        return vec![0.0; n];
    }
    weights.iter().map(|&w| (w / sum) as f32).collect()
}

/// Numerically stable softmax. A degenerate input (no finite logit, or an
/// overflowed sum) falls back to the uniform distribution.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let n = logits.len();
    if n == 0 {
        return Vec::new();
    }

    let max = logits
        .iter()
        .copied()
        .filter(|l| l.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        log::warn!("softmax over {n} non-finite logits, falling back to uniform");
        return vec![1.0 / n as f32; n];
    }

    let mut out: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = out.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        log::warn!("softmax sum degenerate ({sum}), falling back to uniform");
        return vec![1.0 / n as f32; n];
    }
    for v in &mut out {
        *v /= sum;
    }
    out
}

/// Shannon entropy (natural log) of `dist`, divided by `ln(len)` so the
/// result lies in `[0, 1]`. Defined as 0 for 0 or 1 entries.
pub fn normalised_entropy(dist: &[f32]) -> f64 {
    let n = dist.len();
    if n <= 1 {
        return 0.0;
    }
    let mut entropy = 0.0f64;
    for &p in dist {
        if p > 0.0 {
            let p = f64::from(p);
            entropy -= p * p.ln();
        }
    }
    entropy / (n as f64).ln()
}

/// One exported training sample: the legal moves at a node (with
/// post-processing stripped), the `tau = 1` visit-count policy and a
/// per-move value estimate for the mover.
#[derive(Clone, Debug, Serialize)]
pub struct ExItExperience<M> {
    pub moves: Vec<M>,
    pub policy: Vec<f32>,
    /// Child average score for the mover, or -1.0 for an unexpanded child.
    pub value_estimates: Vec<f64>,
}
