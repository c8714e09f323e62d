//! Synthetic source distributions and residual sampling.
//!
//! Predictor residuals of natural images are well modeled by a two-sided
//! Laplacian centered at zero, wrapped into bytes. These helpers build such
//! distributions (plus the geometric family), measure their entropy and
//! sample i.i.d. blocks from them, for training, testing and benchmarks.

use rand::distributions::Distribution;
use rand::Rng;
use rand_distr::weighted_alias::WeightedAliasIndex;

/// Shannon entropy of a (not necessarily normalized) distribution, in bits.
pub fn entropy(pmf: &[f64]) -> f64 {
    let total: f64 = pmf.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    pmf.iter()
        .filter(|p| **p > 0.0)
        .map(|p| {
            let p = p / total;
            -p * p.log2()
        })
        .sum()
}

/// Geometric distribution `p(k) ∝ ratio^(k+1)` clamped to 256 symbols and
/// renormalized.
pub fn geometric_pmf(ratio: f64) -> Vec<f64> {
    let mut pmf: Vec<f64> = (0..256).map(|k| ratio.powi(k + 1)).collect();
    let total: f64 = pmf.iter().sum();
    pmf.iter_mut().for_each(|p| *p /= total);
    pmf
}

/// Two-sided Laplacian over bytes: residual `r` is interpreted as the
/// signed difference `r` or `r - 256`, whichever is closer to zero, and
/// `p(r) ∝ exp(-|r| / scale)`.
pub fn laplacian_pmf(scale: f64) -> Vec<f64> {
    let mut pmf: Vec<f64> = (0..256i32)
        .map(|r| {
            let signed = if r < 128 { r } else { r - 256 };
            (-(signed.abs() as f64) / scale).exp()
        })
        .collect();
    let total: f64 = pmf.iter().sum();
    pmf.iter_mut().for_each(|p| *p /= total);
    pmf
}

/// Laplacian whose entropy is close to `target_bits`, found by bisection on
/// the scale. Targets outside (0, 8) are clamped to the representable range.
pub fn laplacian_pmf_for_entropy(target_bits: f64) -> Vec<f64> {
    let target = target_bits.clamp(0.01, 7.99);
    let (mut lo, mut hi) = (1e-3f64, 1e3f64);
    for _ in 0..64 {
        let mid = (lo * hi).sqrt();
        if entropy(&laplacian_pmf(mid)) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    laplacian_pmf((lo * hi).sqrt())
}

/// Samples a block of `len` i.i.d. symbols from `pmf`.
pub fn sample_block<R: Rng>(pmf: &[f64], len: usize, rng: &mut R) -> Vec<u8> {
    let index = WeightedAliasIndex::new(pmf.to_vec())
        .expect("sampling needs a finite, non-negative, non-degenerate distribution");
    (0..len).map(|_| index.sample(rng) as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn geometric_mass_is_normalized() {
        let pmf = geometric_pmf(0.5);
        assert!((pmf.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(pmf[0] > pmf[1]);
    }

    #[test]
    fn laplacian_is_symmetric_around_zero() {
        let pmf = laplacian_pmf(4.0);
        assert!((pmf[1] - pmf[255]).abs() < 1e-12);
        assert!(pmf[0] > pmf[1]);
    }

    #[test]
    fn entropy_bisection_hits_target() {
        for target in [2.0, 4.0, 6.0] {
            let pmf = laplacian_pmf_for_entropy(target);
            assert!((entropy(&pmf) - target).abs() < 0.05, "target {target}");
        }
    }

    #[test]
    fn sampling_respects_support() {
        let mut pmf = vec![0.0; 256];
        pmf[3] = 0.5;
        pmf[9] = 0.5;
        let mut rng = SmallRng::seed_from_u64(7);
        let block = sample_block(&pmf, 512, &mut rng);
        assert!(block.iter().all(|&b| b == 3 || b == 9));
    }
}
