/*
 * Shared helpers and constants for the integration tests.
 */

use rand::rngs::SmallRng;
use rand::SeedableRng;

use marlin_codec::{distribution, CodecConfig, MarlinCodec};

/// Deterministic seed so failures reproduce.
#[allow(dead_code)]
pub const SEED: u64 = 0x5eed;

/// The geometric source used by most tests: `p(k) = (1/2)^(k+1)`.
pub fn geometric_codec(config: CodecConfig) -> MarlinCodec {
    MarlinCodec::new(&distribution::geometric_pmf(0.5), config).unwrap()
}

/// Samples an i.i.d. block from the given distribution.
#[allow(dead_code)]
pub fn sample(pmf: &[f64], len: usize, seed: u64) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(seed);
    distribution::sample_block(pmf, len, &mut rng)
}

/// Round-trips one block through a codec and checks equality.
#[allow(dead_code)]
pub fn assert_round_trip(codec: &MarlinCodec, block: &[u8]) {
    let encoded = codec.compress(block);
    assert!(encoded.len() <= block.len().max(1));
    let decoded = codec.decompress(&encoded, block.len()).unwrap();
    assert_eq!(decoded, block, "round trip failed for {} bytes", block.len());
}
