use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use marlin_codec::{distribution, CodecConfig, MarlinCodec};

const BLOCK: usize = 1 << 20;

fn residual_fixture(entropy_bits: f64) -> (MarlinCodec, Vec<u8>) {
    let pmf = distribution::laplacian_pmf_for_entropy(entropy_bits);
    let codec = MarlinCodec::new(&pmf, CodecConfig::default()).unwrap();
    let mut rng = SmallRng::seed_from_u64(0xbe7c);
    let block = distribution::sample_block(&pmf, BLOCK, &mut rng);
    (codec, block)
}

fn encoding_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(BLOCK as u64));
    for entropy_bits in [2.0, 4.0, 6.0] {
        let (codec, block) = residual_fixture(entropy_bits);
        let mut dst = vec![0u8; BLOCK];
        group.bench_with_input(
            BenchmarkId::from_parameter(entropy_bits),
            &block,
            |b, block| b.iter(|| codec.compress_into(block, &mut dst).unwrap()),
        );
    }
    group.finish();
}

fn decoding_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(BLOCK as u64));
    for entropy_bits in [2.0, 4.0, 6.0] {
        let (codec, block) = residual_fixture(entropy_bits);
        let encoded = codec.compress(&block);
        let mut dst = vec![0u8; BLOCK];
        group.bench_with_input(
            BenchmarkId::from_parameter(entropy_bits),
            &encoded,
            |b, encoded| b.iter(|| codec.decompress_into(encoded, &mut dst).unwrap()),
        );
    }
    group.finish();
}

fn dictionary_benchmark(c: &mut Criterion) {
    let pmf = distribution::laplacian_pmf_for_entropy(4.0);
    c.bench_function("train", |b| {
        b.iter(|| MarlinCodec::new(&pmf, CodecConfig::default()).unwrap())
    });
}

criterion_group!(
    benches,
    encoding_benchmark,
    decoding_benchmark,
    dictionary_benchmark
);
criterion_main!(benches);
