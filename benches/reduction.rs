//! Benchmarks for block reduction across dimensions and block sizes.

use bkz_engine::{bkz_reduction_flags, BkzFlags, FloatType, IntMatrix};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Diagonally dominant random basis, non-singular by construction.
fn generate_random_basis(dim: usize, seed: u64) -> IntMatrix {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut basis = vec![vec![0i64; dim]; dim];
    for (i, row) in basis.iter_mut().enumerate() {
        for x in row.iter_mut() {
            *x = rng.gen_range(-10..=10);
        }
        row[i] += 100 * dim as i64;
    }
    basis
}

fn bench_bkz_by_dimension(c: &mut Criterion) {
    let mut group = c.benchmark_group("BKZ_dimension");
    for dim in [10usize, 16, 24].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(dim), dim, |bench, &dim| {
            let basis = generate_random_basis(dim, 42);
            bench.iter(|| {
                let mut b = basis.clone();
                let status =
                    bkz_reduction_flags(&mut b, 8, BkzFlags::DEFAULT, FloatType::Default, 0);
                black_box((b, status))
            });
        });
    }
    group.finish();
}

fn bench_bkz_by_block_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("BKZ_block_size");
    let basis = generate_random_basis(20, 7);
    for beta in [2usize, 6, 12].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(beta), beta, |bench, &beta| {
            bench.iter(|| {
                let mut b = basis.clone();
                let status =
                    bkz_reduction_flags(&mut b, beta, BkzFlags::DEFAULT, FloatType::Default, 0);
                black_box((b, status))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bkz_by_dimension, bench_bkz_by_block_size);
criterion_main!(benches);
