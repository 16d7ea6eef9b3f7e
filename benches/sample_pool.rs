// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SamplePool Benchmark
//!
//! Measures allocation and reuse cost for the size-classed free-list pool
//! that backs every `Sample` on the hot path: a cold `get_sample` (class
//! miss, fresh allocation) versus a warm one (buffer returned by a prior
//! `Drop`), across a few representative payload sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nidas_core::sample::pool::SamplePool;
use nidas_core::sample::SampleType;
use std::hint::black_box as bb;
use std::sync::Arc;

fn bench_cold_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_pool_cold");
    for size in [8usize, 64, 1024, 16 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let pool = Arc::new(SamplePool::new());
                bb(pool.get_sample(size, SampleType::UInt8))
            });
        });
    }
    group.finish();
}

fn bench_warm_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_pool_warm");
    for size in [8usize, 64, 1024, 16 * 1024] {
        let pool = Arc::new(SamplePool::new());
        // Prime the free list for this size class.
        drop(pool.get_sample(size, SampleType::UInt8));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let sample = pool.get_sample(size, SampleType::UInt8);
                drop(bb(sample));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cold_allocation, bench_warm_reuse);
criterion_main!(benches);
