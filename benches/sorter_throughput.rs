// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SampleSorter Throughput Benchmark
//!
//! Measures ingest throughput of the horizon-based time-ordering stage:
//! samples arrive already-ordered (best case, no multiset churn) versus
//! shuffled within a small out-of-order window (worst case this sorter is
//! meant to absorb), with a horizon short enough that release keeps pace
//! with ingest during the benchmark.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nidas_core::config::SorterConfig;
use nidas_core::fanout::{SampleClient, SampleSource};
use nidas_core::sample::pool::SamplePool;
use nidas_core::sample::{Sample, SampleId, SampleType};
use nidas_core::sorter::SampleSorter;
use std::hint::black_box as bb;
use std::sync::Arc;
use std::time::Duration;

struct Sink;
impl SampleClient for Sink {
    fn receive(&self, sample: &Sample) -> bool {
        bb(sample.length());
        true
    }
}

fn build_samples(pool: &Arc<SamplePool>, count: usize, shuffle_window_us: i64) -> Vec<Sample> {
    let id = SampleId::new(SampleType::UInt8.code(), 1, 1);
    (0..count)
        .map(|i| {
            let jitter = if shuffle_window_us > 0 { fastrand::i64(0..shuffle_window_us) } else { 0 };
            let mut s = pool.get_sample(8, SampleType::UInt8);
            s.set_timetag(i as i64 * 1000 + jitter);
            s.set_id(id);
            s.set_payload(8, &[0u8; 8]);
            s
        })
        .collect()
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("sorter_ingest");
    for shuffle_window_us in [0i64, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(shuffle_window_us), &shuffle_window_us, |b, &window| {
            let pool = Arc::new(SamplePool::new());
            b.iter_batched(
                || build_samples(&pool, 2_000, window),
                |samples| {
                    let source = Arc::new(SampleSource::new());
                    source.add_sample_client(Arc::new(Sink));
                    let config = SorterConfig { sort_horizon: Duration::from_millis(1), ..SorterConfig::default() };
                    let sorter = SampleSorter::new(config, source);
                    for s in samples {
                        sorter.receive(s);
                    }
                    sorter.flush();
                    sorter.interrupt();
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
