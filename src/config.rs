// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Two-level configuration: compile-time protocol constants, plus a
//! runtime-mutable layer for state that must be hot-swappable without
//! blocking a reader thread (sorter backpressure policy, bad-sample filter
//! rules — the latter lives in [`crate::sample_stream::filter`]).

use std::time::Duration;

/// Microseconds in one UTC day. Time-of-day tags from kernel drivers range
/// over `0 .. USECS_PER_DAY`.
pub const USECS_PER_DAY: i64 = 86_400_000_000;

/// Size of the fixed sample wire header: timetag (8) + id (4) + length (4).
pub const SAMPLE_HEADER_LEN: usize = 16;

/// Default sort horizon: the maximum time a [`crate::sorter::SampleSorter`]
/// buffers a sample before releasing it downstream.
pub const DEFAULT_SORT_HORIZON: Duration = Duration::from_millis(2000);

/// Default [`crate::io::stream::IoStream`] write-behind flush interval.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);

/// Default suggested buffer size for an [`crate::io::stream::IoStream`].
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 16 * 1024;

/// Default maximum element count a [`crate::sorter::SampleSorter`] will
/// hold before applying its [`BackpressurePolicy`].
pub const DEFAULT_SORTER_MAX_SAMPLES: usize = 10_000;

/// Policy applied by a [`crate::sorter::SampleSorter`] when its backlog
/// exceeds its configured maximum element count.
///
/// `RejectNewest` is the default: a blocking policy is deliberately not
/// offered because it would let one slow downstream consumer stall every
/// upstream producer thread sharing the sorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// Drop the sample that triggered the overflow; everything already
    /// buffered is retained.
    #[default]
    RejectNewest,
    /// Evict the single oldest buffered sample to make room for the new
    /// one.
    DropOldest,
}

/// Per-sorter runtime configuration.
#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub sort_horizon: Duration,
    pub max_samples: usize,
    pub backpressure: BackpressurePolicy,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            sort_horizon: DEFAULT_SORT_HORIZON,
            max_samples: DEFAULT_SORTER_MAX_SAMPLES,
            backpressure: BackpressurePolicy::default(),
        }
    }
}

/// Per-stream I/O configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub buffer_size: usize,
    pub flush_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}
