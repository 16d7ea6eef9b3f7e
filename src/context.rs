// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Explicit pipeline context, replacing the process-wide `SamplePool` and
//! `SampleDater` singletons of the original with a value threaded through
//! construction. Only the CLI harness binary owns a context at the process
//! boundary; library code never reaches for a global.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::SampleDater;
use crate::sample::pool::SamplePool;

/// Shared state handed to every pipeline stage at construction time:
/// the sample pool, the time-of-day promoter, and process-wide stats.
#[derive(Clone)]
pub struct PipelineContext {
    pool: Arc<SamplePool>,
    dater: Arc<SampleDater>,
}

impl PipelineContext {
    /// Build a context with a fresh pool and a dater using `max_clock_diff`
    /// as its synchronization tolerance.
    pub fn new(max_clock_diff: Duration) -> Self {
        Self {
            pool: Arc::new(SamplePool::new()),
            dater: Arc::new(SampleDater::new(max_clock_diff)),
        }
    }

    pub fn pool(&self) -> &Arc<SamplePool> {
        &self.pool
    }

    pub fn dater(&self) -> &Arc<SampleDater> {
        &self.dater
    }
}
