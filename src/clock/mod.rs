// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `SampleDater`: promotes a device-relative time-of-day tag into a fully
//! qualified absolute UTC timetag, handling midnight rollover and clock
//! disagreement between a sample's source clock and the process's
//! reference clock (IRIG or OS).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use crate::config::USECS_PER_DAY;
use crate::sample::Sample;

/// Outcome of [`SampleDater::set_sample_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaterStatus {
    /// The sample's absolute timetag was set successfully.
    Ok,
    /// `abs - clockTime` exceeded `maxClockDiff` in every rollover
    /// hypothesis; the sample's timetag was not set.
    OutOfSpec,
    /// No synchronization tick has ever been received (`t0day == 0`).
    NoClock,
}

/// Tracks the current UTC day boundary and the most recent clock
/// synchronization tick, and promotes per-sample time-of-day values to
/// absolute timetags.
///
/// `maxClockDiff` is unified as a `Duration` (internally normalized to
/// microseconds) to resolve the unit ambiguity between generations of the
/// original implementation, where one used seconds and another
/// microseconds for the same tolerance.
pub struct SampleDater {
    /// Absolute UTC microseconds at the start of the current UTC day. Zero
    /// means "never synchronized".
    t0day_us: AtomicI64,
    /// Absolute UTC microseconds of the most recent synchronization tick.
    clock_time_us: AtomicI64,
    max_clock_diff_us: i64,
    out_of_spec_count: AtomicU64,
}

impl SampleDater {
    pub fn new(max_clock_diff: Duration) -> Self {
        SampleDater {
            t0day_us: AtomicI64::new(0),
            clock_time_us: AtomicI64::new(0),
            max_clock_diff_us: max_clock_diff.as_micros() as i64,
            out_of_spec_count: AtomicU64::new(0),
        }
    }

    /// Record a synchronization tick from an IRIG source or the OS clock.
    pub fn set_time(&self, absolute_us: i64) {
        let t0day = absolute_us.div_euclid(USECS_PER_DAY) * USECS_PER_DAY;
        self.t0day_us.store(t0day, Ordering::SeqCst);
        self.clock_time_us.store(absolute_us, Ordering::SeqCst);
    }

    pub fn t0day_us(&self) -> i64 {
        self.t0day_us.load(Ordering::SeqCst)
    }

    pub fn clock_time_us(&self) -> i64 {
        self.clock_time_us.load(Ordering::SeqCst)
    }

    pub fn out_of_spec_count(&self) -> u64 {
        self.out_of_spec_count.load(Ordering::Relaxed)
    }

    /// Compute the absolute timetag for a device-relative `tod` (time of
    /// day in microseconds, `0 .. USECS_PER_DAY`), without mutating a
    /// `Sample`. Exposed separately from [`Self::set_sample_time`] so the
    /// idempotence property can be tested directly against pure inputs.
    pub fn resolve(&self, tod_us: i64) -> (DaterStatus, i64) {
        let t0day = self.t0day_us.load(Ordering::SeqCst);
        let clock_time = self.clock_time_us.load(Ordering::SeqCst);
        let abs = t0day + tod_us;
        let delta = abs - clock_time;

        if delta.abs() <= self.max_clock_diff_us {
            return (DaterStatus::Ok, abs);
        }
        if (delta + USECS_PER_DAY).abs() <= self.max_clock_diff_us {
            return (DaterStatus::Ok, abs + USECS_PER_DAY);
        }
        if (delta - USECS_PER_DAY).abs() <= self.max_clock_diff_us {
            return (DaterStatus::Ok, abs - USECS_PER_DAY);
        }
        if t0day == 0 {
            return (DaterStatus::NoClock, abs);
        }
        (DaterStatus::OutOfSpec, abs)
    }

    /// Date `sample` in place using its current timetag field as the raw
    /// `tod` input, replacing it with the resolved absolute timetag on
    /// `Ok`. Idempotent: calling this twice on the same raw `tod` (without
    /// an intervening `set_time`) yields the same result both times, since
    /// `resolve` is a pure function of `(t0day, clockTime, tod)`.
    pub fn set_sample_time(&self, sample: &mut Sample, tod_us: i64) -> DaterStatus {
        let (status, abs) = self.resolve(tod_us);
        match status {
            DaterStatus::Ok => {
                sample.set_timetag(abs);
            }
            DaterStatus::OutOfSpec => {
                let n = self.out_of_spec_count.fetch_add(1, Ordering::Relaxed);
                if n.count_ones() == 1 || n == 0 {
                    // Exponential backoff: log on powers of two.
                    log::warn!(
                        "[SampleDater] out-of-spec clock skew (occurrence {}): tod={} t0day={} clockTime={}",
                        n + 1,
                        tod_us,
                        self.t0day_us(),
                        self.clock_time_us()
                    );
                }
            }
            DaterStatus::NoClock => {}
        }
        status
    }
}
