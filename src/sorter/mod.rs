// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `SampleSorter`: a bounded, time-ordering stage. A dedicated worker
//! thread holds samples in a `(timetag, id)`-ordered multiset and releases
//! everything older than `now - sort_horizon` downstream, in order.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{BackpressurePolicy, SorterConfig};
use crate::fanout::{SampleClient, SampleSource};
use crate::processor::SampleIOProcessor;
use crate::sample::{Sample, SampleId};

/// Key ordering entries in the sorter's multiset: `(timetag, id)`, so two
/// samples with the same timetag sort by id rather than comparing
/// unordered `Sample` handles directly.
#[derive(Clone)]
struct Entry {
    timetag_us: i64,
    id: SampleId,
    sample: Sample,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.timetag_us == other.timetag_us && self.id == other.id
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.timetag_us, self.id).cmp(&(other.timetag_us, other.id))
    }
}

/// Visible counters for the sorter's ordering and backpressure policy.
#[derive(Default)]
pub struct SorterStats {
    pub inserted: AtomicU64,
    pub released: AtomicU64,
    pub dropped_late: AtomicU64,
    pub dropped_overflow: AtomicU64,
}

fn now_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as i64
}

struct Shared {
    multiset: Mutex<BTreeSet<Entry>>,
    condvar: Condvar,
    stopping: AtomicBool,
    last_released_timetag: Mutex<Option<i64>>,
    stats: SorterStats,
}

/// Bounded multiset keyed by `(timetag, id)`, with a dedicated worker
/// thread releasing aged entries to a [`SampleSource`] fan-out in order.
pub struct SampleSorter {
    shared: Arc<Shared>,
    config: SorterConfig,
    output: Arc<SampleSource>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SampleSorter {
    pub fn new(config: SorterConfig, output: Arc<SampleSource>) -> Arc<Self> {
        let shared = Arc::new(Shared {
            multiset: Mutex::new(BTreeSet::new()),
            condvar: Condvar::new(),
            stopping: AtomicBool::new(false),
            last_released_timetag: Mutex::new(None),
            stats: SorterStats::default(),
        });

        let sorter = Arc::new(SampleSorter {
            shared: shared.clone(),
            config,
            output,
            worker: Mutex::new(None),
        });

        let worker_shared = shared.clone();
        let worker_sorter = sorter.clone();
        let handle = std::thread::Builder::new()
            .name("sample-sorter".into())
            .spawn(move || worker_sorter.worker_loop(worker_shared))
            .expect("failed to spawn sample-sorter worker thread");
        *sorter.worker.lock().unwrap() = Some(handle);

        sorter
    }

    pub fn stats(&self) -> &SorterStats {
        &self.shared.stats
    }

    fn lock_multiset(&self) -> std::sync::MutexGuard<'_, BTreeSet<Entry>> {
        match self.shared.multiset.lock() {
            Ok(g) => g,
            Err(p) => {
                log::debug!("[SampleSorter] multiset lock poisoned, recovering");
                p.into_inner()
            }
        }
    }

    /// Producer side: hold a reference and insert into the multiset.
    /// Applies the configured backpressure policy if the multiset is at
    /// capacity.
    pub fn receive(&self, sample: Sample) {
        let held = sample.hold_reference();
        let entry = Entry {
            timetag_us: held.timetag_us(),
            id: held.id(),
            sample: held,
        };

        let mut multiset = self.lock_multiset();
        if multiset.len() >= self.config.max_samples {
            match self.config.backpressure {
                BackpressurePolicy::RejectNewest => {
                    self.shared.stats.dropped_overflow.fetch_add(1, Ordering::Relaxed);
                    drop(multiset);
                    entry.sample.free_reference();
                    return;
                }
                BackpressurePolicy::DropOldest => {
                    if let Some(oldest) = multiset.iter().next().cloned() {
                        multiset.remove(&oldest);
                        self.shared.stats.dropped_overflow.fetch_add(1, Ordering::Relaxed);
                        oldest.sample.free_reference();
                    }
                }
            }
        }

        multiset.insert(entry);
        self.shared.stats.inserted.fetch_add(1, Ordering::Relaxed);
        drop(multiset);
        self.shared.condvar.notify_one();
    }

    fn worker_loop(&self, shared: Arc<Shared>) {
        let mut guard = self.lock_multiset();
        loop {
            if shared.stopping.load(Ordering::SeqCst) {
                break;
            }
            let (aged, wait_for) = self.drain_aged(&mut guard);
            drop(guard);
            self.release_in_order(aged);

            guard = self.lock_multiset();
            if shared.stopping.load(Ordering::SeqCst) {
                break;
            }
            let timeout = wait_for.unwrap_or(Duration::from_millis(100));
            let (g, _) = shared.condvar.wait_timeout(guard, timeout).unwrap();
            guard = g;
        }
        // interrupt(): release everything still held, without further
        // ordering guarantees beyond what's already in the multiset.
        let remaining: Vec<Entry> = guard.iter().cloned().collect();
        guard.clear();
        drop(guard);
        for e in remaining {
            e.sample.free_reference();
        }
    }

    /// Pop every entry older than `now - sort_horizon` off the multiset,
    /// in ascending order. Returns the aged entries plus how long the
    /// worker should sleep if nothing was aged (the time until the
    /// earliest remaining entry crosses the horizon).
    fn drain_aged(&self, multiset: &mut BTreeSet<Entry>) -> (Vec<Entry>, Option<Duration>) {
        let horizon = now_us() - self.config.sort_horizon.as_micros() as i64;
        let mut aged = Vec::new();
        while let Some(first) = multiset.iter().next().cloned() {
            if first.timetag_us < horizon {
                multiset.remove(&first);
                aged.push(first);
            } else {
                let wait_us = (first.timetag_us - horizon).max(0) as u64;
                return (aged, Some(Duration::from_micros(wait_us)));
            }
        }
        (aged, None)
    }

    fn release_in_order(&self, aged: Vec<Entry>) {
        let mut last = self.shared.last_released_timetag.lock().unwrap();
        for entry in aged {
            if let Some(prev) = *last {
                if entry.timetag_us < prev {
                    // Arrived-late relative to the most recently released
                    // sample: documented policy is drop-with-counter.
                    self.shared.stats.dropped_late.fetch_add(1, Ordering::Relaxed);
                    entry.sample.free_reference();
                    continue;
                }
            }
            *last = Some(entry.timetag_us);
            self.shared.stats.released.fetch_add(1, Ordering::Relaxed);
            self.output.distribute(entry.sample);
        }
    }

    /// Drain everything regardless of horizon, in order.
    pub fn flush(&self) {
        let mut guard = self.lock_multiset();
        let all: Vec<Entry> = guard.iter().cloned().collect();
        guard.clear();
        drop(guard);
        self.release_in_order(all);
    }

    /// Signal the worker to exit cleanly. Remaining samples have their
    /// refcounts released, not delivered.
    pub fn interrupt(&self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        self.shared.condvar.notify_one();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

/// Lets a sorter sit downstream of a `SampleSource` directly, for the
/// "multiple sources feed a shared output stream that requires global
/// ordering" case (§4.8) — bridges the by-reference fan-out contract to
/// the sorter's own by-value enqueue path.
impl SampleClient for SampleSorter {
    fn receive(&self, sample: &Sample) -> bool {
        self.receive(sample.hold_reference());
        true
    }
}

/// `SampleSorter` as a `SampleIOProcessor`: subscribing it to a source just
/// registers it as that source's `SampleClient`. Unlike `SampleArchiver`,
/// disconnecting doesn't stop the worker thread or drop buffered
/// samples — callers that own the sorter call `interrupt()` separately.
impl SampleIOProcessor for SampleSorter {
    fn connect(self: Arc<Self>, source: &SampleSource) {
        let client: Arc<dyn SampleClient> = self;
        source.add_sample_client(client);
    }

    fn disconnect(self: Arc<Self>, source: &SampleSource) {
        let client: Arc<dyn SampleClient> = self;
        source.remove_sample_client(&client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::SampleClient;
    use crate::sample::{pool::SamplePool, SampleType};
    use std::sync::Mutex as StdMutex;

    struct CollectingClient {
        seen: StdMutex<Vec<i64>>,
    }
    impl SampleClient for CollectingClient {
        fn receive(&self, sample: &Sample) -> bool {
            self.seen.lock().unwrap().push(sample.timetag_us());
            true
        }
    }

    fn sample_with_timetag(pool: &Arc<SamplePool>, t: i64) -> Sample {
        let mut s = pool.get_sample(4, SampleType::UInt8);
        s.set_timetag(t);
        s
    }

    #[test]
    fn sorter_releases_in_nondecreasing_order() {
        let pool = Arc::new(SamplePool::new());
        let output = Arc::new(SampleSource::new());
        let collector = Arc::new(CollectingClient { seen: StdMutex::new(Vec::new()) });
        output.add_sample_client(collector.clone());

        let config = SorterConfig {
            sort_horizon: Duration::from_millis(0),
            ..Default::default()
        };
        let sorter = SampleSorter::new(config, output);

        for t in [1000, 500, 1500, 800, 2000] {
            sorter.receive(sample_with_timetag(&pool, t));
        }
        sorter.flush();
        sorter.interrupt();

        let seen = collector.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![500, 800, 1000, 1500, 2000]);
    }

    #[test]
    fn interrupt_releases_all_held_samples() {
        let pool = Arc::new(SamplePool::new());
        let output = Arc::new(SampleSource::new());
        let config = SorterConfig {
            sort_horizon: Duration::from_secs(3600),
            ..Default::default()
        };
        let sorter = SampleSorter::new(config, output);

        let mut held = Vec::new();
        for t in 0..10 {
            let s = sample_with_timetag(&pool, t);
            held.push(s.hold_reference());
            sorter.receive(s);
        }
        sorter.interrupt();

        for s in held {
            assert_eq!(s.refcount(), 1, "no refcount leaks after interrupt");
        }
    }

    #[test]
    fn reject_newest_policy_drops_overflow_and_counts_it() {
        let pool = Arc::new(SamplePool::new());
        let output = Arc::new(SampleSource::new());
        let config = SorterConfig {
            sort_horizon: Duration::from_secs(3600),
            max_samples: 2,
            backpressure: BackpressurePolicy::RejectNewest,
        };
        let sorter = SampleSorter::new(config, output);

        sorter.receive(sample_with_timetag(&pool, 1));
        sorter.receive(sample_with_timetag(&pool, 2));
        sorter.receive(sample_with_timetag(&pool, 3));
        sorter.interrupt();

        assert_eq!(sorter.stats().dropped_overflow.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn sorter_subscribes_as_a_sample_client_via_connect() {
        let pool = Arc::new(SamplePool::new());
        let upstream = SampleSource::new();
        let downstream = Arc::new(SampleSource::new());
        let collector = Arc::new(CollectingClient { seen: StdMutex::new(Vec::new()) });
        downstream.add_sample_client(collector.clone());

        let config = SorterConfig { sort_horizon: Duration::from_millis(0), ..Default::default() };
        let sorter = SampleSorter::new(config, downstream);

        sorter.clone().connect(&upstream);
        assert_eq!(upstream.client_count(), 1);

        upstream.distribute(sample_with_timetag(&pool, 42));
        sorter.flush();

        assert_eq!(collector.seen.lock().unwrap().clone(), vec![42]);

        sorter.clone().disconnect(&upstream);
        assert_eq!(upstream.client_count(), 0);
        sorter.interrupt();
    }
}
