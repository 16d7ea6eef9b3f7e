// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Push-based fan-out: a [`SampleSource`] distributes each [`Sample`] to a
//! snapshot of its [`SampleClient`] list, isolating one client's panic from
//! the rest and always releasing the sample's reference exactly once.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::sample::Sample;

/// A consumer of samples pushed by a [`SampleSource`].
///
/// `receive` returns `true` if the sample was accepted, `false` if
/// rejected (unknown id, backpressure). The source does not act on the
/// return value except for statistics.
pub trait SampleClient: Send + Sync {
    fn receive(&self, sample: &Sample) -> bool;
}

/// Thread-safe, idempotent registry of [`SampleClient`]s subscribed to a
/// source, identified by the address of their `Arc`.
///
/// Iteration for distribution happens against a snapshot taken under lock
/// and then released — the snapshot pattern is essential: it lets a
/// client call `remove` on itself synchronously from within its own
/// `receive` call without deadlocking on the list mutex. The snapshot's
/// `Arc` clone keeps that client alive for the remainder of the current
/// `distribute` call even after it removes itself from the registry.
#[derive(Default)]
pub struct SampleClientList {
    clients: Mutex<Vec<Arc<dyn SampleClient>>>,
}

impl SampleClientList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn SampleClient>>> {
        match self.clients.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::debug!("[SampleClientList] lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Adds `client`. Adding the same `Arc` twice keeps two copies — the
    /// list is not a set — matching the original's plain-vector semantics.
    pub fn add(&self, client: Arc<dyn SampleClient>) {
        self.lock().push(client);
    }

    /// Removes the first entry pointing at the same client as `client`.
    /// No-op if not present.
    pub fn remove(&self, client: &Arc<dyn SampleClient>) {
        let mut clients = self.lock();
        if let Some(idx) = clients.iter().position(|c| Arc::ptr_eq(c, client)) {
            clients.remove(idx);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot the current client list under lock, for distribution
    /// without the lock held.
    fn snapshot(&self) -> Vec<Arc<dyn SampleClient>> {
        self.lock().clone()
    }
}

/// Counters exposed by a [`SampleSource`] for samples whose distribution
/// encountered no interested client, or a panicking client.
#[derive(Default)]
pub struct SourceStats {
    pub delivered: AtomicU64,
    pub no_clients: AtomicU64,
    pub client_panics: AtomicU64,
}

/// A point in the fan-out graph that owns a [`SampleClientList`] and
/// pushes samples to it.
#[derive(Default)]
pub struct SampleSource {
    clients: SampleClientList,
    stats: SourceStats,
}

impl SampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample_client(&self, client: Arc<dyn SampleClient>) {
        self.clients.add(client);
    }

    pub fn remove_sample_client(&self, client: &Arc<dyn SampleClient>) {
        self.clients.remove(client);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    /// Snapshot the client list, deliver `sample` to each client in turn
    /// (isolating panics), then release the sample's reference exactly
    /// once regardless of whether any client panicked.
    pub fn distribute(&self, sample: Sample) {
        let snapshot = self.clients.snapshot();
        if snapshot.is_empty() {
            self.stats.no_clients.fetch_add(1, Ordering::Relaxed);
        }
        for client in &snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| client.receive(&sample)));
            match result {
                Ok(accepted) => {
                    if accepted {
                        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(_) => {
                    self.stats.client_panics.fetch_add(1, Ordering::Relaxed);
                    log::error!("[SampleSource] client panicked during receive()");
                }
            }
        }
        sample.free_reference();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{pool::SamplePool, SampleType};

    struct CountingClient {
        count: AtomicU64,
    }

    impl SampleClient for CountingClient {
        fn receive(&self, _sample: &Sample) -> bool {
            self.count.fetch_add(1, Ordering::Relaxed);
            true
        }
    }

    struct PanickingClient;

    impl SampleClient for PanickingClient {
        fn receive(&self, _sample: &Sample) -> bool {
            panic!("boom");
        }
    }

    #[test]
    fn distribute_delivers_to_all_clients_and_frees_reference() {
        let source = SampleSource::new();
        let client: Arc<dyn SampleClient> = Arc::new(CountingClient { count: AtomicU64::new(0) });
        source.add_sample_client(client.clone());

        let pool = Arc::new(SamplePool::new());
        let sample = pool.get_sample(4, SampleType::UInt8);
        assert_eq!(sample.refcount(), 1);
        let held = sample.hold_reference();
        source.distribute(sample);
        assert_eq!(held.refcount(), 1, "distribute must free its own reference");
    }

    #[test]
    fn panicking_client_does_not_stop_other_deliveries_or_leak_refcount() {
        let source = SampleSource::new();
        source.add_sample_client(Arc::new(PanickingClient));
        let good: Arc<dyn SampleClient> = Arc::new(CountingClient { count: AtomicU64::new(0) });
        source.add_sample_client(good.clone());

        let pool = Arc::new(SamplePool::new());
        let sample = pool.get_sample(4, SampleType::UInt8);
        let held = sample.hold_reference();
        source.distribute(sample);

        assert_eq!(held.refcount(), 1);
        assert_eq!(source.stats().client_panics.load(Ordering::Relaxed), 1);
        assert_eq!(source.stats().delivered.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn add_remove_returns_list_to_prior_state() {
        let list = SampleClientList::new();
        let c: Arc<dyn SampleClient> = Arc::new(CountingClient { count: AtomicU64::new(0) });
        assert_eq!(list.len(), 0);
        list.add(c.clone());
        assert_eq!(list.len(), 1);
        list.remove(&c);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn add_twice_remove_once_leaves_one_copy() {
        let list = SampleClientList::new();
        let c: Arc<dyn SampleClient> = Arc::new(CountingClient { count: AtomicU64::new(0) });
        list.add(c.clone());
        list.add(c.clone());
        list.remove(&c);
        assert_eq!(list.len(), 1, "not set semantics: one add should remain");
    }

    #[test]
    fn unknown_client_rejection_is_not_a_crash() {
        struct RejectingClient;
        impl SampleClient for RejectingClient {
            fn receive(&self, _sample: &Sample) -> bool {
                false
            }
        }
        let source = SampleSource::new();
        source.add_sample_client(Arc::new(RejectingClient));
        let pool = Arc::new(SamplePool::new());
        let sample = pool.get_sample(4, SampleType::UInt8);
        source.distribute(sample);
        assert_eq!(source.stats().delivered.load(Ordering::Relaxed), 0);
    }

    struct SelfRemovingClient {
        list: Arc<SampleClientList>,
        self_ref: Mutex<Option<Arc<dyn SampleClient>>>,
    }

    impl SampleClient for SelfRemovingClient {
        fn receive(&self, _sample: &Sample) -> bool {
            // Synchronous self-removal from within receive(): the
            // registry's strong reference is dropped here, but the
            // distribute() snapshot taken before this call holds its own
            // clone, so this client stays alive until the end of the
            // current distribute() call even though it is no longer
            // reachable from the registry.
            if let Some(me) = self.self_ref.lock().unwrap().take() {
                self.list.remove(&me);
            }
            true
        }
    }

    #[test]
    fn self_removal_during_receive_does_not_deadlock_or_use_after_free() {
        let list = Arc::new(SampleClientList::new());
        let concrete = Arc::new(SelfRemovingClient {
            list: list.clone(),
            self_ref: Mutex::new(None),
        });
        *concrete.self_ref.lock().unwrap() = Some(concrete.clone() as Arc<dyn SampleClient>);
        let client: Arc<dyn SampleClient> = concrete;
        list.add(client.clone());
        assert_eq!(list.len(), 1);

        let source = SampleSource::new();
        source.add_sample_client(client.clone());
        let pool = Arc::new(SamplePool::new());
        let sample = pool.get_sample(4, SampleType::UInt8);
        source.distribute(sample);

        assert_eq!(list.len(), 0, "client removed itself during receive()");
    }
}
