// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-size-class free-list arena for [`super::Sample`] buffers.
//!
//! Mirrors the original's size-class allocator: fixed classes for common
//! small/medium/large requests, with geometric (~1.5x) free-list growth on
//! exhaustion, plus an overflow bucket for requests larger than the
//! largest fixed class. The pool never shrinks.

use std::sync::{Arc, Mutex};

use super::{Sample, SampleType};

/// Fixed size classes in bytes. A request is rounded up to the smallest
/// class that fits; requests larger than the last class fall through to
/// the overflow bucket.
pub const SIZE_CLASSES: &[usize] = &[64, 256, 1024, 4096, 16384];

struct FreeLists {
    classes: Vec<Vec<Box<[u8]>>>,
    /// Buffers larger than the largest fixed class, kept at their actual
    /// size and matched by capacity on reuse.
    overflow: Vec<Box<[u8]>>,
}

impl FreeLists {
    fn new() -> Self {
        FreeLists {
            classes: (0..SIZE_CLASSES.len()).map(|_| Vec::new()).collect(),
            overflow: Vec::new(),
        }
    }
}

/// Push `item` onto `list`, growing the list's capacity by ~1.5x when full
/// rather than relying solely on the allocator's default growth factor —
/// this is an explicit, observable policy the pool documents to callers
/// inspecting its behavior, not just an implementation accident.
fn push_with_geometric_growth<T>(list: &mut Vec<T>, item: T) {
    if list.len() == list.capacity() {
        let new_cap = ((list.capacity() as f64 * 1.5).ceil() as usize).max(list.capacity() + 1);
        list.reserve(new_cap - list.capacity());
    }
    list.push(item);
}

/// Process-wide (or, in this rewrite, `PipelineContext`-wide) arena of
/// reusable sample buffers. Never full: a miss on every free list simply
/// allocates a fresh buffer.
pub struct SamplePool {
    lists: Mutex<FreeLists>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl SamplePool {
    pub fn new() -> Self {
        SamplePool {
            lists: Mutex::new(FreeLists::new()),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn class_for(capacity: usize) -> Option<usize> {
        SIZE_CLASSES.iter().position(|&sz| sz >= capacity)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FreeLists> {
        match self.lists.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::debug!("[SamplePool] lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Returns a sample with allocated capacity >= `capacity`, refcount 1.
    /// Never blocks: a free-list miss allocates rather than waiting.
    pub fn get_sample(self: &Arc<Self>, capacity: usize, sample_type: SampleType) -> Sample {
        match Self::class_for(capacity) {
            Some(class) => {
                let mut lists = self.lock();
                let buf = match lists.classes[class].pop() {
                    Some(buf) => {
                        self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        buf
                    }
                    None => {
                        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        vec![0u8; SIZE_CLASSES[class]].into_boxed_slice()
                    }
                };
                drop(lists);
                Sample::from_pool(self, class, buf, sample_type)
            }
            None => {
                // Beyond the largest size class: search the overflow
                // bucket for a buffer that already fits, else allocate
                // exactly `capacity` bytes. No error is raised — an
                // oversized request just costs a real allocation.
                let mut lists = self.lock();
                let found = lists
                    .overflow
                    .iter()
                    .position(|b| b.len() >= capacity)
                    .map(|idx| lists.overflow.swap_remove(idx));
                let buf = match found {
                    Some(buf) => {
                        self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        buf
                    }
                    None => {
                        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        vec![0u8; capacity].into_boxed_slice()
                    }
                };
                drop(lists);
                Sample::from_pool(self, SIZE_CLASSES.len(), buf, sample_type)
            }
        }
    }

    /// Returns a buffer to its size class, growing the free list if
    /// necessary. Called from [`super::SampleInner::drop`] when a
    /// sample's last reference is released — never by library callers
    /// directly.
    pub(crate) fn recycle(&self, size_class: usize, buffer: Box<[u8]>) {
        let mut lists = self.lock();
        if size_class < SIZE_CLASSES.len() {
            push_with_geometric_growth(&mut lists.classes[size_class], buffer);
        } else {
            push_with_geometric_growth(&mut lists.overflow, buffer);
        }
    }

    /// Pool hit/miss counters, for the "zero new allocations on reuse"
    /// testable property.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(std::sync::atomic::Ordering::Relaxed),
            self.misses.load(std::sync::atomic::Ordering::Relaxed),
        )
    }
}

impl Default for SamplePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_capacity_is_always_met() {
        let pool = Arc::new(SamplePool::new());
        for cap in [0, 1, 63, 64, 65, 4096, 4097, 100_000] {
            let s = pool.get_sample(cap, SampleType::UInt8);
            assert!(s.capacity() >= cap, "capacity {} < requested {}", s.capacity(), cap);
        }
    }

    #[test]
    fn pool_reuse_avoids_new_allocations() {
        let pool = Arc::new(SamplePool::new());
        let mut samples = Vec::new();
        for _ in 0..100 {
            samples.push(pool.get_sample(64, SampleType::UInt8));
        }
        drop(samples);
        let (_, misses_before) = pool.stats();

        let mut samples2 = Vec::new();
        for _ in 0..100 {
            samples2.push(pool.get_sample(64, SampleType::UInt8));
        }
        let (hits_after, misses_after) = pool.stats();
        assert_eq!(misses_after, misses_before, "second batch should be pure hits");
        assert!(hits_after >= 100);
    }

    #[test]
    fn oversized_request_succeeds_and_is_recycled() {
        let pool = Arc::new(SamplePool::new());
        let s = pool.get_sample(1_000_000, SampleType::Float64);
        assert!(s.capacity() >= 1_000_000);
        drop(s);
        let s2 = pool.get_sample(999_999, SampleType::Float64);
        assert!(s2.capacity() >= 999_999);
        let (hits, _) = pool.stats();
        assert!(hits >= 1);
    }

    #[test]
    fn freeing_all_references_returns_buffer_to_pool() {
        let pool = Arc::new(SamplePool::new());
        let s = pool.get_sample(64, SampleType::UInt8);
        let held = s.hold_reference();
        s.free_reference();
        held.free_reference();
        // buffer should now be recyclable
        let s2 = pool.get_sample(64, SampleType::UInt8);
        assert_eq!(s2.refcount(), 1);
    }
}
