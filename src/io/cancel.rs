// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cooperative cancellation joined into every blocking call.
//!
//! Ports the original's SIGUSR1 + `ppoll`/`pselect` unblock pattern to an
//! explicit token: a blocking read or wait loops in short slices and checks
//! the flag between them rather than committing to an unbounded syscall.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// The longest a cancellable wait blocks before re-checking the flag.
pub const POLL_SLICE: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

/// Shared cancellation flag. Cloning yields another handle to the same
/// underlying flag — cancel once, and every clone observes it.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, or return early once cancelled.
    pub fn sleep(&self, duration: Duration) {
        let guard = self.inner.lock.lock().unwrap();
        let _ = self
            .inner
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_cancelled());
    }

    /// Run `poll_once`, a non-blocking or short-timeout step, in a loop
    /// until it returns `Some` or this token is cancelled.
    pub fn poll_until<T>(&self, mut poll_once: impl FnMut(Duration) -> Option<T>) -> Option<T> {
        loop {
            if self.is_cancelled() {
                return None;
            }
            if let Some(v) = poll_once(POLL_SLICE) {
                return Some(v);
            }
        }
    }

    /// The per-attempt timeout a cancellable `IoChannel::read` should use
    /// for its next underlying syscall, given the caller's overall
    /// `deadline` (`None` means block indefinitely absent cancellation).
    /// Returns `None` once this token is cancelled or `deadline` has
    /// already passed — the channel should stop polling in either case.
    pub fn next_slice(&self, deadline: Option<Instant>) -> Option<Duration> {
        if self.is_cancelled() {
            return None;
        }
        match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    None
                } else {
                    Some(remaining.min(POLL_SLICE))
                }
            }
            None => Some(POLL_SLICE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn sleep_returns_early_when_cancelled_concurrently() {
        let token = CancelToken::new();
        let t2 = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            t2.cancel();
        });
        let start = std::time::Instant::now();
        token.sleep(Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();
    }

    #[test]
    fn poll_until_stops_once_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let result: Option<()> = token.poll_until(|_| None);
        assert!(result.is_none());
    }

    #[test]
    fn next_slice_is_none_once_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.next_slice(None).is_none());
        assert!(token.next_slice(Some(Instant::now() + Duration::from_secs(10))).is_none());
    }

    #[test]
    fn next_slice_is_none_once_deadline_passed() {
        let token = CancelToken::new();
        assert!(token.next_slice(Some(Instant::now() - Duration::from_millis(1))).is_none());
    }

    #[test]
    fn next_slice_is_capped_at_poll_slice() {
        let token = CancelToken::new();
        let slice = token.next_slice(Some(Instant::now() + Duration::from_secs(10))).unwrap();
        assert!(slice <= POLL_SLICE);
    }

    #[test]
    fn poll_until_returns_first_some() {
        let token = CancelToken::new();
        let mut calls = 0;
        let result = token.poll_until(|_| {
            calls += 1;
            if calls >= 3 {
                Some(calls)
            } else {
                None
            }
        });
        assert_eq!(result, Some(3));
    }
}
