// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `BadSampleFilter`: a declarative rule set applied to each deserialized
//! sample header, mutable at runtime via a control surface without
//! blocking the reader thread that consults it on every sample (§4.7).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::wire::SampleHeader;

/// One snapshot of filter rules. Replacing the whole struct atomically
/// (rather than locking individual fields) keeps a single sample's
/// validation consistent even if rules are updated mid-stream.
#[derive(Debug, Clone)]
pub struct FilterRules {
    pub min_dsm_id: u16,
    pub max_dsm_id: u16,
    pub min_length: u32,
    pub max_length: u32,
    pub min_time_us: i64,
    pub max_time_us: i64,
    pub time_checks_enabled: bool,
    pub dsm_id_checks_enabled: bool,
}

impl Default for FilterRules {
    fn default() -> Self {
        FilterRules {
            min_dsm_id: 0,
            max_dsm_id: 1023,
            min_length: 0,
            max_length: 1_000_000,
            min_time_us: i64::MIN,
            max_time_us: i64::MAX,
            time_checks_enabled: false,
            dsm_id_checks_enabled: false,
        }
    }
}

#[derive(Default)]
pub struct FilterStats {
    pub rejected_length: AtomicU64,
    pub rejected_dsm_id: AtomicU64,
    pub rejected_time: AtomicU64,
}

/// Runtime-mutable validation gate between the wire header decode and
/// sample delivery. `rules` lives behind an [`ArcSwap`] so a control-RPC
/// thread can publish a new rule set without ever blocking the stream
/// thread reading it.
pub struct BadSampleFilter {
    rules: ArcSwap<FilterRules>,
    stats: FilterStats,
}

impl BadSampleFilter {
    pub fn new(rules: FilterRules) -> Self {
        BadSampleFilter {
            rules: ArcSwap::from_pointee(rules),
            stats: FilterStats::default(),
        }
    }

    pub fn set_rules(&self, rules: FilterRules) {
        self.rules.store(Arc::new(rules));
    }

    pub fn rules(&self) -> Arc<FilterRules> {
        self.rules.load_full()
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// Validate one decoded header. Returns `true` if the sample should
    /// be delivered, `false` if it must be dropped and the stream should
    /// resynchronize.
    pub fn accept(&self, header: &SampleHeader) -> bool {
        let rules = self.rules.load();

        if header.length < rules.min_length || header.length > rules.max_length {
            self.stats.rejected_length.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if rules.dsm_id_checks_enabled {
            let dsm_id = header.id.dsm_id();
            if dsm_id < rules.min_dsm_id || dsm_id > rules.max_dsm_id {
                self.stats.rejected_dsm_id.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        if rules.time_checks_enabled
            && (header.timetag_us < rules.min_time_us || header.timetag_us > rules.max_time_us)
        {
            self.stats.rejected_time.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        true
    }
}

impl Default for BadSampleFilter {
    fn default() -> Self {
        Self::new(FilterRules::default())
    }
}
