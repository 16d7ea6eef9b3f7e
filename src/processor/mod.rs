// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `SampleIOProcessor` family: downstream stages that connect to one or
//! more [`crate::fanout::SampleSource`]s and fan samples out to their own
//! outputs (§4.8). Connection discipline here is independent from
//! [`crate::io::SampleConnectionRequester`] — a processor's `connect`/
//! `disconnect` just subscribes/unsubscribes as a `SampleClient`.

pub mod archiver;
pub mod syncrecord;

use std::sync::Arc;

use crate::fanout::{SampleClient, SampleSource};

/// A pluggable stage downstream of a sorter. Implementations subscribe
/// themselves (or an owned output) as a [`SampleClient`] of each connected
/// source.
pub trait SampleIOProcessor: Send + Sync {
    fn connect(self: Arc<Self>, source: &SampleSource);
    fn disconnect(self: Arc<Self>, source: &SampleSource);
}

pub use archiver::SampleArchiver;
pub use syncrecord::SyncRecordGenerator;
