// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `SampleArchiver`: connects to one or more sources and writes every
//! delivered sample to an owned output (typically a FileSet-backed
//! [`SampleOutputStream`]). Opens the output on connect, closes it on
//! disconnect (§4.8).

use std::sync::{Arc, Mutex};

use crate::fanout::{SampleClient, SampleSource};
use crate::processor::SampleIOProcessor;
use crate::sample::Sample;
use crate::sample_stream::SampleOutputStream;

pub struct SampleArchiver {
    output: Mutex<SampleOutputStream>,
}

impl SampleArchiver {
    pub fn new(output: SampleOutputStream) -> Arc<Self> {
        Arc::new(SampleArchiver { output: Mutex::new(output) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SampleOutputStream> {
        match self.output.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::debug!("[SampleArchiver] output lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl SampleClient for SampleArchiver {
    fn receive(&self, sample: &Sample) -> bool {
        let held = sample.hold_reference();
        match self.lock().write_sample(held) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[SampleArchiver] write failed: {e}");
                false
            }
        }
    }
}

impl SampleIOProcessor for SampleArchiver {
    fn connect(self: Arc<Self>, source: &SampleSource) {
        if let Err(e) = self.lock().init() {
            log::error!("[SampleArchiver] failed to open output: {e}");
            return;
        }
        let client: Arc<dyn SampleClient> = self;
        source.add_sample_client(client);
    }

    fn disconnect(self: Arc<Self>, source: &SampleSource) {
        let client: Arc<dyn SampleClient> = self.clone();
        source.remove_sample_client(&client);
        if let Err(e) = self.lock().close() {
            log::warn!("[SampleArchiver] error closing output: {e}");
        }
    }
}
