// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `SyncRecordGenerator`: packs 1-second "sync records". For each
//! configured [`Variable`] grouped by rate, maintains an offset into a
//! dense per-second float buffer; on sample receive, drops values into the
//! correct slot based on the sample's timetag modulo one second. Emits one
//! sync-record [`Sample`] per second (§4.8).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::USECS_PER_DAY;
use crate::fanout::{SampleClient, SampleSource};
use crate::processor::SampleIOProcessor;
use crate::sample::pool::SamplePool;
use crate::sample::tag::SampleTag;
use crate::sample::{Sample, SampleId, SampleType};

const USECS_PER_SEC: i64 = 1_000_000;

/// Layout of one configured tag's variables within the dense per-second
/// buffer: `base` is the starting slot index, `rate_hz` determines how
/// many sub-second slots each variable gets.
struct TagLayout {
    base: usize,
    rate_hz: f64,
    variable_count: usize,
}

struct SecondBuffer {
    second: i64,
    values: Vec<f32>,
}

pub struct SyncRecordGenerator {
    pool: Arc<SamplePool>,
    output_id: SampleId,
    layouts: HashMap<SampleId, TagLayout>,
    total_slots: usize,
    current: Mutex<Option<SecondBuffer>>,
    output: SampleSource,
}

impl SyncRecordGenerator {
    pub fn new(pool: Arc<SamplePool>, output_id: SampleId, tags: &[SampleTag]) -> Arc<Self> {
        let mut layouts = HashMap::new();
        let mut cursor = 0usize;
        for tag in tags {
            let slots_per_var = tag.rate_hz.max(1.0).round() as usize;
            let variable_count = tag.variables.len().max(1);
            layouts.insert(
                tag.id,
                TagLayout { base: cursor, rate_hz: tag.rate_hz, variable_count },
            );
            cursor += slots_per_var * variable_count;
        }

        Arc::new(SyncRecordGenerator {
            pool,
            output_id,
            layouts,
            total_slots: cursor,
            current: Mutex::new(None),
            output: SampleSource::new(),
        })
    }

    pub fn output(&self) -> &SampleSource {
        &self.output
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SecondBuffer>> {
        match self.current.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::debug!("[SyncRecordGenerator] buffer lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Build and emit a sync-record sample for `buffer`'s second, timetag
    /// set to that second's start.
    fn emit(&self, buffer: SecondBuffer) {
        let byte_len = buffer.values.len() * SampleType::Float32.element_size();
        let mut sample = self.pool.get_sample(byte_len, SampleType::Float32);
        let bytes: Vec<u8> = buffer.values.iter().flat_map(|v| v.to_le_bytes()).collect();
        sample.set_timetag(buffer.second * USECS_PER_SEC);
        sample.set_id(self.output_id);
        sample.set_payload(buffer.values.len() as u32, &bytes);
        self.output.distribute(sample);
    }
}

impl SampleClient for SyncRecordGenerator {
    fn receive(&self, sample: &Sample) -> bool {
        let Some(layout) = self.layouts.get(&sample.id()) else {
            return false;
        };
        let second = sample.timetag_us().div_euclid(USECS_PER_SEC);
        let tod_us = sample.timetag_us().rem_euclid(USECS_PER_DAY);
        let sub_second_us = tod_us.rem_euclid(USECS_PER_SEC);
        let slots_per_var = layout.rate_hz.max(1.0).round() as i64;
        let slot_width_us = (USECS_PER_SEC / slots_per_var.max(1)).max(1);
        let slot = (sub_second_us / slot_width_us) as usize;

        let payload = sample.payload_bytes();
        let values: Vec<f32> = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();

        let mut guard = self.lock();
        let needs_new = match guard.as_ref() {
            Some(buf) => buf.second != second,
            None => true,
        };
        if needs_new {
            if let Some(old) = guard.take() {
                drop(guard);
                self.emit(old);
                guard = self.lock();
            }
            *guard = Some(SecondBuffer { second, values: vec![0.0; self.total_slots] });
        }

        if let Some(buf) = guard.as_mut() {
            for (i, value) in values.iter().take(layout.variable_count).enumerate() {
                let idx = layout.base + slot * layout.variable_count + i;
                if idx < buf.values.len() {
                    buf.values[idx] = *value;
                }
            }
        }
        true
    }
}

impl SampleIOProcessor for SyncRecordGenerator {
    fn connect(self: Arc<Self>, source: &SampleSource) {
        let client: Arc<dyn SampleClient> = self;
        source.add_sample_client(client);
    }

    fn disconnect(self: Arc<Self>, source: &SampleSource) {
        let client: Arc<dyn SampleClient> = self.clone();
        source.remove_sample_client(&client);
        let mut guard = self.lock();
        if let Some(buf) = guard.take() {
            drop(guard);
            self.emit(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::tag::Variable;

    fn one_hz_tag(id: SampleId) -> SampleTag {
        SampleTag::new(id, 1.0)
            .with_variable(Variable::new("TAS", "m/s"))
            .with_variable(Variable::new("ALT", "m"))
    }

    fn float_sample(pool: &Arc<SamplePool>, id: SampleId, timetag_us: i64, values: &[f32]) -> Sample {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut s = pool.get_sample(bytes.len(), SampleType::Float32);
        s.set_timetag(timetag_us);
        s.set_id(id);
        s.set_payload(values.len() as u32, &bytes);
        s
    }

    #[test]
    fn emits_one_record_per_second_boundary() {
        let pool = Arc::new(SamplePool::new());
        let input_id = SampleId::new(5, 1, 1);
        let output_id = SampleId::new(5, 1, 99);
        let gen = SyncRecordGenerator::new(pool.clone(), output_id, &[one_hz_tag(input_id)]);

        let collected = Arc::new(Mutex::new(Vec::new()));
        struct Collector(Arc<Mutex<Vec<i64>>>);
        impl SampleClient for Collector {
            fn receive(&self, sample: &Sample) -> bool {
                self.0.lock().unwrap().push(sample.timetag_us());
                true
            }
        }
        gen.output().add_sample_client(Arc::new(Collector(collected.clone())));

        gen.receive(&float_sample(&pool, input_id, 1_000_000, &[1.0, 2.0]));
        gen.receive(&float_sample(&pool, input_id, 2_000_000, &[3.0, 4.0]));

        let seen = collected.lock().unwrap().clone();
        assert_eq!(seen, vec![1_000_000]);
    }

    #[test]
    fn disconnect_flushes_the_pending_second() {
        let pool = Arc::new(SamplePool::new());
        let input_id = SampleId::new(5, 1, 1);
        let output_id = SampleId::new(5, 1, 99);
        let gen = SyncRecordGenerator::new(pool.clone(), output_id, &[one_hz_tag(input_id)]);

        let collected = Arc::new(Mutex::new(0usize));
        struct Counter(Arc<Mutex<usize>>);
        impl SampleClient for Counter {
            fn receive(&self, _sample: &Sample) -> bool {
                *self.0.lock().unwrap() += 1;
                true
            }
        }
        gen.output().add_sample_client(Arc::new(Counter(collected.clone())));

        let source = SampleSource::new();
        gen.clone().connect(&source);
        source.distribute(float_sample(&pool, input_id, 1_000_000, &[1.0, 2.0]));
        gen.disconnect(&source);

        assert_eq!(*collected.lock().unwrap(), 1);
    }
}
