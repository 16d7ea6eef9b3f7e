// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The [`Sample`] record and its reference-counting discipline.
//!
//! A `Sample` is the unit of data flow: immutable once distributed, shared
//! via `Arc`, and returned to its originating [`pool::SamplePool`] size
//! class when the last reference is dropped rather than deallocated.

pub mod pool;
pub mod tag;

use std::sync::{Arc, Weak};

use self::pool::SamplePool;

/// Scalar element type carried by a sample's payload. Determines how the
/// payload bytes are interpreted; encoded as the low 6 bits of
/// [`SampleId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SampleType {
    Char = 0,
    UInt8 = 1,
    UInt16 = 2,
    UInt32 = 3,
    Int32 = 4,
    Float32 = 5,
    Float64 = 6,
}

impl SampleType {
    /// Size in bytes of one payload element of this type.
    pub fn element_size(self) -> usize {
        match self {
            SampleType::Char | SampleType::UInt8 => 1,
            SampleType::UInt16 => 2,
            SampleType::UInt32 | SampleType::Int32 | SampleType::Float32 => 4,
            SampleType::Float64 => 8,
        }
    }

    /// Decode a 6-bit type code; `None` if the code is outside the valid
    /// set named in the data model.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SampleType::Char),
            1 => Some(SampleType::UInt8),
            2 => Some(SampleType::UInt16),
            3 => Some(SampleType::UInt32),
            4 => Some(SampleType::Int32),
            5 => Some(SampleType::Float32),
            6 => Some(SampleType::Float64),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// The 32-bit composite sample id: 6 bits type, 10 bits DSM id, 16 bits
/// sensor+sample index. The id space is flat per-DSM; type and DSM bits are
/// always set by the originating source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleId(u32);

impl SampleId {
    pub fn new(type_code: u8, dsm_id: u16, sample_index: u16) -> Self {
        debug_assert!(type_code < 64, "type code must fit in 6 bits");
        debug_assert!(dsm_id < 1024, "dsm id must fit in 10 bits");
        let raw = ((type_code as u32 & 0x3F) << 26) | ((dsm_id as u32 & 0x3FF) << 16) | sample_index as u32;
        SampleId(raw)
    }

    pub fn from_raw(raw: u32) -> Self {
        SampleId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn type_code(self) -> u8 {
        ((self.0 >> 26) & 0x3F) as u8
    }

    pub fn dsm_id(self) -> u16 {
        ((self.0 >> 16) & 0x3FF) as u16
    }

    pub fn sample_index(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

struct SampleInner {
    timetag_us: i64,
    id: SampleId,
    sample_type: SampleType,
    length: u32,
    buffer: Option<Box<[u8]>>,
    size_class: usize,
    pool: Weak<SamplePool>,
}

impl Drop for SampleInner {
    fn drop(&mut self) {
        if let (Some(buf), Some(pool)) = (self.buffer.take(), self.pool.upgrade()) {
            pool.recycle(self.size_class, buf);
        }
    }
}

/// A reference-counted, immutable-once-shared sample record.
///
/// `Sample` wraps `Arc<SampleInner>`. `hold_reference`/`free_reference` are
/// the `Arc::clone`/`Drop` pair; on the last drop the backing buffer is
/// handed back to the pool it came from instead of being freed.
#[derive(Clone)]
pub struct Sample {
    inner: Arc<SampleInner>,
}

impl Sample {
    pub(crate) fn from_pool(
        pool: &Arc<SamplePool>,
        size_class: usize,
        buffer: Box<[u8]>,
        sample_type: SampleType,
    ) -> Self {
        Sample {
            inner: Arc::new(SampleInner {
                timetag_us: 0,
                id: SampleId::from_raw(0),
                sample_type,
                length: 0,
                buffer: Some(buffer),
                size_class,
                pool: Arc::downgrade(pool),
            }),
        }
    }

    pub fn timetag_us(&self) -> i64 {
        self.inner.timetag_us
    }

    pub fn id(&self) -> SampleId {
        self.inner.id
    }

    pub fn sample_type(&self) -> SampleType {
        self.inner.sample_type
    }

    pub fn length(&self) -> u32 {
        self.inner.length
    }

    /// Capacity of the backing buffer in bytes. May exceed
    /// `length() * sample_type().element_size()` due to pool reuse.
    pub fn capacity(&self) -> usize {
        self.inner.buffer.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    /// Current strong reference count. `1` for a freshly pooled sample that
    /// has not yet been distributed.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Increment the refcount before queuing into a buffered or deferred
    /// stage (sorter, write-behind output stream).
    pub fn hold_reference(&self) -> Sample {
        self.clone()
    }

    /// Decrement the refcount. On reaching zero the sample returns to its
    /// originating pool. Equivalent to dropping this handle.
    pub fn free_reference(self) {
        drop(self)
    }

    /// Payload bytes, interpreted as raw bytes regardless of
    /// [`SampleType`]. Empty for a length-0 sample.
    pub fn payload_bytes(&self) -> &[u8] {
        let len = self.inner.length as usize * self.inner.sample_type.element_size();
        &self.inner.buffer.as_deref().unwrap_or(&[])[..len]
    }

    /// Mutable access to header fields and payload, available only while
    /// this is the sole reference — mirrors the invariant that a
    /// distributed sample's fields are never mutated, since any client
    /// holding a clone makes `Arc::get_mut` return `None`.
    pub fn set_timetag(&mut self, timetag_us: i64) -> bool {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => {
                inner.timetag_us = timetag_us;
                true
            }
            None => false,
        }
    }

    pub fn set_id(&mut self, id: SampleId) -> bool {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => {
                inner.id = id;
                true
            }
            None => false,
        }
    }

    /// Set the logical element length and write `bytes` into the payload.
    /// `bytes.len()` must not exceed the allocated capacity. Returns
    /// `false` (no-op) if this sample is currently shared.
    pub fn set_payload(&mut self, length: u32, bytes: &[u8]) -> bool {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => {
                let Some(buf) = inner.buffer.as_mut() else {
                    return false;
                };
                if bytes.len() > buf.len() {
                    return false;
                }
                buf[..bytes.len()].copy_from_slice(bytes);
                inner.length = length;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_id_round_trips_through_bit_packing() {
        let id = SampleId::new(0x05, 0x123, 0xABCD);
        assert_eq!(id.type_code(), 0x05);
        assert_eq!(id.dsm_id(), 0x123);
        assert_eq!(id.sample_index(), 0xABCD);
    }

    #[test]
    fn sample_type_round_trips_through_code() {
        for t in [
            SampleType::Char,
            SampleType::UInt8,
            SampleType::UInt16,
            SampleType::UInt32,
            SampleType::Int32,
            SampleType::Float32,
            SampleType::Float64,
        ] {
            assert_eq!(SampleType::from_code(t.code()), Some(t));
        }
        assert_eq!(SampleType::from_code(63), None);
    }

    #[test]
    fn fresh_sample_from_pool_has_refcount_one() {
        let pool = Arc::new(SamplePool::new());
        let sample = pool.get_sample(64, SampleType::Float32);
        assert_eq!(sample.refcount(), 1);
        assert!(sample.capacity() >= 64);
    }

    #[test]
    fn hold_and_free_reference_track_refcount() {
        let pool = Arc::new(SamplePool::new());
        let sample = pool.get_sample(16, SampleType::UInt8);
        let held = sample.hold_reference();
        assert_eq!(sample.refcount(), 2);
        held.free_reference();
        assert_eq!(sample.refcount(), 1);
    }

    #[test]
    fn mutation_is_rejected_once_shared() {
        let pool = Arc::new(SamplePool::new());
        let mut sample = pool.get_sample(16, SampleType::UInt8);
        let _held = sample.hold_reference();
        assert!(!sample.set_timetag(42));
    }

    #[test]
    fn set_payload_updates_length_and_bytes() {
        let pool = Arc::new(SamplePool::new());
        let mut sample = pool.get_sample(16, SampleType::Float32);
        let data = [1.0f32, 2.0, 3.0];
        let bytes: Vec<u8> = data.iter().flat_map(|f| f.to_le_bytes()).collect();
        assert!(sample.set_payload(3, &bytes));
        assert_eq!(sample.length(), 3);
        assert_eq!(sample.payload_bytes(), bytes.as_slice());
    }
}
