// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `SampleInputStream`: deserializes [`Sample`]s from an [`IoStream`],
//! validating the text header at connection open and each sample header
//! against a [`BadSampleFilter`], resynchronizing on rejection by scanning
//! forward for the next plausible header (§4.7).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, IoResult};
use crate::io::{CancelToken, IoStream, LoggingRequester};
use crate::sample::pool::SamplePool;
use crate::sample::{Sample, SampleType};
use crate::sample_stream::filter::BadSampleFilter;
use crate::sample_stream::header::ArchiveHeader;
use crate::wire::SampleHeader;

#[derive(Default)]
pub struct InputStats {
    pub samples_read: AtomicU64,
    pub resyncs: AtomicU64,
}

pub struct SampleInputStream {
    io: IoStream,
    pool: Arc<SamplePool>,
    filter: Arc<BadSampleFilter>,
    header: Option<ArchiveHeader>,
    stats: InputStats,
}

impl SampleInputStream {
    pub fn new(io: IoStream, pool: Arc<SamplePool>, filter: Arc<BadSampleFilter>) -> Self {
        SampleInputStream { io, pool, filter, header: None, stats: InputStats::default() }
    }

    pub fn stats(&self) -> &InputStats {
        &self.stats
    }

    pub fn archive_header(&self) -> Option<&ArchiveHeader> {
        self.header.as_ref()
    }

    /// Connect, then read and validate the text header one line at a time
    /// until `end header` (§4.7 step 3). Here expressed by reading the
    /// whole header region byte-at-a-time since the underlying stream
    /// doesn't expose line framing directly.
    pub fn init(&mut self, cancel: &CancelToken) -> Result<(), Error> {
        self.io.request_connection(&LoggingRequester::new("SampleInputStream"))?;
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.io.read_exact(&mut byte, None, cancel) {
                IoResult::Ok(_) => buf.push(byte[0]),
                IoResult::Eof => return Err(Error::Parse("stream ended before header completed".into())),
                IoResult::Fatal(e) => return Err(e),
                IoResult::Cancelled => return Err(Error::Cancelled),
                IoResult::Timeout | IoResult::WouldBlock => continue,
            }
            if buf.ends_with(b"end header\n") {
                break;
            }
        }
        let (header, offset) = ArchiveHeader::decode(&buf)?;
        self.io.putback(&buf[offset..]);
        self.header = Some(header);
        Ok(())
    }

    /// Read one validated sample, or `None` on clean EOF. On a filter
    /// rejection, scans forward byte-by-byte to resynchronize and retries
    /// rather than propagating a parse error — "parse errors never
    /// propagate past the stream" (§4 Failure model).
    pub fn read_sample(&mut self, timeout: Option<Duration>, cancel: &CancelToken) -> Result<Option<Sample>, Error> {
        let mut header_buf = vec![0u8; SampleHeader::WIRE_LEN];
        let header = 'find_header: loop {
            loop {
                match self.io.read_exact(&mut header_buf, timeout, cancel) {
                    IoResult::Ok(_) => break,
                    IoResult::Eof => return Ok(None),
                    IoResult::Timeout => return Err(Error::Timeout),
                    IoResult::Fatal(e) => return Err(e),
                    IoResult::Cancelled => return Err(Error::Cancelled),
                    IoResult::WouldBlock => continue,
                }
            }
            let candidate = SampleHeader::decode(&header_buf)?;

            if self.filter.accept(&candidate) {
                break 'find_header candidate;
            }
            self.stats.resyncs.fetch_add(1, Ordering::Relaxed);
            // resync() leaves a freshly-validated header's bytes fully
            // consumed from the stream; use it directly rather than
            // reading another 16 bytes that would really be payload.
            break 'find_header self.resync(cancel)?;
        };

        let sample_type = SampleType::from_code(header.id.type_code())
            .ok_or_else(|| Error::Parse(format!("unknown sample type code {}", header.id.type_code())))?;
        let byte_len = header.length as usize * sample_type.element_size();
        let mut payload = vec![0u8; byte_len];
        loop {
            match self.io.read_exact(&mut payload, timeout, cancel) {
                IoResult::Ok(_) => break,
                IoResult::Eof => return Ok(None),
                IoResult::Timeout => return Err(Error::Timeout),
                IoResult::Fatal(e) => return Err(e),
                IoResult::WouldBlock => continue,
            }
        }

        let mut sample = self.pool.get_sample(byte_len, sample_type);
        sample.set_timetag(header.timetag_us);
        sample.set_id(header.id);
        sample.set_payload(header.length, &payload);
        self.stats.samples_read.fetch_add(1, Ordering::Relaxed);
        Ok(Some(sample))
    }

    /// Scan forward one byte at a time looking for a header that the
    /// filter accepts, to recover from a corrupt or lied-about length.
    /// Returns the accepted header; its bytes are fully consumed from the
    /// stream by the time this returns.
    fn resync(&mut self, cancel: &CancelToken) -> Result<SampleHeader, Error> {
        let mut window = vec![0u8; SampleHeader::WIRE_LEN];
        loop {
            let mut byte = [0u8; 1];
            match self.io.read_exact(&mut byte, None, cancel) {
                IoResult::Ok(_) => {
                    window.remove(0);
                    window.push(byte[0]);
                }
                IoResult::Eof => return Err(Error::Parse("stream ended during resync".into())),
                IoResult::Fatal(e) => return Err(e),
                IoResult::Cancelled => return Err(Error::Cancelled),
                IoResult::Timeout | IoResult::WouldBlock => continue,
            }
            if let Ok(header) = SampleHeader::decode(&window) {
                if self.filter.accept(&header) {
                    return Ok(header);
                }
            }
        }
    }
}
