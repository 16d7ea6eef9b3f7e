// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `IoStream`: a user-space buffer over an [`IoChannel`]. Owns the
//! channel, is constructed with a suggested buffer size, and is not
//! thread-safe — one reader or one writer only (§4.6). Flushes the write
//! buffer on byte-count or elapsed-time boundaries; upper layers
//! (`SampleInputStream`/`SampleOutputStream`) own the sample framing.

use std::time::{Duration, Instant};

use crate::config::StreamConfig;
use crate::error::{Error, IoResult};
use crate::io::cancel::CancelToken;
use crate::io::channel::{IoChannel, SampleConnectionRequester};

/// Incremental read state, mirroring a length-prefixed frame reader: an
/// `IoStream` doesn't know about sample framing, but it does need to track
/// how much of the last short read remains unconsumed by its caller.
pub struct IoStream {
    channel: Box<dyn IoChannel>,
    config: StreamConfig,
    read_buf: Vec<u8>,
    read_pos: usize,
    read_len: usize,
    write_buf: Vec<u8>,
    last_flush: Instant,
}

impl IoStream {
    pub fn new(channel: Box<dyn IoChannel>, config: StreamConfig) -> Self {
        let buffer_size = config.buffer_size;
        IoStream {
            channel,
            config,
            read_buf: vec![0u8; buffer_size],
            read_pos: 0,
            read_len: 0,
            write_buf: Vec::with_capacity(buffer_size),
            last_flush: Instant::now(),
        }
    }

    pub fn request_connection(&mut self, requester: &dyn SampleConnectionRequester) -> Result<(), Error> {
        self.channel.request_connection(requester)
    }

    pub fn channel_name(&self) -> String {
        self.channel.name()
    }

    /// Bytes currently sitting in the read buffer, already fetched from the
    /// channel but not yet consumed by the caller.
    pub fn available(&self) -> usize {
        self.read_len - self.read_pos
    }

    /// Push `bytes` back to the front of the read buffer so a later
    /// `read_exact` sees them again — for a caller that peeked past the
    /// part of a frame it understood (§4.6, §6 resynchronization).
    pub fn putback(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let remaining = self.read_buf[self.read_pos..self.read_len].to_vec();
        self.read_buf.clear();
        self.read_buf.extend_from_slice(bytes);
        self.read_buf.extend_from_slice(&remaining);
        if self.read_buf.len() < self.config.buffer_size {
            self.read_buf.resize(self.config.buffer_size, 0);
        }
        self.read_pos = 0;
        self.read_len = bytes.len() + remaining.len();
    }

    /// Fill `out` with exactly `out.len()` bytes, refilling the internal
    /// read buffer from the channel as needed. Returns `Eof` if the
    /// channel closes before `out` is filled.
    pub fn read_exact(&mut self, out: &mut [u8], timeout: Option<Duration>, cancel: &CancelToken) -> IoResult {
        let mut filled = 0;
        while filled < out.len() {
            if self.read_pos == self.read_len {
                match self.channel.read(&mut self.read_buf, timeout, cancel) {
                    IoResult::Ok(n) => {
                        self.read_pos = 0;
                        self.read_len = n;
                    }
                    other => return other,
                }
            }
            let available = self.read_len - self.read_pos;
            let take = available.min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&self.read_buf[self.read_pos..self.read_pos + take]);
            self.read_pos += take;
            filled += take;
        }
        IoResult::Ok(filled)
    }

    /// Buffer `bytes` for write, flushing immediately if the configured
    /// buffer size or flush interval has been reached.
    pub fn write(&mut self, bytes: &[u8]) -> IoResult {
        self.write_buf.extend_from_slice(bytes);
        if self.write_buf.len() >= self.config.buffer_size || self.last_flush.elapsed() >= self.config.flush_interval {
            return self.flush();
        }
        IoResult::Ok(bytes.len())
    }

    pub fn flush(&mut self) -> IoResult {
        if self.write_buf.is_empty() {
            self.last_flush = Instant::now();
            return IoResult::Ok(0);
        }
        let result = self.channel.write(&self.write_buf, None);
        if let IoResult::Ok(n) = result {
            self.write_buf.clear();
            self.last_flush = Instant::now();
            return IoResult::Ok(n);
        }
        result
    }

    pub fn close(&mut self) -> Result<(), Error> {
        let _ = self.flush();
        self.channel.close()
    }
}
