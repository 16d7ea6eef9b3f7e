// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `IoChannel`: the uniform endpoint abstraction every transport (file,
//! FileSet, TCP, UDP, multicast, Unix domain socket, Bluetooth RFCOMM)
//! implements. Capability-based polymorphism: the trait is the method
//! table, variants are concrete implementations behind a uniform handle.

use std::time::Duration;

use crate::error::{Error, IoResult};
use crate::io::cancel::CancelToken;

/// A single endpoint in the pipeline's data path. Not `Sync`: one reader
/// or one writer, matching the original's single-owner discipline —
/// concurrent access is the caller's responsibility (typically via a
/// single [`crate::io::stream::IoStream`] wrapper).
pub trait IoChannel: Send {
    /// Read up to `buf.len()` bytes, blocking at most `timeout` (if any)
    /// and returning early if `cancel` fires.
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>, cancel: &CancelToken) -> IoResult;

    /// Write all of `buf`, blocking at most `timeout` (if any).
    fn write(&mut self, buf: &[u8], timeout: Option<Duration>) -> IoResult;

    /// Establish the connection (open the file, connect the socket,
    /// perform the multicast handshake). Returns once the channel is
    /// ready for `read`/`write`, or a fatal error. Every implementation
    /// here is synchronous, so `requester` is notified inline before this
    /// call returns rather than from a separate networking thread (§4.9's
    /// "for synchronous channels the callback is inline").
    fn request_connection(&mut self, requester: &dyn SampleConnectionRequester) -> Result<(), Error>;

    /// Close the channel. Idempotent.
    fn close(&mut self) -> Result<(), Error>;

    /// A short, human-readable identifier for logging (path, address).
    fn name(&self) -> String;
}

/// Callback wiring for connection establishment (§4.9). Invoked on the
/// networking thread for an asynchronous channel, or inline from
/// `request_connection` for a synchronous one (every channel in this
/// crate); implementations must not block.
pub trait SampleConnectionRequester: Send + Sync {
    /// The requested channel is ready for I/O.
    fn connected(&self, channel_name: &str);

    /// The channel reported a fatal failure and has been closed.
    fn disconnected(&self, channel_name: &str);
}

/// A requester that does nothing, for call sites with no interest in
/// connection lifecycle notifications.
pub struct NullRequester;

impl SampleConnectionRequester for NullRequester {
    fn connected(&self, _channel_name: &str) {}
    fn disconnected(&self, _channel_name: &str) {}
}

/// Default requester for stages that don't own a more specific one:
/// reports connection lifecycle at debug level, tagged by `component`.
pub struct LoggingRequester {
    component: &'static str,
}

impl LoggingRequester {
    pub fn new(component: &'static str) -> Self {
        LoggingRequester { component }
    }
}

impl SampleConnectionRequester for LoggingRequester {
    fn connected(&self, channel_name: &str) {
        log::debug!("[{}] connected: {channel_name}", self.component);
    }

    fn disconnected(&self, channel_name: &str) {
        log::debug!("[{}] disconnected: {channel_name}", self.component);
    }
}
