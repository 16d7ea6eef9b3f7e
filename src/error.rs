// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Grouped by semantic category rather than by originating module, matching
//! the kinds enumerated for this pipeline: transient/fatal I/O, timeouts,
//! parse failures, configuration errors, and resource exhaustion.

use std::fmt;

/// Top-level error type for fatal conditions that must propagate out of a
/// pipeline stage. Transient I/O conditions use [`IoResult`] instead; they
/// are not exceptional on this hot path and converting every `WouldBlock`
/// into an `Error` would force an allocation per short read.
#[derive(Debug)]
pub enum Error {
    /// A required configuration parameter was missing or out of range.
    /// Fatal at startup; never raised during steady-state operation.
    Configuration(String),

    /// An underlying OS I/O operation failed terminally (not transient).
    Io(std::io::Error),

    /// A channel reported a fatal condition that is not a raw `io::Error`
    /// (closed peer, POLLHUP, protocol-level rejection).
    ChannelClosed(String),

    /// A blocking read exceeded its deadline.
    Timeout,

    /// A blocking read was unblocked by a [`crate::io::CancelToken`] rather
    /// than completing or timing out.
    Cancelled,

    /// A sample header or archive text header failed validation and the
    /// stream could not resynchronize.
    Parse(String),

    /// Pool or buffer growth failed due to memory exhaustion.
    Resource(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::ChannelClosed(msg) => write!(f, "channel closed: {msg}"),
            Error::Timeout => write!(f, "operation timed out"),
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::Resource(msg) => write!(f, "resource error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result of a single I/O attempt on an [`crate::io::IoChannel`].
///
/// Mirrors the original's exception hierarchy (`IOException`,
/// `IOTimeoutException`) as a sum type rather than control flow via throw:
/// short reads and `EAGAIN` are routine on this hot path and must not carry
/// allocation or unwinding cost.
#[derive(Debug)]
pub enum IoResult {
    /// `n` bytes were transferred.
    Ok(usize),
    /// The operation would block and no timeout was given; try again later.
    WouldBlock,
    /// The operation's deadline elapsed before it completed.
    Timeout,
    /// The peer closed the channel cleanly (POLLHUP / 0-byte read).
    Eof,
    /// The channel failed terminally and must be closed and reconnected.
    Fatal(Error),
    /// The wait was unblocked by a [`crate::io::CancelToken`] before the
    /// operation completed or its own deadline elapsed.
    Cancelled,
}

impl IoResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, IoResult::Ok(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, IoResult::Fatal(_) | IoResult::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants_are_non_empty() {
        let variants = vec![
            Error::Configuration("missing port".into()),
            Error::ChannelClosed("peer hung up".into()),
            Error::Timeout,
            Error::Cancelled,
            Error::Parse("bad magic".into()),
            Error::Resource("pool exhausted".into()),
        ];
        for v in variants {
            assert!(!v.to_string().is_empty());
        }
    }

    #[test]
    fn io_error_converts_and_has_source() {
        let io_err = std::io::Error::other("boom");
        let err: Error = io_err.into();
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn io_result_classification() {
        assert!(IoResult::Ok(4).is_ok());
        assert!(!IoResult::WouldBlock.is_ok());
        assert!(IoResult::Eof.is_fatal());
        assert!(IoResult::Fatal(Error::Timeout).is_fatal());
        assert!(!IoResult::WouldBlock.is_fatal());
    }
}
