// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint abstraction and buffering layer: [`channel::IoChannel`]
//! variants (file, FileSet, TCP, UDP, multicast, Unix domain socket,
//! Bluetooth RFCOMM) plus [`stream::IoStream`], the user-space buffer that
//! sits on top of one.

pub mod bluetooth;
pub mod cancel;
pub mod channel;
pub mod file;
pub mod fileset;
pub mod mcsocket;
pub mod stream;
pub mod tcp;
pub mod udp;
pub mod unix;

pub use cancel::CancelToken;
pub use channel::{IoChannel, LoggingRequester, NullRequester, SampleConnectionRequester};
pub use stream::IoStream;
