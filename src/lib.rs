// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # nidas-core - a data-acquisition sample pipeline
//!
//! A pure Rust reimplementation of the NIDAS (NCAR In-situ Data Acquisition
//! System) core data-plane: a pooled, reference-counted `Sample` type, a
//! push-based fan-out bus, a time-ordering sorter, a time-of-day-to-absolute
//! clock promoter, and a family of I/O channels and stream codecs for
//! getting samples on and off the wire.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nidas_core::config::SorterConfig;
//! use nidas_core::context::PipelineContext;
//! use nidas_core::fanout::SampleSource;
//! use nidas_core::sorter::SampleSorter;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! fn main() {
//!     let ctx = PipelineContext::new(Duration::from_secs(1));
//!     let output = Arc::new(SampleSource::new());
//!     let sorter = SampleSorter::new(SorterConfig::default(), output);
//!
//!     // elsewhere: sorter.receive(sample) for each sample read off a stream
//!     sorter.interrupt();
//!     let _ = ctx;
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                    SampleInputStream / channel                      |
//! |         File | FileSet | TCP | UDP | McSocket | Unix | RFCOMM       |
//! +---------------------------------------------------------------------+
//! |                          SamplePool                                 |
//! |          size-classed, refcounted, never-shrinking free lists       |
//! +---------------------------------------------------------------------+
//! |                 SampleClock/SampleDater  ->  SampleSorter            |
//! |   tod -> absolute promotion            horizon-based release order  |
//! +---------------------------------------------------------------------+
//! |                  SampleSource  ->  SampleClient fan-out              |
//! |        snapshot-under-lock, panic-isolated per-client delivery       |
//! +---------------------------------------------------------------------+
//! |                       SampleIOProcessor family                       |
//! |       SampleArchiver | SampleSorter-as-processor | SyncRecordGenerator|
//! +---------------------------------------------------------------------+
//! |                SampleOutputStream / channel (mirror of input)        |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`sample::Sample`] | Pooled, refcounted sample header + payload |
//! | [`sample::pool::SamplePool`] | Size-classed free-list allocator |
//! | [`fanout::SampleSource`] | Push-based fan-out to subscribed clients |
//! | [`sorter::SampleSorter`] | Horizon-based time-ordering stage |
//! | [`clock::SampleDater`] | Time-of-day to absolute-UTC promotion |
//! | [`io::IoChannel`] | Capability trait behind every transport variant |
//! | [`sample_stream::SampleInputStream`] | Header-validated sample deserializer |
//! | [`sample_stream::SampleOutputStream`] | Sample + text-header serializer |
//! | [`processor::SampleIOProcessor`] | Downstream stage connect/disconnect contract |
//!
//! ## Modules Overview
//!
//! - [`sample`] - pooled sample type and size-class allocator (start here)
//! - [`fanout`] - push-based distribution to subscribed clients
//! - [`sorter`] - time-ordering stage with configurable backpressure
//! - [`clock`] - time-of-day to absolute-time promotion
//! - [`io`] - channel family, buffered stream, cooperative cancellation
//! - [`wire`] - the 16-byte sample header codec
//! - [`sample_stream`] - sample (de)serialization, archive text header, bad-sample filter
//! - [`processor`] - archiver and sync-record downstream stages
//! - [`config`] - protocol constants and tunables
//! - [`context`] - the shared pool/dater bundle threaded through stage constructors
//! - [`error`] - the crate's `Error` and `IoResult` types

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod fanout;
pub mod io;
pub mod processor;
pub mod sample;
pub mod sample_stream;
pub mod sorter;
pub mod wire;

pub use clock::{DaterStatus, SampleDater};
pub use context::PipelineContext;
pub use error::{Error, IoResult};
pub use fanout::{SampleClient, SampleSource};
pub use io::{CancelToken, IoChannel, IoStream, SampleConnectionRequester};
pub use processor::{SampleArchiver, SampleIOProcessor, SyncRecordGenerator};
pub use sample::pool::SamplePool;
pub use sample::{Sample, SampleId, SampleType};
pub use sample_stream::{BadSampleFilter, FilterRules, SampleInputStream, SampleOutputStream};
pub use sorter::SampleSorter;
pub use wire::SampleHeader;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
