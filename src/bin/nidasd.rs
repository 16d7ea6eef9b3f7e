// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! nidasd - archive or replay a sample stream.
//!
//! Exercises the core pipeline end to end without the XML-driven
//! configuration system of the original daemon: `archive` generates
//! synthetic samples, time-orders them through a `SampleSorter`, and writes
//! them through a `SampleArchiver`; `replay` reads an archived file back and
//! prints each sample.
//!
//! ```text
//! nidasd archive /tmp/out.dat -n 500
//! nidasd replay /tmp/out.dat
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use nidas_core::config::StreamConfig;
use nidas_core::context::PipelineContext;
use nidas_core::fanout::SampleSource;
use nidas_core::io::cancel::CancelToken;
use nidas_core::io::file::FileChannel;
use nidas_core::io::IoStream;
use nidas_core::processor::{SampleArchiver, SampleIOProcessor};
use nidas_core::sample::{SampleId, SampleType};
use nidas_core::sample_stream::{ArchiveHeader, BadSampleFilter, SampleInputStream, SampleOutputStream};
use nidas_core::sorter::SampleSorter;

#[derive(Parser, Debug)]
#[command(name = "nidasd")]
#[command(version)]
#[command(about = "Archive or replay a sorted sample stream")]
struct Args {
    /// Foreground, debug-level logging to stderr instead of info-level.
    #[arg(short = 'd', long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate synthetic samples, sort them, and archive to a file.
    Archive {
        /// Archive file path.
        path: PathBuf,
        /// Number of samples to generate.
        #[arg(short = 'n', long, default_value = "100")]
        count: u32,
        /// DSM id tagged on every generated sample.
        #[arg(long, default_value = "1")]
        dsm_id: u16,
    },
    /// Read an archived file back and print each sample.
    Replay {
        /// Archive file path.
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(if args.debug { LevelFilter::Debug } else { LevelFilter::Info })
        .format_timestamp_millis()
        .init();

    let result = match args.command {
        Command::Archive { path, count, dsm_id } => run_archive(&path, count, dsm_id),
        Command::Replay { path } => run_replay(&path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("[nidasd] {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_archive(path: &std::path::Path, count: u32, dsm_id: u16) -> Result<(), nidas_core::Error> {
    let ctx = PipelineContext::new(Duration::from_secs(1));

    let channel = FileChannel::for_appending(path);
    let io = IoStream::new(Box::new(channel), StreamConfig::default());
    let header = ArchiveHeader::new().with_tag("project name", "nidasd");
    let output_stream = SampleOutputStream::new(io, header);
    let archiver = SampleArchiver::new(output_stream);

    let source = Arc::new(SampleSource::new());
    archiver.clone().connect(&source);

    let sorter = SampleSorter::new(nidas_core::config::SorterConfig::default(), source.clone());

    let base_us = 1_700_000_000_000_000i64;
    let id = SampleId::new(SampleType::Float32.code(), dsm_id, 1);
    for i in 0..count {
        // Out-of-order by design, exercising the sorter's reordering.
        let jitter_us = (fastrand::i64(-5_000..5_000)).max(-(i as i64) * 10_000);
        let timetag_us = base_us + i as i64 * 10_000 + jitter_us;
        let value = fastrand::f32() * 100.0;

        let mut sample = ctx.pool().get_sample(4, SampleType::Float32);
        sample.set_timetag(timetag_us);
        sample.set_id(id);
        sample.set_payload(1, &value.to_le_bytes());
        sorter.receive(sample);
    }
    sorter.flush();
    sorter.interrupt();
    archiver.disconnect(&source);
    log::info!("[nidasd] archived {count} samples to {}", path.display());
    Ok(())
}

fn run_replay(path: &std::path::Path) -> Result<(), nidas_core::Error> {
    let pool = Arc::new(nidas_core::sample::pool::SamplePool::new());
    let filter = Arc::new(BadSampleFilter::default());
    let channel = FileChannel::for_reading(path);
    let io = IoStream::new(Box::new(channel), StreamConfig::default());
    let mut input = SampleInputStream::new(io, pool, filter);
    let cancel = CancelToken::new();
    input.init(&cancel)?;

    if let Some(header) = input.archive_header() {
        for (key, value) in &header.tags {
            println!("# {key}: {value}");
        }
    }

    let mut n = 0u64;
    loop {
        match input.read_sample(None, &cancel) {
            Ok(Some(sample)) => {
                println!("{}\t{:?}\t{}", sample.timetag_us(), sample.id(), sample.length());
                n += 1;
            }
            Ok(None) => break,
            Err(e) => return Err(e),
        }
    }
    log::info!(
        "[nidasd] replayed {n} samples ({} resyncs)",
        input.stats().resyncs.load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}
