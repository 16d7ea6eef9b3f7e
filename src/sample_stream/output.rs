// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `SampleOutputStream`: serializes [`Sample`]s to an [`IoStream`],
//! emitting the text archive header once at connection open (§4.7).

use crate::error::{Error, IoResult};
use crate::io::{IoStream, LoggingRequester};
use crate::sample::Sample;
use crate::sample_stream::header::ArchiveHeader;
use crate::wire::SampleHeader;

pub struct SampleOutputStream {
    io: IoStream,
    header: ArchiveHeader,
    header_written: bool,
}

impl SampleOutputStream {
    pub fn new(io: IoStream, header: ArchiveHeader) -> Self {
        SampleOutputStream { io, header, header_written: false }
    }

    /// Establish the underlying channel, then immediately write the text
    /// header — matching the original's "SampleOutputStream immediately
    /// writes a text header" contract (§4.7 step 2).
    pub fn init(&mut self) -> Result<(), Error> {
        self.io.request_connection(&LoggingRequester::new("SampleOutputStream"))?;
        self.write_header()
    }

    fn write_header(&mut self) -> Result<(), Error> {
        if self.header_written {
            return Ok(());
        }
        let encoded = self.header.encode();
        match self.io.write(&encoded) {
            IoResult::Ok(_) => {
                self.header_written = true;
                Ok(())
            }
            IoResult::Fatal(e) => Err(e),
            _ => Err(Error::Io(std::io::Error::other("short header write"))),
        }
    }

    /// Serialize `sample`'s wire header and payload and append to the
    /// underlying stream. Always frees the sample's reference before
    /// returning, matching [`crate::fanout::SampleSource::distribute`]'s
    /// discipline — this stream is typically registered as a
    /// [`crate::fanout::SampleClient`] downstream of a sorter.
    pub fn write_sample(&mut self, sample: Sample) -> Result<(), Error> {
        let wire_header = SampleHeader {
            timetag_us: sample.timetag_us(),
            id: sample.id(),
            length: sample.length(),
        };
        let mut buf = vec![0u8; SampleHeader::WIRE_LEN];
        wire_header.encode(&mut buf)?;
        buf.extend_from_slice(sample.payload_bytes());
        sample.free_reference();

        match self.io.write(&buf) {
            IoResult::Ok(_) => Ok(()),
            IoResult::Fatal(e) => Err(e),
            _ => Err(Error::Io(std::io::Error::other("short sample write"))),
        }
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        match self.io.flush() {
            IoResult::Ok(_) => Ok(()),
            IoResult::Fatal(e) => Err(e),
            _ => Ok(()),
        }
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.io.close()
    }
}
