// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Plain-file [`IoChannel`]: wraps a file descriptor opened for read or
//! append. `request_connection` returns immediately — opening a file
//! never blocks on a handshake the way a socket does.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, IoResult};
use crate::io::cancel::CancelToken;
use crate::io::channel::{IoChannel, SampleConnectionRequester};

enum Mode {
    Read,
    Append,
}

pub struct FileChannel {
    path: PathBuf,
    mode: Mode,
    file: Option<File>,
}

impl FileChannel {
    pub fn for_reading(path: impl Into<PathBuf>) -> Self {
        FileChannel { path: path.into(), mode: Mode::Read, file: None }
    }

    pub fn for_appending(path: impl Into<PathBuf>) -> Self {
        FileChannel { path: path.into(), mode: Mode::Append, file: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IoChannel for FileChannel {
    /// A regular file never blocks on data the way a socket does, so there
    /// is no slice to poll — just honor a cancellation requested before
    /// this call started.
    fn read(&mut self, buf: &mut [u8], _timeout: Option<Duration>, cancel: &CancelToken) -> IoResult {
        if cancel.is_cancelled() {
            return IoResult::Cancelled;
        }
        let Some(file) = self.file.as_mut() else {
            return IoResult::Fatal(Error::ChannelClosed(self.path.display().to_string()));
        };
        match file.read(buf) {
            Ok(0) => IoResult::Eof,
            Ok(n) => IoResult::Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => IoResult::WouldBlock,
            Err(e) => IoResult::Fatal(Error::Io(e)),
        }
    }

    fn write(&mut self, buf: &[u8], _timeout: Option<Duration>) -> IoResult {
        let Some(file) = self.file.as_mut() else {
            return IoResult::Fatal(Error::ChannelClosed(self.path.display().to_string()));
        };
        match file.write_all(buf) {
            Ok(()) => IoResult::Ok(buf.len()),
            Err(e) => IoResult::Fatal(Error::Io(e)),
        }
    }

    fn request_connection(&mut self, requester: &dyn SampleConnectionRequester) -> Result<(), Error> {
        let file = match self.mode {
            Mode::Read => File::open(&self.path),
            Mode::Append => OpenOptions::new().create(true).append(true).open(&self.path),
        };
        match file {
            Ok(file) => {
                self.file = Some(file);
                requester.connected(&self.name());
                Ok(())
            }
            Err(e) => {
                requester.disconnected(&self.name());
                Err(Error::Io(e))
            }
        }
    }

    fn close(&mut self) -> Result<(), Error> {
        self.file = None;
        Ok(())
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::channel::NullRequester;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.dat");

        let mut writer = FileChannel::for_appending(&path);
        writer.request_connection(&NullRequester).unwrap();
        assert!(matches!(writer.write(b"hello", None), IoResult::Ok(5)));
        writer.close().unwrap();

        let mut reader = FileChannel::for_reading(&path);
        reader.request_connection(&NullRequester).unwrap();
        let mut buf = [0u8; 5];
        let cancel = CancelToken::new();
        assert!(matches!(reader.read(&mut buf, None, &cancel), IoResult::Ok(5)));
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn read_before_connect_is_fatal() {
        let mut channel = FileChannel::for_reading("/nonexistent/path");
        let cancel = CancelToken::new();
        let mut buf = [0u8; 4];
        assert!(matches!(channel.read(&mut buf, None, &cancel), IoResult::Fatal(_)));
    }

    #[test]
    fn connecting_to_missing_file_for_read_fails() {
        let mut channel = FileChannel::for_reading("/nonexistent/path/really");
        assert!(channel.request_connection(&NullRequester).is_err());
    }
}
