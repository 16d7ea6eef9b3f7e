// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Unix domain socket [`IoChannel`]: local-host stream transport, used the
//! same way a TCP channel is but without network-stack overhead.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::{Error, IoResult};
use crate::io::cancel::CancelToken;
use crate::io::channel::{IoChannel, SampleConnectionRequester};

enum Endpoint {
    Connect(PathBuf),
    Accept(UnixListener),
}

pub struct UnixChannel {
    endpoint: Endpoint,
    stream: Option<UnixStream>,
}

impl UnixChannel {
    pub fn connecting_to(path: impl Into<PathBuf>) -> Self {
        UnixChannel { endpoint: Endpoint::Connect(path.into()), stream: None }
    }

    pub fn accepting_on(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path)?;
        Ok(UnixChannel { endpoint: Endpoint::Accept(listener), stream: None })
    }
}

impl IoChannel for UnixChannel {
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>, cancel: &CancelToken) -> IoResult {
        let Some(stream) = self.stream.as_mut() else {
            return IoResult::Fatal(Error::ChannelClosed("not connected".into()));
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let Some(slice) = cancel.next_slice(deadline) else {
                return if cancel.is_cancelled() { IoResult::Cancelled } else { IoResult::Timeout };
            };
            if let Err(e) = stream.set_read_timeout(Some(slice)) {
                return IoResult::Fatal(Error::Io(e));
            }
            match stream.read(buf) {
                Ok(0) => return IoResult::Eof,
                Ok(n) => return IoResult::Ok(n),
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => continue,
                Err(e) => return IoResult::Fatal(Error::Io(e)),
            }
        }
    }

    fn write(&mut self, buf: &[u8], timeout: Option<Duration>) -> IoResult {
        let Some(stream) = self.stream.as_mut() else {
            return IoResult::Fatal(Error::ChannelClosed("not connected".into()));
        };
        if let Err(e) = stream.set_write_timeout(timeout) {
            return IoResult::Fatal(Error::Io(e));
        }
        match stream.write_all(buf) {
            Ok(()) => IoResult::Ok(buf.len()),
            Err(e) => IoResult::Fatal(Error::Io(e)),
        }
    }

    fn request_connection(&mut self, requester: &dyn SampleConnectionRequester) -> Result<(), Error> {
        let stream = match &self.endpoint {
            Endpoint::Connect(path) => UnixStream::connect(path),
            Endpoint::Accept(listener) => listener.accept().map(|(stream, _)| stream),
        };
        match stream {
            Ok(stream) => {
                self.stream = Some(stream);
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
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Ok(())
    }

    fn name(&self) -> String {
        match &self.endpoint {
            Endpoint::Connect(path) => format!("unix://{}", path.display()),
            Endpoint::Accept(_) => "unix-listen".to_string(),
        }
    }
}
