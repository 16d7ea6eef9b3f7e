// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP [`IoChannel`]. Blocking with per-call read/write timeouts, mirroring
//! the original's `ppoll`-with-timeout read discipline without committing
//! to a reactor thread — one `IoStream` owns one connection.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use crate::error::{Error, IoResult};
use crate::io::cancel::CancelToken;
use crate::io::channel::{IoChannel, SampleConnectionRequester};

enum Endpoint {
    Connect(SocketAddr),
    Accept(TcpListener),
}

pub struct TcpChannel {
    endpoint: Endpoint,
    stream: Option<TcpStream>,
}

impl TcpChannel {
    pub fn connecting_to(addr: SocketAddr) -> Self {
        TcpChannel { endpoint: Endpoint::Connect(addr), stream: None }
    }

    pub fn accepting_on(addr: SocketAddr) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr)?;
        Ok(TcpChannel { endpoint: Endpoint::Accept(listener), stream: None })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    /// Accept with a deadline, for the McSocket requester waiting on the
    /// server's reply connection. Polls a non-blocking listener in short
    /// slices rather than blocking indefinitely in `accept()`.
    pub fn request_connection_with_timeout(
        &mut self,
        timeout: Duration,
        requester: &dyn SampleConnectionRequester,
    ) -> Result<(), Error> {
        let Endpoint::Accept(listener) = &self.endpoint else {
            return self.request_connection(requester);
        };
        listener.set_nonblocking(true)?;
        let deadline = std::time::Instant::now() + timeout;
        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    stream.set_nodelay(true)?;
                    self.stream = Some(stream);
                    requester.connected(&self.name());
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if std::time::Instant::now() >= deadline {
                        requester.disconnected(&self.name());
                        return Err(Error::Timeout);
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(e) => {
                    requester.disconnected(&self.name());
                    return Err(Error::Io(e));
                }
            }
        }
    }
}

impl IoChannel for TcpChannel {
    /// Polls in `CancelToken::POLL_SLICE`-sized attempts rather than
    /// committing to `timeout` in one blocking syscall, so `cancel.cancel()`
    /// from another thread unblocks this call within one slice.
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
            Endpoint::Connect(addr) => TcpStream::connect(addr),
            Endpoint::Accept(listener) => listener.accept().map(|(stream, _)| stream),
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                requester.disconnected(&self.name());
                return Err(Error::Io(e));
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            requester.disconnected(&self.name());
            return Err(Error::Io(e));
        }
        self.stream = Some(stream);
        requester.connected(&self.name());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Ok(())
    }

    fn name(&self) -> String {
        match &self.endpoint {
            Endpoint::Connect(addr) => format!("tcp://{addr}"),
            Endpoint::Accept(listener) => format!(
                "tcp-listen://{}",
                listener.local_addr().map(|a| a.to_string()).unwrap_or_default()
            ),
        }
    }
}
