// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP [`IoChannel`]: datagram endpoint, bound on `request_connection`
//! and optionally pre-connected to a single peer.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crate::error::{Error, IoResult};
use crate::io::cancel::CancelToken;
use crate::io::channel::{IoChannel, SampleConnectionRequester};

pub struct UdpChannel {
    bind_addr: SocketAddr,
    peer: Option<SocketAddr>,
    socket: Option<UdpSocket>,
}

impl UdpChannel {
    pub fn new(bind_addr: SocketAddr, peer: Option<SocketAddr>) -> Self {
        UdpChannel { bind_addr, peer, socket: None }
    }
}

impl IoChannel for UdpChannel {
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>, cancel: &CancelToken) -> IoResult {
        let Some(socket) = self.socket.as_mut() else {
            return IoResult::Fatal(Error::ChannelClosed("not bound".into()));
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let Some(slice) = cancel.next_slice(deadline) else {
                return if cancel.is_cancelled() { IoResult::Cancelled } else { IoResult::Timeout };
            };
            if let Err(e) = socket.set_read_timeout(Some(slice)) {
                return IoResult::Fatal(Error::Io(e));
            }
            match socket.recv(buf) {
                Ok(n) => return IoResult::Ok(n),
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => continue,
                Err(e) => return IoResult::Fatal(Error::Io(e)),
            }
        }
    }

    fn write(&mut self, buf: &[u8], timeout: Option<Duration>) -> IoResult {
        let Some(socket) = self.socket.as_mut() else {
            return IoResult::Fatal(Error::ChannelClosed("not bound".into()));
        };
        if let Err(e) = socket.set_write_timeout(timeout) {
            return IoResult::Fatal(Error::Io(e));
        }
        let result = match self.peer {
            Some(peer) => socket.send_to(buf, peer),
            None => socket.send(buf),
        };
        match result {
            Ok(n) => IoResult::Ok(n),
            Err(e) => IoResult::Fatal(Error::Io(e)),
        }
    }

    fn request_connection(&mut self, requester: &dyn SampleConnectionRequester) -> Result<(), Error> {
        let socket = match UdpSocket::bind(self.bind_addr) {
            Ok(socket) => socket,
            Err(e) => {
                requester.disconnected(&self.name());
                return Err(Error::Io(e));
            }
        };
        if let Some(peer) = self.peer {
            if let Err(e) = socket.connect(peer) {
                requester.disconnected(&self.name());
                return Err(Error::Io(e));
            }
        }
        self.socket = Some(socket);
        requester.connected(&self.name());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.socket = None;
        Ok(())
    }

    fn name(&self) -> String {
        format!("udp://{}", self.bind_addr)
    }
}
