// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bluetooth RFCOMM [`IoChannel`], feature-gated behind `bluetooth`. NIDAS
//! used this to talk to serial-over-Bluetooth sensors (GPS pucks,
//! handheld weather stations); kept here as a thin `libc` wrapper over
//! `AF_BLUETOOTH`/`BTPROTO_RFCOMM`, Linux-only like the original.

#![cfg(feature = "bluetooth")]
#![cfg(target_os = "linux")]

use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

use libc::{c_int, pollfd, sockaddr, socket, AF_BLUETOOTH, POLLIN, SOCK_STREAM};

use crate::error::{Error, IoResult};
use crate::io::cancel::CancelToken;
use crate::io::channel::{IoChannel, SampleConnectionRequester};

const BTPROTO_RFCOMM: c_int = 3;

/// A Bluetooth device address, `XX:XX:XX:XX:XX:XX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mut bytes = [0u8; 6];
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(Error::Configuration(format!("invalid bluetooth address: {s}")));
        }
        for (i, part) in parts.iter().enumerate() {
            bytes[5 - i] = u8::from_str_radix(part, 16)
                .map_err(|_| Error::Configuration(format!("invalid bluetooth address: {s}")))?;
        }
        Ok(BdAddr(bytes))
    }
}

#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

fn rfcomm_socket() -> io::Result<RawFd> {
    let fd = unsafe { socket(AF_BLUETOOTH, SOCK_STREAM, BTPROTO_RFCOMM) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

pub struct BluetoothChannel {
    addr: BdAddr,
    channel: u8,
    fd: Option<RawFd>,
}

impl BluetoothChannel {
    pub fn connecting_to(addr: BdAddr, channel: u8) -> Self {
        BluetoothChannel { addr, channel, fd: None }
    }
}

impl IoChannel for BluetoothChannel {
    /// Polls the raw fd in `CancelToken::POLL_SLICE`-sized steps with
    /// `libc::poll` rather than committing to one `libc::read` that could
    /// block past `timeout` with no way to unblock it from another thread.
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>, cancel: &CancelToken) -> IoResult {
        let Some(fd) = self.fd else {
            return IoResult::Fatal(Error::ChannelClosed("not connected".into()));
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let Some(slice) = cancel.next_slice(deadline) else {
                return if cancel.is_cancelled() { IoResult::Cancelled } else { IoResult::Timeout };
            };
            let mut fds = [pollfd { fd, events: POLLIN, revents: 0 }];
            let ret = unsafe { libc::poll(fds.as_mut_ptr(), 1, slice.as_millis() as c_int) };
            if ret < 0 {
                return IoResult::Fatal(Error::Io(io::Error::last_os_error()));
            }
            if ret == 0 {
                continue; // this slice elapsed; re-check cancellation/deadline
            }
            let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut _, buf.len()) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    continue;
                }
                return IoResult::Fatal(Error::Io(err));
            }
            if n == 0 {
                return IoResult::Eof;
            }
            return IoResult::Ok(n as usize);
        }
    }

    fn write(&mut self, buf: &[u8], _timeout: Option<Duration>) -> IoResult {
        let Some(fd) = self.fd else {
            return IoResult::Fatal(Error::ChannelClosed("not connected".into()));
        };
        let n = unsafe { libc::write(fd, buf.as_ptr() as *const _, buf.len()) };
        if n < 0 {
            return IoResult::Fatal(Error::Io(io::Error::last_os_error()));
        }
        IoResult::Ok(n as usize)
    }

    fn request_connection(&mut self, requester: &dyn SampleConnectionRequester) -> Result<(), Error> {
        let fd = match rfcomm_socket() {
            Ok(fd) => fd,
            Err(e) => {
                requester.disconnected(&self.name());
                return Err(Error::Io(e));
            }
        };
        let sockaddr = SockaddrRc {
            rc_family: AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: self.addr.0,
            rc_channel: self.channel,
        };
        let ret = unsafe {
            libc::connect(
                fd,
                &sockaddr as *const SockaddrRc as *const sockaddr,
                std::mem::size_of::<SockaddrRc>() as u32,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            requester.disconnected(&self.name());
            return Err(Error::Io(err));
        }
        self.fd = Some(fd);
        requester.connected(&self.name());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(fd) = self.fd.take() {
            unsafe { libc::close(fd) };
        }
        Ok(())
    }

    fn name(&self) -> String {
        format!(
            "rfcomm://{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}/{}",
            self.addr.0[5], self.addr.0[4], self.addr.0[3], self.addr.0[2], self.addr.0[1], self.addr.0[0], self.channel
        )
    }
}

impl Drop for BluetoothChannel {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
