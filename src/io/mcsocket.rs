// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `McSocket`: multicast request/reply rendezvous. A requester multicasts
//! a small datagram carrying its unicast endpoint and a request-type tag
//! to a well-known group/port; a listening server replies by opening a
//! unicast TCP connection back to that endpoint.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use crate::error::Error;
use crate::io::channel::SampleConnectionRequester;
use crate::io::tcp::TcpChannel;

/// Join `group` on every non-loopback IPv4 interface, tolerating
/// `EADDRINUSE` (already joined on the same physical NIC) as routine.
pub fn join_multicast_group(socket: &UdpSocket, group: Ipv4Addr) -> io::Result<()> {
    let interfaces = local_ip_address::list_afinet_netifas()
        .map(|list| {
            list.into_iter()
                .filter_map(|(_, addr)| match addr {
                    std::net::IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if interfaces.is_empty() {
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        log::debug!("[McSocket] join_multicast_v4({group}) on UNSPECIFIED");
        return Ok(());
    }

    for iface in &interfaces {
        match socket.join_multicast_v4(&group, iface) {
            Ok(()) => log::debug!("[McSocket] join_multicast_v4({group}) on interface {iface}"),
            Err(e) if e.raw_os_error() == Some(98) => {
                log::debug!("[McSocket] join_multicast_v4({group}) on {iface} - already joined");
            }
            Err(e) => log::debug!("[McSocket] join_multicast_v4({group}) on {iface} failed (non-fatal): {e}"),
        }
    }
    Ok(())
}

/// The request-type tag carried in the multicast datagram so a listening
/// server can distinguish which of its services a requester wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestType(pub u32);

/// Requester side of the rendezvous: multicasts its request, then waits
/// (blocking, with `timeout`) for the server's reply TCP connection.
pub struct McSocketRequester {
    group: SocketAddrV4,
    request_type: RequestType,
    reply_listener: TcpChannel,
}

impl McSocketRequester {
    pub fn new(group: SocketAddrV4, request_type: RequestType, reply_bind: SocketAddr) -> Result<Self, Error> {
        Ok(McSocketRequester {
            group,
            request_type,
            reply_listener: TcpChannel::accepting_on(reply_bind)?,
        })
    }

    /// Send the multicast request datagram, encoding `request_type` and
    /// `reply_addr` (this requester's unicast endpoint for the server's
    /// reply connection).
    pub fn send_request(&self, reply_addr: SocketAddr) -> Result<(), Error> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        join_multicast_group(&socket, *self.group.ip())?;
        let mut datagram = Vec::with_capacity(10);
        datagram.extend_from_slice(&self.request_type.0.to_le_bytes());
        match reply_addr {
            SocketAddr::V4(v4) => {
                datagram.extend_from_slice(&v4.ip().octets());
                datagram.extend_from_slice(&v4.port().to_le_bytes());
            }
            SocketAddr::V6(_) => return Err(Error::Configuration("McSocket requires IPv4".into())),
        }
        socket.send_to(&datagram, self.group)?;
        Ok(())
    }

    /// Block until the server's reply connection arrives, or `timeout`
    /// elapses.
    pub fn await_reply(&mut self, timeout: Duration, requester: &dyn SampleConnectionRequester) -> Result<(), Error> {
        self.reply_listener
            .request_connection_with_timeout(timeout, requester)
    }
}

/// Decode a request datagram received by a listening server.
pub fn decode_request(datagram: &[u8]) -> Result<(RequestType, SocketAddr), Error> {
    if datagram.len() < 10 {
        return Err(Error::Parse("McSocket request datagram too short".into()));
    }
    let request_type = RequestType(u32::from_le_bytes(datagram[0..4].try_into().unwrap()));
    let ip = Ipv4Addr::new(datagram[4], datagram[5], datagram[6], datagram[7]);
    let port = u16::from_le_bytes(datagram[8..10].try_into().unwrap());
    Ok((request_type, SocketAddr::V4(SocketAddrV4::new(ip, port))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_datagram_round_trips() {
        let reply_addr: SocketAddr = "10.0.0.5:4321".parse().unwrap();
        let mut datagram = Vec::new();
        datagram.extend_from_slice(&7u32.to_le_bytes());
        if let SocketAddr::V4(v4) = reply_addr {
            datagram.extend_from_slice(&v4.ip().octets());
            datagram.extend_from_slice(&v4.port().to_le_bytes());
        }
        let (req_type, addr) = decode_request(&datagram).unwrap();
        assert_eq!(req_type, RequestType(7));
        assert_eq!(addr, reply_addr);
    }

    #[test]
    fn short_datagram_is_rejected() {
        assert!(decode_request(&[1, 2, 3]).is_err());
    }
}
