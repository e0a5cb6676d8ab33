use super::TSocket;
use socket2::{Domain, Protocol, Type};
use std::mem::MaybeUninit;
use std::net::IpAddr;
use std::{io, time::Duration};

const IPPROTO_RAW: i32 = 255;
// A zero read timeout would block forever.
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(1);

/// Raw IPv4 sockets: probes go out with our own IP header, ICMP comes back in.
///
/// Opening them needs root privileges or `CAP_NET_RAW`. Both sockets are closed on drop.
pub struct RawSocket {
    sender: socket2::Socket,
    receiver: socket2::Socket,
}

impl RawSocket {
    pub fn new() -> Result<Self, io::Error> {
        tracing::trace!("creating RawSocket");
        let sender = socket2::Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(IPPROTO_RAW)))?;
        sender.set_header_included(true)?;
        let receiver = socket2::Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
        Ok(RawSocket { sender, receiver })
    }
}

impl TSocket for RawSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.sender.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)> {
        self.receiver.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

        // Socket2 never writes uninitialized bytes into the buffer, which makes it sound to view
        // the initialized `&mut [u8]` as `&mut [MaybeUninit<u8>]`.
        // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
        //
        // On a RAW socket we get the whole IP packet.
        let (n_bytes, socket_addr) = self
            .receiver
            .recv_from(unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) })?;
        let ip = socket_addr
            .as_socket_ipv4()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "received from a non-IPv4 address"))?;
        Ok((n_bytes, IpAddr::V4(*ip.ip())))
    }
}
