use std::{io, net::IpAddr, time::Duration};

pub(crate) mod raw_socket;

/// The network capability a trace needs: send one IPv4 datagram, receive one IPv4 datagram.
///
/// `send_to` gets a complete IPv4 packet including its header. `recv_from` writes a complete
/// IPv4 datagram (header included) into `buf` and returns its length and sender. When nothing
/// arrives within `timeout` it fails with [`io::ErrorKind::WouldBlock`] or
/// [`io::ErrorKind::TimedOut`]; any other error aborts the trace.
pub trait TSocket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize>;
    fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)>;
}
