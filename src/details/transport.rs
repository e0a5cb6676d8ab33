use crate::details::icmp::v4::{parse_reply, ProbeRequest, TSocket};
use crate::details::records::ProbeSendRecord;
use crate::details::{TraceError, TraceFoxResult};
use crate::ProbeReply;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

// Large enough for any ICMP error a router sends back.
const RECV_BUFFER_LEN: usize = 1500;

pub(crate) struct Transport<S> {
    socket: S,
}

impl<S> Transport<S>
where
    S: TSocket,
{
    pub(crate) fn new(socket: S) -> Self {
        Transport { socket }
    }

    /// Sends `request` and waits up to `timeout` for the reply that belongs to it.
    ///
    /// `Ok(None)` is a timeout.
    pub(crate) fn send_and_wait(&self, request: &ProbeRequest, timeout: Duration) -> TraceFoxResult<Option<ProbeReply>> {
        let send_record = self.send(request)?;
        self.wait_for_reply(request, &send_record, timeout)
    }

    fn send(&self, request: &ProbeRequest) -> TraceFoxResult<ProbeSendRecord> {
        let addr: socket2::SockAddr = SocketAddr::new(IpAddr::V4(request.destination), 0).into();
        let send_time = Instant::now();
        let packet_size = self.socket.send_to(&request.packet, &addr)?;
        let send_record = ProbeSendRecord {
            packet_size,
            destination: request.destination,
            ttl: request.ttl,
            sequence_number: request.sequence_number,
            send_time,
        };
        tracing::trace!(
            destination = %send_record.destination,
            ttl = %send_record.ttl,
            sequence_number = ?send_record.sequence_number,
            packet_size = send_record.packet_size,
            "probe sent"
        );
        Ok(send_record)
    }

    fn wait_for_reply(
        &self,
        request: &ProbeRequest,
        send_record: &ProbeSendRecord,
        timeout: Duration,
    ) -> TraceFoxResult<Option<ProbeReply>> {
        let deadline = send_record
            .send_time
            .checked_add(timeout)
            .ok_or_else(|| TraceError::InvalidConfig(format!("timeout of {timeout:?} is out of range")))?;
        let mut buf = [0u8; RECV_BUFFER_LEN];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let (n_bytes, from) = match self.socket.recv_from(&mut buf, remaining) {
                Ok(received) => received,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            let receive_time = Instant::now();

            let parsed = match parse_reply(&buf[..n_bytes.min(buf.len())]) {
                Some(parsed) => parsed,
                None => {
                    tracing::trace!(%from, "ignoring datagram that is not ICMP");
                    continue;
                }
            };
            if !parsed.probe.map_or(false, |quoted| request.matches(&quoted)) {
                tracing::trace!(%from, classification = ?parsed.classification, "ignoring uncorrelated reply");
                continue;
            }

            let rtt = receive_time.duration_since(send_record.send_time);
            if rtt >= timeout {
                return Ok(None);
            }
            tracing::trace!(ttl = %send_record.ttl, responder = %parsed.responder, ?rtt, "reply received");
            return Ok(Some(ProbeReply { responder: parsed.responder, rtt, classification: parsed.classification }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::icmp::v4::tests::{Hop, OnReceive, OnSend, SocketMock};
    use crate::details::icmp::v4::{ProbeBuilder, SequenceNumber, Ttl};
    use crate::{Classification, ProbeMethod};
    use more_asserts as ma;
    use std::net::Ipv4Addr;

    const ROUTER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const DESTINATION: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

    fn timeout() -> Duration {
        Duration::from_secs(1)
    }

    fn request(method: ProbeMethod, ttl: u8) -> ProbeRequest {
        ProbeBuilder::new(DESTINATION, method, 33434).build(Ttl(ttl), SequenceNumber::start_value()).unwrap()
    }

    #[test]
    fn send_one_probe() {
        let socket_mock = SocketMock::new_silent();
        let transport = Transport::new(socket_mock.clone());

        let result = transport.send_and_wait(&request(ProbeMethod::Udp, 1), timeout());

        assert!(result.is_ok());
        socket_mock
            .should_send_number_of_messages(1)
            .should_send_to_address(&IpAddr::V4(DESTINATION));
    }

    #[test]
    fn correlated_time_exceeded_is_returned() {
        let socket_mock = SocketMock::new_default(vec![Hop::TimeExceeded(ROUTER)]);
        let transport = Transport::new(socket_mock.clone());

        let reply = transport.send_and_wait(&request(ProbeMethod::Udp, 1), timeout()).unwrap().unwrap();

        assert_eq!(ROUTER, reply.responder);
        assert_eq!(Classification::TimeExceeded, reply.classification);
        ma::assert_lt!(reply.rtt, timeout());
        socket_mock.should_receive_number_of_messages(1);
    }

    #[test]
    fn echo_reply_is_returned_for_icmp_probe() {
        let socket_mock = SocketMock::new_default(vec![Hop::EchoReply(DESTINATION)]);
        let transport = Transport::new(socket_mock);

        let reply = transport.send_and_wait(&request(ProbeMethod::IcmpEcho, 1), timeout()).unwrap().unwrap();

        assert_eq!(DESTINATION, reply.responder);
        assert_eq!(Classification::EchoReply, reply.classification);
    }

    #[test]
    fn uncorrelated_reply_is_discarded() {
        let socket_mock = SocketMock::new_silent().with_unrelated_traffic();
        let transport = Transport::new(socket_mock.clone());

        let reply = transport.send_and_wait(&request(ProbeMethod::Udp, 1), timeout()).unwrap();

        assert!(reply.is_none());
        socket_mock.should_receive_number_of_messages(1);
    }

    #[test]
    fn correlated_reply_after_unrelated_traffic_is_returned() {
        let socket_mock = SocketMock::new_default(vec![Hop::TimeExceeded(ROUTER)]).with_unrelated_traffic();
        let transport = Transport::new(socket_mock.clone());

        let reply = transport.send_and_wait(&request(ProbeMethod::Udp, 1), timeout()).unwrap().unwrap();

        assert_eq!(ROUTER, reply.responder);
        socket_mock.should_receive_number_of_messages(2);
    }

    #[test]
    fn nothing_received_is_a_timeout() {
        let socket_mock = SocketMock::new_silent();
        let transport = Transport::new(socket_mock);

        let reply = transport.send_and_wait(&request(ProbeMethod::Udp, 1), timeout()).unwrap();

        assert!(reply.is_none());
    }

    #[test]
    fn when_socket_fails_then_send_and_wait_fails() {
        let socket_mock = SocketMock::new(OnSend::ReturnErr, vec![Hop::TimeExceeded(ROUTER)]);
        let transport = Transport::new(socket_mock.clone());

        let result = transport.send_and_wait(&request(ProbeMethod::Udp, 1), timeout());

        assert!(matches!(result, Err(TraceError::Socket(_))));
        socket_mock.should_send_number_of_messages(0);
    }

    #[test]
    fn timeout_beyond_the_clock_range_is_invalid_config() {
        let socket_mock = SocketMock::new_silent();
        let transport = Transport::new(socket_mock.clone());

        let result = transport.send_and_wait(&request(ProbeMethod::Udp, 1), Duration::MAX);

        assert!(matches!(result, Err(TraceError::InvalidConfig(_))));
        socket_mock.should_send_number_of_messages(1);
    }

    #[test]
    fn when_receive_fails_then_send_and_wait_fails() {
        let socket_mock = SocketMock::new(OnSend::ReturnDefault, vec![Hop::TimeExceeded(ROUTER)])
            .on_receive(OnReceive::ReturnErr);
        let transport = Transport::new(socket_mock.clone());

        let result = transport.send_and_wait(&request(ProbeMethod::Udp, 1), timeout());

        assert!(matches!(result, Err(TraceError::Socket(_))));
        socket_mock.should_send_number_of_messages(1).should_receive_number_of_messages(0);
    }

    #[test]
    fn interrupted_receive_is_retried() {
        let socket_mock = SocketMock::new(OnSend::ReturnDefault, vec![Hop::TimeExceeded(ROUTER)])
            .on_receive(OnReceive::InterruptOnce);
        let transport = Transport::new(socket_mock.clone());

        let reply = transport.send_and_wait(&request(ProbeMethod::Udp, 1), timeout()).unwrap().unwrap();

        assert_eq!(ROUTER, reply.responder);
        socket_mock.should_receive_number_of_messages(1);
    }

    #[test]
    fn reply_arriving_after_the_timeout_is_a_timeout() {
        let socket_mock = SocketMock::new(OnSend::ReturnDefault, vec![Hop::TimeExceeded(ROUTER)])
            .on_receive(OnReceive::Delay(Duration::from_millis(50)));
        let transport = Transport::new(socket_mock.clone());

        let reply = transport.send_and_wait(&request(ProbeMethod::Udp, 1), Duration::from_millis(10)).unwrap();

        assert!(reply.is_none());
        socket_mock.should_receive_number_of_messages(1);
    }
}
