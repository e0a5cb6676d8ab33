use crate::details::icmp::v4::{ProbeBuilder, SequenceNumber, TSocket, Ttl};
use crate::details::transport::Transport;
use crate::details::{TraceError, TraceFoxResult};
use crate::{HopRecord, Sample, TraceConfig, MAX_NUM_PACKETS};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Probing(Ttl),
    Done,
}

/// Drives the TTL loop. Every call to `next` probes one TTL and yields its record.
///
/// Probes are strictly sequential: each one is answered or timed out before the next is sent, so
/// there is never a probe in flight between two calls and dropping the aggregator needs no
/// cleanup beyond closing the socket.
pub(crate) struct HopAggregator<S> {
    transport: Transport<S>,
    probe_builder: ProbeBuilder,
    max_hops: Ttl,
    num_packets: usize,
    timeout: Duration,
    sequence_number: SequenceNumber,
    state: State,
}

impl<S> HopAggregator<S>
where
    S: TSocket,
{
    pub(crate) fn new(socket: S, probe_builder: ProbeBuilder, config: &TraceConfig) -> Self {
        HopAggregator {
            transport: Transport::new(socket),
            probe_builder,
            max_hops: Ttl(config.max_hops),
            num_packets: config.num_packets,
            timeout: config.timeout,
            sequence_number: SequenceNumber::start_value(),
            state: State::Probing(Ttl::start_value()),
        }
    }

    pub(crate) fn probe_builder(&self) -> &ProbeBuilder {
        &self.probe_builder
    }

    fn probe_hop(&mut self, ttl: Ttl) -> TraceFoxResult<HopRecord> {
        let mut samples = Vec::with_capacity(self.num_packets.min(MAX_NUM_PACKETS));
        for _ in 0..self.num_packets {
            let sequence_number = self.sequence_number;
            self.sequence_number = sequence_number.next();

            let request = self.probe_builder.build(ttl, sequence_number).ok_or_else(|| {
                TraceError::Packet(format!("could not assemble packet for ttl {ttl}, sequence {sequence_number:?}"))
            })?;
            let sample = match self.transport.send_and_wait(&request, self.timeout)? {
                Some(reply) => Sample::Reply(reply),
                None => Sample::Timeout,
            };
            samples.push(sample);
        }
        Ok(HopRecord::new(ttl, samples))
    }

    fn evaluate(&self, hop: &HopRecord) -> State {
        if hop.is_terminal() {
            tracing::debug!(ttl = %hop.ttl, "destination reached");
            return State::Done;
        }
        match hop.ttl.next() {
            Some(ttl) if ttl <= self.max_hops => State::Probing(ttl),
            _ => {
                tracing::debug!(max_hops = %self.max_hops, "maximum number of hops reached");
                State::Done
            }
        }
    }
}

impl<S> Iterator for HopAggregator<S>
where
    S: TSocket,
{
    type Item = TraceFoxResult<HopRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let ttl = match self.state {
            State::Probing(ttl) => ttl,
            State::Done => return None,
        };
        match self.probe_hop(ttl) {
            Ok(hop) => {
                tracing::trace!(%ttl, address = ?hop.address, "hop probed");
                self.state = self.evaluate(&hop);
                Some(Ok(hop))
            }
            Err(e) => {
                tracing::debug!(%ttl, error = %e, "trace aborted");
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::icmp::v4::tests::{Hop, OnSend, SocketMock};
    use crate::{Classification, ProbeMethod};
    use more_asserts as ma;
    use std::net::Ipv4Addr;

    const DESTINATION: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

    fn config(max_hops: u8, num_packets: usize) -> TraceConfig {
        TraceConfig { max_hops, num_packets, timeout: Duration::from_secs(1), ..TraceConfig::default() }
    }

    fn aggregator(socket: SocketMock, config: &TraceConfig) -> HopAggregator<SocketMock> {
        let probe_builder = ProbeBuilder::new(DESTINATION, config.method, config.base_port);
        HopAggregator::new(socket, probe_builder, config)
    }

    fn collect(aggregator: HopAggregator<SocketMock>) -> Vec<HopRecord> {
        aggregator.map(Result::unwrap).collect()
    }

    #[test]
    fn three_hops_to_unreachable_destination() {
        let socket = SocketMock::new_default(vec![
            Hop::TimeExceeded(Ipv4Addr::new(10, 0, 0, 1)),
            Hop::TimeExceeded(Ipv4Addr::new(10, 0, 0, 2)),
            Hop::PortUnreachable(DESTINATION),
        ]);

        let hops = collect(aggregator(socket.clone(), &config(3, 2)));

        assert_eq!(3, hops.len());
        assert_eq!(Some(Ipv4Addr::new(10, 0, 0, 1)), hops[0].address);
        assert_eq!(Some(Ipv4Addr::new(10, 0, 0, 2)), hops[1].address);
        assert_eq!(Some(DESTINATION), hops[2].address);
        assert!(!hops[0].is_terminal());
        assert!(!hops[1].is_terminal());
        assert!(hops[2].is_terminal());
        assert!(hops[2].samples.iter().all(|s| s.classification() == Classification::DestinationUnreachable(3)));
        assert_eq!(vec![1, 1, 2, 2, 3, 3], socket.sent_ttls());
    }

    #[test]
    fn ttls_increase_by_one_from_one() {
        let socket = SocketMock::new_default(vec![
            Hop::TimeExceeded(Ipv4Addr::new(10, 0, 0, 1)),
            Hop::Silent,
            Hop::TimeExceeded(Ipv4Addr::new(10, 0, 0, 3)),
            Hop::PortUnreachable(DESTINATION),
        ]);

        let hops = collect(aggregator(socket, &config(30, 3)));

        let ttls: Vec<u8> = hops.iter().map(|hop| hop.ttl.into()).collect();
        assert_eq!(vec![1, 2, 3, 4], ttls);
    }

    #[test]
    fn unreachable_at_first_hop_yields_one_record() {
        let socket = SocketMock::new_default(vec![Hop::PortUnreachable(DESTINATION)]);

        let hops = collect(aggregator(socket.clone(), &config(30, 3)));

        assert_eq!(1, hops.len());
        assert_eq!(3, hops[0].samples.len());
        socket.should_send_number_of_messages(3);
    }

    #[test]
    fn silent_destination_yields_max_hops_records() {
        let socket = SocketMock::new_silent();

        let hops = collect(aggregator(socket.clone(), &config(5, 3)));

        assert_eq!(5, hops.len());
        for hop in &hops {
            assert_eq!(3, hop.samples.len());
            assert!(hop.samples.iter().all(|sample| *sample == Sample::Timeout));
            assert!(hop.address.is_none());
        }
        socket.should_send_number_of_messages(15);
    }

    #[test]
    fn silent_hop_does_not_stop_the_trace() {
        let socket = SocketMock::new_default(vec![Hop::Silent, Hop::PortUnreachable(DESTINATION)]);

        let hops = collect(aggregator(socket, &config(30, 2)));

        assert_eq!(2, hops.len());
        assert!(hops[0].address.is_none());
        assert!(hops[1].is_terminal());
    }

    #[test]
    fn other_icmp_does_not_stop_the_trace() {
        let socket = SocketMock::new_default(vec![
            Hop::Other(Ipv4Addr::new(10, 0, 0, 1), 12, 0),
            Hop::PortUnreachable(DESTINATION),
        ]);

        let hops = collect(aggregator(socket, &config(30, 1)));

        assert_eq!(2, hops.len());
        assert_eq!(
            Classification::Other { icmp_type: 12, icmp_code: 0 },
            hops[0].samples[0].classification()
        );
    }

    #[test]
    fn echo_reply_terminates_icmp_trace() {
        let socket = SocketMock::new_default(vec![
            Hop::TimeExceeded(Ipv4Addr::new(10, 0, 0, 1)),
            Hop::EchoReply(DESTINATION),
            Hop::EchoReply(DESTINATION),
        ]);
        let config = TraceConfig { method: ProbeMethod::IcmpEcho, ..config(30, 3) };

        let hops = collect(aggregator(socket, &config));

        assert_eq!(2, hops.len());
        assert!(hops[1].samples.iter().all(|sample| sample.classification() == Classification::EchoReply));
    }

    #[test]
    fn uncorrelated_replies_become_timeouts() {
        let socket = SocketMock::new_silent().with_unrelated_traffic();

        let hops = collect(aggregator(socket, &config(2, 2)));

        assert_eq!(2, hops.len());
        assert!(hops.iter().all(|hop| hop.address.is_none()));
    }

    #[test]
    fn rtts_are_below_timeout() {
        let socket = SocketMock::new_default(vec![
            Hop::TimeExceeded(Ipv4Addr::new(10, 0, 0, 1)),
            Hop::PortUnreachable(DESTINATION),
        ]);
        let config = config(30, 3);

        for hop in collect(aggregator(socket, &config)) {
            for rtt in hop.samples.iter().filter_map(Sample::rtt) {
                ma::assert_lt!(rtt, config.timeout);
            }
        }
    }

    #[test]
    fn dropping_the_iterator_stops_probing() {
        let socket = SocketMock::new_silent();

        let hops: Vec<_> = aggregator(socket.clone(), &config(30, 3)).take(2).collect();

        assert_eq!(2, hops.len());
        socket.should_send_number_of_messages(6);
    }

    #[test]
    fn socket_error_is_yielded_once() {
        let socket = SocketMock::new(OnSend::ReturnErr, vec![]);
        let mut aggregator = aggregator(socket, &config(30, 3));

        assert!(matches!(aggregator.next(), Some(Err(TraceError::Socket(_)))));
        assert!(aggregator.next().is_none());
    }

    #[test]
    fn every_probe_gets_its_own_destination_port() {
        let socket = SocketMock::new_silent();

        let _ = collect(aggregator(socket.clone(), &config(2, 2)));

        assert_eq!(vec![33434, 33435, 33436, 33437], socket.sent_udp_destination_ports());
    }

    #[test]
    fn max_hops_of_255_ends_after_last_ttl() {
        let socket = SocketMock::new_silent();

        let hops = collect(aggregator(socket, &config(u8::MAX, 1)));

        assert_eq!(255, hops.len());
        assert_eq!(Ttl(u8::MAX), hops[254].ttl);
    }
}
