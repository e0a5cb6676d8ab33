use super::{SequenceNumber, Ttl};
use pnet_packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet_packet::icmp::{IcmpPacket, IcmpTypes};
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet_packet::ipv4::{self, Ipv4Flags, MutableIpv4Packet};
use pnet_packet::udp::{MutableUdpPacket, UdpPacket};
use pnet_packet::Packet;
use rand::Rng;
use std::net::Ipv4Addr;

const IPV4_HEADER_LEN: usize = 20;
const IPV4_HEADER_WORDS: u8 = 5;
const PAYLOAD_SIZE: usize = 32;

/// Transport used for the probes of a trace.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProbeMethod {
    /// UDP datagrams to an unused port; the destination answers with Port Unreachable.
    #[default]
    Udp,
    /// ICMP Echo Requests; the destination answers with an Echo Reply.
    IcmpEcho,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ProbeKey {
    Udp { src_port: u16, dst_port: u16 },
    IcmpEcho { identifier: u16, sequence_number: SequenceNumber },
}

/// What a reply carries about the probe that caused it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct QuotedProbe {
    pub destination: Ipv4Addr,
    pub key: ProbeKey,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ProbeRequest {
    pub destination: Ipv4Addr,
    pub ttl: Ttl,
    pub sequence_number: SequenceNumber,
    pub key: ProbeKey,
    pub packet: Vec<u8>,
}

impl ProbeRequest {
    pub(crate) fn matches(&self, quoted: &QuotedProbe) -> bool {
        self.destination == quoted.destination && self.key == quoted.key
    }
}

pub(crate) struct ProbeBuilder {
    destination: Ipv4Addr,
    method: ProbeMethod,
    base_port: u16,
    identifier: u16,
    payload: [u8; PAYLOAD_SIZE],
}

impl ProbeBuilder {
    pub(crate) fn new(destination: Ipv4Addr, method: ProbeMethod, base_port: u16) -> Self {
        let mut rng = rand::thread_rng();
        let mut payload = [0u8; PAYLOAD_SIZE];
        rng.fill(&mut payload[..]);
        ProbeBuilder { destination, method, base_port, identifier: rng.gen::<u16>() | 0x8000, payload }
    }

    pub(crate) fn destination(&self) -> Ipv4Addr {
        self.destination
    }

    pub(crate) fn build(&self, ttl: Ttl, sequence_number: SequenceNumber) -> Option<ProbeRequest> {
        let (key, transport) = match self.method {
            ProbeMethod::Udp => {
                let src_port = self.identifier;
                let dst_port = self.base_port.wrapping_add(sequence_number.into());
                (ProbeKey::Udp { src_port, dst_port }, new_udp_segment(src_port, dst_port, &self.payload)?)
            }
            ProbeMethod::IcmpEcho => (
                ProbeKey::IcmpEcho { identifier: self.identifier, sequence_number },
                new_echo_request(self.identifier, sequence_number, &self.payload)?,
            ),
        };
        let packet = new_ipv4_packet(self.destination, ttl, sequence_number, protocol(self.method), &transport)?;
        Some(ProbeRequest { destination: self.destination, ttl, sequence_number, key, packet })
    }
}

fn protocol(method: ProbeMethod) -> IpNextHeaderProtocol {
    match method {
        ProbeMethod::Udp => IpNextHeaderProtocols::Udp,
        ProbeMethod::IcmpEcho => IpNextHeaderProtocols::Icmp,
    }
}

// The source address stays unspecified, the kernel fills in the address of the outgoing route.
fn new_ipv4_packet(
    destination: Ipv4Addr,
    ttl: Ttl,
    sequence_number: SequenceNumber,
    protocol: IpNextHeaderProtocol,
    transport: &[u8],
) -> Option<Vec<u8>> {
    let total_length = IPV4_HEADER_LEN + transport.len();
    let mut packet = MutableIpv4Packet::owned(vec![0u8; total_length])?;
    packet.set_version(4);
    packet.set_header_length(IPV4_HEADER_WORDS);
    packet.set_total_length(u16::try_from(total_length).ok()?);
    packet.set_identification(sequence_number.into());
    packet.set_flags(Ipv4Flags::DontFragment);
    packet.set_ttl(ttl.into());
    packet.set_next_level_protocol(protocol);
    packet.set_source(Ipv4Addr::UNSPECIFIED);
    packet.set_destination(destination);
    packet.set_payload(transport);
    packet.set_checksum(0_u16);
    let checksum = ipv4::checksum(&packet.to_immutable());
    packet.set_checksum(checksum);
    Some(packet.packet().to_vec())
}

// A zero checksum means "no checksum" for UDP over IPv4. The real one would need the source
// address, which only the kernel knows at this point.
fn new_udp_segment(src_port: u16, dst_port: u16, payload: &[u8]) -> Option<Vec<u8>> {
    let length = UdpPacket::minimum_packet_size() + payload.len();
    let mut segment = MutableUdpPacket::owned(vec![0u8; length])?;
    segment.set_source(src_port);
    segment.set_destination(dst_port);
    segment.set_length(u16::try_from(length).ok()?);
    segment.set_payload(payload);
    segment.set_checksum(0_u16);
    Some(segment.packet().to_vec())
}

fn new_echo_request(identifier: u16, sequence_number: SequenceNumber, payload: &[u8]) -> Option<Vec<u8>> {
    let buf = vec![0u8; EchoRequestPacket::minimum_packet_size() + payload.len()];
    let mut package = MutableEchoRequestPacket::owned(buf)?;
    package.set_icmp_type(IcmpTypes::EchoRequest);
    package.set_identifier(identifier);
    package.set_sequence_number(sequence_number.into());
    package.set_payload(payload);

    package.set_checksum(0_u16);
    let checksum = pnet_packet::icmp::checksum(&IcmpPacket::new(package.packet())?);
    package.set_checksum(checksum);
    Some(package.packet().to_vec())
}
