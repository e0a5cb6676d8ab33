use super::probe::{ProbeKey, QuotedProbe};
use crate::Classification;
use pnet_packet::icmp::echo_reply::EchoReplyPacket;
use pnet_packet::icmp::echo_request::EchoRequestPacket;
use pnet_packet::icmp::{IcmpCode, IcmpPacket, IcmpType, IcmpTypes};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::udp::UdpPacket;
use std::net::Ipv4Addr;

// type, code, checksum and four bytes that are unused for the error types we handle
const ICMP_ERROR_HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ParsedReply {
    pub responder: Ipv4Addr,
    pub classification: Classification,
    // The probe quoted by an ICMP error, or the identity echoed back by an Echo Reply.
    pub probe: Option<QuotedProbe>,
}

/// Parses an IPv4 datagram read from the raw ICMP socket.
///
/// Returns `None` for anything that is not a well-formed ICMP message.
pub(crate) fn parse_reply(datagram: &[u8]) -> Option<ParsedReply> {
    let ipv4_packet = Ipv4Packet::new(datagram)?;
    if ipv4_packet.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let icmp_bytes = datagram.get(header_len(&ipv4_packet)..)?;
    let icmp_packet = IcmpPacket::new(icmp_bytes)?;
    let responder = ipv4_packet.get_source();
    let icmp_type = icmp_packet.get_icmp_type();
    let classification = classify(icmp_type, icmp_packet.get_icmp_code());

    let probe = if classification == Classification::EchoReply {
        EchoReplyPacket::new(icmp_bytes).map(|echo_reply| QuotedProbe {
            destination: responder,
            key: ProbeKey::IcmpEcho {
                identifier: echo_reply.get_identifier(),
                sequence_number: echo_reply.get_sequence_number().into(),
            },
        })
    } else if is_error_message(icmp_type) {
        icmp_bytes.get(ICMP_ERROR_HEADER_LEN..).and_then(parse_quoted_probe)
    } else {
        None
    };

    Some(ParsedReply { responder, classification, probe })
}

fn classify(icmp_type: IcmpType, icmp_code: IcmpCode) -> Classification {
    match icmp_type {
        IcmpTypes::TimeExceeded if icmp_code == IcmpCode(0) => Classification::TimeExceeded,
        IcmpTypes::DestinationUnreachable => Classification::DestinationUnreachable(icmp_code.0),
        IcmpTypes::EchoReply => Classification::EchoReply,
        _ => Classification::Other { icmp_type: icmp_type.0, icmp_code: icmp_code.0 },
    }
}

fn is_error_message(icmp_type: IcmpType) -> bool {
    matches!(
        icmp_type,
        IcmpTypes::DestinationUnreachable
            | IcmpTypes::SourceQuench
            | IcmpTypes::RedirectMessage
            | IcmpTypes::TimeExceeded
            | IcmpTypes::ParameterProblem
    )
}

// Routers quote at least the original IP header plus the first 8 bytes of its payload, which
// covers the UDP ports or the echo identifier and sequence number.
fn parse_quoted_probe(quoted: &[u8]) -> Option<QuotedProbe> {
    let ipv4_packet = Ipv4Packet::new(quoted)?;
    let transport = quoted.get(header_len(&ipv4_packet)..)?;
    let key = match ipv4_packet.get_next_level_protocol() {
        IpNextHeaderProtocols::Udp => {
            let udp_packet = UdpPacket::new(transport)?;
            ProbeKey::Udp { src_port: udp_packet.get_source(), dst_port: udp_packet.get_destination() }
        }
        IpNextHeaderProtocols::Icmp => {
            let echo_request = EchoRequestPacket::new(transport)?;
            if echo_request.get_icmp_type() != IcmpTypes::EchoRequest {
                return None;
            }
            ProbeKey::IcmpEcho {
                identifier: echo_request.get_identifier(),
                sequence_number: echo_request.get_sequence_number().into(),
            }
        }
        _ => return None,
    };
    Some(QuotedProbe { destination: ipv4_packet.get_destination(), key })
}

fn header_len(ipv4_packet: &Ipv4Packet<'_>) -> usize {
    usize::from(ipv4_packet.get_header_length()) * 4
}
