use crate::details::icmp::v4::{SequenceNumber, Ttl};
use std::net::Ipv4Addr;
use std::time::Instant;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ProbeSendRecord {
    pub packet_size: usize,
    pub destination: Ipv4Addr,
    pub ttl: Ttl,
    pub sequence_number: SequenceNumber,
    pub send_time: Instant,
}
