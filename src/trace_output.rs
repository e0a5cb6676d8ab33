use crate::Ttl;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// What kind of answer a probe got.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Classification {
    /// ICMP Time Exceeded in transit: an intermediate router.
    TimeExceeded,
    /// ICMP Destination Unreachable with its code; a UDP probe hit the closed port of the
    /// destination (code 3) or the path ends here.
    DestinationUnreachable(u8),
    /// ICMP Echo Reply from the destination.
    EchoReply,
    /// No correlated answer within the timeout.
    Timeout,
    /// Any other ICMP message quoting the probe.
    Other { icmp_type: u8, icmp_code: u8 },
}

impl Classification {
    /// Whether this answer means the destination has been reached.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Classification::DestinationUnreachable(_) | Classification::EchoReply)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProbeReply {
    pub responder: Ipv4Addr,
    pub rtt: Duration,
    pub classification: Classification,
}

/// Outcome of a single probe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sample {
    Reply(ProbeReply),
    Timeout,
}

impl Sample {
    #[must_use]
    pub fn responder(&self) -> Option<Ipv4Addr> {
        match self {
            Sample::Reply(reply) => Some(reply.responder),
            Sample::Timeout => None,
        }
    }

    #[must_use]
    pub fn rtt(&self) -> Option<Duration> {
        match self {
            Sample::Reply(reply) => Some(reply.rtt),
            Sample::Timeout => None,
        }
    }

    #[must_use]
    pub fn classification(&self) -> Classification {
        match self {
            Sample::Reply(reply) => reply.classification,
            Sample::Timeout => Classification::Timeout,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.classification().is_terminal()
    }
}

/// All samples taken at one TTL.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HopRecord {
    pub ttl: Ttl,
    /// One entry per probe, in the order the probes were sent.
    pub samples: Vec<Sample>,
    /// The first responder among the samples, `None` when every probe timed out.
    pub address: Option<Ipv4Addr>,
}

impl HopRecord {
    #[must_use]
    pub fn new(ttl: Ttl, samples: Vec<Sample>) -> Self {
        let address = samples.iter().find_map(Sample::responder);
        HopRecord { ttl, samples, address }
    }

    /// Every distinct responder in probe order. More than one means the probes took different
    /// paths, e.g. behind a load balancer.
    #[must_use]
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        let mut addresses = Vec::new();
        for responder in self.samples.iter().filter_map(Sample::responder) {
            if !addresses.contains(&responder) {
                addresses.push(responder);
            }
        }
        addresses
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.samples.iter().any(Sample::is_terminal)
    }
}

// ` 3  10.0.0.2  0.512 ms  *  0.498 ms`
impl fmt::Display for HopRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Some(address) => write!(f, " {}  {}", self.ttl, address)?,
            None => write!(f, " {}  *", self.ttl)?,
        }
        for sample in &self.samples {
            match sample.rtt() {
                Some(rtt) => write!(f, "  {:.3} ms", rtt.as_secs_f64() * 1000.0)?,
                None => write!(f, "  *")?,
            }
        }
        Ok(())
    }
}

/// A finished trace.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TraceResult {
    pub hops: Vec<HopRecord>,
    pub reached_destination: bool,
}
