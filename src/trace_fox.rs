use crate::details::icmp::v4::ProbeBuilder;
use crate::details::{resolve_destination, HopAggregator};
use crate::{HopRecord, ProbeMethod, RawSocket, TSocket, TraceError, TraceResult};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Highest TTL probed unless configured otherwise.
pub const DEFAULT_MAX_HOPS: u8 = 30;
/// Probes per TTL unless configured otherwise.
pub const DEFAULT_NUM_PACKETS: usize = 3;
/// Reply timeout per probe unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// The traditional first traceroute port.
pub const DEFAULT_BASE_PORT: u16 = 33434;
/// Upper bound for `num_packets`: a trace over all 255 TTLs still fits into the 16 bit
/// sequence space, so no two probes share a port or an echo sequence number.
pub const MAX_NUM_PACKETS: usize = 257;
/// Upper bound for `timeout`.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60);

#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceConfig {
    /// Highest TTL to probe; the trace yields at most this many hops.
    pub max_hops: u8,
    /// Probes per TTL, at most [`MAX_NUM_PACKETS`].
    pub num_packets: usize,
    /// How long to wait for the reply to a single probe, at most [`MAX_TIMEOUT`].
    pub timeout: Duration,
    /// UDP destination port of the first probe; every following probe uses the next port.
    pub base_port: u16,
    pub method: ProbeMethod,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            max_hops: DEFAULT_MAX_HOPS,
            num_packets: DEFAULT_NUM_PACKETS,
            timeout: DEFAULT_TIMEOUT,
            base_port: DEFAULT_BASE_PORT,
            method: ProbeMethod::default(),
        }
    }
}

impl TraceConfig {
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.max_hops == 0 {
            return Err(TraceError::InvalidConfig("max_hops must be at least 1".to_owned()));
        }
        if self.num_packets == 0 {
            return Err(TraceError::InvalidConfig("num_packets must be at least 1".to_owned()));
        }
        if self.num_packets > MAX_NUM_PACKETS {
            return Err(TraceError::InvalidConfig(format!("num_packets must be at most {MAX_NUM_PACKETS}")));
        }
        if self.timeout.is_zero() {
            return Err(TraceError::InvalidConfig("timeout must not be zero".to_owned()));
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(TraceError::InvalidConfig(format!("timeout must be at most {}s", MAX_TIMEOUT.as_secs())));
        }
        Ok(())
    }
}

/// A running trace: yields one [`HopRecord`] per TTL, starting at 1.
///
/// Probing happens lazily inside `next`. The iterator ends after the first hop with a terminal
/// reply, after `max_hops` records, or right after yielding an error. Dropping it stops the trace
/// and closes the socket.
pub struct Trace<S = RawSocket>(HopAggregator<S>);

impl<S> Trace<S>
where
    S: TSocket,
{
    /// The resolved address being traced to.
    pub fn destination(&self) -> Ipv4Addr {
        self.0.probe_builder().destination()
    }

    /// Runs the trace to its end and collects all hops.
    pub fn run_to_end(self) -> Result<TraceResult, TraceError> {
        let mut result = TraceResult::default();
        for hop in self {
            let hop = hop?;
            result.reached_destination = hop.is_terminal();
            result.hops.push(hop);
        }
        Ok(result)
    }
}

impl<S> Iterator for Trace<S>
where
    S: TSocket,
{
    type Item = Result<HopRecord, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

impl<S> std::iter::FusedIterator for Trace<S> where S: TSocket {}

/// Traces to `destination` with `max_hops` TTLs and `num_packets` probes per TTL; everything
/// else keeps its default.
pub fn run_trace(destination: &str, max_hops: u8, num_packets: usize) -> Result<Trace<RawSocket>, TraceError> {
    trace(destination, &TraceConfig { max_hops, num_packets, ..TraceConfig::default() })
}

/// Resolves `destination`, then opens the raw sockets. No socket is opened for a bad destination.
pub fn trace(destination: &str, config: &TraceConfig) -> Result<Trace<RawSocket>, TraceError> {
    config.validate()?;
    let destination = resolve_destination(destination)?;
    let socket = RawSocket::new()?;
    Ok(create_with_socket(destination, config, socket))
}

/// Like [`trace`] but probes through the given socket.
pub fn trace_with_socket<S>(destination: &str, config: &TraceConfig, socket: S) -> Result<Trace<S>, TraceError>
where
    S: TSocket,
{
    config.validate()?;
    let destination = resolve_destination(destination)?;
    Ok(create_with_socket(destination, config, socket))
}

fn create_with_socket<S>(destination: Ipv4Addr, config: &TraceConfig, socket: S) -> Trace<S>
where
    S: TSocket,
{
    tracing::debug!(%destination, max_hops = config.max_hops, num_packets = config.num_packets, "starting trace");
    let probe_builder = ProbeBuilder::new(destination, config.method, config.base_port);
    Trace(HopAggregator::new(socket, probe_builder, config))
}
