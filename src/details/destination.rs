use crate::details::{TraceError, TraceFoxResult};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const MAX_HOST_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Turns an IPv4 literal or a host name into the address to trace to.
///
/// Host names are checked for RFC 1123 syntax before they are looked up, so garbage never
/// reaches the resolver.
pub(crate) fn resolve_destination(destination: &str) -> TraceFoxResult<Ipv4Addr> {
    if let Ok(ipv4) = destination.parse::<Ipv4Addr>() {
        return Ok(ipv4);
    }
    if destination.parse::<Ipv6Addr>().is_ok() {
        return Err(TraceError::build(destination, "IPv6 destinations are not supported"));
    }
    if !is_valid_host_name(destination) {
        return Err(TraceError::build(destination, "malformed host name"));
    }

    let addresses = dns_lookup::lookup_host(destination).map_err(|e| TraceError::build(destination, e.to_string()))?;
    let ipv4 = addresses
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(ipv4) => Some(ipv4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| TraceError::build(destination, "host has no IPv4 address"))?;
    tracing::debug!(destination, %ipv4, "destination resolved");
    Ok(ipv4)
}

fn is_valid_host_name(host_name: &str) -> bool {
    let host_name = host_name.strip_suffix('.').unwrap_or(host_name);
    !host_name.is_empty() && host_name.len() <= MAX_HOST_NAME_LEN && host_name.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}
