mod probe;
mod reply;
mod sequence_number;
mod socket;
mod ttl;

pub use probe::ProbeMethod;
pub(crate) use probe::{ProbeBuilder, ProbeRequest};
pub(crate) use reply::parse_reply;
pub(crate) use sequence_number::SequenceNumber;
pub use socket::raw_socket::RawSocket;
pub use socket::TSocket;
pub use ttl::Ttl;

#[cfg(test)]
pub(crate) use socket::tests;
