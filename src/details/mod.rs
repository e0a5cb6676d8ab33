pub(crate) use destination::resolve_destination;
pub(crate) use hop_aggregator::HopAggregator;
pub use trace_error::TraceError;
pub(crate) use trace_fox_result::TraceFoxResult;

mod destination;
mod hop_aggregator;
pub(crate) mod icmp;
mod records;
mod trace_error;
mod trace_fox_result;
mod transport;
