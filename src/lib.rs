#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub use details::icmp::v4::{ProbeMethod, RawSocket, TSocket, Ttl};
pub use details::TraceError;
pub use trace_fox::*;
pub use trace_output::*;

mod details;
mod trace_fox;
mod trace_output;
