use std::{error::Error, fmt, io};

#[derive(Debug)]
pub enum TraceError {
    /// The destination is malformed or does not resolve to an IPv4 address.
    Build { destination: String, message: String },
    /// Opening, writing to or reading from the raw socket failed.
    Socket(io::Error),
    InvalidConfig(String),
    /// A packet could not be assembled. Nothing is wrong with the destination.
    Packet(String),
}

impl TraceError {
    pub(crate) fn build(destination: &str, message: impl Into<String>) -> Self {
        TraceError::Build { destination: destination.to_owned(), message: message.into() }
    }
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "TraceError")?;
        match self {
            TraceError::Build { destination, message } => write!(f, ": cannot trace to '{destination}': {message}"),
            TraceError::Socket(error) => {
                write!(f, ": socket error: {error}")?;
                if error.kind() == io::ErrorKind::PermissionDenied {
                    write!(f, " (raw sockets need root privileges or CAP_NET_RAW)")?;
                }
                Ok(())
            }
            TraceError::InvalidConfig(message) => write!(f, ": invalid configuration: {message}"),
            TraceError::Packet(message) => write!(f, ": {message}"),
        }
    }
}

impl Error for TraceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TraceError::Socket(error) => Some(error),
            TraceError::Build { .. } | TraceError::InvalidConfig(_) | TraceError::Packet(_) => None,
        }
    }
}

impl From<io::Error> for TraceError {
    fn from(error: io::Error) -> TraceError {
        TraceError::Socket(error)
    }
}
