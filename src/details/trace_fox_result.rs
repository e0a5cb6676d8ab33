use crate::details::TraceError;

pub(crate) type TraceFoxResult<T> = std::result::Result<T, TraceError>;
