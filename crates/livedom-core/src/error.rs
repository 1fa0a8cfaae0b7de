#![forbid(unsafe_code)]

//! Errors raised by live queries.
//!
//! Every error is raised synchronously, before any state is touched. Nothing
//! is retried internally: all variants describe caller mistakes.

/// Errors from constructing or driving a [`LiveQuery`](crate::LiveQuery).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A target, listener, or event type the host cannot accept.
    InvalidArgument(&'static str),
    /// A lifecycle event name outside the fixed set.
    UnknownEvent(String),
    /// The host rejected the selector.
    InvalidSelector(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Self::UnknownEvent(name) => write!(f, "unknown lifecycle event: {name}"),
            Self::InvalidSelector(selector) => write!(f, "invalid selector: {selector:?}"),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
