//! Error types for the resource adapter.
//!
//! # Design
//! Transport problems keep their raw status and body in `TransportFailure`
//! so callers can tell "the server said no" apart from "nothing came back."
//! Every other failure is local: bad configuration, a schema lookup miss,
//! or a payload that does not have the shape the dialect promises.
//!
//! `Error` is `Clone` because a single failure is reported twice: once to
//! the store's error channel and once back to the caller.

use thiserror::Error;

/// A failed round-trip, exactly as the transport observed it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// No response was received at all.
    #[error("network failure: {0}")]
    Network(String),
}

impl TransportFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportFailure::Status { status, .. } => Some(*status),
            TransportFailure::Network(_) => None,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            TransportFailure::Status { body, .. } => body,
            TransportFailure::Network(msg) => msg,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Errors returned by the client, the codec and the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Adapter configuration is unusable. Raised once, at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The transport failed; propagated unchanged.
    #[error(transparent)]
    Transport(#[from] TransportFailure),

    /// A pagination cursor is present but carries no `offset=` parameter.
    ///
    /// Only the strict parser returns this. The lenient reducer treats it
    /// as "no next page".
    #[error("pagination cursor has no offset parameter: {cursor}")]
    MalformedCursor { cursor: String },

    /// The schema has no resource type with this name.
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    /// An operation that addresses a single resource got a record with no id.
    #[error("{resource} record has no identifier")]
    MissingIdentifier { resource: String },

    /// A request payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A response payload does not have the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl Error {
    /// The transport failure behind this error, if there is one.
    pub fn transport(&self) -> Option<&TransportFailure> {
        match self {
            Error::Transport(failure) => Some(failure),
            _ => None,
        }
    }
}
