//! The driver's error taxonomy (spec §7). Every fallible public operation
//! returns `Result<T, Error>`; the session also keeps the most recent
//! `Error` around so `get_last_error_message` can describe it later.

/// The kind of failure, independent of its human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A caller-supplied argument is out of domain, or names a read-only
    /// register for write.
    InvalidParameter,
    /// Operation called on an uncreated/destroyed session. Not reachable in
    /// this implementation (a `DriverSession` always exists once
    /// constructed), kept for taxonomy completeness and for bindings that
    /// model a separate "created" state.
    NotInitialized,
    /// Operation requires a connected session, but the session is not
    /// connected.
    NotConnected,
    /// `connect` called on an already-connected session.
    AlreadyInitialized,
    /// TCP connect or the `ACK` handshake failed.
    ConnectionFailed,
    /// Stream send/recv returned an OS error other than timeout.
    CommunicationFailed,
    /// Send or recv exceeded the configured timeout.
    Timeout,
    /// Response could not be parsed, or was structurally valid but
    /// semantically wrong, or an outgoing frame failed to format.
    ProtocolError,
    /// The device returned an error frame, or write/door verification
    /// mismatched.
    DeviceError,
    /// A resource (socket, handle) could not be obtained.
    ResourceUnavailable,
    /// An invariant internal to the driver was violated.
    Internal,
}

/// A driver operation failure: a [`ErrorKind`] plus a human-readable
/// message, mirroring the session's last-error slot (spec §4.4).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<regctl_protocol::ProtocolError> for Error {
    fn from(err: regctl_protocol::ProtocolError) -> Self {
        Self::new(ErrorKind::ProtocolError, err.to_string())
    }
}
