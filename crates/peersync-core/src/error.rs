//! Error types for the connection engine.
//!
//! We avoid `std::io::Error` for engine-level logic so callers can match on
//! what actually went wrong (protocol violation vs. transport failure vs.
//! liveness timeout) rather than guessing from an `io::ErrorKind`.

use std::io;

use thiserror::Error;

/// Errors produced by a running [`crate::connection::Connection`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The connection was closed, locally or by the peer, before this
    /// operation could complete.
    #[error("connection is closed")]
    Closed,

    /// No activity was seen from the peer for longer than the receive
    /// timeout.
    #[error("liveness timeout: no read activity within the receive timeout")]
    Timeout,

    /// A message was received that the state machine does not accept in the
    /// connection's current state.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Wire-level codec or validation error from `peersync-proto`.
    #[error("protocol error: {0}")]
    Protocol(#[from] peersync_proto::ProtocolError),

    /// The underlying transport (socket, pipe) failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The peer closed the connection gracefully with this reason.
    #[error("peer closed the connection: {0}")]
    RemoteClose(String),

    /// LZ4 (de)compression of a message body failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// The request id counter wrapped around onto an id that is still
    /// outstanding. A local bug, not a transport condition; always fatal.
    #[error("request id {0} collided with a still-outstanding request")]
    RequestIdCollision(u32),
}

impl EngineError {
    /// Returns true if this error represents a liveness-related condition
    /// rather than a protocol violation or transport failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Convenience alias for results returning [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
