//! Connection state machine: `Initial` until the first `ClusterConfig`
//! arrives, `Ready` thereafter. Every other message type is illegal in
//! `Initial`; a second `ClusterConfig` is illegal once `Ready`. `Close` is
//! legal in either state and never changes it — the reader terminates the
//! connection on receipt rather than advancing the handshake.

use peersync_proto::MessageType;

use crate::error::{EngineError, Result};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No `ClusterConfig` has been exchanged yet.
    Initial,
    /// Handshake complete; every message type except a repeated
    /// `ClusterConfig` is legal.
    Ready,
}

impl ConnectionState {
    /// Validate that `message_type` is legal to receive in this state, and
    /// return the state that should follow.
    ///
    /// # Errors
    /// Returns [`EngineError::UnexpectedMessage`] if `message_type` is
    /// anything other than `ClusterConfig` or `Close` while still `Initial`,
    /// or if it is a `ClusterConfig` received again after the handshake
    /// completed.
    pub fn advance(self, message_type: MessageType) -> Result<Self> {
        match (self, message_type) {
            (_, MessageType::Close) => Ok(self),
            (Self::Initial, MessageType::ClusterConfig) => Ok(Self::Ready),
            (Self::Initial, other) => Err(EngineError::UnexpectedMessage(format!(
                "received {other:?} before the handshaking ClusterConfig"
            ))),
            (Self::Ready, MessageType::ClusterConfig) => Err(EngineError::UnexpectedMessage(
                "received a second ClusterConfig after the handshake completed".to_string(),
            )),
            (Self::Ready, _) => Ok(Self::Ready),
        }
    }
}
