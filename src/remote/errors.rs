//! Error taxonomy for the remote client.
//!
//! Every failure the core can raise is a variant of [`RemoteError`]. None of
//! them are retried inside the core; retry and backoff are caller concerns.

use thiserror::Error;

use super::RemoteId;

/// Errors raised by the remote proxy subsystem.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// A non-success status, a missing body, or a body that does not decode
    /// into the expected response shape.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status when the failure came from a status check.
        status: Option<u16>,
    },

    /// A capability name or type unknown to the local registry.
    #[error("Capability not registered: {name}")]
    NotRegistered { name: String },

    /// The remote entity does not expose the requested capability.
    #[error("Capability {capability} not supported by this proxy")]
    NotSupported { capability: String },

    /// A proxy argument has no id in the session it is used with.
    #[error("Proxy has no remote id in this session (destroyed or from another session)")]
    DanglingProxy,

    /// A returned reference names an id with no live proxy in the session.
    #[error("No proxy for remote id {remote_id} in this session")]
    UnknownRemoteId { remote_id: RemoteId },

    /// The persistent notification connection dropped.
    #[error("Notification connection lost: {reason}")]
    ConnectionLost { reason: String },

    /// The session that created a handler no longer exists.
    #[error("Remote session has been dropped")]
    SessionClosed,

    /// A response value could not be converted to the declared Rust type.
    #[error("Cannot decode value of type {type_name}: {message}")]
    Decode { type_name: String, message: String },
}

impl RemoteError {
    /// Build a transport error without a status code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Short, stable name of the condition for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TransportError",
            Self::NotRegistered { .. } => "NotRegistered",
            Self::NotSupported { .. } => "NotSupported",
            Self::DanglingProxy => "DanglingProxy",
            Self::UnknownRemoteId { .. } => "UnknownRemoteId",
            Self::ConnectionLost { .. } => "ConnectionLost",
            Self::SessionClosed => "SessionClosed",
            Self::Decode { .. } => "DecodeError",
        }
    }
}
