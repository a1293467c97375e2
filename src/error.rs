//! Error types for gbxremote-client.
//!
//! Transport-level variants ([`GbxError::Timeout`], [`GbxError::ConnectionClosed`],
//! [`GbxError::Protocol`], [`GbxError::Io`]) abort every pending and queued call on
//! the connection. [`GbxError::Fault`] is local to the call or multicall slot that
//! produced it.

use thiserror::Error;

/// Main error type for all GBXRemote operations.
#[derive(Debug, Error)]
pub enum GbxError {
    /// I/O error on the TCP stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while decoding a mode script callback payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server did not answer the handshake with the expected signature.
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// Malformed frame or XML-RPC document.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A blocking read, write or connect exceeded its configured timeout.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Peer closed or reset the connection, or it was closed locally.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Server-reported application error for a single call.
    #[error("Fault {code}: {message}")]
    Fault { code: i32, message: String },

    /// Client-side precondition failure, raised before any I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A decoded value does not have the shape the target type expects.
    #[error("Cannot decode {target}: {detail}")]
    Marshal { target: String, detail: String },
}

impl GbxError {
    /// Build a [`GbxError::Marshal`] for `target` (a structure or `Structure.Field`).
    pub fn marshal(target: impl Into<String>, detail: impl Into<String>) -> Self {
        GbxError::Marshal {
            target: target.into(),
            detail: detail.into(),
        }
    }

    /// Check if this is a server fault.
    pub fn is_fault(&self) -> bool {
        matches!(self, GbxError::Fault { .. })
    }

    /// Fault code, if this is a server fault.
    pub fn fault_code(&self) -> Option<i32> {
        match self {
            GbxError::Fault { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this error means the connection can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GbxError::ConnectionClosed
                | GbxError::ProtocolMismatch(_)
                | GbxError::Protocol(_)
                | GbxError::Io(_)
        )
    }
}

/// Result type alias using GbxError.
pub type Result<T> = std::result::Result<T, GbxError>;
