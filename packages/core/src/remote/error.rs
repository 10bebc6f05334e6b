//! Remote Call Error Types
//!
//! Errors raised by the remote repository collaborators: node reads, relation
//! queries, batch submission, version creation and raw content transfer.
//! The graph layer propagates these to the caller unmodified (wrapped in
//! `GraphError::Remote`).

use thiserror::Error;

/// Remote repository operation errors
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The connection could not be established or broke mid-call
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The service answered but refused the operation
    #[error("Remote {operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    /// The service answered with something we could not interpret
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The addressed node does not exist on the server
    #[error("Node not found on server: {identity}")]
    NotFound { identity: String },

    /// Socket or file I/O failure during a transfer
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Create a transport failure error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a rejected operation error
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a not found error
    pub fn not_found(identity: impl Into<String>) -> Self {
        Self::NotFound {
            identity: identity.into(),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
