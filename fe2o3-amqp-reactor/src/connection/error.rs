//! Implements errors associated with the connection

use std::io;

use fe2o3_amqp_reactor_types::definitions;
use tokio::{sync::mpsc, task::JoinError};

/// Errors associated with [`crate::Connection`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// This could occur only when the user attempts to close the connection
    #[error(transparent)]
    JoinError(#[from] JoinError),

    /// The peer violated the protocol. The connection has been closed locally
    /// with this error
    #[error("Protocol error {}", .0)]
    Protocol(definitions::Error),

    /// An error no handler took care of. The connection has been closed
    /// locally with this error
    #[error("Unhandled error {}", .0)]
    Unhandled(definitions::Error),
}

impl<T> From<mpsc::error::SendError<T>> for Error {
    fn from(err: mpsc::error::SendError<T>) -> Self {
        Self::Io(io::Error::new(io::ErrorKind::Other, err.to_string()))
    }
}

/// Errors allocating a new session on a connection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocSessionError {
    /// The connection is closing or closed
    #[error("Illegal connection state")]
    IllegalState,

    /// All channels up to channel max are in use
    #[error("Reached connection channel max")]
    ChannelMaxReached,
}
