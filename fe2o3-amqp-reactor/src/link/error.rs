use crate::{connection::AllocSessionError, session::AllocLinkError};

/// Errors opening a link
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The connection or session is closing or closed
    #[error("Illegal connection or session state")]
    IllegalState,

    /// All channels of the connection are in use
    #[error("Channel max reached")]
    ChannelMaxReached,

    /// All handles of the session are in use
    #[error("Handle max reached")]
    HandleMaxReached,

    /// A link with the same name and role already exists on the session
    #[error("Link name must be unique")]
    DuplicatedLinkName,
}

impl From<AllocLinkError> for Error {
    fn from(err: AllocLinkError) -> Self {
        match err {
            AllocLinkError::IllegalState => Self::IllegalState,
            AllocLinkError::HandleMaxReached => Self::HandleMaxReached,
            AllocLinkError::DuplicatedLinkName => Self::DuplicatedLinkName,
        }
    }
}

impl From<AllocSessionError> for Error {
    fn from(err: AllocSessionError) -> Self {
        match err {
            AllocSessionError::IllegalState => Self::IllegalState,
            AllocSessionError::ChannelMaxReached => Self::ChannelMaxReached,
        }
    }
}

/// Errors sending a message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// Only senders send
    #[error("Link is not a sender")]
    NotSender,

    /// The link is not attached on both ends or is detaching
    #[error("Link is not attached")]
    NotAttached,

    /// The receiver has not issued credit
    #[error("No link credit")]
    InsufficientCredit,
}

/// Errors updating a delivery through its link
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispositionError {
    /// No delivery with the tag is tracked by the link
    #[error("Unknown delivery tag")]
    UnknownDeliveryTag,

    /// The delivery has already been settled locally
    #[error("Delivery is already settled")]
    AlreadySettled,
}
