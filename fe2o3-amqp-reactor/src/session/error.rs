use fe2o3_amqp_reactor_types::definitions::{self, AmqpError, ConnectionError};

/// Errors allocating a new link on a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocLinkError {
    /// The session is ending or has ended
    #[error("Illegal session state")]
    IllegalState,

    /// All handles up to handle max are in use
    #[error("Reached session handle max")]
    HandleMaxReached,

    /// A link with the same name and role already exists
    #[error("Link name must be unique")]
    DuplicatedLinkName,
}

impl From<AllocLinkError> for definitions::Error {
    fn from(err: AllocLinkError) -> Self {
        match err {
            AllocLinkError::IllegalState => Self {
                condition: AmqpError::IllegalState.into(),
                description: None,
                info: None,
            },
            AllocLinkError::HandleMaxReached => Self {
                condition: ConnectionError::FramingError.into(),
                description: Some("Handle max has been reached".to_string()),
                info: None,
            },
            AllocLinkError::DuplicatedLinkName => Self {
                condition: AmqpError::NotAllowed.into(),
                description: Some("Link name is duplicated".to_string()),
                info: None,
            },
        }
    }
}
