//! Endpoint states of connections, sessions and links

use serde::{Deserialize, Serialize};

/// Connection state, collapsed from AMQP 1.0 Part 2.4.6 now that the protocol
/// header exchange belongs to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Nothing has been sent or received
    #[default]
    Start,

    /// An open frame has been received from the peer but an open frame has not been sent
    OpenReceived,

    /// An open frame has been sent to the peer but no open frame has yet been received
    OpenSent,

    /// The open frame has been both sent and received
    Opened,

    /// A close frame has been received indicating that the peer has initiated a close
    CloseReceived,

    /// A close frame has been sent to the peer
    CloseSent,

    /// The close triggered by an error has been sent. Incoming frames are
    /// discarded until the peer's close arrives
    Discarding,

    /// Close frames have been exchanged
    End,
}

/// 2.5.5 Session States
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// UNMAPPED
    #[default]
    Unmapped,

    /// BEGIN SENT
    BeginSent,

    /// BEGIN RCVD
    BeginReceived,

    /// MAPPED
    Mapped,

    /// END SENT
    EndSent,

    /// END RCVD
    EndReceived,

    /// Both end frames have been exchanged
    Ended,
}

/// Link state.
///
/// There is no official definition of the link state in the AMQP 1.0 core specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkState {
    /// The initial state after initialization
    #[default]
    Unattached,

    /// An attach frame has been sent
    AttachSent,

    /// An attach frame has been received
    AttachReceived,

    /// The link is attached
    Attached,

    /// A detach frame has been sent
    DetachSent,

    /// A detach frame has been received
    DetachReceived,

    /// The link is detached
    Detached,
}
