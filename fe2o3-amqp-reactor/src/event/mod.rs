//! Protocol events and their dispatch to application handlers
//!
//! An event is routed to the most specific scope that has a handler for its
//! kind: link, then session, then connection, then container. The first
//! scope with a match consumes the event.

use std::fmt::Display;

use fe2o3_amqp_reactor_types::definitions::{DeliveryTag, Error, Role};

use crate::{link::LinkId, session::SessionId};

mod context;
pub use context::EventContext;

mod handlers;
pub use handlers::{Handler, Handlers};

/// Kinds of events emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The peer's open has arrived
    ConnectionOpen,

    /// The peer's close has arrived
    ConnectionClose,

    /// The peer closed the connection with an error
    ConnectionError,

    /// The peer's begin has arrived
    SessionOpen,

    /// The peer's end has arrived
    SessionClose,

    /// The peer ended the session with an error
    SessionError,

    /// The peer attached to a sender
    SenderOpen,

    /// The peer attached to a receiver
    ReceiverOpen,

    /// The peer detached from a sender
    SenderClose,

    /// The peer detached from a receiver
    ReceiverClose,

    /// A sender was detached with an error
    SenderError,

    /// A receiver was detached with an error
    ReceiverError,

    /// A sender holds credit
    Sendable,

    /// A receiver got a message
    Message,

    /// A delivery has been settled on both ends
    Settled,

    /// The peer accepted a delivery
    Accepted,

    /// The peer rejected a delivery
    Rejected,

    /// The peer released a delivery
    Released,

    /// The peer modified a delivery
    Modified,

    /// An error no closer scope handled
    Error,

    /// The transport ended before the close handshake completed
    Disconnected,
}

impl EventKind {
    /// Name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConnectionOpen => "connection_open",
            EventKind::ConnectionClose => "connection_close",
            EventKind::ConnectionError => "connection_error",
            EventKind::SessionOpen => "session_open",
            EventKind::SessionClose => "session_close",
            EventKind::SessionError => "session_error",
            EventKind::SenderOpen => "sender_open",
            EventKind::ReceiverOpen => "receiver_open",
            EventKind::SenderClose => "sender_close",
            EventKind::ReceiverClose => "receiver_close",
            EventKind::SenderError => "sender_error",
            EventKind::ReceiverError => "receiver_error",
            EventKind::Sendable => "sendable",
            EventKind::Message => "message",
            EventKind::Settled => "settled",
            EventKind::Accepted => "accepted",
            EventKind::Rejected => "rejected",
            EventKind::Released => "released",
            EventKind::Modified => "modified",
            EventKind::Error => "error",
            EventKind::Disconnected => "disconnected",
        }
    }

    pub(crate) fn link_open(role: Role) -> Self {
        match role {
            Role::Sender => EventKind::SenderOpen,
            Role::Receiver => EventKind::ReceiverOpen,
        }
    }

    pub(crate) fn link_close(role: Role) -> Self {
        match role {
            Role::Sender => EventKind::SenderClose,
            Role::Receiver => EventKind::ReceiverClose,
        }
    }

    pub(crate) fn link_error(role: Role) -> Self {
        match role {
            Role::Sender => EventKind::SenderError,
            Role::Receiver => EventKind::ReceiverError,
        }
    }

    /// Errors that escalate to the container `error` handler when unhandled
    pub fn escalates(&self) -> bool {
        matches!(
            self,
            EventKind::ConnectionError
                | EventKind::SessionError
                | EventKind::SenderError
                | EventKind::ReceiverError
        )
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event queued on a connection
#[derive(Debug, Clone)]
pub struct Event {
    pub(crate) kind: EventKind,
    pub(crate) session: Option<SessionId>,
    pub(crate) link: Option<LinkId>,
    pub(crate) delivery: Option<DeliveryTag>,
    pub(crate) error: Option<Error>,
}

impl Event {
    pub(crate) fn connection(kind: EventKind) -> Self {
        Self {
            kind,
            session: None,
            link: None,
            delivery: None,
            error: None,
        }
    }

    pub(crate) fn session(kind: EventKind, session: SessionId) -> Self {
        Self {
            session: Some(session),
            ..Self::connection(kind)
        }
    }

    pub(crate) fn link(kind: EventKind, link: LinkId) -> Self {
        Self {
            session: Some(link.session),
            link: Some(link),
            ..Self::connection(kind)
        }
    }

    pub(crate) fn delivery(kind: EventKind, link: LinkId, tag: DeliveryTag) -> Self {
        Self {
            delivery: Some(tag),
            ..Self::link(kind, link)
        }
    }

    pub(crate) fn with_error(mut self, error: Option<Error>) -> Self {
        self.error = error;
        self
    }

    /// Kind of the event
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> Option<SessionId> {
        self.session
    }

    /// Link the event belongs to
    pub fn link_id(&self) -> Option<LinkId> {
        self.link
    }

    /// Delivery the event belongs to
    pub fn delivery_tag(&self) -> Option<&DeliveryTag> {
        self.delivery.as_ref()
    }

    /// Error carried by the event
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }
}
