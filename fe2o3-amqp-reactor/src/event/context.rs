use fe2o3_amqp_reactor_types::{definitions::Error, messaging::Message};

use crate::{
    connection::Connection,
    container::Container,
    link::{delivery::Delivery, Link},
    session::Session,
};

use super::{Event, EventKind};

/// What a handler sees of the event it was invoked for.
///
/// The context borrows the owning [`Connection`] mutably, so a handler may
/// open, close or update any endpoint of that connection. Frames resulting
/// from such changes are only emitted after the handler returns.
#[derive(Debug)]
pub struct EventContext<'a> {
    connection: &'a mut Connection,
    event: &'a Event,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(connection: &'a mut Connection, event: &'a Event) -> Self {
        Self { connection, event }
    }

    /// The event
    pub fn event(&self) -> &Event {
        self.event
    }

    /// Kind of the event
    pub fn kind(&self) -> EventKind {
        self.event.kind
    }

    /// The container owning the connection
    pub fn container(&self) -> &Container {
        self.connection.container()
    }

    /// The connection the event happened on
    pub fn connection(&self) -> &Connection {
        self.connection
    }

    /// The connection the event happened on
    pub fn connection_mut(&mut self) -> &mut Connection {
        self.connection
    }

    /// The session the event happened on
    pub fn session(&self) -> Option<&Session> {
        self.event.session.and_then(|id| self.connection.session(id))
    }

    /// The session the event happened on
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.event
            .session
            .and_then(|id| self.connection.session_mut(id))
    }

    /// The link the event happened on
    pub fn link(&self) -> Option<&Link> {
        self.event.link.and_then(|id| self.connection.link(id))
    }

    /// The link the event happened on
    pub fn link_mut(&mut self) -> Option<&mut Link> {
        self.event.link.and_then(|id| self.connection.link_mut(id))
    }

    /// The link the event happened on if it is a sender
    pub fn sender(&self) -> Option<&Link> {
        self.link().filter(|link| link.is_sender())
    }

    /// The link the event happened on if it is a sender
    pub fn sender_mut(&mut self) -> Option<&mut Link> {
        self.link_mut().filter(|link| link.is_sender())
    }

    /// The link the event happened on if it is a receiver
    pub fn receiver(&self) -> Option<&Link> {
        self.link().filter(|link| link.is_receiver())
    }

    /// The link the event happened on if it is a receiver
    pub fn receiver_mut(&mut self) -> Option<&mut Link> {
        self.link_mut().filter(|link| link.is_receiver())
    }

    /// The delivery the event is about
    pub fn delivery(&self) -> Option<&Delivery> {
        let tag = self.event.delivery.as_ref()?;
        self.link()?.delivery(tag)
    }

    /// The delivery the event is about
    pub fn delivery_mut(&mut self) -> Option<&mut Delivery> {
        let link = self.event.link?;
        let tag = self.event.delivery.as_ref()?;
        self.connection.link_mut(link)?.delivery_mut(tag)
    }

    /// The message of a `message` event
    pub fn message(&self) -> Option<&Message> {
        self.delivery()?.message()
    }

    /// The error carried by the event
    pub fn error(&self) -> Option<&Error> {
        self.event.error.as_ref()
    }
}
