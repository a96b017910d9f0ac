//! Deliveries tracked by a link until both ends have settled them

use fe2o3_amqp_reactor_types::{
    definitions::{DeliveryNumber, DeliveryTag, Error, MessageFormat, Role},
    messaging::{
        Accepted, DeliveryState, Message, Modified, Outcome, Rejected, Released,
    },
};

/// A message that is ready to be sent over a sender link
#[derive(Debug, Clone)]
pub struct Sendable {
    pub(crate) message: Message,
    pub(crate) message_format: MessageFormat,
    pub(crate) settled: Option<bool>,
}

impl Sendable {
    /// Creates a builder for [`Sendable`]
    pub fn builder() -> Builder<Uninitialized> {
        Builder::new()
    }
}

impl<T> From<T> for Sendable
where
    T: Into<Message>,
{
    fn from(value: T) -> Self {
        Self {
            message: value.into(),
            message_format: 0,
            settled: None,
        }
    }
}

/// Type state of a [`Builder`] that has no message yet
#[derive(Debug)]
pub struct Uninitialized {}

/// Builder for [`Sendable`]
#[derive(Debug)]
pub struct Builder<T> {
    message: T,
    message_format: MessageFormat,
    settled: Option<bool>,
}

impl Builder<Uninitialized> {
    /// Creates a new builder
    pub fn new() -> Self {
        Self {
            message: Uninitialized {},
            message_format: 0,
            settled: None,
        }
    }
}

impl Default for Builder<Uninitialized> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Builder<T> {
    /// The message to send
    pub fn message(self, message: impl Into<Message>) -> Builder<Message> {
        Builder {
            message: message.into(),
            message_format: self.message_format,
            settled: self.settled,
        }
    }

    /// Message format
    pub fn message_format(mut self, message_format: MessageFormat) -> Self {
        self.message_format = message_format;
        self
    }

    /// Whether the delivery is sent settled. Only consulted when the sender
    /// settle mode is `mixed`
    pub fn settled(mut self, settled: impl Into<Option<bool>>) -> Self {
        self.settled = settled.into();
        self
    }
}

impl Builder<Message> {
    /// Builds the [`Sendable`]
    pub fn build(self) -> Sendable {
        Sendable {
            message: self.message,
            message_format: self.message_format,
            settled: self.settled,
        }
    }
}

impl From<Builder<Message>> for Sendable {
    fn from(builder: Builder<Message>) -> Self {
        builder.build()
    }
}

/// One message transfer on a link.
///
/// Local and remote settlement are tracked separately because either end
/// may settle first.
#[derive(Debug)]
pub struct Delivery {
    tag: DeliveryTag,
    id: Option<DeliveryNumber>,
    role: Role,
    message: Option<Message>,
    message_format: MessageFormat,

    local_settled: bool,
    remote_settled: bool,
    local_state: Option<DeliveryState>,
    remote_state: Option<DeliveryState>,

    /// Whether an outcome settles the delivery at once
    settle_on_outcome: bool,

    pub(crate) transferred: bool,
    pub(crate) updated: bool,
    pub(crate) pending_disposition: bool,
    pub(crate) settled_fired: bool,
}

impl Delivery {
    pub(crate) fn outgoing(
        tag: DeliveryTag,
        message: Message,
        message_format: MessageFormat,
        settled: bool,
    ) -> Self {
        Self {
            tag,
            id: None,
            role: Role::Sender,
            message: Some(message),
            message_format,
            local_settled: settled,
            remote_settled: false,
            local_state: None,
            remote_state: None,
            settle_on_outcome: true,
            transferred: false,
            updated: false,
            pending_disposition: false,
            settled_fired: false,
        }
    }

    pub(crate) fn incoming(
        tag: DeliveryTag,
        id: DeliveryNumber,
        message: Message,
        message_format: MessageFormat,
        remote_settled: bool,
        remote_state: Option<DeliveryState>,
        settle_on_outcome: bool,
    ) -> Self {
        Self {
            tag,
            id: Some(id),
            role: Role::Receiver,
            message: Some(message),
            message_format,
            local_settled: false,
            remote_settled,
            local_state: None,
            remote_state,
            settle_on_outcome,
            transferred: true,
            updated: false,
            pending_disposition: false,
            settled_fired: false,
        }
    }

    /// Delivery tag
    pub fn tag(&self) -> &DeliveryTag {
        &self.tag
    }

    /// Delivery id. `None` until the transfer has been sent
    pub fn id(&self) -> Option<DeliveryNumber> {
        self.id
    }

    /// Role of the link that owns the delivery
    pub fn role(&self) -> Role {
        self.role
    }

    /// The message carried by the delivery
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Message format
    pub fn message_format(&self) -> MessageFormat {
        self.message_format
    }

    /// Whether this end has settled the delivery
    pub fn local_settled(&self) -> bool {
        self.local_settled
    }

    /// Whether the peer has settled the delivery
    pub fn remote_settled(&self) -> bool {
        self.remote_settled
    }

    /// The state this end has assigned
    pub fn local_state(&self) -> Option<&DeliveryState> {
        self.local_state.as_ref()
    }

    /// The last state reported by the peer
    pub fn remote_state(&self) -> Option<&DeliveryState> {
        self.remote_state.as_ref()
    }

    /// Whether both ends have settled
    pub fn is_settled(&self) -> bool {
        self.local_settled && self.remote_settled
    }

    /// Updates the local settlement and outcome of the delivery.
    ///
    /// A disposition is sent once control returns to the engine unless the
    /// peer has already settled. Updates after local settlement are ignored.
    pub fn update(&mut self, settled: bool, outcome: Option<Outcome>) {
        if self.local_settled {
            return;
        }
        self.updated = true;
        if let Some(outcome) = outcome {
            self.local_state = Some(DeliveryState::from(outcome));
        }
        if settled {
            self.local_settled = true;
        }
        if !self.remote_settled {
            self.pending_disposition = true;
        }
    }

    /// Accepts the delivery
    pub fn accept(&mut self) {
        self.update(
            self.settle_on_outcome,
            Some(Outcome::Accepted(Accepted {})),
        )
    }

    /// Rejects the delivery with an optional error
    pub fn reject(&mut self, error: impl Into<Option<Error>>) {
        let outcome = Outcome::Rejected(Rejected {
            error: error.into(),
        });
        self.update(self.settle_on_outcome, Some(outcome))
    }

    /// Releases the delivery
    pub fn release(&mut self) {
        self.update(
            self.settle_on_outcome,
            Some(Outcome::Released(Released {})),
        )
    }

    /// Modifies the delivery
    pub fn modify(&mut self, delivery_failed: bool, undeliverable_here: bool) {
        let outcome = Outcome::Modified(Modified {
            delivery_failed: Some(delivery_failed),
            undeliverable_here: Some(undeliverable_here),
            message_annotations: None,
        });
        self.update(self.settle_on_outcome, Some(outcome))
    }

    pub(crate) fn take_message(&mut self) -> Option<Message> {
        self.message.take()
    }

    pub(crate) fn set_id(&mut self, id: DeliveryNumber) {
        self.id = Some(id);
    }

    /// Applies a disposition sent by the peer
    pub(crate) fn on_remote_disposition(&mut self, settled: bool, state: Option<DeliveryState>) {
        if state.is_some() {
            self.remote_state = state;
        }
        if settled {
            self.remote_settled = true;
            self.pending_disposition = false;
        }
    }

    /// Settles locally without telling the peer, which has settled already
    pub(crate) fn settle_silently(&mut self) {
        self.local_settled = true;
        self.pending_disposition = false;
    }

    /// Settled on both ends and the `settled` event has not fired yet
    pub(crate) fn needs_settled_event(&self) -> bool {
        self.is_settled() && !self.settled_fired
    }

    /// Settled locally and nothing else remains to be told to the peer
    pub(crate) fn is_done_locally(&self) -> bool {
        self.local_settled && self.transferred && !self.pending_disposition && !self.remote_settled
    }

    /// The disposition this end owes the peer
    pub(crate) fn local_disposition(&self) -> (bool, Option<DeliveryState>) {
        (self.local_settled, self.local_state.clone())
    }
}
