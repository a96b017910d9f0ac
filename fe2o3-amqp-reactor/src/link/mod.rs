//! Implementation of AMQP1.0 links
//!
//! A [`Link`] is either a sender or a receiver. Both share the attach/detach
//! state machine and the delivery tracker implemented here; the role specific
//! parts live in `sender.rs` and `receiver.rs`.

use std::collections::VecDeque;

use fe2o3_amqp_reactor_types::{
    definitions::{
        DeliveryNumber, DeliveryTag, Error as AmqpErrorObject, Fields, Handle, ReceiverSettleMode,
        Role, SenderSettleMode, SequenceNo,
    },
    messaging::{DeliveryState, Outcome, Source, Target},
    performatives::{Attach, Detach, Flow},
    primitives::{Multiple, Symbol},
    states::LinkState,
};
use indexmap::IndexMap;

use crate::{
    event::{EventContext, EventKind, Handlers},
    session::SessionId,
};

pub mod delivery;
pub mod options;

mod error;
mod receiver;
mod sender;

pub use delivery::{Delivery, Sendable};
pub use error::{DispositionError, Error, SendError};
pub use options::{LinkArgs, LinkOptions, DEFAULT_CREDIT_WINDOW};

/// Identifies a link within a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId {
    /// The session the link belongs to
    pub session: SessionId,

    /// Key of the link within the session
    pub key: usize,
}

/// The local end of a link.
///
/// The attach may be changed until it has been sent, which happens once the
/// handler that opened or accepted the link returns.
#[derive(Debug, Clone)]
pub struct LocalLink {
    /// Attach sent, or to be sent, to the peer
    pub attach: Attach,

    /// Detach sent, or to be sent, to the peer
    pub detach: Detach,
}

/// What the peer sent about its end of the link
#[derive(Debug, Clone, Default)]
pub struct RemoteLink {
    /// The peer's attach
    pub attach: Option<Attach>,

    /// The peer's detach
    pub detach: Option<Detach>,
}

/// A sender or receiver link
#[derive(Debug)]
pub struct Link {
    id: LinkId,
    role: Role,
    state: LinkState,

    pub(crate) local: LocalLink,
    pub(crate) remote: RemoteLink,
    pub(crate) handlers: Handlers,

    attach_sent: bool,
    detach_requested: bool,
    detach_sent: bool,

    // Flow state
    delivery_count: SequenceNo,
    link_credit: u32,
    available: u32,
    drain: bool,
    credit_window: u32,
    flow_pending: bool,

    autoaccept: bool,
    autosettle: bool,

    next_tag: u64,
    outgoing: VecDeque<DeliveryTag>,
    deliveries: IndexMap<DeliveryTag, Delivery>,
}

impl Link {
    /// Creates a link opened by this end
    pub(crate) fn new(id: LinkId, role: Role, handle: Handle, options: LinkOptions) -> Self {
        let name = options
            .name
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut attach = Attach::new(name, role);
        attach.handle = handle;
        attach.snd_settle_mode = options.snd_settle_mode.unwrap_or_default();
        attach.rcv_settle_mode = options.rcv_settle_mode.unwrap_or_default();
        attach.source = options.source.map(Box::new);
        attach.target = options.target.map(Box::new);
        attach.offered_capabilities = options.offered_capabilities;
        attach.desired_capabilities = options.desired_capabilities;
        attach.properties = options.properties;
        attach.max_message_size = options.max_message_size;
        if role == Role::Sender {
            attach.initial_delivery_count = Some(0);
        }

        Self::with_attach(
            id,
            attach,
            LinkState::AttachSent,
            options.autoaccept,
            options.autosettle,
            options.credit_window,
        )
    }

    /// Creates the local end of a link the peer attached first. The local
    /// attach echoes the peer's termini and settle modes
    pub(crate) fn from_remote(
        id: LinkId,
        handle: Handle,
        remote: &Attach,
        options: &LinkOptions,
    ) -> Self {
        let role = remote.role.peer();
        let mut attach = Attach::new(remote.name.clone(), role);
        attach.handle = handle;
        attach.source = remote.source.clone();
        attach.target = remote.target.clone();
        attach.rcv_settle_mode = remote.rcv_settle_mode;
        match role {
            Role::Sender => attach.initial_delivery_count = Some(0),
            Role::Receiver => attach.snd_settle_mode = remote.snd_settle_mode,
        }

        Self::with_attach(
            id,
            attach,
            LinkState::AttachReceived,
            options.autoaccept,
            options.autosettle,
            options.credit_window,
        )
    }

    fn with_attach(
        id: LinkId,
        attach: Attach,
        state: LinkState,
        autoaccept: Option<bool>,
        autosettle: Option<bool>,
        credit_window: Option<u32>,
    ) -> Self {
        let role = attach.role;
        let handle = attach.handle;
        Self {
            id,
            role,
            state,
            local: LocalLink {
                attach,
                detach: Detach {
                    handle,
                    closed: true,
                    error: None,
                },
            },
            remote: RemoteLink::default(),
            handlers: Handlers::default(),
            attach_sent: false,
            detach_requested: false,
            detach_sent: false,
            delivery_count: 0,
            link_credit: 0,
            available: 0,
            drain: false,
            credit_window: credit_window.unwrap_or(DEFAULT_CREDIT_WINDOW),
            flow_pending: false,
            autoaccept: autoaccept.unwrap_or(true),
            autosettle: autosettle.unwrap_or(true),
            next_tag: 0,
            outgoing: VecDeque::new(),
            deliveries: IndexMap::new(),
        }
    }

    /// Id of the link
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Role of this end of the link
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether this end is a sender
    pub fn is_sender(&self) -> bool {
        self.role == Role::Sender
    }

    /// Whether this end is a receiver
    pub fn is_receiver(&self) -> bool {
        self.role == Role::Receiver
    }

    /// Link state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether both ends are attached and no detach has been requested
    pub fn is_open(&self) -> bool {
        self.state == LinkState::Attached && !self.detach_requested
    }

    /// Whether the link has been detached on both ends
    pub fn is_closed(&self) -> bool {
        self.state == LinkState::Detached
    }

    /// Registers a handler for events of this link
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        self.handlers.on(kind, handler);
        self
    }

    /// Registers a handler for the next event of `kind` on this link
    pub fn once<F>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        self.handlers.once(kind, handler);
        self
    }

    /// Handlers registered on this link
    pub fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    /// The local end
    pub fn local(&self) -> &LocalLink {
        &self.local
    }

    /// The local end. Changes to the attach take effect if it has not been sent yet
    pub fn local_mut(&mut self) -> &mut LocalLink {
        &mut self.local
    }

    /// What the peer sent
    pub fn remote(&self) -> &RemoteLink {
        &self.remote
    }

    /* ---------------------------- remote aliases ---------------------------- */

    /// Link name
    pub fn name(&self) -> &str {
        &self.local.attach.name
    }

    fn remote_attach(&self) -> Option<&Attach> {
        self.remote.attach.as_ref()
    }

    /// Source sent by the peer
    pub fn source(&self) -> Option<&Source> {
        self.remote_attach()?.source.as_deref()
    }

    /// Target sent by the peer
    pub fn target(&self) -> Option<&Target> {
        self.remote_attach()?.target.as_deref()
    }

    /// Sender settle mode declared by the peer
    pub fn snd_settle_mode(&self) -> Option<SenderSettleMode> {
        self.remote_attach().map(|a| a.snd_settle_mode)
    }

    /// Receiver settle mode declared by the peer
    pub fn rcv_settle_mode(&self) -> Option<ReceiverSettleMode> {
        self.remote_attach().map(|a| a.rcv_settle_mode)
    }

    /// Capabilities offered by the peer
    pub fn offered_capabilities(&self) -> Option<&Multiple<Symbol>> {
        self.remote_attach()?.offered_capabilities.as_ref()
    }

    /// Capabilities desired by the peer
    pub fn desired_capabilities(&self) -> Option<&Multiple<Symbol>> {
        self.remote_attach()?.desired_capabilities.as_ref()
    }

    /// Link properties sent by the peer
    pub fn properties(&self) -> Option<&Fields> {
        self.remote_attach()?.properties.as_ref()
    }

    /// Max message size of the peer
    pub fn max_message_size(&self) -> Option<u64> {
        self.remote_attach()?.max_message_size
    }

    /// Error the peer detached with
    pub fn error(&self) -> Option<&AmqpErrorObject> {
        self.remote.detach.as_ref()?.error.as_ref()
    }

    /* ------------------------------- detach -------------------------------- */

    /// Detaches without closing the link
    pub fn detach(&mut self) {
        self.local.detach.closed = false;
        self.request_detach();
    }

    /// Closes the link. An error given here replaces `local.detach.error`
    pub fn close(&mut self, error: impl Into<Option<AmqpErrorObject>>) {
        if let Some(error) = error.into() {
            self.local.detach.error = Some(error);
        }
        self.local.detach.closed = true;
        self.request_detach();
    }

    fn request_detach(&mut self) {
        if self.detach_requested || self.state == LinkState::Detached {
            return;
        }
        self.detach_requested = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(name = %self.name(), closed = self.local.detach.closed, "detach requested");
        #[cfg(feature = "log")]
        log::debug!("detach requested on {}", self.name());
    }

    /* ------------------------------- credit -------------------------------- */

    /// Credit currently held by the sender, or issued by the receiver
    pub fn credit(&self) -> u32 {
        self.link_credit
    }

    /// Delivery count
    pub fn delivery_count(&self) -> SequenceNo {
        self.delivery_count
    }

    /// Whether the peer asked the sender to drain its credit
    pub fn is_draining(&self) -> bool {
        self.drain
    }

    /* ------------------------------ deliveries ----------------------------- */

    /// Deliveries that are still tracked
    pub fn deliveries(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.values()
    }

    /// A tracked delivery
    pub fn delivery(&self, tag: &DeliveryTag) -> Option<&Delivery> {
        self.deliveries.get(tag)
    }

    /// A tracked delivery
    pub fn delivery_mut(&mut self, tag: &DeliveryTag) -> Option<&mut Delivery> {
        self.deliveries.get_mut(tag)
    }

    /// Updates a tracked delivery
    pub fn dispose(
        &mut self,
        tag: &DeliveryTag,
        settled: bool,
        outcome: Option<Outcome>,
    ) -> Result<(), DispositionError> {
        let delivery = self
            .deliveries
            .get_mut(tag)
            .ok_or(DispositionError::UnknownDeliveryTag)?;
        if delivery.local_settled() {
            return Err(DispositionError::AlreadySettled);
        }
        delivery.update(settled, outcome);
        Ok(())
    }

    /* ----------------------- engine side transitions ----------------------- */

    pub(crate) fn output_handle(&self) -> Handle {
        self.local.attach.handle
    }

    pub(crate) fn autoaccept(&self) -> bool {
        self.autoaccept
    }

    pub(crate) fn autosettle(&self) -> bool {
        self.autosettle
    }

    pub(crate) fn is_detach_sent(&self) -> bool {
        self.detach_sent
    }

    /// The attach to send if it has not been sent yet
    pub(crate) fn take_attach(&mut self) -> Option<Attach> {
        if self.attach_sent || self.state == LinkState::Detached {
            return None;
        }
        self.attach_sent = true;
        if self.state == LinkState::AttachReceived {
            self.state = LinkState::Attached;
        }
        Some(self.local.attach.clone())
    }

    pub(crate) fn on_remote_attach(&mut self, attach: Attach) {
        if self.role == Role::Receiver {
            self.delivery_count = attach.initial_delivery_count.unwrap_or(0);
        }
        self.remote.attach = Some(attach);
        if self.state == LinkState::AttachSent {
            self.state = LinkState::Attached;
        }
    }

    pub(crate) fn on_remote_detach(&mut self, detach: Detach) {
        let closed = detach.closed;
        self.remote.detach = Some(detach);
        match self.state {
            LinkState::DetachSent => self.state = LinkState::Detached,
            _ => {
                self.state = LinkState::DetachReceived;
                if !self.detach_requested {
                    self.local.detach.closed = closed;
                    self.detach_requested = true;
                }
            }
        }
    }

    /// The detach to send if one has been requested
    pub(crate) fn take_detach(&mut self) -> Option<Detach> {
        if !self.detach_requested || !self.attach_sent || self.detach_sent {
            return None;
        }
        self.detach_sent = true;
        self.state = match self.state {
            LinkState::DetachReceived => LinkState::Detached,
            _ => LinkState::DetachSent,
        };
        self.outgoing.clear();
        Some(self.local.detach.clone())
    }

    /// Ends the link without exchanging detach frames, as part of ending
    /// its session
    pub(crate) fn force_detach(&mut self) {
        self.state = LinkState::Detached;
        self.detach_requested = true;
        self.detach_sent = true;
        self.outgoing.clear();
    }

    /// Whether the link is still waiting on the peer to complete an attach or detach
    pub(crate) fn is_pending(&self) -> bool {
        matches!(self.state, LinkState::AttachSent | LinkState::DetachSent)
    }

    pub(crate) fn on_flow(&mut self, flow: &Flow) -> bool {
        match self.role {
            Role::Sender => self.on_sender_flow(flow),
            Role::Receiver => {
                self.on_receiver_flow(flow);
                false
            }
        }
    }

    /// The link part of the flow to send, if any
    pub(crate) fn take_flow(&mut self) -> Option<Flow> {
        if !self.attach_sent || self.detach_sent {
            return None;
        }
        match self.role {
            Role::Sender => self.complete_drain(),
            Role::Receiver => self.top_up_credit(),
        }
        if !self.flow_pending {
            return None;
        }
        self.flow_pending = false;
        Some(Flow {
            handle: Some(self.output_handle()),
            delivery_count: Some(self.delivery_count),
            link_credit: Some(self.link_credit),
            available: Some(self.available),
            drain: self.drain,
            ..Default::default()
        })
    }

    /// Dispositions this end owes the peer
    pub(crate) fn take_dispositions(&mut self) -> Vec<(DeliveryNumber, bool, Option<DeliveryState>)> {
        self.deliveries
            .values_mut()
            .filter(|d| d.pending_disposition)
            .filter_map(|d| {
                let id = d.id()?;
                d.pending_disposition = false;
                let (settled, state) = d.local_disposition();
                Some((id, settled, state))
            })
            .collect()
    }

    /// Tags of deliveries that became settled on both ends
    pub(crate) fn take_settled(&mut self) -> Vec<DeliveryTag> {
        self.deliveries
            .iter_mut()
            .filter(|(_, d)| d.needs_settled_event())
            .map(|(tag, d)| {
                d.settled_fired = true;
                tag.clone()
            })
            .collect()
    }

    /// Drops deliveries settled here and never to be settled by the peer.
    /// Returns their ids
    pub(crate) fn sweep(&mut self) -> Vec<DeliveryNumber> {
        let mut ids = Vec::new();
        self.deliveries.retain(|_, d| {
            if d.is_done_locally() {
                ids.extend(d.id());
                false
            } else {
                true
            }
        });
        ids
    }

    pub(crate) fn remove_delivery(&mut self, tag: &DeliveryTag) -> Option<Delivery> {
        self.deliveries.shift_remove(tag)
    }
}
