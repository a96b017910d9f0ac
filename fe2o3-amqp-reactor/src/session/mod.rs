//! Implementation of AMQP1.0 sessions
//!
//! A [`Session`] multiplexes links over one channel of a connection. It maps
//! link handles in both directions and remembers which link owns each
//! unsettled delivery id so that dispositions find their delivery.

use std::collections::{BTreeMap, VecDeque};

use fe2o3_amqp_reactor_types::{
    definitions::{
        self, AmqpError, ConnectionError, DeliveryNumber, DeliveryTag, Handle, Role,
        SessionError, TransferNumber,
    },
    frame::{Frame, FrameBody},
    messaging::{Message, Outcome},
    performatives::{Attach, Begin, Detach, Disposition, End, Flow, Transfer},
    states::{LinkState, SessionState},
};
use indexmap::IndexMap;
use slab::Slab;

use crate::{
    event::{Event, EventContext, EventKind, Handlers},
    link::{Link, LinkId, LinkOptions},
};

mod error;
pub use error::AllocLinkError;

/// Default incoming and outgoing window
pub const DEFAULT_WINDOW: u32 = 2048;

/// Default handle max
pub const DEFAULT_HANDLE_MAX: u32 = u32::MAX;

/// Identifies a session within a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub usize);

/// The local end of a session
#[derive(Debug, Clone)]
pub struct LocalSession {
    /// Begin sent, or to be sent, to the peer
    pub begin: Begin,

    /// End sent, or to be sent, to the peer
    pub end: End,
}

/// What the peer sent about its end of the session
#[derive(Debug, Clone, Default)]
pub struct RemoteSession {
    /// The peer's begin
    pub begin: Option<Begin>,

    /// The peer's end
    pub end: Option<End>,
}

/// An AMQP1.0 session
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,

    pub(crate) local: LocalSession,
    pub(crate) remote: RemoteSession,
    pub(crate) handlers: Handlers,

    outgoing_channel: u16,
    incoming_channel: Option<u16>,

    begin_sent: bool,
    end_requested: bool,
    end_sent: bool,
    flow_pending: bool,

    // Session flow control
    next_outgoing_id: TransferNumber,
    next_incoming_id: TransferNumber,
    incoming_window: u32,
    outgoing_window: u32,
    remote_incoming_window: u32,
    remote_outgoing_window: u32,

    links: IndexMap<usize, Link>,
    next_link_key: usize,
    output_handles: Slab<usize>,
    input_handles: BTreeMap<Handle, usize>,

    outgoing_unsettled: BTreeMap<DeliveryNumber, (usize, DeliveryTag)>,
    incoming_unsettled: BTreeMap<DeliveryNumber, (usize, DeliveryTag)>,
}

impl Session {
    /// Creates a session begun by this end
    pub(crate) fn new(id: SessionId, outgoing_channel: u16) -> Self {
        let begin = Begin {
            remote_channel: None,
            next_outgoing_id: 0,
            incoming_window: DEFAULT_WINDOW,
            outgoing_window: DEFAULT_WINDOW,
            handle_max: Handle(DEFAULT_HANDLE_MAX),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        Self {
            id,
            state: SessionState::BeginSent,
            local: LocalSession {
                begin,
                end: End::default(),
            },
            remote: RemoteSession::default(),
            handlers: Handlers::default(),
            outgoing_channel,
            incoming_channel: None,
            begin_sent: false,
            end_requested: false,
            end_sent: false,
            flow_pending: false,
            next_outgoing_id: 0,
            next_incoming_id: 0,
            incoming_window: DEFAULT_WINDOW,
            outgoing_window: DEFAULT_WINDOW,
            remote_incoming_window: 0,
            remote_outgoing_window: 0,
            links: IndexMap::new(),
            next_link_key: 0,
            output_handles: Slab::new(),
            input_handles: BTreeMap::new(),
            outgoing_unsettled: BTreeMap::new(),
            incoming_unsettled: BTreeMap::new(),
        }
    }

    /// Creates the local end of a session the peer began
    pub(crate) fn from_remote(
        id: SessionId,
        outgoing_channel: u16,
        incoming_channel: u16,
        remote: Begin,
    ) -> Self {
        let mut session = Self::new(id, outgoing_channel);
        session.state = SessionState::BeginReceived;
        session.incoming_channel = Some(incoming_channel);
        session.on_remote_begin(remote);
        session
    }

    /// Id of the session
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Channel used for outgoing frames
    pub fn channel(&self) -> u16 {
        self.outgoing_channel
    }

    /// Whether the session is mapped and not ending
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Mapped && !self.end_requested
    }

    /// Whether the session has ended
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Ended
    }

    /// Registers a handler for events of this session and its links
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        self.handlers.on(kind, handler);
        self
    }

    /// Registers a handler for the next event of `kind`
    pub fn once<F>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        self.handlers.once(kind, handler);
        self
    }

    /// Handlers registered on this session
    pub fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    /// The local end
    pub fn local(&self) -> &LocalSession {
        &self.local
    }

    /// The local end. Changes to the begin take effect if it has not been sent yet
    pub fn local_mut(&mut self) -> &mut LocalSession {
        &mut self.local
    }

    /// What the peer sent
    pub fn remote(&self) -> &RemoteSession {
        &self.remote
    }

    /// Error the peer ended the session with
    pub fn error(&self) -> Option<&definitions::Error> {
        self.remote.end.as_ref()?.error.as_ref()
    }

    /// Links of the session in the order they were created
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// A link of the session
    pub fn link(&self, key: usize) -> Option<&Link> {
        self.links.get(&key)
    }

    /// A link of the session
    pub fn link_mut(&mut self, key: usize) -> Option<&mut Link> {
        self.links.get_mut(&key)
    }

    /// Ends the session. Its links are detached along with it without
    /// detach frames of their own
    pub fn close(&mut self, error: impl Into<Option<definitions::Error>>) {
        if let Some(error) = error.into() {
            self.local.end.error = Some(error);
        }
        if self.end_requested || self.state == SessionState::Ended {
            return;
        }
        self.end_requested = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(channel = self.outgoing_channel, "end requested");
        #[cfg(feature = "log")]
        log::debug!("end requested on channel {}", self.outgoing_channel);
    }

    pub(crate) fn is_ending(&self) -> bool {
        self.end_requested
            || matches!(
                self.state,
                SessionState::EndSent | SessionState::EndReceived | SessionState::Ended
            )
    }

    fn handle_max(&self) -> u32 {
        let local = self.local.begin.handle_max.0;
        match &self.remote.begin {
            Some(begin) => local.min(begin.handle_max.0),
            None => local,
        }
    }

    /// Creates a link opened by this end
    pub(crate) fn create_link(
        &mut self,
        role: Role,
        options: LinkOptions,
    ) -> Result<&mut Link, AllocLinkError> {
        if self.is_ending() {
            return Err(AllocLinkError::IllegalState);
        }
        if let Some(name) = &options.name {
            let duplicated = self
                .links
                .values()
                .any(|l| l.role() == role && l.name() == name && !l.is_closed());
            if duplicated {
                return Err(AllocLinkError::DuplicatedLinkName);
            }
        }

        let key = self.next_link_key;
        let handle = self.alloc_handle(key)?;
        self.next_link_key += 1;

        let id = LinkId {
            session: self.id,
            key,
        };
        let link = Link::new(id, role, handle, options);
        Ok(self.links.entry(key).or_insert(link))
    }

    fn alloc_handle(&mut self, key: usize) -> Result<Handle, AllocLinkError> {
        let handle_max = self.handle_max();
        let entry = self.output_handles.vacant_entry();
        let handle = u32::try_from(entry.key()).map_err(|_| AllocLinkError::HandleMaxReached)?;
        if handle > handle_max {
            return Err(AllocLinkError::HandleMaxReached);
        }
        entry.insert(key);
        Ok(Handle(handle))
    }

    /* ------------------------------- incoming ------------------------------- */

    pub(crate) fn on_remote_begin(&mut self, begin: Begin) {
        self.next_incoming_id = begin.next_outgoing_id;
        self.remote_incoming_window = begin.incoming_window;
        self.remote_outgoing_window = begin.outgoing_window;
        self.remote.begin = Some(begin);
        if self.state == SessionState::BeginSent {
            self.state = SessionState::Mapped;
        }
    }

    /// Applies the peer's end. Returns the events to dispatch
    pub(crate) fn on_remote_end(&mut self, end: End) -> Vec<Event> {
        let error = end.error.clone();
        self.remote.end = Some(end);
        self.detach_all();
        match self.state {
            SessionState::EndSent => self.state = SessionState::Ended,
            _ => {
                self.state = SessionState::EndReceived;
                self.end_requested = true;
            }
        }

        let mut events = Vec::with_capacity(2);
        if error.is_some() {
            events.push(Event::session(EventKind::SessionError, self.id).with_error(error.clone()));
        }
        events.push(Event::session(EventKind::SessionClose, self.id).with_error(error));
        events
    }

    pub(crate) fn on_attach(
        &mut self,
        attach: Attach,
        preset: &LinkOptions,
    ) -> Result<Event, definitions::Error> {
        if attach.handle.0 > self.local.begin.handle_max.0 {
            return Err(definitions::Error::new(
                ConnectionError::FramingError,
                "Handle exceeds handle max".to_string(),
                None,
            ));
        }
        if self.input_handles.contains_key(&attach.handle) {
            return Err(SessionError::HandleInUse.into());
        }

        let role = attach.role.peer();
        let existing = self
            .links
            .iter()
            .find(|(_, l)| {
                l.role() == role
                    && l.name() == attach.name
                    && l.remote.attach.is_none()
                    && !l.is_closed()
            })
            .map(|(key, _)| *key);

        let key = match existing {
            Some(key) => key,
            None => {
                if self.is_ending() {
                    return Err(AmqpError::IllegalState.into());
                }
                let key = self.next_link_key;
                let handle = self.alloc_handle(key)?;
                self.next_link_key += 1;
                let id = LinkId {
                    session: self.id,
                    key,
                };
                self.links
                    .insert(key, Link::from_remote(id, handle, &attach, preset));
                key
            }
        };

        self.input_handles.insert(attach.handle, key);
        let link = self
            .links
            .get_mut(&key)
            .ok_or_else(|| definitions::Error::from(AmqpError::InternalError))?;
        link.on_remote_attach(attach);

        #[cfg(feature = "tracing")]
        tracing::debug!(name = %link.name(), role = link.role().as_str(), "link attached by peer");
        #[cfg(feature = "log")]
        log::debug!("link {} attached by peer", link.name());

        Ok(Event::link(EventKind::link_open(role), link.id()))
    }

    fn link_by_input_handle(&mut self, handle: &Handle) -> Result<&mut Link, definitions::Error> {
        let key = self
            .input_handles
            .get(handle)
            .ok_or_else(|| definitions::Error::from(SessionError::UnattachedHandle))?;
        self.links
            .get_mut(key)
            .ok_or_else(|| definitions::Error::from(SessionError::UnattachedHandle))
    }

    pub(crate) fn on_flow(&mut self, flow: Flow) -> Result<Option<Event>, definitions::Error> {
        self.remote_incoming_window = match flow.next_incoming_id {
            Some(next_incoming_id) => next_incoming_id
                .wrapping_add(flow.incoming_window)
                .wrapping_sub(self.next_outgoing_id),
            None => flow.incoming_window,
        };
        self.remote_outgoing_window = flow.outgoing_window;

        let Some(handle) = flow.handle else {
            if flow.echo {
                self.flow_pending = true;
            }
            return Ok(None);
        };

        let link = self.link_by_input_handle(&handle)?;
        match link.on_flow(&flow) {
            true => Ok(Some(Event::link(EventKind::Sendable, link.id()))),
            false => Ok(None),
        }
    }

    pub(crate) fn on_transfer(
        &mut self,
        transfer: Transfer,
        payload: Message,
    ) -> Result<Option<Event>, definitions::Error> {
        let delivery_id = transfer.delivery_id.unwrap_or(self.next_incoming_id);
        self.next_incoming_id = self.next_incoming_id.wrapping_add(1);
        self.remote_outgoing_window = self.remote_outgoing_window.saturating_sub(1);

        let key = *self
            .input_handles
            .get(&transfer.handle)
            .ok_or_else(|| definitions::Error::from(SessionError::UnattachedHandle))?;
        let link = self
            .links
            .get_mut(&key)
            .ok_or_else(|| definitions::Error::from(SessionError::UnattachedHandle))?;
        if link.is_sender() {
            return Err(definitions::Error::new(
                AmqpError::NotAllowed,
                "Transfer received on a sender".to_string(),
                None,
            ));
        }
        if transfer.aborted || link.state() != LinkState::Attached {
            return Ok(None);
        }

        let settled = transfer.settled.unwrap_or(false);
        let tag = link.on_transfer(transfer, delivery_id, payload);
        if !settled {
            self.incoming_unsettled
                .insert(delivery_id, (key, tag.clone()));
        }
        Ok(Some(Event::delivery(EventKind::Message, link.id(), tag)))
    }

    pub(crate) fn on_disposition(&mut self, disposition: Disposition) -> Vec<Event> {
        let mut events = Vec::new();
        // A disposition from the receiving peer is about deliveries we sent
        let unsettled = match disposition.role {
            Role::Receiver => &mut self.outgoing_unsettled,
            Role::Sender => &mut self.incoming_unsettled,
        };

        for delivery_id in disposition.delivery_ids() {
            let Some((key, tag)) = unsettled.get(&delivery_id).cloned() else {
                continue;
            };
            if disposition.settled {
                unsettled.remove(&delivery_id);
            }
            let Some(link) = self.links.get_mut(&key) else {
                continue;
            };
            let role = link.role();
            let autosettle = link.autosettle();
            let id = link.id();
            let Some(delivery) = link.delivery_mut(&tag) else {
                continue;
            };
            delivery.on_remote_disposition(disposition.settled, disposition.state.clone());

            match role {
                Role::Sender => match disposition.state.as_ref().and_then(|s| s.outcome()) {
                    Some(outcome) => {
                        events.push(Event::delivery(outcome_event(&outcome), id, tag));
                    }
                    None => {
                        if disposition.settled && autosettle {
                            delivery.settle_silently();
                        }
                    }
                },
                Role::Receiver => {
                    if disposition.settled {
                        delivery.settle_silently();
                    }
                }
            }
        }
        events
    }

    /// Applies the peer's detach. Returns the events to dispatch
    pub(crate) fn on_detach(&mut self, detach: Detach) -> Result<Vec<Event>, definitions::Error> {
        let key = self
            .input_handles
            .remove(&detach.handle)
            .ok_or_else(|| definitions::Error::from(SessionError::UnattachedHandle))?;
        let link = self
            .links
            .get_mut(&key)
            .ok_or_else(|| definitions::Error::from(SessionError::UnattachedHandle))?;

        let error = detach.error.clone();
        link.on_remote_detach(detach);

        #[cfg(feature = "tracing")]
        tracing::debug!(name = %link.name(), error = ?error, "link detached by peer");
        #[cfg(feature = "log")]
        log::debug!("link {} detached by peer {:?}", link.name(), error);

        let role = link.role();
        let id = link.id();
        let mut events = Vec::with_capacity(2);
        if error.is_some() {
            events.push(Event::link(EventKind::link_error(role), id).with_error(error.clone()));
        }
        events.push(Event::link(EventKind::link_close(role), id).with_error(error));
        Ok(events)
    }

    /* --------------------------- after dispatching --------------------------- */

    /// Accepts a message no handler has updated
    pub(crate) fn autoaccept(&mut self, key: usize, tag: &DeliveryTag) {
        if let Some(link) = self.links.get_mut(&key) {
            if !link.autoaccept() {
                return;
            }
            if let Some(delivery) = link.delivery_mut(tag) {
                if !delivery.updated {
                    delivery.accept();
                }
            }
        }
    }

    /// Settles an outgoing delivery the peer has settled
    pub(crate) fn autosettle(&mut self, key: usize, tag: &DeliveryTag) {
        if let Some(link) = self.links.get_mut(&key) {
            if !link.autosettle() {
                return;
            }
            if let Some(delivery) = link.delivery_mut(tag) {
                if delivery.remote_settled() && !delivery.local_settled() {
                    delivery.settle_silently();
                }
            }
        }
    }

    /// Forgets a delivery settled on both ends
    pub(crate) fn remove_delivery(&mut self, key: usize, tag: &DeliveryTag) {
        let Some(link) = self.links.get_mut(&key) else {
            return;
        };
        let role = link.role();
        if let Some(id) = link.remove_delivery(tag).and_then(|d| d.id()) {
            match role {
                Role::Sender => self.outgoing_unsettled.remove(&id),
                Role::Receiver => self.incoming_unsettled.remove(&id),
            };
        }
    }

    /* ------------------------------- outgoing ------------------------------- */

    fn take_begin(&mut self) -> Option<Begin> {
        if self.begin_sent || self.state == SessionState::Ended {
            return None;
        }
        self.begin_sent = true;
        let mut begin = self.local.begin.clone();
        begin.remote_channel = self.incoming_channel;
        begin.next_outgoing_id = self.next_outgoing_id;
        begin.incoming_window = self.incoming_window;
        begin.outgoing_window = self.outgoing_window;
        if self.state == SessionState::BeginReceived {
            self.state = SessionState::Mapped;
        }
        Some(begin)
    }

    fn take_end(&mut self) -> Option<End> {
        if !self.end_requested || !self.begin_sent || self.end_sent {
            return None;
        }
        self.end_sent = true;
        self.detach_all();
        self.state = match self.state {
            SessionState::EndReceived => SessionState::Ended,
            _ => SessionState::EndSent,
        };
        Some(self.local.end.clone())
    }

    fn detach_all(&mut self) {
        for link in self.links.values_mut() {
            link.force_detach();
        }
    }

    /// Ends the session without exchanging end frames, as part of closing
    /// its connection
    pub(crate) fn force_end(&mut self) {
        self.detach_all();
        self.begin_sent = true;
        self.end_requested = true;
        self.end_sent = true;
        self.state = SessionState::Ended;
    }

    /// Fails every endpoint still waiting on the peer with `error` and ends
    /// the session. Returns the error events to dispatch
    pub(crate) fn fail_pending(&mut self, error: &definitions::Error) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .links
            .values()
            .filter(|link| link.is_pending())
            .map(|link| {
                Event::link(EventKind::link_error(link.role()), link.id())
                    .with_error(Some(error.clone()))
            })
            .collect();
        if matches!(self.state, SessionState::BeginSent | SessionState::EndSent) {
            events.push(
                Event::session(EventKind::SessionError, self.id).with_error(Some(error.clone())),
            );
        }
        self.force_end();
        events
    }

    fn remove_detached_links(&mut self) {
        let detached: Vec<usize> = self
            .links
            .iter()
            .filter(|(_, l)| l.is_closed() && l.is_detach_sent())
            .map(|(key, _)| *key)
            .collect();
        for key in detached {
            if let Some(link) = self.links.shift_remove(&key) {
                let handle = link.output_handle().0 as usize;
                if self.output_handles.get(handle) == Some(&key) {
                    self.output_handles.remove(handle);
                }
            }
            self.input_handles.retain(|_, k| *k != key);
            self.outgoing_unsettled.retain(|_, (k, _)| *k != key);
            self.incoming_unsettled.retain(|_, (k, _)| *k != key);
        }
    }

    /// Emits the frames owed to the peer from the current local state and
    /// queues the `settled` events that became due
    pub(crate) fn process(&mut self, frames: &mut VecDeque<Frame>, events: &mut VecDeque<Event>) {
        let channel = self.outgoing_channel;
        self.remove_detached_links();

        if let Some(begin) = self.take_begin() {
            frames.push_back(Frame::new(channel, begin));
        }
        if !self.begin_sent || self.end_sent {
            return;
        }
        if let Some(end) = self.take_end() {
            frames.push_back(Frame::new(channel, end));
            return;
        }

        for link in self.links.values_mut() {
            if let Some(attach) = link.take_attach() {
                frames.push_back(Frame::new(channel, attach));
            }

            if let Some(mut flow) = link.take_flow() {
                flow.next_incoming_id = self.remote.begin.as_ref().map(|_| self.next_incoming_id);
                flow.incoming_window = self.incoming_window;
                flow.next_outgoing_id = self.next_outgoing_id;
                flow.outgoing_window = self.outgoing_window;
                frames.push_back(Frame::new(channel, flow));
            }

            while link.has_pending_transfer() {
                let delivery_id = self.next_outgoing_id;
                let Some((transfer, payload)) = link.take_transfer(delivery_id) else {
                    break;
                };
                self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
                self.remote_incoming_window = self.remote_incoming_window.saturating_sub(1);
                if transfer.settled != Some(true) {
                    if let Some(tag) = transfer.delivery_tag.clone() {
                        self.outgoing_unsettled.insert(delivery_id, (link.id().key, tag));
                    }
                }
                let body = FrameBody::Transfer {
                    performative: transfer,
                    payload,
                };
                frames.push_back(Frame::new(channel, body));
            }

            let role = link.role();
            for (first, settled, state) in link.take_dispositions() {
                if settled {
                    match role {
                        Role::Sender => self.outgoing_unsettled.remove(&first),
                        Role::Receiver => self.incoming_unsettled.remove(&first),
                    };
                }
                let disposition = Disposition {
                    role,
                    first,
                    last: None,
                    settled,
                    state,
                    batchable: false,
                };
                frames.push_back(Frame::new(channel, disposition));
            }

            for tag in link.take_settled() {
                events.push_back(Event::delivery(EventKind::Settled, link.id(), tag));
            }
            for id in link.sweep() {
                match role {
                    Role::Sender => self.outgoing_unsettled.remove(&id),
                    Role::Receiver => self.incoming_unsettled.remove(&id),
                };
            }

            if let Some(detach) = link.take_detach() {
                frames.push_back(Frame::new(channel, detach));
            }
        }

        if self.flow_pending {
            self.flow_pending = false;
            let flow = Flow {
                next_incoming_id: self.remote.begin.as_ref().map(|_| self.next_incoming_id),
                incoming_window: self.incoming_window,
                next_outgoing_id: self.next_outgoing_id,
                outgoing_window: self.outgoing_window,
                ..Default::default()
            };
            frames.push_back(Frame::new(channel, flow));
        }
    }
}

fn outcome_event(outcome: &Outcome) -> EventKind {
    match outcome {
        Outcome::Accepted(_) => EventKind::Accepted,
        Outcome::Rejected(_) => EventKind::Rejected,
        Outcome::Released(_) => EventKind::Released,
        Outcome::Modified(_) => EventKind::Modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped_session() -> Session {
        let mut session = Session::new(SessionId(0), 0);
        let mut frames = VecDeque::new();
        let mut events = VecDeque::new();
        session.process(&mut frames, &mut events);
        session.on_remote_begin(Begin {
            remote_channel: Some(0),
            incoming_window: DEFAULT_WINDOW,
            outgoing_window: DEFAULT_WINDOW,
            handle_max: Handle(1),
            ..Default::default()
        });
        session
    }

    #[test]
    fn begin_is_emitted_once() {
        let mut session = Session::new(SessionId(0), 3);
        let mut frames = VecDeque::new();
        let mut events = VecDeque::new();
        session.process(&mut frames, &mut events);
        session.process(&mut frames, &mut events);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel, 3);
        assert!(matches!(frames[0].body, FrameBody::Begin(_)));
        assert_eq!(session.state(), SessionState::BeginSent);
    }

    #[test]
    fn handle_max_of_the_peer_limits_links() {
        let mut session = mapped_session();
        assert!(session.create_link(Role::Sender, LinkOptions::default()).is_ok());
        assert!(session.create_link(Role::Sender, LinkOptions::default()).is_ok());
        assert_eq!(
            session
                .create_link(Role::Sender, LinkOptions::default())
                .err(),
            Some(AllocLinkError::HandleMaxReached)
        );
    }

    #[test]
    fn duplicated_names_are_refused() {
        let mut session = mapped_session();
        let options = LinkOptions::builder().name("dup").build();
        assert!(session.create_link(Role::Sender, options.clone()).is_ok());
        assert!(session.create_link(Role::Receiver, options.clone()).is_ok());
        assert_eq!(
            session.create_link(Role::Sender, options).err(),
            Some(AllocLinkError::DuplicatedLinkName)
        );
    }

    #[test]
    fn attach_on_used_handle_is_refused() {
        let mut session = mapped_session();
        let attach = Attach::new("a", Role::Sender);
        assert!(session.on_attach(attach.clone(), &LinkOptions::default()).is_ok());

        let mut second = Attach::new("b", Role::Sender);
        second.handle = attach.handle;
        let err = session
            .on_attach(second, &LinkOptions::default())
            .unwrap_err();
        assert_eq!(err.condition, "amqp:session:handle-in-use");
    }

    #[test]
    fn end_detaches_links_without_frames() {
        let mut session = mapped_session();
        let mut frames = VecDeque::new();
        let mut events = VecDeque::new();
        session
            .create_link(Role::Receiver, LinkOptions::default())
            .unwrap();
        session.process(&mut frames, &mut events);
        frames.clear();

        session.close(None);
        session.process(&mut frames, &mut events);
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0].body, FrameBody::End(_)));
        assert!(session.links().all(|l| l.is_closed()));
        assert_eq!(session.state(), SessionState::EndSent);

        let events = session.on_remote_end(End::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::SessionClose);
        assert!(session.is_closed());
    }
}
