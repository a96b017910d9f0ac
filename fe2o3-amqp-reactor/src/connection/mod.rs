//! Implements AMQP1.0 Connection
//!
//! A [`Connection`] is a synchronous state machine. Decoded frames from the
//! peer go in through [`Connection::handle_frame`], frames for the peer come
//! out through [`Connection::pop_frame`]. Application calls only change local
//! state; the frames they imply are composed once the handler that made the
//! call has returned, which is what lets a handler rewrite the local attach
//! of a link the peer has just opened.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use fe2o3_amqp_reactor_types::{
    definitions::{self, AmqpError, Role},
    frame::{Frame, FrameBody},
    performatives::{Begin, Close, Open},
    states::ConnectionState,
};
use indexmap::IndexMap;
use slab::Slab;

use crate::{
    container::Container,
    event::{Event, EventContext, EventKind, Handler, Handlers},
    link::{self, Link, LinkArgs, LinkId, LinkOptions},
    session::{Session, SessionId},
};

pub mod builder;
pub(crate) mod engine;
mod error;
mod handle;

pub use builder::{ConnectionOptions, DEFAULT_CHANNEL_MAX, DEFAULT_MAX_FRAME_SIZE};
pub use error::{AllocSessionError, Error};
pub use handle::ConnectionHandle;

/// The local end of a connection
#[derive(Debug, Clone)]
pub struct LocalConnection {
    /// Open sent, or to be sent, to the peer
    pub open: Open,

    /// Close sent, or to be sent, to the peer
    pub close: Close,
}

/// What the peer sent about its end of the connection
#[derive(Debug, Clone, Default)]
pub struct RemoteConnection {
    /// The peer's open
    pub open: Option<Open>,

    /// The peer's close
    pub close: Option<Close>,
}

/// An AMQP1.0 connection
#[derive(Debug)]
pub struct Connection {
    container: Container,
    options: ConnectionOptions,
    state: ConnectionState,

    local: LocalConnection,
    remote: RemoteConnection,
    handlers: Handlers,

    open_requested: bool,
    open_sent: bool,
    close_requested: bool,
    close_sent: bool,
    discarding: bool,

    sessions: IndexMap<usize, Session>,
    next_session_key: usize,
    default_session: Option<usize>,
    channels: Slab<usize>,
    incoming_channels: BTreeMap<u16, usize>,

    events: VecDeque<Event>,
    frames: VecDeque<Frame>,
    fatal: Option<definitions::Error>,
}

impl Connection {
    pub(crate) fn new(container: Container, mut options: ConnectionOptions) -> Self {
        if options.sender_options.is_none() {
            options.sender_options = container.options().sender_options.clone();
        }
        if options.receiver_options.is_none() {
            options.receiver_options = container.options().receiver_options.clone();
        }

        let open = Open {
            container_id: options
                .container_id
                .clone()
                .unwrap_or_else(|| container.id().to_string()),
            hostname: options.hostname.clone(),
            max_frame_size: options.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME_SIZE),
            channel_max: options.channel_max.unwrap_or(DEFAULT_CHANNEL_MAX),
            idle_time_out: options.idle_time_out,
            offered_capabilities: options.offered_capabilities.clone(),
            desired_capabilities: options.desired_capabilities.clone(),
            properties: options.properties.clone(),
        };

        Self {
            container,
            options,
            state: ConnectionState::Start,
            local: LocalConnection {
                open,
                close: Close::default(),
            },
            remote: RemoteConnection::default(),
            handlers: Handlers::default(),
            open_requested: false,
            open_sent: false,
            close_requested: false,
            close_sent: false,
            discarding: false,
            sessions: IndexMap::new(),
            next_session_key: 0,
            default_session: None,
            channels: Slab::new(),
            incoming_channels: BTreeMap::new(),
            events: VecDeque::new(),
            frames: VecDeque::new(),
            fatal: None,
        }
    }

    /* --------------------------------- views -------------------------------- */

    /// The container that created the connection
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Connection options
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Connection options. Presets changed here apply to links opened afterwards
    pub fn options_mut(&mut self) -> &mut ConnectionOptions {
        &mut self.options
    }

    /// Connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The local end
    pub fn local(&self) -> &LocalConnection {
        &self.local
    }

    /// The local end. Changes to the open take effect if it has not been sent yet
    pub fn local_mut(&mut self) -> &mut LocalConnection {
        &mut self.local
    }

    /// What the peer sent
    pub fn remote(&self) -> &RemoteConnection {
        &self.remote
    }

    /// The peer's open
    pub fn remote_open(&self) -> Option<&Open> {
        self.remote.open.as_ref()
    }

    /// Container id of the peer
    pub fn remote_container_id(&self) -> Option<&str> {
        self.remote.open.as_ref().map(|o| o.container_id.as_str())
    }

    /// Error the peer closed the connection with
    pub fn error(&self) -> Option<&definitions::Error> {
        self.remote.close.as_ref()?.error.as_ref()
    }

    /// The unhandled error that ended the connection
    pub fn fatal_error(&self) -> Option<&definitions::Error> {
        self.fatal.as_ref()
    }

    /// Whether both ends have opened and no close has been requested
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Opened && !self.close_requested
    }

    /// Whether the connection has ended
    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::End
    }

    /// Sessions in the order they were created
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// A session
    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id.0)
    }

    /// A session
    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id.0)
    }

    /// A link
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.session(id.session)?.link(id.key)
    }

    /// A link
    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.session_mut(id.session)?.link_mut(id.key)
    }

    /* -------------------------------- handlers ------------------------------- */

    /// Registers a handler for events of this connection and everything it owns
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

    /// Handlers registered on this connection
    pub fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    /* ------------------------------ local calls ------------------------------ */

    /// Opens the connection. Called by [`Container::connect`]; an accepted
    /// connection opens in response to the peer's open
    pub fn open(&mut self) {
        self.open_requested = true;
    }

    /// Closes the connection and with it every session and link
    pub fn close(&mut self, error: impl Into<Option<definitions::Error>>) {
        if let Some(error) = error.into() {
            self.local.close.error = Some(error);
        }
        if self.close_requested || self.state == ConnectionState::End {
            return;
        }
        self.close_requested = true;
        self.open_requested = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(error = ?self.local.close.error, "close requested");
        #[cfg(feature = "log")]
        log::debug!("close requested {:?}", self.local.close.error);
    }

    /// Begins a new session
    pub fn open_session(&mut self) -> Result<&mut Session, AllocSessionError> {
        let key = self.create_session()?;
        self.sessions
            .get_mut(&key)
            .ok_or(AllocSessionError::IllegalState)
    }

    fn create_session(&mut self) -> Result<usize, AllocSessionError> {
        if self.close_requested || self.state == ConnectionState::End {
            return Err(AllocSessionError::IllegalState);
        }
        let key = self.next_session_key;
        let channel = self.alloc_channel(key)?;
        self.next_session_key += 1;
        self.sessions
            .insert(key, Session::new(SessionId(key), channel));
        Ok(key)
    }

    fn channel_max(&self) -> u16 {
        let local = self.local.open.channel_max;
        match &self.remote.open {
            Some(open) => local.min(open.channel_max),
            None => local,
        }
    }

    fn alloc_channel(&mut self, key: usize) -> Result<u16, AllocSessionError> {
        let channel_max = self.channel_max();
        let entry = self.channels.vacant_entry();
        let channel =
            u16::try_from(entry.key()).map_err(|_| AllocSessionError::ChannelMaxReached)?;
        if channel > channel_max {
            return Err(AllocSessionError::ChannelMaxReached);
        }
        entry.insert(key);
        Ok(channel)
    }

    fn default_session(&mut self) -> Result<usize, AllocSessionError> {
        if let Some(key) = self.default_session {
            let usable = self
                .sessions
                .get(&key)
                .map(|s| !s.is_ending())
                .unwrap_or(false);
            if usable {
                return Ok(key);
            }
        }
        let key = self.create_session()?;
        self.default_session = Some(key);
        Ok(key)
    }

    fn preset(&self, role: Role) -> Option<Arc<LinkOptions>> {
        match role {
            Role::Sender => self.options.sender_options.clone(),
            Role::Receiver => self.options.receiver_options.clone(),
        }
    }

    fn open_link(&mut self, role: Role, args: LinkArgs) -> Result<&mut Link, link::Error> {
        let custom = args.compose(role);
        let options = match self.preset(role) {
            Some(preset) => preset.merge(&custom),
            None => custom,
        };
        let key = self.default_session()?;
        let session = self
            .sessions
            .get_mut(&key)
            .ok_or(link::Error::IllegalState)?;
        let link = session.create_link(role, options)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(name = %link.name(), role = role.as_str(), "link opened");
        #[cfg(feature = "log")]
        log::debug!("{} {} opened", role.as_str(), link.name());

        Ok(link)
    }

    /// Opens a sender on the default session.
    ///
    /// `args` is an address (the target), a [`LinkOptions`] or `()`. The
    /// connection's `sender_options` preset is merged underneath.
    pub fn open_sender(&mut self, args: impl Into<LinkArgs>) -> Result<&mut Link, link::Error> {
        self.open_link(Role::Sender, args.into())
    }

    /// Opens a receiver on the default session.
    ///
    /// `args` is an address (the source), a [`LinkOptions`] or `()`. The
    /// connection's `receiver_options` preset is merged underneath.
    pub fn open_receiver(&mut self, args: impl Into<LinkArgs>) -> Result<&mut Link, link::Error> {
        self.open_link(Role::Receiver, args.into())
    }

    /* ---------------------------- frame exchange ---------------------------- */

    /// Applies a frame from the peer and dispatches the resulting events.
    ///
    /// A protocol violation closes the connection with the matching error,
    /// which is also returned.
    pub fn handle_frame(&mut self, frame: Frame) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::trace!(channel = frame.channel, frame = ?frame.body, "RECV");
        #[cfg(feature = "log")]
        log::trace!("RECV channel = {}, frame = {:?}", frame.channel, frame.body);

        let result = match self.on_frame(frame) {
            Ok(()) => Ok(()),
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::error!(%error, "protocol error");
                #[cfg(feature = "log")]
                log::error!("protocol error {}", error);

                self.close(error.clone());
                self.discarding = true;
                Err(Error::Protocol(error))
            }
        };
        self.run();
        result
    }

    /// The next frame to send to the peer
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.run();
        let frame = self.frames.pop_front()?;

        #[cfg(feature = "tracing")]
        tracing::trace!(channel = frame.channel, frame = ?frame.body, "SEND");
        #[cfg(feature = "log")]
        log::trace!("SEND channel = {}, frame = {:?}", frame.channel, frame.body);

        Some(frame)
    }

    /// All frames to send to the peer
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.pop_frame() {
            frames.push(frame);
        }
        frames
    }

    /// Tells the connection that its transport ended
    pub fn on_disconnected(&mut self) {
        if self.state == ConnectionState::End {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(state = ?self.state, "transport ended before close");
        #[cfg(feature = "log")]
        log::debug!("transport ended before close in state {:?}", self.state);

        self.state = ConnectionState::End;
        self.open_sent = true;
        self.close_sent = true;
        self.frames.clear();
        for session in self.sessions.values_mut() {
            session.force_end();
        }
        self.events
            .push_back(Event::connection(EventKind::Disconnected));
        self.run();
    }

    fn on_frame(&mut self, frame: Frame) -> Result<(), definitions::Error> {
        match self.state {
            ConnectionState::End => return Ok(()),
            ConnectionState::Discarding if !matches!(frame.body, FrameBody::Close(_)) => {
                return Ok(())
            }
            _ => {}
        }
        if self.discarding && !matches!(frame.body, FrameBody::Close(_)) {
            return Ok(());
        }

        match frame.body {
            FrameBody::Open(open) => self.on_open(open),
            FrameBody::Close(close) => {
                self.on_close(close);
                Ok(())
            }
            FrameBody::Empty => Ok(()),
            body => {
                if self.remote.open.is_none() {
                    return Err(definitions::Error::new(
                        AmqpError::IllegalState,
                        format!("{} received before open", body.name()),
                        None,
                    ));
                }
                if self.close_sent {
                    return Ok(());
                }
                self.on_session_frame(frame.channel, body)
            }
        }
    }

    fn on_open(&mut self, open: Open) -> Result<(), definitions::Error> {
        if self.remote.open.is_some() {
            return Err(definitions::Error::new(
                AmqpError::IllegalState,
                "Open received twice".to_string(),
                None,
            ));
        }
        self.state = match self.state {
            ConnectionState::Start => ConnectionState::OpenReceived,
            ConnectionState::OpenSent => ConnectionState::Opened,
            // Closed before the peer's open arrived
            state => state,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(container_id = %open.container_id, "connection opened by peer");
        #[cfg(feature = "log")]
        log::debug!("connection opened by peer {}", open.container_id);

        self.remote.open = Some(open);
        self.open_requested = true;
        if !self.close_requested {
            self.events
                .push_back(Event::connection(EventKind::ConnectionOpen));
        }
        Ok(())
    }

    fn on_close(&mut self, close: Close) {
        let error = close.error.clone();
        self.remote.close = Some(close);
        match self.state {
            ConnectionState::CloseSent | ConnectionState::Discarding => {
                self.state = ConnectionState::End;
            }
            _ => {
                self.state = ConnectionState::CloseReceived;
                self.close_requested = true;
                self.open_requested = true;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(error = ?error, "connection closed by peer");
        #[cfg(feature = "log")]
        log::debug!("connection closed by peer {:?}", error);

        self.end_sessions(error.as_ref());
        if error.is_some() {
            self.events.push_back(
                Event::connection(EventKind::ConnectionError).with_error(error.clone()),
            );
        }
        self.events
            .push_back(Event::connection(EventKind::ConnectionClose).with_error(error));
    }

    /// Ends every session without frames. An error is first delivered to the
    /// endpoints still waiting on the peer
    fn end_sessions(&mut self, error: Option<&definitions::Error>) {
        for session in self.sessions.values_mut() {
            if session.is_closed() {
                continue;
            }
            match error {
                Some(error) => self.events.extend(session.fail_pending(error)),
                None => session.force_end(),
            }
        }
        self.incoming_channels.clear();
    }

    fn on_session_frame(&mut self, channel: u16, body: FrameBody) -> Result<(), definitions::Error> {
        let body = match body {
            FrameBody::Begin(begin) => return self.on_begin(channel, begin),
            body => body,
        };

        let key = *self.incoming_channels.get(&channel).ok_or_else(|| {
            definitions::Error::new(
                AmqpError::NotAllowed,
                format!("{} received on unattached channel {}", body.name(), channel),
                None,
            )
        })?;
        let preset = match &body {
            FrameBody::Attach(attach) => self.preset(attach.role.peer()),
            _ => None,
        };
        let session = self
            .sessions
            .get_mut(&key)
            .ok_or_else(|| definitions::Error::from(AmqpError::InternalError))?;

        match body {
            FrameBody::Attach(attach) => {
                let preset = preset.unwrap_or_default();
                let event = session.on_attach(attach, &preset)?;
                self.events.push_back(event);
            }
            FrameBody::Flow(flow) => {
                if let Some(event) = session.on_flow(flow)? {
                    self.events.push_back(event);
                }
            }
            FrameBody::Transfer {
                performative,
                payload,
            } => {
                if let Some(event) = session.on_transfer(performative, payload)? {
                    self.events.push_back(event);
                }
            }
            FrameBody::Disposition(disposition) => {
                self.events.extend(session.on_disposition(disposition));
            }
            FrameBody::Detach(detach) => {
                self.events.extend(session.on_detach(detach)?);
            }
            FrameBody::End(end) => {
                self.events.extend(session.on_remote_end(end));
                self.incoming_channels.remove(&channel);
            }
            FrameBody::Open(_) | FrameBody::Begin(_) | FrameBody::Close(_) | FrameBody::Empty => {}
        }
        Ok(())
    }

    fn on_begin(&mut self, channel: u16, begin: Begin) -> Result<(), definitions::Error> {
        if self.incoming_channels.contains_key(&channel) {
            return Err(definitions::Error::new(
                AmqpError::NotAllowed,
                format!("Begin received on channel {} already in use", channel),
                None,
            ));
        }

        let key = match begin.remote_channel {
            Some(remote_channel) => {
                let key = self
                    .channels
                    .get(remote_channel as usize)
                    .copied()
                    .ok_or_else(|| {
                        definitions::Error::new(
                            AmqpError::NotAllowed,
                            format!("Begin refers to unknown channel {}", remote_channel),
                            None,
                        )
                    })?;
                let session = self
                    .sessions
                    .get_mut(&key)
                    .ok_or_else(|| definitions::Error::from(AmqpError::InternalError))?;
                if session.remote.begin.is_some() {
                    return Err(definitions::Error::new(
                        AmqpError::IllegalState,
                        "Begin received twice".to_string(),
                        None,
                    ));
                }
                session.on_remote_begin(begin);
                key
            }
            None => {
                let key = self.next_session_key;
                let outgoing = self.alloc_channel(key).map_err(|err| {
                    definitions::Error::new(AmqpError::ResourceLimitExceeded, err.to_string(), None)
                })?;
                self.next_session_key += 1;
                let session = Session::from_remote(SessionId(key), outgoing, channel, begin);
                self.sessions.insert(key, session);
                key
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(channel, "session begun by peer");
        #[cfg(feature = "log")]
        log::debug!("session begun by peer on channel {}", channel);

        self.incoming_channels.insert(channel, key);
        self.events
            .push_back(Event::session(EventKind::SessionOpen, SessionId(key)));
        Ok(())
    }

    /* ------------------------------- dispatch ------------------------------- */

    /// Dispatches queued events and emits the frames they lead to until
    /// nothing is left to do
    fn run(&mut self) {
        loop {
            while let Some(event) = self.events.pop_front() {
                self.dispatch(event);
            }
            self.process();
            if self.events.is_empty() {
                break;
            }
        }
    }

    fn dispatch(&mut self, event: Event) {
        let handlers = self.resolve(&event);
        if handlers.is_empty() {
            if event.kind.escalates() {
                self.escalate(&event);
            } else {
                #[cfg(feature = "tracing")]
                tracing::trace!(event = %event.kind, "no handler");
                #[cfg(feature = "log")]
                log::trace!("no handler for {}", event.kind);
            }
        } else {
            self.invoke(&event, handlers);
        }
        self.after_dispatch(&event);
    }

    /// Finds the handlers of the most specific scope that has any
    fn resolve(&mut self, event: &Event) -> Vec<Handler> {
        let kind = event.kind;
        if let Some(link) = event.link.and_then(|id| self.link_mut(id)) {
            let handlers = link.handlers.take(kind);
            if !handlers.is_empty() {
                return handlers;
            }
        }
        if let Some(session) = event.session.and_then(|id| self.session_mut(id)) {
            let handlers = session.handlers.take(kind);
            if !handlers.is_empty() {
                return handlers;
            }
        }
        let handlers = self.handlers.take(kind);
        if !handlers.is_empty() {
            return handlers;
        }
        self.container.take_handlers(kind)
    }

    fn invoke(&mut self, event: &Event, handlers: Vec<Handler>) {
        for handler in handlers {
            let mut context = EventContext::new(self, event);
            handler(&mut context);
        }
    }

    /// Hands an unhandled endpoint error to the container `error` handler.
    /// Without one the error is fatal to this connection
    fn escalate(&mut self, event: &Event) {
        let handlers = self.container.take_handlers(EventKind::Error);
        if !handlers.is_empty() {
            let escalated = Event {
                kind: EventKind::Error,
                ..event.clone()
            };
            self.invoke(&escalated, handlers);
            return;
        }

        let error = event
            .error
            .clone()
            .unwrap_or_else(|| definitions::Error::from(AmqpError::InternalError));

        #[cfg(feature = "tracing")]
        tracing::error!(event = %event.kind, %error, "unhandled error");
        #[cfg(feature = "log")]
        log::error!("unhandled {} {}", event.kind, error);

        if self.fatal.is_none() {
            self.fatal = Some(error.clone());
        }
        if !self.close_requested {
            self.close(error);
        }
    }

    fn after_dispatch(&mut self, event: &Event) {
        let (Some(link), Some(tag)) = (event.link, event.delivery.as_ref()) else {
            return;
        };
        let Some(session) = self.session_mut(link.session) else {
            return;
        };
        match event.kind {
            EventKind::Message => session.autoaccept(link.key, tag),
            EventKind::Accepted
            | EventKind::Rejected
            | EventKind::Released
            | EventKind::Modified => session.autosettle(link.key, tag),
            EventKind::Settled => session.remove_delivery(link.key, tag),
            _ => {}
        }
    }

    /* ------------------------------- outgoing ------------------------------- */

    fn remove_ended_sessions(&mut self) {
        let ended: Vec<usize> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_closed())
            .map(|(key, _)| *key)
            .collect();
        for key in ended {
            if let Some(session) = self.sessions.shift_remove(&key) {
                let channel = session.channel() as usize;
                if self.channels.get(channel) == Some(&key) {
                    self.channels.remove(channel);
                }
            }
            self.incoming_channels.retain(|_, k| *k != key);
            if self.default_session == Some(key) {
                self.default_session = None;
            }
        }
    }

    /// Emits the frames owed to the peer from the current local state
    fn process(&mut self) {
        if self.state == ConnectionState::End && self.close_sent {
            return;
        }
        self.remove_ended_sessions();

        if self.open_requested && !self.open_sent {
            self.open_sent = true;
            self.state = match self.state {
                ConnectionState::Start => ConnectionState::OpenSent,
                ConnectionState::OpenReceived => ConnectionState::Opened,
                state => state,
            };
            self.frames
                .push_back(Frame::new(0u16, self.local.open.clone()));
        }
        if !self.open_sent || self.close_sent {
            return;
        }

        for session in self.sessions.values_mut() {
            session.process(&mut self.frames, &mut self.events);
        }

        if self.close_requested {
            self.close_sent = true;
            let error = self.local.close.error.clone();
            self.end_sessions(error.as_ref());
            self.frames
                .push_back(Frame::new(0u16, self.local.close.clone()));
            self.state = match self.state {
                ConnectionState::CloseReceived => ConnectionState::End,
                _ if self.discarding => ConnectionState::Discarding,
                _ => ConnectionState::CloseSent,
            };
        }
    }
}
