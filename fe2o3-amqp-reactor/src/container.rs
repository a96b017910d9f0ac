//! The container owning connections and the root of handler resolution

use std::{fmt::Debug, sync::Arc};

use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use slab::Slab;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    connection::{engine::ConnectionEngine, Connection, ConnectionHandle, ConnectionOptions},
    control::ConnectionControl,
    event::{EventContext, EventKind, Handler, Handlers},
    link::LinkOptions,
    transport::Transport,
};

/// Options of a [`Container`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Container id. A UUID v4 is generated when absent
    pub id: Option<String>,

    /// Preset options of senders on every connection of the container
    pub sender_options: Option<Arc<LinkOptions>>,

    /// Preset options of receivers on every connection of the container
    pub receiver_options: Option<Arc<LinkOptions>>,
}

impl ContainerOptions {
    /// Creates a builder for [`ContainerOptions`]
    pub fn builder() -> Builder {
        Builder::default()
    }
}

/// Builder for [`ContainerOptions`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    options: ContainerOptions,
}

impl Builder {
    /// Container id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.options.id = Some(id.into());
        self
    }

    /// Preset options of senders
    pub fn sender_options(mut self, options: impl Into<LinkOptions>) -> Self {
        self.options.sender_options = Some(Arc::new(options.into()));
        self
    }

    /// Preset options of receivers
    pub fn receiver_options(mut self, options: impl Into<LinkOptions>) -> Self {
        self.options.receiver_options = Some(Arc::new(options.into()));
        self
    }

    /// Builds the [`ContainerOptions`]
    pub fn build(self) -> ContainerOptions {
        self.options
    }
}

impl From<Builder> for ContainerOptions {
    fn from(builder: Builder) -> Self {
        builder.build()
    }
}

struct Inner {
    id: String,
    options: ContainerOptions,
    handlers: Mutex<Handlers>,
    connections: Mutex<Slab<mpsc::Sender<ConnectionControl>>>,
}

/// An AMQP container.
///
/// Cloning a container yields another reference to the same container.
///
/// # Example
///
/// ```rust
/// use fe2o3_amqp_reactor::{Container, ConnectionOptions, EventKind};
///
/// let container = Container::default();
/// container.on(EventKind::Message, |ctx| {
///     if let Some(message) = ctx.message() {
///         println!("{:?}", message.body);
///     }
/// });
///
/// let mut connection = container.connect(ConnectionOptions::default());
/// connection.open_sender("examples").unwrap();
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new(ContainerOptions::default())
    }
}

/// Creates a container with default options
pub fn create_container() -> Container {
    Container::default()
}

impl Container {
    /// Creates a new container
    pub fn new(options: impl Into<ContainerOptions>) -> Self {
        let options = options.into();
        let id = options
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            inner: Arc::new(Inner {
                id,
                options,
                handlers: Mutex::new(Handlers::default()),
                connections: Mutex::new(Slab::new()),
            }),
        }
    }

    /// Container id sent in the open of every connection
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Container options
    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Registers a handler for events of every connection of the container.
    ///
    /// [`EventKind::Error`] handlers receive the endpoint errors no other
    /// handler took care of
    pub fn on<F>(&self, kind: EventKind, handler: F) -> &Self
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        self.inner.handlers.lock().on(kind, handler);
        self
    }

    /// Registers a handler for the next event of `kind` on any connection
    pub fn once<F>(&self, kind: EventKind, handler: F) -> &Self
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        self.inner.handlers.lock().once(kind, handler);
        self
    }

    /// Removes every container handler of `kind`
    pub fn remove_handlers(&self, kind: EventKind) {
        self.inner.handlers.lock().remove(kind);
    }

    pub(crate) fn take_handlers(&self, kind: EventKind) -> Vec<Handler> {
        self.inner.handlers.lock().take(kind)
    }

    /// Creates a connection and opens it. The open is sent with the first
    /// frames taken from the connection
    pub fn connect(&self, options: impl Into<ConnectionOptions>) -> Connection {
        let mut connection = Connection::new(self.clone(), options.into());
        connection.open();

        #[cfg(feature = "tracing")]
        tracing::debug!(container_id = %self.id(), "connecting");
        #[cfg(feature = "log")]
        log::debug!("container {} connecting", self.id());

        connection
    }

    /// Creates an unopened connection for a transport accepted by a
    /// listener. It opens in response to the peer's open
    pub fn accept(&self, options: impl Into<ConnectionOptions>) -> Connection {
        Connection::new(self.clone(), options.into())
    }

    /// Runs `connection` over `transport` on a new tokio task
    pub fn spawn<T>(&self, connection: Connection, transport: T) -> ConnectionHandle
    where
        T: Transport,
    {
        let handle = ConnectionEngine::spawn(connection, transport);
        let mut connections = self.inner.connections.lock();
        connections.retain(|_, control| !control.is_closed());
        connections.insert(handle.control.clone());
        handle
    }

    /// Accepts transports from `acceptor` and runs each as a new connection
    /// with `options` until the returned [`Listener`] is closed
    pub fn listen<A, T>(&self, acceptor: A, options: impl Into<ConnectionOptions>) -> Listener
    where
        A: Stream<Item = T> + Send + Unpin + 'static,
        T: Transport,
    {
        let container = self.clone();
        let options = options.into();
        let handle = tokio::spawn(async move {
            let mut acceptor = acceptor;
            let mut handles: Vec<ConnectionHandle> = Vec::new();
            while let Some(transport) = acceptor.next().await {
                #[cfg(feature = "tracing")]
                tracing::debug!("accepted transport");
                #[cfg(feature = "log")]
                log::debug!("accepted transport");

                handles.retain(|h| !h.is_finished());
                let connection = container.accept(options.clone());
                handles.push(container.spawn(connection, transport));
            }
            // Keep serving accepted connections after the acceptor ends
            for mut handle in handles {
                let _ = handle.join().await;
            }
        });
        Listener { handle }
    }

    /// Number of connections currently run by the container
    pub fn connection_count(&self) -> usize {
        let mut connections = self.inner.connections.lock();
        connections.retain(|_, control| !control.is_closed());
        connections.len()
    }

    /// Asks every connection run by the container to close
    pub fn close_all(&self) {
        let connections = self.inner.connections.lock();
        for (_, control) in connections.iter() {
            let _ = control.try_send(ConnectionControl::Close(None));
        }
    }
}

/// A running listener
#[derive(Debug)]
pub struct Listener {
    handle: JoinHandle<()>,
}

impl Listener {
    /// Stops accepting. Connections accepted so far are closed
    pub fn close(self) {
        self.handle.abort();
    }

    /// Whether the listener task has stopped
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = Container::default();
        let b = create_container();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().len(), 36);
    }

    #[test]
    fn configured_id_is_used_in_open() {
        let container = Container::new(ContainerOptions::builder().id("my-container"));
        let mut connection = container.connect(ConnectionOptions::default());
        let frame = connection.pop_frame().expect("open frame");
        match frame.body {
            fe2o3_amqp_reactor_types::frame::FrameBody::Open(open) => {
                assert_eq!(open.container_id, "my-container")
            }
            other => panic!("expected open, found {:?}", other),
        }
    }

    #[test]
    fn deserialize_with_presets() {
        let options: ContainerOptions = serde_json::from_str(
            r#"{ "id": "c1", "receiver_options": { "credit_window": 5 } }"#,
        )
        .unwrap();
        assert_eq!(options.id.as_deref(), Some("c1"));
        assert_eq!(
            options.receiver_options.and_then(|o| o.credit_window),
            Some(5)
        );
    }

    #[test]
    fn once_handlers_are_taken_once() {
        let container = Container::default();
        container.once(EventKind::Error, |_| {});
        assert_eq!(container.take_handlers(EventKind::Error).len(), 1);
        assert!(container.take_handlers(EventKind::Error).is_empty());
    }
}
