#![deny(missing_docs, missing_debug_implementations)]

//! An event driven AMQP1.0 engine.
//!
//! A [`Container`] creates [`Connection`]s, which multiplex [`Session`]s,
//! which in turn multiplex [`Link`]s. Incoming frames update the endpoints
//! and raise [`EventKind`]s that are handed to the handlers registered on the
//! most specific scope: link, then session, then connection, then container.
//!
//! The engine itself does no IO. [`Connection::handle_frame`] applies a
//! decoded frame and [`Connection::pop_frame`] yields the frames to send.
//! [`Container::spawn`] drives a connection over any [`transport::Transport`]
//! on a tokio task.
//!
//! # Quick start
//!
//! ```rust
//! use fe2o3_amqp_reactor::{Container, ConnectionOptions, EventKind};
//!
//! let container = Container::default();
//! container
//!     .on(EventKind::ConnectionOpen, |ctx| {
//!         ctx.connection_mut().open_sender("examples").unwrap();
//!     })
//!     .on(EventKind::Sendable, |ctx| {
//!         if let Some(sender) = ctx.sender_mut() {
//!             let _ = sender.send("hello AMQP");
//!         }
//!     })
//!     .on(EventKind::Accepted, |ctx| {
//!         ctx.connection_mut().close(None);
//!     });
//!
//! let connection = container.connect(ConnectionOptions::default());
//! # drop(connection);
//! ```

pub use fe2o3_amqp_reactor_types as types;

pub mod connection;
pub mod container;
pub mod control;
pub mod event;
pub mod link;
pub mod session;
pub mod transport;

pub use connection::{Connection, ConnectionHandle, ConnectionOptions};
pub use container::{create_container, Container, ContainerOptions, Listener};
pub use event::{Event, EventContext, EventKind};
pub use link::{Delivery, Link, LinkOptions, Sendable};
pub use session::Session;
