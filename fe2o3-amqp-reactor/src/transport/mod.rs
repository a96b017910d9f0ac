//! Transport collaborators of a [`Connection`](crate::Connection).
//!
//! A transport is an ordered, reliable stream of decoded frames in both
//! directions. Byte encoding and sockets live outside of this crate; anything
//! that is a `Stream` of incoming frames and a `Sink` of outgoing frames can
//! drive a connection.

use std::io;

use fe2o3_amqp_reactor_types::frame::Frame;
use futures_util::{Sink, Stream};

pub mod memory;

/// An ordered, reliable frame stream
pub trait Transport:
    Stream<Item = Result<Frame, io::Error>> + Sink<Frame, Error = io::Error> + Send + Unpin + 'static
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<Frame, io::Error>>
        + Sink<Frame, Error = io::Error>
        + Send
        + Unpin
        + 'static
{
}
