//! In-memory frame transport
//!
//! # Example
//!
//! ```rust,no_run
//! use fe2o3_amqp_reactor::transport::memory;
//!
//! # async fn example() {
//! let (connector, _acceptor) = memory::listener();
//! // hand `_acceptor` to `Container::listen`, then
//! let transport = connector.connect().await.unwrap();
//! # }
//! ```

use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use fe2o3_amqp_reactor_types::frame::Frame;
use futures_util::{Sink, Stream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::PollSender;

/// Number of frames buffered in each direction
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Number of connect requests buffered by a [`MemoryAcceptor`]
pub const DEFAULT_BACKLOG: usize = 16;

/// One end of an in-memory frame transport
#[derive(Debug)]
pub struct MemoryTransport {
    sender: PollSender<Frame>,
    receiver: ReceiverStream<Frame>,
}

/// Creates two connected ends of an in-memory transport
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (left_tx, left_rx) = mpsc::channel(DEFAULT_BUFFER_SIZE);
    let (right_tx, right_rx) = mpsc::channel(DEFAULT_BUFFER_SIZE);
    let left = MemoryTransport {
        sender: PollSender::new(right_tx),
        receiver: ReceiverStream::new(left_rx),
    };
    let right = MemoryTransport {
        sender: PollSender::new(left_tx),
        receiver: ReceiverStream::new(right_rx),
    };
    (left, right)
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "peer transport dropped")
}

impl Stream for MemoryTransport {
    type Item = Result<Frame, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx).map(|o| o.map(Ok))
    }
}

impl Sink<Frame> for MemoryTransport {
    type Error = io::Error;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.sender)
            .poll_ready(cx)
            .map_err(|_| broken_pipe())
    }

    fn start_send(mut self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        Pin::new(&mut self.sender)
            .start_send(item)
            .map_err(|_| broken_pipe())
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.sender)
            .poll_flush(cx)
            .map_err(|_| broken_pipe())
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.sender)
            .poll_close(cx)
            .map_err(|_| broken_pipe())
    }
}

/// Creates an in-memory listener. Each [`MemoryConnector::connect`] yields
/// one end of a new transport and hands the other end to the acceptor
pub fn listener() -> (MemoryConnector, MemoryAcceptor) {
    let (tx, rx) = mpsc::channel(DEFAULT_BACKLOG);
    (
        MemoryConnector { sender: tx },
        MemoryAcceptor {
            incoming: ReceiverStream::new(rx),
        },
    )
}

/// Connects to a [`MemoryAcceptor`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    sender: mpsc::Sender<MemoryTransport>,
}

impl MemoryConnector {
    /// Opens a new transport to the acceptor
    pub async fn connect(&self) -> Result<MemoryTransport, io::Error> {
        let (local, remote) = pair();
        self.sender.send(remote).await.map_err(|_| {
            io::Error::new(io::ErrorKind::ConnectionRefused, "acceptor dropped")
        })?;
        Ok(local)
    }
}

/// Stream of accepted in-memory transports
#[derive(Debug)]
pub struct MemoryAcceptor {
    incoming: ReceiverStream<MemoryTransport>,
}

impl Stream for MemoryAcceptor {
    type Item = MemoryTransport;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.incoming).poll_next(cx)
    }
}
