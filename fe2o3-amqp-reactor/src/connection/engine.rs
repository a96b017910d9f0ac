use std::io;

use fe2o3_amqp_reactor_types::frame::Frame;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::{control::ConnectionControl, transport::Transport};

use super::{Connection, ConnectionHandle, Error};

pub(crate) const DEFAULT_CONTROL_CHAN_BUF: usize = 128;

/// Drives a [`Connection`] over a [`Transport`] on its own task
#[derive(Debug)]
pub(crate) struct ConnectionEngine<T> {
    transport: T,
    connection: Connection,
    control: mpsc::Receiver<ConnectionControl>,
    control_open: bool,
    protocol_error: Option<Error>,
}

impl<T> ConnectionEngine<T>
where
    T: Transport,
{
    pub(crate) fn new(
        connection: Connection,
        transport: T,
    ) -> (Self, mpsc::Sender<ConnectionControl>) {
        let (control_tx, control_rx) = mpsc::channel(DEFAULT_CONTROL_CHAN_BUF);
        let engine = Self {
            transport,
            connection,
            control: control_rx,
            control_open: true,
            protocol_error: None,
        };
        (engine, control_tx)
    }

    pub(crate) fn spawn(connection: Connection, transport: T) -> ConnectionHandle {
        let (engine, control) = Self::new(connection, transport);
        let handle = tokio::spawn(engine.event_loop());
        ConnectionHandle { control, handle }
    }

    async fn flush(&mut self) -> Result<(), Error> {
        let frames = self.connection.drain_frames();
        if frames.is_empty() {
            return Ok(());
        }
        for frame in frames {
            self.transport.feed(frame).await?;
        }
        self.transport.flush().await?;
        Ok(())
    }

    fn on_incoming(&mut self, incoming: Option<Result<Frame, io::Error>>) -> Result<(), Error> {
        match incoming {
            Some(Ok(frame)) => {
                if let Err(err) = self.connection.handle_frame(frame) {
                    // The connection has closed itself and waits for the
                    // peer's close
                    if self.protocol_error.is_none() {
                        self.protocol_error = Some(err);
                    }
                }
                Ok(())
            }
            Some(Err(err)) => {
                #[cfg(feature = "tracing")]
                tracing::error!(?err, "transport error");
                #[cfg(feature = "log")]
                log::error!("transport error {:?}", err);

                self.connection.on_disconnected();
                Err(err.into())
            }
            None => {
                self.connection.on_disconnected();
                Ok(())
            }
        }
    }

    fn on_control(&mut self, control: Option<ConnectionControl>) {
        match control {
            Some(ConnectionControl::Close(error)) => self.connection.close(error),
            Some(ConnectionControl::Execute(f)) => f(&mut self.connection),
            None => {
                // All handles are dropped
                self.control_open = false;
            }
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn event_loop(mut self) -> Result<(), Error> {
        loop {
            self.flush().await?;
            if self.connection.is_closed() {
                break;
            }

            tokio::select! {
                incoming = self.transport.next() => self.on_incoming(incoming)?,
                control = self.control.recv(), if self.control_open => self.on_control(control),
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("connection event loop stopped");
        #[cfg(feature = "log")]
        log::debug!("connection event loop stopped");

        if let Some(error) = self.connection.fatal_error() {
            return Err(Error::Unhandled(error.clone()));
        }
        match self.protocol_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
