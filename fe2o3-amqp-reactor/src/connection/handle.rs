use fe2o3_amqp_reactor_types::definitions;
use tokio::{sync::mpsc::Sender, task::JoinHandle};

use crate::control::ConnectionControl;

use super::{Connection, Error};

/// A handle to the [`Connection`] event loop.
///
/// Dropping the handle will also close the [`Connection`]
#[derive(Debug)]
pub struct ConnectionHandle {
    pub(crate) control: Sender<ConnectionControl>,
    pub(crate) handle: JoinHandle<Result<(), Error>>,
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        let _ = self.control.try_send(ConnectionControl::Close(None));
    }
}

impl ConnectionHandle {
    /// Checks if the underlying event loop has stopped
    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    /// Checks if the task running the event loop has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Runs `f` against the [`Connection`] on its event loop. Frames resulting
    /// from `f` are sent once it returns
    pub async fn execute<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Connection) + Send + 'static,
    {
        self.control
            .send(ConnectionControl::Execute(Box::new(f)))
            .await
            .map_err(Into::into)
    }

    /// Close the connection, optionally with an error, and wait for the
    /// event loop to stop
    ///
    /// # Panics
    ///
    /// Panics if this is called after executing any of [`close`](#method.close)
    /// or [`join`](#method.join). This will cause the JoinHandle to be polled
    /// after completion, which causes a panic.
    pub async fn close(
        &mut self,
        error: impl Into<Option<definitions::Error>>,
    ) -> Result<(), Error> {
        // If sending is unsuccessful, the event loop has already stopped and
        // its outcome is in the JoinHandle
        let _ = self
            .control
            .send(ConnectionControl::Close(error.into()))
            .await;
        self.join().await
    }

    /// Returns when the underlying event loop has stopped
    ///
    /// # Panics
    ///
    /// Panics if this is called after executing any of [`close`](#method.close)
    /// or [`join`](#method.join).
    pub async fn join(&mut self) -> Result<(), Error> {
        match (&mut self.handle).await {
            Ok(res) => res,
            Err(e) => Err(Error::JoinError(e)),
        }
    }
}
