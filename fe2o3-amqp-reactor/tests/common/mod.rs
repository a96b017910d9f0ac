#![allow(dead_code)]

use std::sync::Arc;

use fe2o3_amqp_reactor::{Connection, ConnectionOptions, Container};
use parking_lot::Mutex;

const MAX_ROUNDS: usize = 64;

/// Exchanges frames between two connections until neither has anything left
/// to send. Protocol errors are returned in the order they occurred
pub fn pump(a: &mut Connection, b: &mut Connection) -> Vec<fe2o3_amqp_reactor::connection::Error> {
    let mut errors = Vec::new();
    for _ in 0..MAX_ROUNDS {
        let from_a = a.drain_frames();
        let from_b = b.drain_frames();
        if from_a.is_empty() && from_b.is_empty() {
            return errors;
        }
        for frame in from_a {
            if let Err(err) = b.handle_frame(frame) {
                errors.push(err);
            }
        }
        for frame in from_b {
            if let Err(err) = a.handle_frame(frame) {
                errors.push(err);
            }
        }
    }
    panic!("connections still exchanging frames after {} rounds", MAX_ROUNDS);
}

/// A client connection from `client` and the server side accepted by `server`
pub fn connect(client: &Container, server: &Container) -> (Connection, Connection) {
    let a = client.connect(ConnectionOptions::default());
    let b = server.accept(ConnectionOptions::default());
    (a, b)
}

/// Shared log of what handlers observed
#[derive(Debug, Clone, Default)]
pub struct Recorder<T> {
    inner: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, value: T) {
        self.inner.lock().push(value);
    }

    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
