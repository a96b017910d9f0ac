//! Controls sent from a handle to the event loop of its connection

use std::fmt::Debug;

use fe2o3_amqp_reactor_types::definitions;

use crate::connection::Connection;

/// A closure run by the event loop against its [`Connection`]
pub type Execute = Box<dyn FnOnce(&mut Connection) + Send>;

pub(crate) enum ConnectionControl {
    Close(Option<definitions::Error>),
    Execute(Execute),
}

impl Debug for ConnectionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Close(arg0) => f.debug_tuple("Close").field(arg0).finish(),
            Self::Execute(_) => f.debug_tuple("Execute").finish(),
        }
    }
}
