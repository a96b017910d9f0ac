//! Decoded AMQP frames exchanged with the transport

use serde::{Deserialize, Serialize};

use crate::{
    messaging::Message,
    performatives::{Attach, Begin, Close, Detach, Disposition, End, Flow, Open, Transfer},
};

/// A decoded AMQP frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Channel number. Connection level frames travel on channel 0
    pub channel: u16,

    /// Frame body
    pub body: FrameBody,
}

impl Frame {
    /// Creates a new frame
    pub fn new(channel: impl Into<u16>, body: impl Into<FrameBody>) -> Self {
        Self {
            channel: channel.into(),
            body: body.into(),
        }
    }

    /// Creates an empty frame
    pub fn empty() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Empty,
        }
    }
}

/// The performative carried by a [`Frame`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrameBody {
    /// Open
    Open(Open),

    /// Begin
    Begin(Begin),

    /// Attach
    Attach(Attach),

    /// Flow
    Flow(Flow),

    /// Transfer with its decoded message payload
    Transfer {
        /// The transfer performative
        performative: Transfer,

        /// Decoded message
        payload: Message,
    },

    /// Disposition
    Disposition(Disposition),

    /// Detach
    Detach(Detach),

    /// End
    End(End),

    /// Close
    Close(Close),

    /// Empty frame used as heartbeat
    Empty,
}

impl FrameBody {
    /// Name of the performative, for logging
    pub fn name(&self) -> &'static str {
        match self {
            FrameBody::Open(_) => "open",
            FrameBody::Begin(_) => "begin",
            FrameBody::Attach(_) => "attach",
            FrameBody::Flow(_) => "flow",
            FrameBody::Transfer { .. } => "transfer",
            FrameBody::Disposition(_) => "disposition",
            FrameBody::Detach(_) => "detach",
            FrameBody::End(_) => "end",
            FrameBody::Close(_) => "close",
            FrameBody::Empty => "empty",
        }
    }
}

macro_rules! impl_from_performative {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for FrameBody {
                fn from(value: $variant) -> Self {
                    FrameBody::$variant(value)
                }
            }
        )*
    };
}

impl_from_performative!(Open, Begin, Attach, Flow, Disposition, Detach, End, Close);
