//! Connection options and their builder

use std::sync::Arc;

use fe2o3_amqp_reactor_types::{
    definitions::{Fields, Milliseconds},
    primitives::{Multiple, Symbol, Value},
};
use serde::Deserialize;

use crate::link::LinkOptions;

/// Default max-frame-size
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 256 * 1024;

/// Default channel-max
pub const DEFAULT_CHANNEL_MAX: u16 = 255;

/// Options of a connection.
///
/// `sender_options` and `receiver_options` are presets merged under the
/// options of every link opened on the connection. They are shared and never
/// modified by a merge.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Overrides the container id sent in the open
    pub container_id: Option<String>,

    /// Hostname sent in the open
    pub hostname: Option<String>,

    /// Max frame size. Defaults to [`DEFAULT_MAX_FRAME_SIZE`]
    pub max_frame_size: Option<u32>,

    /// Channel max. Defaults to [`DEFAULT_CHANNEL_MAX`]
    pub channel_max: Option<u16>,

    /// Idle time out in milliseconds
    pub idle_time_out: Option<Milliseconds>,

    /// Offered capabilities
    pub offered_capabilities: Option<Multiple<Symbol>>,

    /// Desired capabilities
    pub desired_capabilities: Option<Multiple<Symbol>>,

    /// Connection properties
    pub properties: Option<Fields>,

    /// Preset options of senders
    pub sender_options: Option<Arc<LinkOptions>>,

    /// Preset options of receivers
    pub receiver_options: Option<Arc<LinkOptions>>,
}

impl ConnectionOptions {
    /// Creates a builder for [`ConnectionOptions`]
    pub fn builder() -> Builder {
        Builder::default()
    }
}

/// Builder for [`ConnectionOptions`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    options: ConnectionOptions,
}

impl Builder {
    /// Container id
    pub fn container_id(mut self, id: impl Into<String>) -> Self {
        self.options.container_id = Some(id.into());
        self
    }

    /// Hostname
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.options.hostname = Some(hostname.into());
        self
    }

    /// Max frame size
    pub fn max_frame_size(mut self, max_frame_size: u32) -> Self {
        self.options.max_frame_size = Some(max_frame_size);
        self
    }

    /// Channel max
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.options.channel_max = Some(channel_max);
        self
    }

    /// Idle time out
    pub fn idle_time_out(mut self, idle_time_out: Milliseconds) -> Self {
        self.options.idle_time_out = Some(idle_time_out);
        self
    }

    /// Offered capabilities
    pub fn offered_capabilities(mut self, capabilities: impl Into<Multiple<Symbol>>) -> Self {
        self.options.offered_capabilities = Some(capabilities.into());
        self
    }

    /// Desired capabilities
    pub fn desired_capabilities(mut self, capabilities: impl Into<Multiple<Symbol>>) -> Self {
        self.options.desired_capabilities = Some(capabilities.into());
        self
    }

    /// Adds one connection property
    pub fn add_property(mut self, key: impl Into<Symbol>, value: impl Into<Value>) -> Self {
        self.options
            .properties
            .get_or_insert_with(Fields::new)
            .insert(key.into(), value.into());
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

    /// Builds the [`ConnectionOptions`]
    pub fn build(self) -> ConnectionOptions {
        self.options
    }
}

impl From<Builder> for ConnectionOptions {
    fn from(builder: Builder) -> Self {
        builder.build()
    }
}
