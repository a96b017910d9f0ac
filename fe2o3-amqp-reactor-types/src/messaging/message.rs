//! 3.2 Message Format

use serde::{Deserialize, Serialize};

use crate::{
    definitions::{Fields, Milliseconds},
    primitives::{Binary, Symbol, Value},
};

/// 3.2.1 Header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    /// Specify durability requirements
    pub durable: bool,

    /// Relative message priority
    pub priority: u8,

    /// Time to live in ms
    pub ttl: Option<Milliseconds>,

    /// If this value is true, then this message has not been acquired by any
    /// other link
    pub first_acquirer: bool,

    /// The number of prior unsuccessful delivery attempts
    pub delivery_count: u32,
}

/// 3.2.4 Properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Properties {
    /// Application message identifier
    pub message_id: Option<Value>,

    /// The address of the node the message is destined for
    pub to: Option<String>,

    /// The subject of the message
    pub subject: Option<String>,

    /// The node to send replies to
    pub reply_to: Option<String>,

    /// Application correlation identifier
    pub correlation_id: Option<Value>,

    /// MIME content type
    pub content_type: Option<Symbol>,
}

/// The body sections of a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Body {
    /// 3.2.8 AMQP Value
    Value(Value),

    /// 3.2.6 Data
    Data(Binary),

    /// 3.2.7 AMQP Sequence
    Sequence(Vec<Value>),

    /// No body section
    #[default]
    Empty,
}

impl Body {
    /// Returns the value of a [`Body::Value`] section
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Body::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<T> for Body
where
    T: Into<Value>,
{
    fn from(value: T) -> Self {
        Body::Value(value.into())
    }
}

impl PartialEq<&str> for Body {
    fn eq(&self, other: &&str) -> bool {
        matches!(self.as_value(), Some(value) if value == other)
    }
}

/// An annotated message consisting of the bare message plus sections for
/// annotation at the head of the bare message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Transport headers for a message
    pub header: Option<Header>,

    /// Immutable properties of the message
    pub properties: Option<Properties>,

    /// Structured application data
    pub application_properties: Option<Fields>,

    /// Body section
    pub body: Body,
}

impl Message {
    /// Creates a [`Message`] builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The body of the message
    pub fn body(&self) -> &Body {
        &self.body
    }
}

impl<T> From<T> for Message
where
    T: Into<Body>,
{
    fn from(value: T) -> Self {
        Self {
            body: value.into(),
            ..Default::default()
        }
    }
}

/// [`Message`] builder
#[derive(Debug, Clone, Default)]
pub struct Builder {
    message: Message,
}

impl Builder {
    /// Set the header
    pub fn header(mut self, header: Header) -> Self {
        self.message.header = Some(header);
        self
    }

    /// Set the properties
    pub fn properties(mut self, properties: Properties) -> Self {
        self.message.properties = Some(properties);
        self
    }

    /// Insert one application property
    pub fn application_property(mut self, key: impl Into<Symbol>, value: impl Into<Value>) -> Self {
        self.message
            .application_properties
            .get_or_insert_with(Fields::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.message.body = body.into();
        self
    }

    /// Build the [`Message`]
    pub fn build(self) -> Message {
        self.message
    }
}
