//! Part 2.8 Definitions

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::primitives::{Binary, OrderedMap, Symbol, Value};

mod error_cond;
pub use error_cond::*;

mod error;
pub use error::Error;

/// 2.8.1 Role
///
/// <type name="role" class="restricted" source="boolean">
///     <choice name="sender" value="false"/>
///     <choice name="receiver" value="true"/>
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sender
    Sender,

    /// Receiver
    Receiver,
}

impl Role {
    /// The role of the peer endpoint of the same link
    pub fn peer(&self) -> Self {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }

    /// The lowercase name used as prefix of link event names
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sender => "sender",
            Role::Receiver => "receiver",
        }
    }
}

impl From<Role> for bool {
    fn from(role: Role) -> Self {
        matches!(role, Role::Receiver)
    }
}

/// 2.8.2 Sender Settle Mode
///
/// <type name="sender-settle-mode" class="restricted" source="ubyte">
///     <choice name="unsettled" value="0"/>
///     <choice name="settled" value="1"/>
///     <choice name="mixed" value="2"/>
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum SenderSettleMode {
    /// The sender will send all deliveries initially unsettled to the receiver
    Unsettled = 0,

    /// The sender will send all deliveries settled to the receiver
    Settled = 1,

    /// The sender MAY send a mixture of settled and unsettled deliveries to the receiver
    #[default]
    Mixed = 2,
}

impl From<SenderSettleMode> for u8 {
    fn from(mode: SenderSettleMode) -> Self {
        mode as u8
    }
}

impl TryFrom<u8> for SenderSettleMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unsettled),
            1 => Ok(Self::Settled),
            2 => Ok(Self::Mixed),
            _ => Err(value),
        }
    }
}

/// 2.8.3 Receiver Settle Mode
///
/// <type name="receiver-settle-mode" class="restricted" source="ubyte">
///     <choice name="first" value="0"/>
///     <choice name="second" value="1"/>
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ReceiverSettleMode {
    /// The receiver will spontaneously settle all incoming transfers
    #[default]
    First = 0,

    /// The receiver will only settle after sending the disposition to the
    /// sender and receiving a disposition indicating settlement of the delivery
    /// from the sender
    Second = 1,
}

impl From<ReceiverSettleMode> for u8 {
    fn from(mode: ReceiverSettleMode) -> Self {
        mode as u8
    }
}

impl TryFrom<u8> for ReceiverSettleMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::First),
            1 => Ok(Self::Second),
            _ => Err(value),
        }
    }
}

/// 2.8.4 Handle
///
/// The handle of a link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(pub u32);

impl From<u32> for Handle {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl From<usize> for Handle {
    fn from(val: usize) -> Self {
        Self(val as u32)
    }
}

/// 2.8.5 Seconds
pub type Seconds = u32;

/// 2.8.6 Milliseconds
pub type Milliseconds = u32;

/// 2.8.7 Delivery Tag
pub type DeliveryTag = Binary;

/// 2.8.8 Delivery Number
pub type DeliveryNumber = SequenceNo;

/// 2.8.9 Transfer Number
pub type TransferNumber = SequenceNo;

/// 2.8.10 Sequence No
pub type SequenceNo = u32;

/// 2.8.12 Message Format
pub type MessageFormat = u32;

/// 2.8.16 Fields
///
/// A mapping from field name to value
pub type Fields = OrderedMap<Symbol, Value>;
