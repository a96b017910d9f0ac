//! Part 3 Messaging

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    definitions::Fields,
    primitives::{Described, OrderedMap, Symbol, Value},
};

pub mod message;
pub use message::{Body, Header, Message, Properties};

/* --------------------------- 3.4 Delivery State --------------------------- */
mod delivery_state;
pub use delivery_state::*;

/* -------------------------- 3.5 Source and Target ------------------------- */
pub mod source;
pub use source::Source;

pub mod target;
pub use target::Target;

pub mod filter;

/// 3.5.1 Address
pub type Address = String;

/// 3.5.5 Terminus Durability
///
/// <type name="terminus-durability" class="restricted" source="uint">
///     <choice name="none" value="0"/>
///     <choice name="configuration" value="1"/>
///     <choice name="unsettled-state" value="2"/>
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
#[repr(u32)]
pub enum TerminusDurability {
    /// No terminus state is retained durably
    #[default]
    None = 0,

    /// Only the existence and configuration of the terminus is retained durably
    Configuration = 1,

    /// In addition to the existence and configuration of the terminus, the
    /// unsettled state for durable messages is retained durably
    UnsettledState = 2,
}

impl From<TerminusDurability> for u32 {
    fn from(value: TerminusDurability) -> Self {
        value as u32
    }
}

impl PartialEq<u32> for TerminusDurability {
    fn eq(&self, other: &u32) -> bool {
        *self as u32 == *other
    }
}

/// 3.5.6 Terminus Expiry Policy
///
/// <type name="terminus-expiry-policy" class="restricted" source="symbol">
///     <choice name="link-detach" value="link-detach"/>
///     <choice name="session-end" value="session-end"/>
///     <choice name="connection-close" value="connection-close"/>
///     <choice name="never" value="never"/>
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminusExpiryPolicy {
    /// The expiry timer starts when terminus is detached
    LinkDetach,

    /// The expiry timer starts when the most recently associated session is
    /// ended
    #[default]
    SessionEnd,

    /// The expiry timer starts when most recently associated connection is
    /// closed
    ConnectionClose,

    /// The terminus never expires
    Never,
}

impl TerminusExpiryPolicy {
    /// The symbolic value
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminusExpiryPolicy::LinkDetach => "link-detach",
            TerminusExpiryPolicy::SessionEnd => "session-end",
            TerminusExpiryPolicy::ConnectionClose => "connection-close",
            TerminusExpiryPolicy::Never => "never",
        }
    }
}

impl PartialEq<&str> for TerminusExpiryPolicy {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// 3.5.7 Standard Distribution Mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    /// Once successfully transferred over the link, the message will no longer
    /// be available to other links from the same node
    Move,

    /// Once successfully transferred over the link, the message is still
    /// available for other links from the same node
    Copy,
}

impl DistributionMode {
    /// The symbolic value
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionMode::Move => "move",
            DistributionMode::Copy => "copy",
        }
    }
}

impl PartialEq<&str> for DistributionMode {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// 3.5.8 Filter Set
///
/// A set of named filters. Every value MUST be either null or of a
/// described type which provides the archetype filter.
pub type FilterSet = OrderedMap<Symbol, Option<Described<Value>>>;

/// 3.5.9 Node Properties
pub type NodeProperties = Fields;
