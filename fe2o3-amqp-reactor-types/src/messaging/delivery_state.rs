use serde::{Deserialize, Serialize};

use crate::definitions::{Error, Fields};

/// 3.4.1 Received
///
/// <type name="received" class="composite" source="list" provides="delivery-state">
///     <descriptor name="amqp:received:list" code="0x00000000:0x00000023"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Received {
    /// <field name="section-number" type="uint" mandatory="true"/>
    pub section_number: u32,

    /// <field name="section-offset" type="ulong" mandatory="true"/>
    pub section_offset: u64,
}

/// 3.4.2 Accepted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accepted {}

/// 3.4.3 Rejected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rejected {
    /// <field name="error" type="error"/>
    pub error: Option<Error>,
}

/// 3.4.4 Released
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Released {}

/// 3.4.5 Modified
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Modified {
    /// <field name="delivery-failed" type="boolean"/>
    pub delivery_failed: Option<bool>,

    /// <field name="undeliverable-here" type="boolean"/>
    pub undeliverable_here: Option<bool>,

    /// <field name="message-annotations" type="fields"/>
    pub message_annotations: Option<Fields>,
}

/// The terminal outcomes a delivery may reach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// 3.4.2 Accepted
    Accepted(Accepted),

    /// 3.4.3 Rejected
    Rejected(Rejected),

    /// 3.4.4 Released
    Released(Released),

    /// 3.4.5 Modified
    Modified(Modified),
}

impl Outcome {
    /// The descriptor name of the outcome, as used in the "outcomes" field of a source
    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Accepted(_) => "amqp:accepted:list",
            Outcome::Rejected(_) => "amqp:rejected:list",
            Outcome::Released(_) => "amqp:released:list",
            Outcome::Modified(_) => "amqp:modified:list",
        }
    }

    /// Whether the outcome is [`Outcome::Accepted`]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    /// Whether the outcome is [`Outcome::Rejected`]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }

    /// Whether the outcome is [`Outcome::Released`]
    pub fn is_released(&self) -> bool {
        matches!(self, Outcome::Released(_))
    }

    /// Whether the outcome is [`Outcome::Modified`]
    pub fn is_modified(&self) -> bool {
        matches!(self, Outcome::Modified(_))
    }
}

impl From<Accepted> for Outcome {
    fn from(value: Accepted) -> Self {
        Self::Accepted(value)
    }
}

impl From<Rejected> for Outcome {
    fn from(value: Rejected) -> Self {
        Self::Rejected(value)
    }
}

impl From<Released> for Outcome {
    fn from(value: Released) -> Self {
        Self::Released(value)
    }
}

impl From<Modified> for Outcome {
    fn from(value: Modified) -> Self {
        Self::Modified(value)
    }
}

/// 3.4 Delivery State
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeliveryState {
    /// 3.4.1 Received
    Received(Received),

    /// 3.4.2 Accepted
    Accepted(Accepted),

    /// 3.4.3 Rejected
    Rejected(Rejected),

    /// 3.4.4 Released
    Released(Released),

    /// 3.4.5 Modified
    Modified(Modified),
}

impl DeliveryState {
    /// Returns the outcome if the state is terminal
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            DeliveryState::Received(_) => None,
            DeliveryState::Accepted(v) => Some(Outcome::Accepted(v.clone())),
            DeliveryState::Rejected(v) => Some(Outcome::Rejected(v.clone())),
            DeliveryState::Released(v) => Some(Outcome::Released(v.clone())),
            DeliveryState::Modified(v) => Some(Outcome::Modified(v.clone())),
        }
    }

    /// Whether the state is [`DeliveryState::Accepted`]
    pub fn is_accepted(&self) -> bool {
        matches!(self, DeliveryState::Accepted(_))
    }
}

impl From<Outcome> for DeliveryState {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Accepted(v) => Self::Accepted(v),
            Outcome::Rejected(v) => Self::Rejected(v),
            Outcome::Released(v) => Self::Released(v),
            Outcome::Modified(v) => Self::Modified(v),
        }
    }
}
