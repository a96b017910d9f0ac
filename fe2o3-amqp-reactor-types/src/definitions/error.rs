use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::{ErrorCondition, Fields};

/// 2.8.14 Error
///
/// <type name="error" class="composite" source="list">
/// <descriptor name="amqp:error:list" code="0x00000000:0x0000001d"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    /// <field name="condition" type="symbol" requires="error-condition" mandatory="true"/>
    pub condition: ErrorCondition,

    /// <field name="description" type="string"/>
    pub description: Option<String>,

    /// <field name="info" type="fields"/>
    pub info: Option<Fields>,
}

impl Error {
    /// Creates a new [`Error`]
    pub fn new(
        condition: impl Into<ErrorCondition>,
        description: impl Into<Option<String>>,
        info: impl Into<Option<Fields>>,
    ) -> Self {
        Self {
            condition: condition.into(),
            description: description.into(),
            info: info.into(),
        }
    }

    /// The description as a string slice
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.condition, description),
            None => write!(f, "{}", self.condition),
        }
    }
}

impl<T> From<T> for Error
where
    T: Into<ErrorCondition>,
{
    fn from(condition: T) -> Self {
        Self {
            condition: condition.into(),
            description: None,
            info: None,
        }
    }
}
