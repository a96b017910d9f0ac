use std::fmt::Display;

use serde::{de, ser};

use crate::primitives::Symbol;

macro_rules! condition_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $symbol:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            /// The namespaced symbol of the condition
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $symbol,)*
                }
            }
        }

        impl<'a> TryFrom<&'a str> for $name {
            type Error = &'a str;

            fn try_from(value: &'a str) -> Result<Self, Self::Error> {
                match value {
                    $($symbol => Ok($name::$variant),)*
                    _ => Err(value),
                }
            }
        }

        impl From<$name> for ErrorCondition {
            fn from(err: $name) -> Self {
                ErrorCondition::$name(err)
            }
        }
    };
}

condition_enum! {
    /// 2.8.15 AMQP Error
    AmqpError {
        InternalError => "amqp:internal-error",
        NotFound => "amqp:not-found",
        UnauthorizedAccess => "amqp:unauthorized-access",
        DecodeError => "amqp:decode-error",
        ResourceLimitExceeded => "amqp:resource-limit-exceeded",
        NotAllowed => "amqp:not-allowed",
        InvalidField => "amqp:invalid-field",
        NotImplemented => "amqp:not-implemented",
        ResourceLocked => "amqp:resource-locked",
        PreconditionFailed => "amqp:precondition-failed",
        ResourceDeleted => "amqp:resource-deleted",
        IllegalState => "amqp:illegal-state",
        FrameSizeTooSmall => "amqp:frame-size-too-small",
    }
}

condition_enum! {
    /// 2.8.16 Connection Error
    ConnectionError {
        ConnectionForced => "amqp:connection:forced",
        FramingError => "amqp:connection:framing-error",
        Redirect => "amqp:connection:redirect",
    }
}

condition_enum! {
    /// 2.8.17 Session Error
    SessionError {
        WindowViolation => "amqp:session:window-violation",
        ErrantLink => "amqp:session:errant-link",
        HandleInUse => "amqp:session:handle-in-use",
        UnattachedHandle => "amqp:session:unattached-handle",
    }
}

condition_enum! {
    /// 2.8.18 Link Error
    LinkError {
        DetachForced => "amqp:link:detach-forced",
        TransferLimitExceeded => "amqp:link:transfer-limit-exceeded",
        MessageSizeExceeded => "amqp:link:message-size-exceeded",
        Redirect => "amqp:link:redirect",
        Stolen => "amqp:link:stolen",
    }
}

/// Error condition of an [`Error`](super::Error).
///
/// Conditions outside of the standard families are carried verbatim in
/// [`ErrorCondition::Custom`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCondition {
    /// 2.8.15 AMQP Error
    AmqpError(AmqpError),

    /// 2.8.16 Connection Error
    ConnectionError(ConnectionError),

    /// 2.8.17 Session Error
    SessionError(SessionError),

    /// 2.8.18 Link Error
    LinkError(LinkError),

    /// Any other namespaced condition
    Custom(Symbol),
}

impl ErrorCondition {
    /// The namespaced condition string
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCondition::AmqpError(e) => e.as_str(),
            ErrorCondition::ConnectionError(e) => e.as_str(),
            ErrorCondition::SessionError(e) => e.as_str(),
            ErrorCondition::LinkError(e) => e.as_str(),
            ErrorCondition::Custom(s) => s.as_str(),
        }
    }
}

impl Display for ErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ErrorCondition {
    fn from(value: &str) -> Self {
        if let Ok(e) = AmqpError::try_from(value) {
            return e.into();
        }
        if let Ok(e) = ConnectionError::try_from(value) {
            return e.into();
        }
        if let Ok(e) = SessionError::try_from(value) {
            return e.into();
        }
        if let Ok(e) = LinkError::try_from(value) {
            return e.into();
        }
        ErrorCondition::Custom(Symbol::from(value))
    }
}

impl From<String> for ErrorCondition {
    fn from(value: String) -> Self {
        ErrorCondition::from(value.as_str())
    }
}

impl From<Symbol> for ErrorCondition {
    fn from(value: Symbol) -> Self {
        ErrorCondition::from(value.as_str())
    }
}

impl PartialEq<&str> for ErrorCondition {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<str> for ErrorCondition {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl ser::Serialize for ErrorCondition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> de::Deserialize<'de> for ErrorCondition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let symbol = Symbol::deserialize(deserializer)?;
        Ok(ErrorCondition::from(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_conditions_are_parsed_into_their_family() {
        let cond = ErrorCondition::from("amqp:link:detach-forced");
        assert_eq!(cond, ErrorCondition::LinkError(LinkError::DetachForced));
        assert_eq!(cond, "amqp:link:detach-forced");
    }

    #[test]
    fn unknown_conditions_pass_through_unchanged() {
        let cond = ErrorCondition::from("com.example:quota-exceeded");
        assert_eq!(cond, ErrorCondition::Custom(Symbol::from("com.example:quota-exceeded")));
        assert_eq!(cond.to_string(), "com.example:quota-exceeded");
    }
}
