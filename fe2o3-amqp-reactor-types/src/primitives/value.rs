use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::{Binary, OrderedMap, Symbol};

/// The descriptor of a described type, either a symbolic name or a numeric code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Descriptor {
    /// Symbolic descriptor, eg. "amqp:modified:list"
    Name(Symbol),

    /// Numeric descriptor. The upper 32 bits carry the domain id
    Code(u64),
}

impl Descriptor {
    /// Returns the numeric code if this is a [`Descriptor::Code`]
    pub fn code(&self) -> Option<u64> {
        match self {
            Descriptor::Code(code) => Some(*code),
            Descriptor::Name(_) => None,
        }
    }
}

impl From<u64> for Descriptor {
    fn from(code: u64) -> Self {
        Self::Code(code)
    }
}

impl From<Symbol> for Descriptor {
    fn from(name: Symbol) -> Self {
        Self::Name(name)
    }
}

/// A value annotated with a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Described<T> {
    /// Descriptor of the value
    pub descriptor: Descriptor,

    /// The described value
    pub value: T,
}

impl<T> Described<T> {
    /// Creates a new described value
    pub fn new(descriptor: impl Into<Descriptor>, value: T) -> Self {
        Self {
            descriptor: descriptor.into(),
            value,
        }
    }
}

/// A decoded AMQP value
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Null
    #[default]
    Null,

    /// Boolean
    Bool(bool),

    /// Signed integers
    Long(i64),

    /// Unsigned integers
    ULong(u64),

    /// 64-bit floating point
    Double(OrderedFloat<f64>),

    /// UTF-8 string
    String(String),

    /// Symbol
    Symbol(Symbol),

    /// Binary
    Binary(Binary),

    /// A sequence of polymorphic values
    List(Vec<Value>),

    /// A map with symbolic keys
    Map(OrderedMap<Symbol, Value>),

    /// A described value
    Described(Box<Described<Value>>),
}

impl Value {
    /// Returns the string content of a `String` or `Symbol` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the numeric content of an integer value if it fits in `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            Value::ULong(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the content of a `Bool` value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the content of a `Described` value
    pub fn as_described(&self) -> Option<&Described<Value>> {
        match self {
            Value::Described(d) => Some(d),
            _ => None,
        }
    }

    /// Whether the value is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! impl_from_for_value {
    ($($variant:ident: $ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(val: $ty) -> Self {
                    Value::$variant(val.into())
                }
            }
        )*
    };
}

impl_from_for_value! {
    Bool: bool,
    Long: i8,
    Long: i16,
    Long: i32,
    Long: i64,
    ULong: u8,
    ULong: u16,
    ULong: u32,
    ULong: u64,
    Double: f64,
    String: String,
    String: &str,
    Symbol: Symbol,
    Binary: Binary,
    List: Vec<Value>,
    Map: OrderedMap<Symbol, Value>
}

impl From<Described<Value>> for Value {
    fn from(val: Described<Value>) -> Self {
        Value::Described(Box::new(val))
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(val: Option<T>) -> Self {
        match val {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool {
        self.as_i64() == Some(*other)
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

impl PartialEq<&str> for Described<Value> {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_and_symbol_compare_as_text() {
        assert_eq!(Value::from("vanilla"), "vanilla");
        assert_eq!(Value::Symbol(Symbol::from("copy")), "copy");
        assert_ne!(Value::from(2i64), "2");
    }

    #[test]
    fn unsigned_values_compare_as_signed_when_in_range() {
        assert_eq!(Value::from(2u32), 2i64);
        assert_ne!(Value::from(u64::MAX), -1i64);
    }

    #[test]
    fn described_value_exposes_code() {
        let described = Described::new(0x0000_468c_0000_0004u64, Value::from("a = 1"));
        assert_eq!(described.descriptor.code(), Some(0x0000_468c_0000_0004));
        assert_eq!(described, "a = 1");
    }
}
