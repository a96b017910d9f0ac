//! Primitive types

mod symbol;
pub use symbol::Symbol;

mod value;
pub use value::*;

mod multiple;
pub use multiple::Multiple;

/// A sequence of octets
pub type Binary = serde_bytes::ByteBuf;

/// Boolean
pub type Boolean = bool;

/// 8-bit unsigned integer
pub type UByte = u8;

/// 16-bit unsigned integer
pub type UShort = u16;

/// 32-bit unsigned integer
pub type UInt = u32;

/// 64-bit unsigned integer
pub type ULong = u64;

/// A mapping from symbolic keys to values that keeps insertion order
pub type OrderedMap<K, V> = indexmap::IndexMap<K, V>;
