#![deny(missing_docs, missing_debug_implementations)]

//! Decoded AMQP1.0 data types consumed and produced by the reactor engine.
//!
//! Byte-level encoding is left to the transport. Everything in this crate is
//! the already decoded form of a frame, which is why the types stay close to
//! the shape of the [specification](http://docs.oasis-open.org/amqp/core/v1.0/os/amqp-core-overview-v1.0-os.html)
//! while keeping scalar-or-list fields in the shape the peer sent them.

pub mod primitives;

pub mod definitions;

pub mod messaging;

pub mod performatives;

pub mod frame;

pub mod states;
