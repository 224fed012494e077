//! Message model - the wire-shaped envelope exchanged with brokers.
//!
//! A `Message` is a transport-agnostic `MessageHeader` plus an opaque binary
//! `Body`. Requests are turned into messages (and back) by a `MessageMapper`
//! registered per request type; the envelope itself knows nothing about any
//! request type.

mod header;
mod mapper;
mod message;

pub use header::{MessageHeader, MessageType};
pub use mapper::{MapperRegistry, MappingError, MessageMapper};
pub use message::{Body, Message};
