//! Consuming channels - the inbound edge of the crate.

mod channel;
mod error;
mod in_memory;

pub use channel::{Channel, ChannelAsync};
pub use error::ChannelError;
pub use in_memory::InMemoryChannel;
