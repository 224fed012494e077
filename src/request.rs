//! Request model: the commands and events dispatched through the processor.
//!
//! A request is a Plain Old Rust Struct with an identity. Whether it is a
//! command (exactly one handler) or an event (zero..N handlers) is decided
//! by how it is registered, not by a marker trait; see
//! `SubscriberRegistry::register_command` / `register_event`.

use uuid::Uuid;

/// A dispatchable request.
///
/// The identity is immutable for the life of the request; payload fields are
/// free to be mutated by handlers along the pipeline.
pub trait Request: Send + 'static {
    /// Unique identifier for this request instance.
    fn id(&self) -> &str;
}

/// Generate a fresh request/message identifier.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}
