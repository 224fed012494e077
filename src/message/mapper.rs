//! Mapping between requests and wire messages.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::request::Request;

use super::Message;

/// Error raised while translating between a request and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// Message content could not be turned into a request.
    Malformed(String),
    /// No mapper registered for the request type.
    MissingMapper(String),
    /// Serializing the request into a message body failed.
    Serialization(String),
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::Malformed(msg) => write!(f, "malformed message: {}", msg),
            MappingError::MissingMapper(t) => {
                write!(f, "no message mapper registered for {}", t)
            }
            MappingError::Serialization(msg) => write!(f, "serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for MappingError {}

/// Translates one request type to and from the wire envelope.
///
/// The mapping must be deterministic: for well-formed input, request →
/// message → request preserves id, topic, message type, and body payload.
pub trait MessageMapper<R: Request>: Send + Sync {
    fn map_to_message(&self, request: &R) -> Result<Message, MappingError>;
    fn map_to_request(&self, message: &Message) -> Result<R, MappingError>;
}

impl<R: Request> std::fmt::Debug for dyn MessageMapper<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn MessageMapper")
    }
}

/// Registry of message mappers keyed by request type.
///
/// The type token replaces runtime reflection: each mapper is registered
/// under its request type and resolved by the same type at dispatch, so a
/// missing mapper is a lookup failure, not a downcast surprise.
#[derive(Default)]
pub struct MapperRegistry {
    mappers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self {
            mappers: HashMap::new(),
        }
    }

    /// Register the mapper for a request type, replacing any previous one.
    pub fn register<R, M>(&mut self, mapper: M)
    where
        R: Request,
        M: MessageMapper<R> + 'static,
    {
        let mapper: Arc<dyn MessageMapper<R>> = Arc::new(mapper);
        self.mappers.insert(TypeId::of::<R>(), Box::new(mapper));
    }

    /// Look up the mapper for a request type.
    pub fn lookup<R: Request>(&self) -> Result<Arc<dyn MessageMapper<R>>, MappingError> {
        self.mappers
            .get(&TypeId::of::<R>())
            .and_then(|any| any.downcast_ref::<Arc<dyn MessageMapper<R>>>())
            .cloned()
            .ok_or_else(|| MappingError::MissingMapper(type_name::<R>().to_string()))
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}
