use serde::{Deserialize, Serialize};

use super::{MessageHeader, MessageType};

/// Opaque message payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub bytes: Vec<u8>,
}

impl Body {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Create a body from a string payload.
    pub fn with_string_payload(payload: impl Into<String>) -> Self {
        Self {
            bytes: payload.into().into_bytes(),
        }
    }

    /// Create a body with a bitcode-serialized payload.
    pub fn encode<T: Serialize>(payload: &T) -> Result<Self, bitcode::Error> {
        Ok(Self {
            bytes: bitcode::serialize(payload)?,
        })
    }

    /// Decode the payload from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.bytes)
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A wire-shaped message: header plus opaque body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    pub body: Body,
}

impl Message {
    pub fn new(header: MessageHeader, body: Body) -> Self {
        Self { header, body }
    }

    /// Control message that asks a blocking pump to exit.
    pub fn quit() -> Self {
        Self {
            header: MessageHeader::new(crate::request::new_request_id(), "", MessageType::Quit),
            body: Body::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn topic(&self) -> &str {
        &self.header.topic
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }
}
