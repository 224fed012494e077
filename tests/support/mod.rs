//! Shared doubles for the integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use courier_rust::{
    Body, MappingError, Message, MessageHeader, MessageMapper, MessageType, Request,
};

pub const ORDERS_TOPIC: &str = "orders";
pub const ORDER_PLACED_TOPIC: &str = "orders.placed";

/// Command double: place one order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub id: String,
    pub sku: String,
}

impl PlaceOrder {
    pub fn new(id: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sku: sku.into(),
        }
    }
}

impl Request for PlaceOrder {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Event double: an order was placed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub id: String,
    pub sku: String,
}

impl OrderPlaced {
    pub fn new(id: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sku: sku.into(),
        }
    }
}

impl Request for OrderPlaced {
    fn id(&self) -> &str {
        &self.id
    }
}

/// JSON mapper for [`PlaceOrder`] on the orders topic.
pub struct PlaceOrderMapper;

impl MessageMapper<PlaceOrder> for PlaceOrderMapper {
    fn map_to_message(&self, request: &PlaceOrder) -> Result<Message, MappingError> {
        let payload = serde_json::to_string(request)
            .map_err(|e| MappingError::Serialization(e.to_string()))?;
        Ok(Message::new(
            MessageHeader::new(request.id.clone(), ORDERS_TOPIC, MessageType::Command)
                .with_content_type("application/json"),
            Body::with_string_payload(payload),
        ))
    }

    fn map_to_request(&self, message: &Message) -> Result<PlaceOrder, MappingError> {
        let payload = message
            .body
            .payload_str()
            .ok_or_else(|| MappingError::Malformed("body is not utf-8".into()))?;
        serde_json::from_str(payload).map_err(|e| MappingError::Malformed(e.to_string()))
    }
}

/// JSON mapper for [`OrderPlaced`] on the orders.placed topic.
pub struct OrderPlacedMapper;

impl MessageMapper<OrderPlaced> for OrderPlacedMapper {
    fn map_to_message(&self, request: &OrderPlaced) -> Result<Message, MappingError> {
        let payload = serde_json::to_string(request)
            .map_err(|e| MappingError::Serialization(e.to_string()))?;
        Ok(Message::new(
            MessageHeader::new(request.id.clone(), ORDER_PLACED_TOPIC, MessageType::Event)
                .with_content_type("application/json"),
            Body::with_string_payload(payload),
        ))
    }

    fn map_to_request(&self, message: &Message) -> Result<OrderPlaced, MappingError> {
        let payload = message
            .body
            .payload_str()
            .ok_or_else(|| MappingError::Malformed("body is not utf-8".into()))?;
        serde_json::from_str(payload).map_err(|e| MappingError::Malformed(e.to_string()))
    }
}

/// Clone-shared append-only log, for asserting what handlers saw.
#[derive(Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Build a broker-shaped command message for pump tests.
pub fn order_message(id: &str, sku: &str) -> Message {
    PlaceOrderMapper
        .map_to_message(&PlaceOrder::new(id, sku))
        .unwrap()
}

/// Build a broker-shaped event message for pump tests.
pub fn order_placed_message(id: &str, sku: &str) -> Message {
    OrderPlacedMapper
        .map_to_message(&OrderPlaced::new(id, sku))
        .unwrap()
}

/// A message the mapper cannot parse.
pub fn garbled_message(id: &str) -> Message {
    Message::new(
        MessageHeader::new(id, ORDERS_TOPIC, MessageType::Command),
        Body::with_string_payload("not json"),
    )
}

/// A message the transport already flagged as unparseable.
pub fn unacceptable_message(id: &str) -> Message {
    Message::new(
        MessageHeader::new(id, ORDERS_TOPIC, MessageType::Unacceptable),
        Body::default(),
    )
}
