use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Kind of message carried in the envelope.
///
/// `Quit` and `None` are control markers: `Quit` asks a blocking pump to
/// exit, `None` stands for "nothing to read" on channels that cannot return
/// an empty receive. `Unacceptable` marks a payload the transport could not
/// even parse into an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Command,
    Event,
    Document,
    Quit,
    None,
    Unacceptable,
}

/// Transport-agnostic message header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Unique message identifier.
    pub id: String,
    /// Destination topic / routing key.
    pub topic: String,
    pub message_type: MessageType,
    pub timestamp: SystemTime,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub content_type: String,
    /// Number of times a consumer has attempted this message.
    pub handled_count: u32,
    pub partition_key: Option<String>,
    /// Free-form transport headers.
    pub bag: HashMap<String, serde_json::Value>,
    /// Reference to an externally stored body (claim-check pattern).
    pub claim_check_ref: Option<String>,
}

impl MessageHeader {
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            message_type,
            timestamp: SystemTime::now(),
            correlation_id: None,
            reply_to: None,
            content_type: "application/octet-stream".to_string(),
            handled_count: 0,
            partition_key: None,
            bag: HashMap::new(),
            claim_check_ref: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    pub fn with_claim_check_ref(mut self, claim_check_ref: impl Into<String>) -> Self {
        self.claim_check_ref = Some(claim_check_ref.into());
        self
    }

    /// Add an entry to the header bag.
    pub fn with_bag_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.bag.insert(key.into(), value);
        self
    }

    /// Record another delivery attempt.
    pub fn update_handled_count(&mut self) {
        self.handled_count += 1;
    }

    /// Whether the message has exhausted its requeue budget.
    ///
    /// A budget of `requeue_count` allows the original delivery plus
    /// `requeue_count` redeliveries before the message is dropped.
    pub fn handled_count_reached(&self, requeue_count: u32) -> bool {
        self.handled_count > requeue_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handled_count_allows_original_plus_requeue_budget() {
        let mut header = MessageHeader::new("msg-1", "orders", MessageType::Command);

        // requeue_count = 3: four attempts total before the budget trips
        for _ in 0..3 {
            header.update_handled_count();
            assert!(!header.handled_count_reached(3));
        }
        header.update_handled_count();
        assert!(header.handled_count_reached(3));
    }

    #[test]
    fn requeue_count_zero_trips_on_first_attempt() {
        let mut header = MessageHeader::new("msg-1", "orders", MessageType::Command);
        header.update_handled_count();
        assert!(header.handled_count_reached(0));
    }

    #[test]
    fn builder_style_setters() {
        let header = MessageHeader::new("msg-1", "orders", MessageType::Event)
            .with_correlation_id("corr-9")
            .with_reply_to("orders.reply")
            .with_partition_key("customer-42")
            .with_bag_entry("source", serde_json::json!("order-service"));

        assert_eq!(header.correlation_id.as_deref(), Some("corr-9"));
        assert_eq!(header.reply_to.as_deref(), Some("orders.reply"));
        assert_eq!(header.partition_key.as_deref(), Some("customer-42"));
        assert_eq!(header.bag["source"], serde_json::json!("order-service"));
    }
}
