//! Broker producers - the outbound edge of the crate.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::message::Message;

/// Error raised while handing a message to a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    /// No producer registered for the message's topic.
    MissingProducer(String),
    /// The broker refused or dropped the message.
    SendFailed { topic: String, reason: String },
}

impl fmt::Display for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerError::MissingProducer(topic) => {
                write!(f, "no producer registered for topic '{}'", topic)
            }
            ProducerError::SendFailed { topic, reason } => {
                write!(f, "send to topic '{}' failed: {}", topic, reason)
            }
        }
    }
}

impl std::error::Error for ProducerError {}

/// Hands one message to an external broker.
///
/// A send that returns `Ok(())` must mean the broker durably accepted the
/// message; the mediator marks the outbox row dispatched on nothing less.
pub trait Producer: Send + Sync {
    fn send(&self, message: &Message) -> Result<(), ProducerError>;
}

impl fmt::Debug for dyn Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn Producer")
    }
}

/// Producers keyed by the topic they publish to.
#[derive(Default)]
pub struct ProducerRegistry {
    producers: HashMap<String, Arc<dyn Producer>>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self {
            producers: HashMap::new(),
        }
    }

    /// Bind a topic to a producer, replacing any previous binding.
    pub fn register(&mut self, topic: impl Into<String>, producer: Arc<dyn Producer>) {
        self.producers.insert(topic.into(), producer);
    }

    pub fn lookup(&self, topic: &str) -> Result<Arc<dyn Producer>, ProducerError> {
        self.producers
            .get(topic)
            .cloned()
            .ok_or_else(|| ProducerError::MissingProducer(topic.to_string()))
    }

    pub fn topics(&self) -> Vec<String> {
        self.producers.keys().cloned().collect()
    }
}

/// In-memory producer backed by a shared message log.
///
/// Cloning shares the log, so a test can hold one handle while the mediator
/// holds another. `fail_next` scripts transient broker failures.
#[derive(Clone, Default)]
pub struct InMemoryProducer {
    sent: Arc<Mutex<Vec<Message>>>,
    failures_remaining: Arc<Mutex<u32>>,
}

impl InMemoryProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` sends fail before succeeding again.
    pub fn fail_next(&self, count: u32) {
        *self.failures_remaining.lock().unwrap() = count;
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Producer for InMemoryProducer {
    fn send(&self, message: &Message) -> Result<(), ProducerError> {
        {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ProducerError::SendFailed {
                    topic: message.topic().to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
