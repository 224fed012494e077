//! Outbox storage trait and the in-memory reference implementation.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use crate::message::Message;

use super::record::OutboxRecord;

/// Error raised by outbox storage or the mediator around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxError {
    /// No row stored under the given message id.
    NotFound(String),
    /// Outstanding (undispatched) rows exceed the configured ceiling.
    LimitReached { outstanding: usize, max: usize },
    /// The backing store failed.
    Storage(String),
}

impl fmt::Display for OutboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboxError::NotFound(id) => write!(f, "no outbox record for message '{}'", id),
            OutboxError::LimitReached { outstanding, max } => write!(
                f,
                "outbox has {} outstanding messages, limit is {}",
                outstanding, max
            ),
            OutboxError::Storage(msg) => write!(f, "outbox storage error: {}", msg),
        }
    }
}

impl std::error::Error for OutboxError {}

/// Durable staging area for outbound messages.
///
/// `add` must be callable inside the caller's storage transaction so the
/// message and the state change it describes commit or roll back together.
/// `mark_dispatched` is idempotent: marking an already dispatched row keeps
/// the original timestamp.
pub trait Outbox: Send + Sync {
    fn add(&self, record: OutboxRecord) -> Result<(), OutboxError>;

    fn get(&self, id: &str) -> Result<Option<OutboxRecord>, OutboxError>;

    fn mark_dispatched(&self, id: &str, at: SystemTime) -> Result<(), OutboxError>;

    /// Undispatched messages at least `min_age` old, oldest first, up to
    /// `batch_size`, excluding any topic in `skip_topics`.
    fn outstanding(
        &self,
        min_age: Duration,
        batch_size: usize,
        skip_topics: &[String],
    ) -> Result<Vec<Message>, OutboxError>;

    fn outstanding_count(&self, min_age: Duration) -> Result<usize, OutboxError>;
}

/// In-memory outbox over an insertion-ordered vector.
///
/// Cloning shares the storage (thread-safe via `Arc<RwLock<...>>`), so the
/// command processor, the sweeper, and a test can all hold handles to the
/// same rows.
#[derive(Clone, Default)]
pub struct InMemoryOutbox {
    records: Arc<RwLock<Vec<OutboxRecord>>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, dispatched or not.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

fn older_than(record: &OutboxRecord, min_age: Duration) -> bool {
    SystemTime::now()
        .duration_since(record.created_at)
        .map(|age| age >= min_age)
        .unwrap_or(false)
}

impl Outbox for InMemoryOutbox {
    fn add(&self, record: OutboxRecord) -> Result<(), OutboxError> {
        self.records.write().unwrap().push(record);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<OutboxRecord>, OutboxError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .find(|r| r.id() == id)
            .cloned())
    }

    fn mark_dispatched(&self, id: &str, at: SystemTime) -> Result<(), OutboxError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| OutboxError::NotFound(id.to_string()))?;
        if record.dispatched_at.is_none() {
            record.dispatched_at = Some(at);
        }
        Ok(())
    }

    fn outstanding(
        &self,
        min_age: Duration,
        batch_size: usize,
        skip_topics: &[String],
    ) -> Result<Vec<Message>, OutboxError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .filter(|r| !r.is_dispatched())
            .filter(|r| older_than(r, min_age))
            .filter(|r| !skip_topics.iter().any(|t| t == r.topic()))
            .take(batch_size)
            .map(|r| r.message.clone())
            .collect())
    }

    fn outstanding_count(&self, min_age: Duration) -> Result<usize, OutboxError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .filter(|r| !r.is_dispatched())
            .filter(|r| older_than(r, min_age))
            .count())
    }
}
