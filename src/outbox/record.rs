use std::time::SystemTime;

use crate::message::Message;

/// One row in the outbox.
///
/// Rows are never deleted by the core: dispatch is recorded by setting
/// `dispatched_at`, which keeps clearing idempotent and leaves the row for
/// retention policies to prune.
#[derive(Clone, Debug)]
pub struct OutboxRecord {
    pub message: Message,
    pub created_at: SystemTime,
    pub dispatched_at: Option<SystemTime>,
}

impl OutboxRecord {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            created_at: SystemTime::now(),
            dispatched_at: None,
        }
    }

    pub fn id(&self) -> &str {
        self.message.id()
    }

    pub fn topic(&self) -> &str {
        self.message.topic()
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }
}
