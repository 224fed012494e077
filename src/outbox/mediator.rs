//! Mediates between the outbox and the broker producers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use crate::error::DispatchError;
use crate::message::Message;
use crate::policy::RetryPolicy;
use crate::producer::ProducerRegistry;

use super::circuit_breaker::{CircuitBreaker, InMemoryCircuitBreaker};
use super::record::OutboxRecord;
use super::store::{Outbox, OutboxError};

/// What one clearing pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClearReport {
    /// Rows sent and marked dispatched.
    pub cleared: usize,
    /// Rows left alone: already dispatched, or their topic's circuit is open.
    pub skipped: usize,
    /// Rows whose send failed; they stay pending for the next pass.
    pub failed: usize,
}

struct OutstandingCheck {
    last: Option<Instant>,
    count: usize,
}

/// Deposits messages into the outbox and clears them through producers.
///
/// The invariant this type protects: a row is marked dispatched only after
/// its producer reported a completed send. Failed or skipped sends leave the
/// row pending, so the sweeper's next pass retries it.
pub struct OutboxProducerMediator {
    outbox: Arc<dyn Outbox>,
    producers: Arc<ProducerRegistry>,
    breaker: Arc<dyn CircuitBreaker>,
    retry: RetryPolicy,
    /// Consecutive send failures a topic is allowed before its circuit trips.
    failure_threshold: u32,
    failure_counts: Mutex<HashMap<String, u32>>,
    max_outstanding: Option<usize>,
    outstanding_check_interval: Duration,
    outstanding_check: Mutex<OutstandingCheck>,
}

impl OutboxProducerMediator {
    pub fn new(outbox: Arc<dyn Outbox>, producers: Arc<ProducerRegistry>) -> Self {
        Self {
            outbox,
            producers,
            breaker: Arc::new(InMemoryCircuitBreaker::default()),
            retry: RetryPolicy::none(),
            failure_threshold: 1,
            failure_counts: Mutex::new(HashMap::new()),
            max_outstanding: None,
            outstanding_check_interval: Duration::from_secs(1),
            outstanding_check: Mutex::new(OutstandingCheck {
                last: None,
                count: 0,
            }),
        }
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<dyn CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_failure_threshold(mut self, failure_threshold: u32) -> Self {
        self.failure_threshold = failure_threshold.max(1);
        self
    }

    /// Cap on undispatched rows. `deposit` re-counts at most once per
    /// `check_interval` and refuses new rows while over the cap.
    pub fn with_max_outstanding(mut self, max: usize, check_interval: Duration) -> Self {
        self.max_outstanding = Some(max);
        self.outstanding_check_interval = check_interval;
        self
    }

    /// Stage a message for later clearing. Returns the message id.
    pub fn deposit(&self, message: Message) -> Result<String, OutboxError> {
        self.check_outstanding()?;
        let id = message.id().to_string();
        let topic = message.topic().to_string();
        self.outbox.add(OutboxRecord::new(message))?;
        tracing::debug!(message_id = %id, topic = %topic, "message deposited");
        Ok(id)
    }

    /// Clear specific rows by message id.
    ///
    /// Unknown ids fail the call; already dispatched rows and rows on
    /// tripped topics are skipped, so clearing the same ids twice sends
    /// each message once.
    pub fn clear(&self, ids: &[String]) -> Result<ClearReport, OutboxError> {
        let tripped = self.breaker.tripped_topics();
        let mut report = ClearReport::default();

        for id in ids {
            let record = self
                .outbox
                .get(id)?
                .ok_or_else(|| OutboxError::NotFound(id.clone()))?;

            if record.is_dispatched() {
                report.skipped += 1;
                continue;
            }
            if tripped.iter().any(|t| t == record.topic()) {
                tracing::debug!(message_id = %id, topic = record.topic(), "circuit open, skipping");
                report.skipped += 1;
                continue;
            }

            self.send_one(&record.message, &mut report)?;
        }

        Ok(report)
    }

    /// Clear every undispatched row at least `min_age` old, up to
    /// `batch_size`, excluding tripped topics. The sweeper's per-tick call.
    pub fn clear_outstanding(
        &self,
        min_age: Duration,
        batch_size: usize,
    ) -> Result<ClearReport, OutboxError> {
        let tripped = self.breaker.tripped_topics();
        let pending = self.outbox.outstanding(min_age, batch_size, &tripped)?;

        let mut report = ClearReport::default();
        for message in &pending {
            self.send_one(message, &mut report)?;
        }
        Ok(report)
    }

    /// Advance the breaker one cooldown tick.
    pub fn cool_down(&self) {
        self.breaker.cool_down();
    }

    /// Undispatched rows right now, bypassing the deposit-time cache.
    pub fn outstanding_count(&self) -> Result<usize, OutboxError> {
        self.outbox.outstanding_count(Duration::ZERO)
    }

    fn check_outstanding(&self) -> Result<(), OutboxError> {
        let Some(max) = self.max_outstanding else {
            return Ok(());
        };

        let mut check = self.outstanding_check.lock().unwrap();
        let due = check
            .last
            .map_or(true, |at| at.elapsed() >= self.outstanding_check_interval);
        if due {
            check.count = self.outbox.outstanding_count(Duration::ZERO)?;
            check.last = Some(Instant::now());
        }

        if check.count > max {
            return Err(OutboxError::LimitReached {
                outstanding: check.count,
                max,
            });
        }
        Ok(())
    }

    fn send_one(&self, message: &Message, report: &mut ClearReport) -> Result<(), OutboxError> {
        let topic = message.topic().to_string();

        // A missing producer is a registration gap, not broker health: the
        // circuit stays closed and the row sends as soon as one is registered.
        let producer = match self.producers.lookup(&topic) {
            Ok(producer) => producer,
            Err(err) => {
                report.failed += 1;
                tracing::error!(message_id = message.id(), topic = %topic, error = %err, "row stays pending");
                return Ok(());
            }
        };

        let sent = self.retry.run(|| {
            producer
                .send(message)
                .map_err(|err| DispatchError::Transient(err.to_string()))
        });

        match sent {
            Ok(()) => {
                self.outbox.mark_dispatched(message.id(), SystemTime::now())?;
                self.failure_counts.lock().unwrap().remove(&topic);
                report.cleared += 1;
                tracing::info!(message_id = message.id(), topic = %topic, "message cleared");
            }
            Err(err) => {
                report.failed += 1;
                tracing::warn!(message_id = message.id(), topic = %topic, error = %err, "send failed, row stays pending");
                self.record_failure(&topic);
            }
        }
        Ok(())
    }

    fn record_failure(&self, topic: &str) {
        let mut counts = self.failure_counts.lock().unwrap();
        let count = counts.entry(topic.to_string()).or_insert(0);
        *count += 1;
        if *count >= self.failure_threshold {
            counts.remove(topic);
            self.breaker.trip_topic(topic);
        }
    }
}
