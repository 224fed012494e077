//! Consumer subscription configuration.

use std::time::Duration;

/// Which message pump a subscription runs on.
///
/// `Reactor` is the blocking pump: one dedicated thread per performer,
/// handlers run synchronously. `Proactor` is the async pump: one task per
/// performer on the dispatcher runtime, handlers are awaited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpKind {
    Reactor,
    Proactor,
}

/// Configuration for consuming one channel.
///
/// A dispatcher spawns `performer_count` pumps per subscription, each with
/// its own channel handle. Built with `with_*` setters over sane defaults:
///
/// ```ignore
/// let sub = Subscription::new("orders", "orders.queue", "orders")
///     .with_performer_count(2)
///     .with_requeue_count(5)
///     .with_pump_kind(PumpKind::Proactor);
/// ```
#[derive(Clone, Debug)]
pub struct Subscription {
    /// Human-readable subscription name, used in logs and consumer ids.
    pub name: String,
    /// Name of the channel (queue) to consume.
    pub channel_name: String,
    /// Topic the channel is bound to.
    pub routing_key: String,
    /// Number of concurrent pumps reading this channel.
    pub performer_count: usize,
    /// Messages fetched per receive on transports that batch.
    pub buffer_size: usize,
    /// How long a single receive blocks before reporting "nothing there".
    pub timeout: Duration,
    /// Redeliveries allowed after the original attempt before rejecting.
    pub requeue_count: u32,
    /// Delay applied to each requeue.
    pub requeue_delay: Duration,
    /// Consecutive unparseable messages tolerated before the pump stops
    /// itself. Zero disables the limit.
    pub unacceptable_message_limit: u32,
    /// Pause after an empty receive before polling again.
    pub empty_channel_delay: Duration,
    /// Pause after a channel failure before polling again.
    pub channel_failure_delay: Duration,
    pub pump_kind: PumpKind,
}

impl Subscription {
    pub fn new(
        name: impl Into<String>,
        channel_name: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            channel_name: channel_name.into(),
            routing_key: routing_key.into(),
            performer_count: 1,
            buffer_size: 1,
            timeout: Duration::from_secs(1),
            requeue_count: 3,
            requeue_delay: Duration::ZERO,
            unacceptable_message_limit: 0,
            empty_channel_delay: Duration::from_millis(500),
            channel_failure_delay: Duration::from_millis(1000),
            pump_kind: PumpKind::Reactor,
        }
    }

    pub fn with_performer_count(mut self, performer_count: usize) -> Self {
        self.performer_count = performer_count.max(1);
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_requeue_count(mut self, requeue_count: u32) -> Self {
        self.requeue_count = requeue_count;
        self
    }

    pub fn with_requeue_delay(mut self, requeue_delay: Duration) -> Self {
        self.requeue_delay = requeue_delay;
        self
    }

    pub fn with_unacceptable_message_limit(mut self, limit: u32) -> Self {
        self.unacceptable_message_limit = limit;
        self
    }

    pub fn with_empty_channel_delay(mut self, delay: Duration) -> Self {
        self.empty_channel_delay = delay;
        self
    }

    pub fn with_channel_failure_delay(mut self, delay: Duration) -> Self {
        self.channel_failure_delay = delay;
        self
    }

    pub fn with_pump_kind(mut self, pump_kind: PumpKind) -> Self {
        self.pump_kind = pump_kind;
        self
    }
}
