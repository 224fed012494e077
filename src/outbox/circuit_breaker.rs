//! Per-topic circuit breaking for outbox clearing.

use std::collections::HashMap;
use std::sync::Mutex;

/// Tracks which topics are too unhealthy to send to.
///
/// A tripped topic is excluded from outstanding sweeps until its cooldown
/// expires. Cooldown is measured in `cool_down()` calls, which the sweeper
/// issues once per tick, so the unit is sweep cycles rather than wall time.
pub trait CircuitBreaker: Send + Sync {
    /// Open the circuit for a topic, restarting its cooldown.
    fn trip_topic(&self, topic: &str);

    /// Advance one cooldown tick; fully cooled topics close again.
    fn cool_down(&self);

    /// Topics whose circuit is currently open.
    fn tripped_topics(&self) -> Vec<String>;
}

/// In-memory breaker: topic → remaining cooldown ticks.
pub struct InMemoryCircuitBreaker {
    cooldown_count: u32,
    tripped: Mutex<HashMap<String, u32>>,
}

impl InMemoryCircuitBreaker {
    pub fn new(cooldown_count: u32) -> Self {
        Self {
            cooldown_count: cooldown_count.max(1),
            tripped: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_tripped(&self, topic: &str) -> bool {
        self.tripped.lock().unwrap().contains_key(topic)
    }
}

impl Default for InMemoryCircuitBreaker {
    fn default() -> Self {
        Self::new(10)
    }
}

impl CircuitBreaker for InMemoryCircuitBreaker {
    fn trip_topic(&self, topic: &str) {
        tracing::warn!(topic, cooldown = self.cooldown_count, "circuit tripped");
        self.tripped
            .lock()
            .unwrap()
            .insert(topic.to_string(), self.cooldown_count);
    }

    fn cool_down(&self) {
        let mut tripped = self.tripped.lock().unwrap();
        tripped.retain(|topic, remaining| {
            *remaining -= 1;
            if *remaining == 0 {
                tracing::info!(topic, "circuit closed");
                false
            } else {
                true
            }
        });
    }

    fn tripped_topics(&self) -> Vec<String> {
        self.tripped.lock().unwrap().keys().cloned().collect()
    }
}
