//! Transactional outbox - reliable delivery to external brokers.
//!
//! Messages are deposited alongside the caller's own state change, then
//! cleared to the broker either explicitly (by id) or by the background
//! sweeper. A per-topic circuit breaker keeps a dead broker from being
//! hammered on every pass.

mod circuit_breaker;
mod mediator;
mod record;
mod store;
mod sweeper;

pub use circuit_breaker::{CircuitBreaker, InMemoryCircuitBreaker};
pub use mediator::{ClearReport, OutboxProducerMediator};
pub use record::OutboxRecord;
pub use store::{InMemoryOutbox, Outbox, OutboxError};
pub use sweeper::{OutboxSweeper, SweeperConfig, SweeperStats};
