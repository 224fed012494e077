//! Message pumps - read from a channel, translate, dispatch, settle.
//!
//! Both pumps run the same per-message state machine; they differ only in
//! how they wait. The `Reactor` blocks a dedicated thread and preserves
//! strict ordering; the `Proactor` yields to the runtime at every I/O point.

mod proactor;
mod reactor;

pub use proactor::Proactor;
pub use reactor::Reactor;

use crate::error::DispatchError;
use crate::pipeline::HandlerOutcome;

/// Why a pump's run loop ended.
#[derive(Debug)]
pub enum PumpExit {
    /// A `Quit` control message was received.
    Quit,
    /// The cancellation token fired.
    Cancelled,
    /// Consecutive unacceptable messages reached the subscription limit.
    PoisonedChannel,
    /// A registration problem: redelivery can never fix it.
    Configuration(DispatchError),
}

/// What to do with a message after its dispatch attempt.
#[derive(Debug)]
pub(crate) enum Disposition {
    Acknowledge,
    Requeue,
    Reject(String),
    /// Reject, then stop the pump.
    StopPump(DispatchError),
}

/// Map a dispatch result onto the channel operation that settles it.
///
/// Deferral and transient failures are the requeue path (the requeue budget
/// is applied by the pump); validation and handler failures reject;
/// configuration failures reject and stop the pump, since every redelivery
/// would hit the same missing registration.
pub(crate) fn disposition(result: Result<HandlerOutcome, DispatchError>) -> Disposition {
    match result {
        Ok(HandlerOutcome::Success) => Disposition::Acknowledge,
        Ok(HandlerOutcome::Defer) => Disposition::Requeue,
        Ok(HandlerOutcome::Reject(reason)) => Disposition::Reject(reason),
        Err(err) if err.is_configuration() => Disposition::StopPump(err),
        Err(err) if err.is_transient() => Disposition::Requeue,
        Err(err) => Disposition::Reject(err.to_string()),
    }
}
