use std::time::Duration;

use async_trait::async_trait;

use crate::message::Message;

use super::ChannelError;

/// A consuming view of one queue on a broker, used by the blocking pump.
///
/// `receive` blocks up to `timeout` and returns `Ok(None)` on an empty
/// queue - emptiness is not an error. `stop` injects a `Quit` control
/// message so a pump blocked in `receive` wakes up and exits cleanly.
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    fn receive(&self, timeout: Duration) -> Result<Option<Message>, ChannelError>;

    /// Mark the message done; the broker will not redeliver it.
    fn acknowledge(&self, message: &Message) -> Result<(), ChannelError>;

    /// Discard the message without processing.
    fn reject(&self, message: &Message) -> Result<(), ChannelError>;

    /// Put the message back for redelivery after `delay`.
    /// Returns `false` when the transport cannot requeue.
    fn requeue(&self, message: Message, delay: Duration) -> Result<bool, ChannelError>;

    /// Drop everything currently queued.
    fn purge(&self) -> Result<(), ChannelError>;

    /// Inject a `Quit` control message to unblock and stop a pump.
    fn stop(&self) -> Result<(), ChannelError>;
}

/// Async mirror of [`Channel`], used by the Proactor pump.
#[async_trait]
pub trait ChannelAsync: Send + Sync {
    fn name(&self) -> &str;

    async fn receive(&self, timeout: Duration) -> Result<Option<Message>, ChannelError>;

    async fn acknowledge(&self, message: &Message) -> Result<(), ChannelError>;

    async fn reject(&self, message: &Message) -> Result<(), ChannelError>;

    async fn requeue(&self, message: Message, delay: Duration) -> Result<bool, ChannelError>;

    async fn purge(&self) -> Result<(), ChannelError>;

    async fn stop(&self) -> Result<(), ChannelError>;
}
