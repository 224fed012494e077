//! Blocking message pump: one thread, strict per-performer ordering.

use std::sync::Arc;
use std::thread;

use tokio_util::sync::CancellationToken;

use crate::channel::Channel;
use crate::context::RequestContext;
use crate::message::{Message, MessageMapper, MessageType};
use crate::processor::CommandProcessor;
use crate::request::Request;
use crate::subscription::Subscription;

use super::{disposition, Disposition, PumpExit};

/// Reads messages off a channel one at a time and dispatches them
/// synchronously. A message is fully settled (acknowledged, requeued, or
/// rejected) before the next receive, which is what gives the Reactor its
/// ordering guarantee.
pub struct Reactor<R: Request> {
    subscription: Subscription,
    channel: Arc<dyn Channel>,
    processor: Arc<CommandProcessor>,
    mapper: Arc<dyn MessageMapper<R>>,
    cancellation: CancellationToken,
}

impl<R: Request> Reactor<R> {
    pub fn new(
        subscription: Subscription,
        channel: Arc<dyn Channel>,
        processor: Arc<CommandProcessor>,
        mapper: Arc<dyn MessageMapper<R>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            subscription,
            channel,
            processor,
            mapper,
            cancellation,
        }
    }

    /// Run until quit, cancellation, a poisoned channel, or a
    /// configuration failure.
    pub fn run(&self) -> PumpExit {
        tracing::info!(subscription = %self.subscription.name, "message pump started");
        let mut unacceptable_streak: u32 = 0;

        loop {
            if self.cancellation.is_cancelled() {
                tracing::info!(subscription = %self.subscription.name, "message pump cancelled");
                return PumpExit::Cancelled;
            }

            let message = match self.channel.receive(self.subscription.timeout) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    thread::sleep(self.subscription.empty_channel_delay);
                    continue;
                }
                Err(err) => {
                    tracing::warn!(
                        subscription = %self.subscription.name,
                        error = %err,
                        "channel receive failed"
                    );
                    thread::sleep(self.subscription.channel_failure_delay);
                    continue;
                }
            };

            match message.message_type() {
                MessageType::Quit => {
                    tracing::info!(subscription = %self.subscription.name, "quit received, stopping pump");
                    return PumpExit::Quit;
                }
                // Some transports cannot return an empty receive; MT_NONE is
                // their "nothing to read" marker, not a stop signal.
                MessageType::None => {
                    thread::sleep(self.subscription.empty_channel_delay);
                    continue;
                }
                MessageType::Unacceptable => {
                    tracing::warn!(message_id = message.id(), "unacceptable message, rejecting");
                    self.reject(&message);
                    unacceptable_streak += 1;
                    if self.poisoned(unacceptable_streak) {
                        return PumpExit::PoisonedChannel;
                    }
                    continue;
                }
                MessageType::Command | MessageType::Event | MessageType::Document => {}
            }

            let mut request = match self.mapper.map_to_request(&message) {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!(
                        message_id = message.id(),
                        error = %err,
                        "message failed to map, rejecting"
                    );
                    self.reject(&message);
                    unacceptable_streak += 1;
                    if self.poisoned(unacceptable_streak) {
                        return PumpExit::PoisonedChannel;
                    }
                    continue;
                }
            };

            let mut ctx = RequestContext::with_cancellation(self.cancellation.clone())
                .with_originating_message(message.header.clone());

            let result = match message.message_type() {
                MessageType::Command => self.processor.send_with_context(&mut request, &mut ctx),
                // Documents dispatch like events: zero or more subscribers.
                _ => self.processor.publish_with_context(&mut request, &mut ctx),
            };

            match disposition(result) {
                Disposition::Acknowledge => {
                    if let Err(err) = self.channel.acknowledge(&message) {
                        tracing::warn!(message_id = message.id(), error = %err, "acknowledge failed");
                    }
                    unacceptable_streak = 0;
                }
                Disposition::Requeue => self.requeue(message),
                Disposition::Reject(reason) => {
                    tracing::warn!(message_id = message.id(), reason = %reason, "message rejected");
                    self.reject(&message);
                }
                Disposition::StopPump(err) => {
                    tracing::error!(
                        subscription = %self.subscription.name,
                        error = %err,
                        "configuration failure, stopping pump"
                    );
                    self.reject(&message);
                    return PumpExit::Configuration(err);
                }
            }
        }
    }

    fn requeue(&self, mut message: Message) {
        message.header.update_handled_count();
        if message
            .header
            .handled_count_reached(self.subscription.requeue_count)
        {
            tracing::warn!(
                message_id = message.id(),
                handled_count = message.header.handled_count,
                "requeue budget exhausted, rejecting"
            );
            self.reject(&message);
            return;
        }

        let id = message.id().to_string();
        match self
            .channel
            .requeue(message, self.subscription.requeue_delay)
        {
            Ok(true) => tracing::debug!(message_id = %id, "message requeued"),
            Ok(false) => tracing::warn!(message_id = %id, "channel cannot requeue, message dropped"),
            Err(err) => tracing::warn!(message_id = %id, error = %err, "requeue failed"),
        }
    }

    fn reject(&self, message: &Message) {
        if let Err(err) = self.channel.reject(message) {
            tracing::warn!(message_id = message.id(), error = %err, "reject failed");
        }
    }

    fn poisoned(&self, streak: u32) -> bool {
        let limit = self.subscription.unacceptable_message_limit;
        if limit > 0 && streak >= limit {
            tracing::error!(
                subscription = %self.subscription.name,
                streak,
                "unacceptable message limit reached, stopping pump"
            );
            return true;
        }
        false
    }
}
