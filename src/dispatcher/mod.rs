//! The dispatcher - supervises message pump consumers.
//!
//! One consumer per (subscription × performer). Reactor subscriptions get a
//! dedicated thread each; Proactor subscriptions run as tasks on a
//! dispatcher-owned tokio runtime.

mod consumer;
mod state;

pub use state::{ConsumerState, DispatcherState};

use std::sync::Arc;
use std::thread;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;

use crate::channel::{Channel, ChannelAsync};
use crate::message::MessageMapper;
use crate::processor::CommandProcessor;
use crate::pump::{Proactor, Reactor};
use crate::request::Request;
use crate::subscription::{PumpKind, Subscription};

use consumer::{Consumer, ConsumerRunner};
use state::StateCell;

type StartFn = Box<dyn Fn(usize, &Handle) -> Consumer + Send>;

/// How to build the consumers of one subscription.
struct ConsumerFactory {
    subscription: Subscription,
    start: StartFn,
}

/// Starts, supervises, and stops message pump consumers.
///
/// ## Example
///
/// ```ignore
/// let mut dispatcher = Dispatcher::new(processor)?;
/// dispatcher.add_subscription::<PlaceOrder, _>(subscription, channel, mapper);
/// dispatcher.receive();
/// // ... run ...
/// dispatcher.end();
/// ```
pub struct Dispatcher {
    processor: Arc<CommandProcessor>,
    runtime: Runtime,
    factories: Vec<ConsumerFactory>,
    consumers: Vec<Consumer>,
}

impl Dispatcher {
    pub fn new(processor: Arc<CommandProcessor>) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread().enable_all().build()?;
        Ok(Self {
            processor,
            runtime,
            factories: Vec::new(),
            consumers: Vec::new(),
        })
    }

    /// Register a subscription with a channel that supports both pump
    /// kinds; `subscription.pump_kind` picks the one to run.
    pub fn add_subscription<R, C>(
        &mut self,
        subscription: Subscription,
        channel: C,
        mapper: Arc<dyn MessageMapper<R>>,
    ) where
        R: Request,
        C: Channel + ChannelAsync + 'static,
    {
        let channel = Arc::new(channel);
        match subscription.pump_kind {
            PumpKind::Reactor => self.add_reactor(subscription, channel, mapper),
            PumpKind::Proactor => self.add_proactor(subscription, channel, mapper),
        }
    }

    /// Register a Reactor subscription over a blocking channel.
    pub fn add_reactor<R: Request>(
        &mut self,
        subscription: Subscription,
        channel: Arc<dyn Channel>,
        mapper: Arc<dyn MessageMapper<R>>,
    ) {
        let processor = Arc::clone(&self.processor);
        let sub = subscription.clone();

        let start: StartFn = Box::new(move |performer, _handle| {
            let name = format!("{}-{}", sub.name, performer);
            let cancellation = CancellationToken::new();
            let state = Arc::new(StateCell::new());

            let pump = Reactor::new(
                sub.clone(),
                Arc::clone(&channel),
                Arc::clone(&processor),
                Arc::clone(&mapper),
                cancellation.clone(),
            );

            let pump_state = Arc::clone(&state);
            let handle = thread::spawn(move || {
                pump_state.set(ConsumerState::Running);
                let exit = pump.run();
                pump_state.set(ConsumerState::Stopped);
                exit
            });

            let stop_channel = Arc::clone(&channel);
            Consumer {
                name,
                subscription_name: sub.name.clone(),
                state,
                cancellation,
                stopper: Box::new(move || {
                    if let Err(err) = stop_channel.stop() {
                        tracing::warn!(error = %err, "failed to inject quit message");
                    }
                }),
                runner: Some(ConsumerRunner::Thread(handle)),
            }
        });

        self.factories.push(ConsumerFactory {
            subscription,
            start,
        });
    }

    /// Register a Proactor subscription over an async channel.
    pub fn add_proactor<R: Request>(
        &mut self,
        subscription: Subscription,
        channel: Arc<dyn ChannelAsync>,
        mapper: Arc<dyn MessageMapper<R>>,
    ) {
        let processor = Arc::clone(&self.processor);
        let sub = subscription.clone();

        let start: StartFn = Box::new(move |performer, handle| {
            let name = format!("{}-{}", sub.name, performer);
            let cancellation = CancellationToken::new();
            let state = Arc::new(StateCell::new());

            let pump = Proactor::new(
                sub.clone(),
                Arc::clone(&channel),
                Arc::clone(&processor),
                Arc::clone(&mapper),
                cancellation.clone(),
            );

            let pump_state = Arc::clone(&state);
            let task = handle.spawn(async move {
                pump_state.set(ConsumerState::Running);
                let exit = pump.run().await;
                pump_state.set(ConsumerState::Stopped);
                exit
            });

            let stop_channel = Arc::clone(&channel);
            let stop_handle = handle.clone();
            Consumer {
                name,
                subscription_name: sub.name.clone(),
                state,
                cancellation,
                stopper: Box::new(move || {
                    let channel = Arc::clone(&stop_channel);
                    stop_handle.spawn(async move {
                        if let Err(err) = channel.stop().await {
                            tracing::warn!(error = %err, "failed to inject quit message");
                        }
                    });
                }),
                runner: Some(ConsumerRunner::Task(task)),
            }
        });

        self.factories.push(ConsumerFactory {
            subscription,
            start,
        });
    }

    /// Start every registered subscription that is not already consuming.
    pub fn receive(&mut self) {
        let handle = self.runtime.handle().clone();
        for factory in &self.factories {
            Self::start_consumers(&mut self.consumers, factory, &handle);
        }
        tracing::info!(consumers = self.consumers.len(), "dispatcher receiving");
    }

    /// Stop every consumer: inject quit, cancel, and join.
    pub fn end(&mut self) {
        tracing::info!("dispatcher ending");
        let runtime = &self.runtime;
        for consumer in &mut self.consumers {
            consumer.stop(runtime);
        }
    }

    /// Start the consumers of one subscription.
    pub fn open(&mut self, subscription_name: &str) {
        let handle = self.runtime.handle().clone();
        match self
            .factories
            .iter()
            .find(|s| s.subscription.name == subscription_name)
        {
            Some(factory) => Self::start_consumers(&mut self.consumers, factory, &handle),
            None => {
                tracing::warn!(subscription = subscription_name, "open: unknown subscription")
            }
        }
    }

    /// Stop the consumers of one subscription; others keep running.
    pub fn shut(&mut self, subscription_name: &str) {
        let runtime = &self.runtime;
        let mut found = false;
        for consumer in &mut self.consumers {
            if consumer.subscription_name == subscription_name {
                consumer.stop(runtime);
                found = true;
            }
        }
        if !found {
            tracing::warn!(subscription = subscription_name, "shut: no consumers");
        }
    }

    /// Aggregate state across all consumers.
    pub fn state(&self) -> DispatcherState {
        let states: Vec<ConsumerState> = self.consumers.iter().map(|c| c.state()).collect();
        if states.is_empty() {
            return DispatcherState::Awaiting;
        }
        if states.iter().any(|s| *s == ConsumerState::Running) {
            return DispatcherState::Running;
        }
        if states.iter().any(|s| *s == ConsumerState::Stopping) {
            return DispatcherState::Stopping;
        }
        if states.iter().all(|s| *s == ConsumerState::Stopped) {
            return DispatcherState::Stopped;
        }
        DispatcherState::Awaiting
    }

    /// Per-consumer states for health reporting.
    pub fn consumer_states(&self) -> Vec<(String, ConsumerState)> {
        self.consumers
            .iter()
            .map(|c| (c.name.clone(), c.state()))
            .collect()
    }

    fn start_consumers(consumers: &mut Vec<Consumer>, factory: &ConsumerFactory, handle: &Handle) {
        let name = &factory.subscription.name;
        // Clear out finished consumers so open() after shut() restarts clean.
        consumers.retain(|c| c.subscription_name != *name || c.state() != ConsumerState::Stopped);
        if consumers.iter().any(|c| c.subscription_name == *name) {
            return;
        }
        for performer in 0..factory.subscription.performer_count {
            consumers.push((factory.start)(performer, handle));
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Cancel without joining; a caller that wants clean joins calls end().
        for consumer in &self.consumers {
            (consumer.stopper)();
            consumer.cancellation.cancel();
        }
    }
}
