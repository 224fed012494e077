//! The command processor - the crate's dispatch facade.
//!
//! `send` routes a command to its one handler pipeline, `publish` fans an
//! event out to every subscriber pipeline, and `post`/`deposit_post`/
//! `clear_outbox` bridge requests onto external brokers through the
//! transactional outbox.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::{ConfigurationError, DispatchError};
use crate::message::{MapperRegistry, MappingError};
use crate::outbox::{ClearReport, OutboxError, OutboxProducerMediator};
use crate::pipeline::{HandlerOutcome, PipelineBuilder, SubscriberRegistry};
use crate::request::Request;

fn mapping_error(err: MappingError) -> DispatchError {
    match err {
        MappingError::MissingMapper(t) => ConfigurationError::MissingMapper(t).into(),
        MappingError::Malformed(msg) => DispatchError::Validation(msg),
        MappingError::Serialization(msg) => DispatchError::Validation(msg),
    }
}

fn outbox_error(err: OutboxError) -> DispatchError {
    match err {
        OutboxError::NotFound(id) => {
            DispatchError::Validation(format!("no outbox record for message '{}'", id))
        }
        err @ OutboxError::LimitReached { .. } => DispatchError::Transient(err.to_string()),
        OutboxError::Storage(msg) => DispatchError::Transient(msg),
    }
}

/// Dispatches requests to handler pipelines and brokers.
///
/// All collaborators arrive through the constructor; nothing is global, so
/// two processors in one process (or one per test) never share state.
///
/// ## Example
///
/// ```ignore
/// let mut registry = SubscriberRegistry::new();
/// registry.register_command::<PlaceOrder, _, _>(|| PlaceOrderHandler::new(store.clone()));
///
/// let processor = CommandProcessor::new(registry);
/// processor.send(&mut PlaceOrder::new("order-1"))?;
/// ```
pub struct CommandProcessor {
    pipelines: PipelineBuilder,
    mappers: Arc<MapperRegistry>,
    mediator: Option<Arc<OutboxProducerMediator>>,
}

impl CommandProcessor {
    pub fn new(registry: SubscriberRegistry) -> Self {
        Self {
            pipelines: PipelineBuilder::new(registry),
            mappers: Arc::new(MapperRegistry::new()),
            mediator: None,
        }
    }

    /// Attach the message mappers used by `post`/`deposit_post`.
    pub fn with_mappers(mut self, mappers: Arc<MapperRegistry>) -> Self {
        self.mappers = mappers;
        self
    }

    /// Attach the outbox mediator used by the posting operations.
    pub fn with_mediator(mut self, mediator: Arc<OutboxProducerMediator>) -> Self {
        self.mediator = Some(mediator);
        self
    }

    /// Drop cached pipeline plans so re-registered handlers take effect.
    pub fn clear_pipeline_cache(&self) {
        self.pipelines.clear_cache();
    }

    /// Dispatch a command to its single handler pipeline.
    pub fn send<R: Request>(&self, request: &mut R) -> Result<HandlerOutcome, DispatchError> {
        let mut ctx = RequestContext::new();
        self.send_with_context(request, &mut ctx)
    }

    /// `send` with a caller-supplied context (pumps thread the originating
    /// message and cancellation through here).
    pub fn send_with_context<R: Request>(
        &self,
        request: &mut R,
        ctx: &mut RequestContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        let mut pipeline = self.pipelines.command_chain::<R>()?;
        tracing::debug!(request_id = request.id(), "dispatching command");
        pipeline.invoke(request, ctx)
    }

    /// Dispatch an event to every subscriber pipeline.
    ///
    /// Every pipeline runs even when earlier ones fail; failures are
    /// collected and raised together afterwards. With no subscribers this is
    /// a no-op. Outcomes merge with Defer > Reject > Success, so one
    /// deferring subscriber defers the whole delivery.
    pub fn publish<R: Request>(&self, request: &mut R) -> Result<HandlerOutcome, DispatchError> {
        let mut ctx = RequestContext::new();
        self.publish_with_context(request, &mut ctx)
    }

    pub fn publish_with_context<R: Request>(
        &self,
        request: &mut R,
        ctx: &mut RequestContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        let pipelines = self.pipelines.event_chains::<R>()?;
        tracing::debug!(
            request_id = request.id(),
            subscribers = pipelines.len(),
            "publishing event"
        );

        let mut outcome = HandlerOutcome::Success;
        let mut failures = Vec::new();
        for mut pipeline in pipelines {
            match pipeline.invoke(request, ctx) {
                Ok(next) => outcome = outcome.merge(next),
                Err(err) => failures.push(err),
            }
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(DispatchError::Aggregate(failures))
        }
    }

    /// Async mirror of [`send`](Self::send).
    pub async fn send_async<R: Request>(
        &self,
        request: &mut R,
    ) -> Result<HandlerOutcome, DispatchError> {
        let mut ctx = RequestContext::new();
        self.send_async_with_context(request, &mut ctx).await
    }

    pub async fn send_async_with_context<R: Request>(
        &self,
        request: &mut R,
        ctx: &mut RequestContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        let mut pipeline = self.pipelines.command_chain_async::<R>()?;
        tracing::debug!(request_id = request.id(), "dispatching command");
        pipeline.invoke(request, ctx).await
    }

    /// Async mirror of [`publish`](Self::publish).
    pub async fn publish_async<R: Request>(
        &self,
        request: &mut R,
    ) -> Result<HandlerOutcome, DispatchError> {
        let mut ctx = RequestContext::new();
        self.publish_async_with_context(request, &mut ctx).await
    }

    pub async fn publish_async_with_context<R: Request>(
        &self,
        request: &mut R,
        ctx: &mut RequestContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        let pipelines = self.pipelines.event_chains_async::<R>()?;
        tracing::debug!(
            request_id = request.id(),
            subscribers = pipelines.len(),
            "publishing event"
        );

        let mut outcome = HandlerOutcome::Success;
        let mut failures = Vec::new();
        for mut pipeline in pipelines {
            match pipeline.invoke(request, ctx).await {
                Ok(next) => outcome = outcome.merge(next),
                Err(err) => failures.push(err),
            }
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(DispatchError::Aggregate(failures))
        }
    }

    /// Map the request to a message, deposit it, and clear it immediately.
    /// Returns the message id.
    pub fn post<R: Request>(&self, request: &R) -> Result<String, DispatchError> {
        let id = self.deposit_post(request)?;
        self.clear_outbox(std::slice::from_ref(&id))?;
        Ok(id)
    }

    /// Map the request to a message and stage it in the outbox for a later
    /// explicit clear, typically inside the caller's own transaction.
    /// Returns the message id to clear with.
    pub fn deposit_post<R: Request>(&self, request: &R) -> Result<String, DispatchError> {
        let mediator = self.mediator()?;
        let mapper = self.mappers.lookup::<R>().map_err(mapping_error)?;
        let message = mapper.map_to_message(request).map_err(mapping_error)?;
        mediator.deposit(message).map_err(outbox_error)
    }

    /// Flush staged messages by id through their topic producers.
    pub fn clear_outbox(&self, ids: &[String]) -> Result<ClearReport, DispatchError> {
        let mediator = self.mediator()?;
        mediator.clear(ids).map_err(outbox_error)
    }

    /// Async mirror of [`post`](Self::post); outbox work runs on the
    /// blocking pool.
    pub async fn post_async<R: Request>(&self, request: &R) -> Result<String, DispatchError> {
        let mediator = Arc::clone(self.mediator()?);
        let mapper = self.mappers.lookup::<R>().map_err(mapping_error)?;
        let message = mapper.map_to_message(request).map_err(mapping_error)?;

        tokio::task::spawn_blocking(move || {
            let id = mediator.deposit(message).map_err(outbox_error)?;
            mediator
                .clear(std::slice::from_ref(&id))
                .map_err(outbox_error)?;
            Ok(id)
        })
        .await
        .map_err(|err| DispatchError::Transient(format!("outbox task failed: {}", err)))?
    }

    /// Async mirror of [`deposit_post`](Self::deposit_post).
    pub async fn deposit_post_async<R: Request>(
        &self,
        request: &R,
    ) -> Result<String, DispatchError> {
        let mediator = Arc::clone(self.mediator()?);
        let mapper = self.mappers.lookup::<R>().map_err(mapping_error)?;
        let message = mapper.map_to_message(request).map_err(mapping_error)?;

        tokio::task::spawn_blocking(move || mediator.deposit(message).map_err(outbox_error))
            .await
            .map_err(|err| DispatchError::Transient(format!("outbox task failed: {}", err)))?
    }

    /// Async mirror of [`clear_outbox`](Self::clear_outbox).
    pub async fn clear_outbox_async(&self, ids: &[String]) -> Result<ClearReport, DispatchError> {
        let mediator = Arc::clone(self.mediator()?);
        let ids = ids.to_vec();

        tokio::task::spawn_blocking(move || mediator.clear(&ids).map_err(outbox_error))
            .await
            .map_err(|err| DispatchError::Transient(format!("outbox task failed: {}", err)))?
    }

    fn mediator(&self) -> Result<&Arc<OutboxProducerMediator>, DispatchError> {
        self.mediator
            .as_ref()
            .ok_or_else(|| ConfigurationError::MissingOutbox.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Handler, HandlerResult, Next};
    use std::sync::Mutex;

    struct Ping {
        id: String,
        acked: bool,
    }

    impl Request for Ping {
        fn id(&self) -> &str {
            &self.id
        }
    }

    struct PingHandler;

    impl Handler<Ping> for PingHandler {
        fn handle(
            &mut self,
            request: &mut Ping,
            ctx: &mut RequestContext,
            next: Next<'_, Ping>,
        ) -> HandlerResult {
            request.acked = true;
            next.invoke(request, ctx)
        }
    }

    struct Ticked {
        id: String,
    }

    impl Request for Ticked {
        fn id(&self) -> &str {
            &self.id
        }
    }

    struct CountingSubscriber {
        seen: Arc<Mutex<u32>>,
        result: fn() -> HandlerResult,
    }

    impl Handler<Ticked> for CountingSubscriber {
        fn handle(
            &mut self,
            _request: &mut Ticked,
            _ctx: &mut RequestContext,
            _next: Next<'_, Ticked>,
        ) -> HandlerResult {
            *self.seen.lock().unwrap() += 1;
            (self.result)()
        }
    }

    fn counting(seen: &Arc<Mutex<u32>>, result: fn() -> HandlerResult) -> impl Fn() -> CountingSubscriber {
        let seen = Arc::clone(seen);
        move || CountingSubscriber {
            seen: Arc::clone(&seen),
            result,
        }
    }

    #[test]
    fn send_routes_to_the_single_command_handler() {
        let mut registry = SubscriberRegistry::new();
        registry.register_command::<Ping, _, _>(|| PingHandler);

        let processor = CommandProcessor::new(registry);
        let mut ping = Ping {
            id: "ping-1".into(),
            acked: false,
        };

        let outcome = processor.send(&mut ping).unwrap();
        assert!(outcome.is_success());
        assert!(ping.acked);
    }

    #[test]
    fn send_without_registration_is_a_configuration_error() {
        let processor = CommandProcessor::new(SubscriberRegistry::new());
        let err = processor
            .send(&mut Ping {
                id: "ping-1".into(),
                acked: false,
            })
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn publish_runs_every_subscriber_despite_failures() {
        let seen = Arc::new(Mutex::new(0));
        let mut registry = SubscriberRegistry::new();
        registry.register_event::<Ticked, _, _>(counting(&seen, || Ok(HandlerOutcome::Success)));
        registry.register_event::<Ticked, _, _>(counting(&seen, || {
            Err(DispatchError::Validation("bad".into()))
        }));
        registry.register_event::<Ticked, _, _>(counting(&seen, || Ok(HandlerOutcome::Success)));

        let processor = CommandProcessor::new(registry);
        let err = processor
            .publish(&mut Ticked { id: "t-1".into() })
            .unwrap_err();

        assert_eq!(*seen.lock().unwrap(), 3);
        match err {
            DispatchError::Aggregate(failures) => assert_eq!(failures.len(), 1),
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn publish_with_no_subscribers_is_a_no_op() {
        let processor = CommandProcessor::new(SubscriberRegistry::new());
        let outcome = processor.publish(&mut Ticked { id: "t-1".into() }).unwrap();
        assert!(outcome.is_success());
    }

    #[test]
    fn one_deferring_subscriber_defers_the_delivery() {
        let seen = Arc::new(Mutex::new(0));
        let mut registry = SubscriberRegistry::new();
        registry.register_event::<Ticked, _, _>(counting(&seen, || Ok(HandlerOutcome::Success)));
        registry.register_event::<Ticked, _, _>(counting(&seen, || Ok(HandlerOutcome::Defer)));

        let processor = CommandProcessor::new(registry);
        let outcome = processor.publish(&mut Ticked { id: "t-1".into() }).unwrap();
        assert!(outcome.is_defer());
    }

    #[test]
    fn posting_without_an_outbox_is_a_configuration_error() {
        let processor = CommandProcessor::new(SubscriberRegistry::new());
        let err = processor
            .deposit_post(&Ping {
                id: "ping-1".into(),
                acked: false,
            })
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
