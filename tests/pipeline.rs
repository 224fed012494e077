mod support;

use async_trait::async_trait;
use courier_rust::{
    CommandProcessor, DispatchError, Handler, HandlerAsync, HandlerOutcome, HandlerResult,
    HandlerTiming, Next, NextAsync, RequestContext, SubscriberRegistry,
};
use support::{OrderPlaced, PlaceOrder, Recorder};

struct StampHandler {
    recorder: Recorder,
}

impl Handler<PlaceOrder> for StampHandler {
    fn handle(
        &mut self,
        request: &mut PlaceOrder,
        ctx: &mut RequestContext,
        next: Next<'_, PlaceOrder>,
    ) -> HandlerResult {
        ctx.bag
            .insert("stamped".into(), serde_json::json!(request.sku.clone()));
        self.recorder.record("stamp");
        next.invoke(request, ctx)
    }
}

struct PlaceOrderHandler {
    recorder: Recorder,
}

impl Handler<PlaceOrder> for PlaceOrderHandler {
    fn handle(
        &mut self,
        request: &mut PlaceOrder,
        ctx: &mut RequestContext,
        next: Next<'_, PlaceOrder>,
    ) -> HandlerResult {
        // The decorator ran first and left its mark in the context bag.
        assert_eq!(ctx.bag["stamped"], serde_json::json!(request.sku));
        self.recorder.record(format!("placed:{}", request.sku));
        next.invoke(request, ctx)
    }
}

#[test]
fn decorators_share_context_with_the_terminal_handler() {
    let recorder = Recorder::new();
    let mut registry = SubscriberRegistry::new();

    let r = recorder.clone();
    registry.register_command::<PlaceOrder, _, _>(move || PlaceOrderHandler { recorder: r.clone() });
    let r = recorder.clone();
    registry.add_decorator::<PlaceOrder, _, _>(1, HandlerTiming::Before, move || StampHandler {
        recorder: r.clone(),
    });

    let processor = CommandProcessor::new(registry);
    let outcome = processor
        .send(&mut PlaceOrder::new("order-1", "sku-9"))
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(recorder.entries(), vec!["stamp", "placed:sku-9"]);
}

struct AsyncPlaceOrderHandler {
    recorder: Recorder,
}

#[async_trait]
impl HandlerAsync<PlaceOrder> for AsyncPlaceOrderHandler {
    async fn handle(
        &mut self,
        request: &mut PlaceOrder,
        ctx: &mut RequestContext,
        next: NextAsync<'_, PlaceOrder>,
    ) -> HandlerResult {
        self.recorder.record(format!("placed:{}", request.sku));
        next.invoke(request, ctx).await
    }
}

#[tokio::test]
async fn send_async_routes_to_the_async_pipeline() {
    let recorder = Recorder::new();
    let mut registry = SubscriberRegistry::new();
    let r = recorder.clone();
    registry.register_command_async::<PlaceOrder, _, _>(move || AsyncPlaceOrderHandler {
        recorder: r.clone(),
    });

    let processor = CommandProcessor::new(registry);
    let outcome = processor
        .send_async(&mut PlaceOrder::new("order-1", "sku-1"))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(recorder.entries(), vec!["placed:sku-1"]);
}

struct AsyncSubscriber {
    recorder: Recorder,
    fail: bool,
}

#[async_trait]
impl HandlerAsync<OrderPlaced> for AsyncSubscriber {
    async fn handle(
        &mut self,
        request: &mut OrderPlaced,
        _ctx: &mut RequestContext,
        _next: NextAsync<'_, OrderPlaced>,
    ) -> HandlerResult {
        self.recorder.record(request.id.clone());
        if self.fail {
            Err(DispatchError::Validation("projection rejected".into()))
        } else {
            Ok(HandlerOutcome::Success)
        }
    }
}

#[tokio::test]
async fn publish_async_runs_all_subscribers_and_aggregates_failures() {
    let recorder = Recorder::new();
    let mut registry = SubscriberRegistry::new();

    for fail in [false, true, false] {
        let r = recorder.clone();
        registry.register_event_async::<OrderPlaced, _, _>(move || AsyncSubscriber {
            recorder: r.clone(),
            fail,
        });
    }

    let processor = CommandProcessor::new(registry);
    let err = processor
        .publish_async(&mut OrderPlaced::new("order-1", "sku-1"))
        .await
        .unwrap_err();

    assert_eq!(recorder.len(), 3);
    match err {
        DispatchError::Aggregate(failures) => assert_eq!(failures.len(), 1),
        other => panic!("expected aggregate, got {:?}", other),
    }
}

struct AcceptingHandler;

impl Handler<PlaceOrder> for AcceptingHandler {
    fn handle(
        &mut self,
        request: &mut PlaceOrder,
        ctx: &mut RequestContext,
        next: Next<'_, PlaceOrder>,
    ) -> HandlerResult {
        next.invoke(request, ctx)
    }
}

#[test]
fn sync_and_async_registrations_are_independent() {
    let mut registry = SubscriberRegistry::new();
    registry.register_command::<PlaceOrder, _, _>(|| AcceptingHandler);

    let processor = CommandProcessor::new(registry);
    // No async registration exists for this command.
    let rt = tokio::runtime::Runtime::new().unwrap();
    let err = rt
        .block_on(processor.send_async(&mut PlaceOrder::new("order-1", "sku-1")))
        .unwrap_err();
    assert!(err.is_configuration());
}
