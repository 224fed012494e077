mod support;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use courier_rust::{
    CommandProcessor, ConsumerState, Dispatcher, DispatcherState, Handler, HandlerResult,
    InMemoryChannel, InMemoryOutbox, InMemoryProducer, MapperRegistry, Next,
    OutboxProducerMediator, ProducerRegistry, PumpKind, RequestContext, SubscriberRegistry,
    Subscription,
};
use support::{order_message, PlaceOrder, PlaceOrderMapper, Recorder, ORDERS_TOPIC};

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

struct AcceptingHandler {
    recorder: Recorder,
}

impl Handler<PlaceOrder> for AcceptingHandler {
    fn handle(
        &mut self,
        request: &mut PlaceOrder,
        ctx: &mut RequestContext,
        next: Next<'_, PlaceOrder>,
    ) -> HandlerResult {
        self.recorder.record(request.sku.clone());
        next.invoke(request, ctx)
    }
}

fn registry_recording_to(recorder: &Recorder) -> SubscriberRegistry {
    let mut registry = SubscriberRegistry::new();
    let r = recorder.clone();
    registry.register_command::<PlaceOrder, _, _>(move || AcceptingHandler { recorder: r.clone() });
    registry
}

fn fast_subscription(name: &str) -> Subscription {
    Subscription::new(name, format!("{}.queue", name), ORDERS_TOPIC)
        .with_timeout(Duration::from_millis(50))
        .with_empty_channel_delay(Duration::from_millis(2))
}

#[test]
fn receive_starts_consumers_and_end_stops_them() {
    let recorder = Recorder::new();
    let processor = Arc::new(CommandProcessor::new(registry_recording_to(&recorder)));
    let channel = InMemoryChannel::new("orders");

    let mut dispatcher = Dispatcher::new(processor).unwrap();
    dispatcher.add_subscription::<PlaceOrder, _>(
        fast_subscription("orders").with_performer_count(2),
        channel.clone(),
        Arc::new(PlaceOrderMapper),
    );

    assert_eq!(dispatcher.state(), DispatcherState::Awaiting);

    dispatcher.receive();
    assert!(wait_until(Duration::from_secs(3), || {
        dispatcher.state() == DispatcherState::Running
    }));
    assert_eq!(dispatcher.consumer_states().len(), 2);

    channel.enqueue(order_message("order-1", "sku-1")).unwrap();
    assert!(wait_until(Duration::from_secs(3), || recorder.len() == 1));

    dispatcher.end();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert!(dispatcher
        .consumer_states()
        .iter()
        .all(|(_, s)| *s == ConsumerState::Stopped));
}

#[test]
fn shut_and_open_target_a_single_subscription() {
    let recorder = Recorder::new();
    let processor = Arc::new(CommandProcessor::new(registry_recording_to(&recorder)));
    let orders = InMemoryChannel::new("orders");
    let returns = InMemoryChannel::new("returns");

    let mut dispatcher = Dispatcher::new(processor).unwrap();
    dispatcher.add_subscription::<PlaceOrder, _>(
        fast_subscription("orders"),
        orders.clone(),
        Arc::new(PlaceOrderMapper),
    );
    dispatcher.add_subscription::<PlaceOrder, _>(
        fast_subscription("returns"),
        returns.clone(),
        Arc::new(PlaceOrderMapper),
    );

    dispatcher.receive();
    assert!(wait_until(Duration::from_secs(3), || {
        dispatcher.state() == DispatcherState::Running
    }));

    dispatcher.shut("returns");
    let states = dispatcher.consumer_states();
    assert!(states
        .iter()
        .any(|(name, s)| name.starts_with("returns") && *s == ConsumerState::Stopped));
    assert!(states
        .iter()
        .any(|(name, s)| name.starts_with("orders") && *s == ConsumerState::Running));

    // The surviving subscription still consumes.
    orders.enqueue(order_message("order-1", "sku-1")).unwrap();
    assert!(wait_until(Duration::from_secs(3), || recorder.len() == 1));

    dispatcher.open("returns");
    assert!(wait_until(Duration::from_secs(3), || {
        dispatcher
            .consumer_states()
            .iter()
            .filter(|(name, s)| name.starts_with("returns") && *s == ConsumerState::Running)
            .count()
            == 1
    }));

    returns.enqueue(order_message("order-2", "sku-2")).unwrap();
    assert!(wait_until(Duration::from_secs(3), || recorder.len() == 2));

    dispatcher.end();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
}

#[test]
fn proactor_subscriptions_run_on_the_dispatcher_runtime() {
    let recorder = Recorder::new();
    let processor = {
        let mut registry = SubscriberRegistry::new();
        let r = recorder.clone();
        registry.register_command_async::<PlaceOrder, _, _>(move || AsyncAcceptingHandler {
            recorder: r.clone(),
        });
        Arc::new(CommandProcessor::new(registry))
    };
    let channel = InMemoryChannel::new("orders");

    let mut dispatcher = Dispatcher::new(processor).unwrap();
    dispatcher.add_subscription::<PlaceOrder, _>(
        fast_subscription("orders").with_pump_kind(PumpKind::Proactor),
        channel.clone(),
        Arc::new(PlaceOrderMapper),
    );

    dispatcher.receive();
    channel.enqueue(order_message("order-1", "sku-1")).unwrap();
    assert!(wait_until(Duration::from_secs(3), || recorder.len() == 1));

    dispatcher.end();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
}

struct AsyncAcceptingHandler {
    recorder: Recorder,
}

#[async_trait::async_trait]
impl courier_rust::HandlerAsync<PlaceOrder> for AsyncAcceptingHandler {
    async fn handle(
        &mut self,
        request: &mut PlaceOrder,
        ctx: &mut RequestContext,
        next: courier_rust::NextAsync<'_, PlaceOrder>,
    ) -> HandlerResult {
        self.recorder.record(request.sku.clone());
        next.invoke(request, ctx).await
    }
}

/// End-to-end: post through the outbox to a broker double, then feed the
/// broker's log into a consuming channel and dispatch it.
#[test]
fn posted_messages_round_trip_to_a_consuming_handler() {
    // producing side
    let producer = InMemoryProducer::new();
    let outbox = InMemoryOutbox::new();
    let mut producers = ProducerRegistry::new();
    producers.register(ORDERS_TOPIC, Arc::new(producer.clone()));
    let mediator = Arc::new(OutboxProducerMediator::new(
        Arc::new(outbox),
        Arc::new(producers),
    ));
    let mut mappers = MapperRegistry::new();
    mappers.register::<PlaceOrder, _>(PlaceOrderMapper);
    let posting = CommandProcessor::new(SubscriberRegistry::new())
        .with_mappers(Arc::new(mappers))
        .with_mediator(mediator);

    posting.post(&PlaceOrder::new("order-1", "sku-42")).unwrap();

    // consuming side
    let recorder = Recorder::new();
    let processor = Arc::new(CommandProcessor::new(registry_recording_to(&recorder)));
    let channel = InMemoryChannel::new("orders");
    let mut dispatcher = Dispatcher::new(processor).unwrap();
    dispatcher.add_subscription::<PlaceOrder, _>(
        fast_subscription("orders"),
        channel.clone(),
        Arc::new(PlaceOrderMapper),
    );
    dispatcher.receive();

    // the "broker": everything the producer accepted arrives on the channel
    for message in producer.sent() {
        channel.enqueue(message).unwrap();
    }

    assert!(wait_until(Duration::from_secs(3), || recorder.len() == 1));
    assert_eq!(recorder.entries(), vec!["sku-42"]);

    dispatcher.end();
}
