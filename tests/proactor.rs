mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use courier_rust::{
    ChannelAsync, CommandProcessor, HandlerAsync, HandlerOutcome, HandlerResult, InMemoryChannel,
    NextAsync, Proactor, PumpExit, RequestContext, SubscriberRegistry, Subscription,
};
use support::{order_message, PlaceOrder, PlaceOrderMapper, Recorder};

fn subscription() -> Subscription {
    Subscription::new("orders", "orders.queue", support::ORDERS_TOPIC)
        .with_timeout(Duration::from_millis(50))
        .with_empty_channel_delay(Duration::from_millis(2))
        .with_channel_failure_delay(Duration::from_millis(2))
}

struct AcceptingHandler {
    recorder: Recorder,
}

#[async_trait]
impl HandlerAsync<PlaceOrder> for AcceptingHandler {
    async fn handle(
        &mut self,
        request: &mut PlaceOrder,
        ctx: &mut RequestContext,
        next: NextAsync<'_, PlaceOrder>,
    ) -> HandlerResult {
        assert!(ctx.originating_message.is_some());
        self.recorder.record(request.sku.clone());
        next.invoke(request, ctx).await
    }
}

struct DeferringHandler {
    attempts: Arc<Mutex<u32>>,
}

#[async_trait]
impl HandlerAsync<PlaceOrder> for DeferringHandler {
    async fn handle(
        &mut self,
        _request: &mut PlaceOrder,
        _ctx: &mut RequestContext,
        _next: NextAsync<'_, PlaceOrder>,
    ) -> HandlerResult {
        *self.attempts.lock().unwrap() += 1;
        Ok(HandlerOutcome::Defer)
    }
}

fn proactor(
    subscription: Subscription,
    channel: &InMemoryChannel,
    registry: SubscriberRegistry,
    token: CancellationToken,
) -> Proactor<PlaceOrder> {
    Proactor::new(
        subscription,
        Arc::new(channel.clone()) as Arc<dyn ChannelAsync>,
        Arc::new(CommandProcessor::new(registry)),
        Arc::new(PlaceOrderMapper),
        token,
    )
}

async fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let result = timeout(deadline, async {
        loop {
            if check() {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    result.is_ok()
}

#[tokio::test(flavor = "multi_thread")]
async fn dispatches_commands_through_async_handlers() {
    let recorder = Recorder::new();
    let mut registry = SubscriberRegistry::new();
    let r = recorder.clone();
    registry.register_command_async::<PlaceOrder, _, _>(move || AcceptingHandler {
        recorder: r.clone(),
    });

    let channel = InMemoryChannel::new("orders");
    channel.enqueue(order_message("order-1", "sku-1")).unwrap();

    let pump = proactor(subscription(), &channel, registry, CancellationToken::new());
    let task = tokio::spawn(async move { pump.run().await });

    assert!(wait_until(Duration::from_secs(3), || channel.acked().len() == 1).await);

    ChannelAsync::stop(&channel).await.unwrap();
    let exit = timeout(Duration::from_secs(3), task).await.unwrap().unwrap();
    assert!(matches!(exit, PumpExit::Quit));
    assert_eq!(recorder.entries(), vec!["sku-1"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn deferral_respects_the_requeue_budget() {
    let attempts = Arc::new(Mutex::new(0));
    let mut registry = SubscriberRegistry::new();
    let a = Arc::clone(&attempts);
    registry.register_command_async::<PlaceOrder, _, _>(move || DeferringHandler {
        attempts: Arc::clone(&a),
    });

    let channel = InMemoryChannel::new("orders");
    channel.enqueue(order_message("order-1", "sku-1")).unwrap();

    let pump = proactor(
        subscription().with_requeue_count(2),
        &channel,
        registry,
        CancellationToken::new(),
    );
    let task = tokio::spawn(async move { pump.run().await });

    assert!(wait_until(Duration::from_secs(3), || channel.rejected().len() == 1).await);

    ChannelAsync::stop(&channel).await.unwrap();
    timeout(Duration::from_secs(3), task).await.unwrap().unwrap();

    // requeue_count = 2: three attempts, then reject.
    assert_eq!(*attempts.lock().unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_stops_the_pump_between_messages() {
    let mut registry = SubscriberRegistry::new();
    registry.register_command_async::<PlaceOrder, _, _>(|| AcceptingHandler {
        recorder: Recorder::new(),
    });

    let channel = InMemoryChannel::new("orders");
    let token = CancellationToken::new();
    let pump = proactor(subscription(), &channel, registry, token.clone());
    let task = tokio::spawn(async move { pump.run().await });

    sleep(Duration::from_millis(30)).await;
    token.cancel();

    let exit = timeout(Duration::from_secs(3), task).await.unwrap().unwrap();
    assert!(matches!(exit, PumpExit::Cancelled));
}
