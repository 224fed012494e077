//! Handler traits and the per-invocation outcome.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::request::Request;

/// What a handler decided about the request.
///
/// `Defer` means "not now, redeliver me later" - it is data, not an error,
/// so a pump can requeue without unwinding through error paths. `Reject`
/// marks the request permanently unprocessable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Success,
    Defer,
    Reject(String),
}

impl HandlerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, HandlerOutcome::Success)
    }

    pub fn is_defer(&self) -> bool {
        matches!(self, HandlerOutcome::Defer)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, HandlerOutcome::Reject(_))
    }

    /// Combine outcomes from several pipelines of one publish.
    ///
    /// Defer wins over Reject wins over Success, so a pump requeues if any
    /// handler asked for redelivery.
    pub(crate) fn merge(self, other: HandlerOutcome) -> HandlerOutcome {
        use HandlerOutcome::*;
        match (self, other) {
            (Defer, _) | (_, Defer) => Defer,
            (Reject(reason), _) => Reject(reason),
            (_, Reject(reason)) => Reject(reason),
            (Success, Success) => Success,
        }
    }
}

pub type HandlerResult = Result<HandlerOutcome, DispatchError>;

/// A synchronous handler in a pipeline.
///
/// Handler instances are created fresh for every dispatch and dropped
/// afterwards; they need not be reusable or thread-safe across dispatches.
///
/// ## Example
///
/// ```ignore
/// struct Audit;
///
/// impl Handler<PlaceOrder> for Audit {
///     fn handle(
///         &mut self,
///         request: &mut PlaceOrder,
///         ctx: &mut RequestContext,
///         next: Next<'_, PlaceOrder>,
///     ) -> HandlerResult {
///         ctx.bag.insert("audited".into(), serde_json::json!(true));
///         next.invoke(request, ctx)
///     }
/// }
/// ```
pub trait Handler<R: Request>: Send {
    fn handle(
        &mut self,
        request: &mut R,
        ctx: &mut RequestContext,
        next: Next<'_, R>,
    ) -> HandlerResult;
}

/// The remainder of a synchronous pipeline.
///
/// Consuming `self` in `invoke` means a handler can continue the chain at
/// most once per dispatch.
pub struct Next<'a, R: Request> {
    handlers: &'a mut [Box<dyn Handler<R>>],
}

impl<'a, R: Request> Next<'a, R> {
    pub(crate) fn new(handlers: &'a mut [Box<dyn Handler<R>>]) -> Self {
        Self { handlers }
    }

    /// Run the rest of the chain. An empty remainder succeeds.
    pub fn invoke(self, request: &mut R, ctx: &mut RequestContext) -> HandlerResult {
        match self.handlers.split_first_mut() {
            None => Ok(HandlerOutcome::Success),
            Some((head, rest)) => head.handle(request, ctx, Next::new(rest)),
        }
    }

    /// How many handlers remain after this point.
    pub fn remaining(&self) -> usize {
        self.handlers.len()
    }
}

/// An asynchronous handler in a pipeline. Mirrors [`Handler`].
#[async_trait]
pub trait HandlerAsync<R: Request>: Send {
    async fn handle(
        &mut self,
        request: &mut R,
        ctx: &mut RequestContext,
        next: NextAsync<'_, R>,
    ) -> HandlerResult;
}

/// The remainder of an asynchronous pipeline.
pub struct NextAsync<'a, R: Request> {
    handlers: &'a mut [Box<dyn HandlerAsync<R>>],
}

impl<'a, R: Request> NextAsync<'a, R> {
    pub(crate) fn new(handlers: &'a mut [Box<dyn HandlerAsync<R>>]) -> Self {
        Self { handlers }
    }

    /// Run the rest of the chain. An empty remainder succeeds.
    pub fn invoke<'b>(
        self,
        request: &'b mut R,
        ctx: &'b mut RequestContext,
    ) -> BoxFuture<'b, HandlerResult>
    where
        'a: 'b,
    {
        Box::pin(async move {
            match self.handlers.split_first_mut() {
                None => Ok(HandlerOutcome::Success),
                Some((head, rest)) => head.handle(request, ctx, NextAsync::new(rest)).await,
            }
        })
    }

    /// How many handlers remain after this point.
    pub fn remaining(&self) -> usize {
        self.handlers.len()
    }
}
