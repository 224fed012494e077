//! Static mapping from request types to handler registrations.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::request::Request;

use super::handler::{Handler, HandlerAsync};

/// Where a decorator sits relative to the terminal handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerTiming {
    Before,
    After,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RegistrationKind {
    Command,
    Event,
}

pub(crate) type HandlerFactoryFn<R> = Arc<dyn Fn() -> Box<dyn Handler<R>> + Send + Sync>;
pub(crate) type HandlerFactoryFnAsync<R> =
    Arc<dyn Fn() -> Box<dyn HandlerAsync<R>> + Send + Sync>;

/// A decorator declaration: ordering step, timing, and the factory that
/// yields a fresh instance per dispatch.
pub(crate) struct Descriptor<F> {
    pub step: i32,
    pub timing: HandlerTiming,
    pub factory: F,
}

pub(crate) struct Registration<F> {
    pub kind: Option<RegistrationKind>,
    pub terminals: Vec<F>,
    pub decorators: Vec<Descriptor<F>>,
}

impl<F> Registration<F> {
    fn empty() -> Self {
        Self {
            kind: None,
            terminals: Vec::new(),
            decorators: Vec::new(),
        }
    }
}

/// Registry of handlers keyed by request type.
///
/// Commands get exactly one terminal handler; events get zero or more. Each
/// registration supplies a factory so every dispatch works on a fresh
/// handler instance - instances are never shared across dispatches.
///
/// Sync and async registrations live side by side: the sync set feeds
/// `send`/`publish` (and the Reactor pump), the async set feeds
/// `send_async`/`publish_async` (and the Proactor pump).
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    entries_async: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            entries_async: HashMap::new(),
        }
    }

    /// Register the terminal handler for a command type.
    pub fn register_command<R, H, F>(&mut self, factory: F)
    where
        R: Request,
        H: Handler<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let entry = self.entry_mut::<R>();
        entry.kind.get_or_insert(RegistrationKind::Command);
        entry
            .terminals
            .push(Arc::new(move || Box::new(factory()) as Box<dyn Handler<R>>));
    }

    /// Register one of the terminal handlers for an event type.
    pub fn register_event<R, H, F>(&mut self, factory: F)
    where
        R: Request,
        H: Handler<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let entry = self.entry_mut::<R>();
        entry.kind.get_or_insert(RegistrationKind::Event);
        entry
            .terminals
            .push(Arc::new(move || Box::new(factory()) as Box<dyn Handler<R>>));
    }

    /// Add a decorator around every pipeline of a request type.
    ///
    /// Decorators with `HandlerTiming::Before` run ahead of the terminal
    /// handler in ascending `step` order; `After` decorators follow it, also
    /// ascending. Equal steps keep registration order.
    pub fn add_decorator<R, H, F>(&mut self, step: i32, timing: HandlerTiming, factory: F)
    where
        R: Request,
        H: Handler<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.entry_mut::<R>().decorators.push(Descriptor {
            step,
            timing,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Handler<R>>),
        });
    }

    /// Register the terminal async handler for a command type.
    pub fn register_command_async<R, H, F>(&mut self, factory: F)
    where
        R: Request,
        H: HandlerAsync<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let entry = self.entry_async_mut::<R>();
        entry.kind.get_or_insert(RegistrationKind::Command);
        entry
            .terminals
            .push(Arc::new(move || Box::new(factory()) as Box<dyn HandlerAsync<R>>));
    }

    /// Register one of the terminal async handlers for an event type.
    pub fn register_event_async<R, H, F>(&mut self, factory: F)
    where
        R: Request,
        H: HandlerAsync<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let entry = self.entry_async_mut::<R>();
        entry.kind.get_or_insert(RegistrationKind::Event);
        entry
            .terminals
            .push(Arc::new(move || Box::new(factory()) as Box<dyn HandlerAsync<R>>));
    }

    /// Add an async decorator around every async pipeline of a request type.
    pub fn add_decorator_async<R, H, F>(&mut self, step: i32, timing: HandlerTiming, factory: F)
    where
        R: Request,
        H: HandlerAsync<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.entry_async_mut::<R>().decorators.push(Descriptor {
            step,
            timing,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn HandlerAsync<R>>),
        });
    }

    pub(crate) fn entry<R: Request>(&self) -> Option<&Registration<HandlerFactoryFn<R>>> {
        self.entries
            .get(&TypeId::of::<R>())
            .and_then(|any| any.downcast_ref())
    }

    pub(crate) fn entry_async<R: Request>(
        &self,
    ) -> Option<&Registration<HandlerFactoryFnAsync<R>>> {
        self.entries_async
            .get(&TypeId::of::<R>())
            .and_then(|any| any.downcast_ref())
    }

    fn entry_mut<R: Request>(&mut self) -> &mut Registration<HandlerFactoryFn<R>> {
        self.entries
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Registration::<HandlerFactoryFn<R>>::empty()))
            .downcast_mut()
            .expect("registry entry stored under the wrong request type")
    }

    fn entry_async_mut<R: Request>(&mut self) -> &mut Registration<HandlerFactoryFnAsync<R>> {
        self.entries_async
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Registration::<HandlerFactoryFnAsync<R>>::empty()))
            .downcast_mut()
            .expect("registry entry stored under the wrong request type")
    }
}
