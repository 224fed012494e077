//! Assembles and caches handler chains per request type.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::context::RequestContext;
use crate::error::ConfigurationError;
use crate::request::Request;

use super::handler::{Handler, HandlerAsync, HandlerResult, Next, NextAsync};
use super::registry::{
    Descriptor, HandlerFactoryFn, HandlerFactoryFnAsync, Registration, RegistrationKind,
    SubscriberRegistry,
};
use super::HandlerTiming;

/// An assembled chain plan: factories in invocation order, one chain per
/// terminal handler. Plans are cached; handler instances are not.
struct Plan<F> {
    kind: RegistrationKind,
    chains: Vec<Vec<F>>,
}

fn assemble<F: Clone>(
    registration: &Registration<F>,
    request_type: &str,
) -> Result<Plan<F>, ConfigurationError> {
    let kind = registration
        .kind
        .ok_or_else(|| ConfigurationError::MissingHandler(request_type.to_string()))?;

    let mut befores: Vec<&Descriptor<F>> = registration
        .decorators
        .iter()
        .filter(|d| d.timing == HandlerTiming::Before)
        .collect();
    befores.sort_by_key(|d| d.step);

    let mut afters: Vec<&Descriptor<F>> = registration
        .decorators
        .iter()
        .filter(|d| d.timing == HandlerTiming::After)
        .collect();
    afters.sort_by_key(|d| d.step);

    let chains = registration
        .terminals
        .iter()
        .map(|terminal| {
            let mut chain = Vec::with_capacity(befores.len() + 1 + afters.len());
            chain.extend(befores.iter().map(|d| d.factory.clone()));
            chain.push(terminal.clone());
            chain.extend(afters.iter().map(|d| d.factory.clone()));
            chain
        })
        .collect();

    Ok(Plan { kind, chains })
}

/// Builds pipelines from the subscriber registry.
///
/// The chain *plan* (ordering of factories) is computed once per request
/// type and cached; every dispatch still gets fresh handler instances from
/// the factories. `clear_cache` drops all plans so tests can re-register and
/// rebuild deterministically.
pub struct PipelineBuilder {
    registry: SubscriberRegistry,
    plans: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    plans_async: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl PipelineBuilder {
    pub fn new(registry: SubscriberRegistry) -> Self {
        Self {
            registry,
            plans: Mutex::new(HashMap::new()),
            plans_async: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every cached chain plan.
    pub fn clear_cache(&self) {
        self.plans.lock().unwrap().clear();
        self.plans_async.lock().unwrap().clear();
    }

    /// Build the single pipeline for a command type.
    ///
    /// Fails with a `ConfigurationError` when the type has no registration,
    /// is registered as an event, or has more than one terminal handler -
    /// all before any handler instance is created.
    pub fn command_chain<R: Request>(&self) -> Result<Pipeline<R>, ConfigurationError> {
        let plan = self
            .plan::<R>()?
            .ok_or_else(|| ConfigurationError::MissingHandler(type_name::<R>().to_string()))?;

        if plan.kind != RegistrationKind::Command {
            return Err(ConfigurationError::WrongRegistrationKind {
                request_type: type_name::<R>().to_string(),
                expected: "a command",
            });
        }
        if plan.chains.len() != 1 {
            return Err(ConfigurationError::AmbiguousCommandHandler {
                request_type: type_name::<R>().to_string(),
                count: plan.chains.len(),
            });
        }

        Ok(Pipeline {
            handlers: plan.chains[0].iter().map(|f| f()).collect(),
        })
    }

    /// Build every pipeline for an event type.
    ///
    /// An event type with no registration yields no pipelines: publishing an
    /// event nobody subscribes to is a no-op, not an error.
    pub fn event_chains<R: Request>(&self) -> Result<Vec<Pipeline<R>>, ConfigurationError> {
        match self.plan::<R>()? {
            None => Ok(Vec::new()),
            Some(plan) => {
                if plan.kind != RegistrationKind::Event {
                    return Err(ConfigurationError::WrongRegistrationKind {
                        request_type: type_name::<R>().to_string(),
                        expected: "an event",
                    });
                }
                Ok(plan
                    .chains
                    .iter()
                    .map(|chain| Pipeline {
                        handlers: chain.iter().map(|f| f()).collect(),
                    })
                    .collect())
            }
        }
    }

    /// Async mirror of [`command_chain`](Self::command_chain).
    pub fn command_chain_async<R: Request>(&self) -> Result<PipelineAsync<R>, ConfigurationError> {
        let plan = self
            .plan_async::<R>()?
            .ok_or_else(|| ConfigurationError::MissingHandler(type_name::<R>().to_string()))?;

        if plan.kind != RegistrationKind::Command {
            return Err(ConfigurationError::WrongRegistrationKind {
                request_type: type_name::<R>().to_string(),
                expected: "a command",
            });
        }
        if plan.chains.len() != 1 {
            return Err(ConfigurationError::AmbiguousCommandHandler {
                request_type: type_name::<R>().to_string(),
                count: plan.chains.len(),
            });
        }

        Ok(PipelineAsync {
            handlers: plan.chains[0].iter().map(|f| f()).collect(),
        })
    }

    /// Async mirror of [`event_chains`](Self::event_chains).
    pub fn event_chains_async<R: Request>(
        &self,
    ) -> Result<Vec<PipelineAsync<R>>, ConfigurationError> {
        match self.plan_async::<R>()? {
            None => Ok(Vec::new()),
            Some(plan) => {
                if plan.kind != RegistrationKind::Event {
                    return Err(ConfigurationError::WrongRegistrationKind {
                        request_type: type_name::<R>().to_string(),
                        expected: "an event",
                    });
                }
                Ok(plan
                    .chains
                    .iter()
                    .map(|chain| PipelineAsync {
                        handlers: chain.iter().map(|f| f()).collect(),
                    })
                    .collect())
            }
        }
    }

    fn plan<R: Request>(
        &self,
    ) -> Result<Option<Arc<Plan<HandlerFactoryFn<R>>>>, ConfigurationError> {
        let mut cache = self.plans.lock().unwrap();
        if let Some(any) = cache.get(&TypeId::of::<R>()) {
            let plan = any
                .downcast_ref::<Arc<Plan<HandlerFactoryFn<R>>>>()
                .expect("pipeline plan stored under the wrong request type");
            return Ok(Some(plan.clone()));
        }

        let Some(entry) = self.registry.entry::<R>() else {
            return Ok(None);
        };
        let plan = Arc::new(assemble(entry, type_name::<R>())?);
        cache.insert(TypeId::of::<R>(), Box::new(plan.clone()));
        Ok(Some(plan))
    }

    fn plan_async<R: Request>(
        &self,
    ) -> Result<Option<Arc<Plan<HandlerFactoryFnAsync<R>>>>, ConfigurationError> {
        let mut cache = self.plans_async.lock().unwrap();
        if let Some(any) = cache.get(&TypeId::of::<R>()) {
            let plan = any
                .downcast_ref::<Arc<Plan<HandlerFactoryFnAsync<R>>>>()
                .expect("pipeline plan stored under the wrong request type");
            return Ok(Some(plan.clone()));
        }

        let Some(entry) = self.registry.entry_async::<R>() else {
            return Ok(None);
        };
        let plan = Arc::new(assemble(entry, type_name::<R>())?);
        cache.insert(TypeId::of::<R>(), Box::new(plan.clone()));
        Ok(Some(plan))
    }
}

/// A ready-to-run chain of fresh handler instances.
pub struct Pipeline<R: Request> {
    handlers: Vec<Box<dyn Handler<R>>>,
}

impl<R: Request> std::fmt::Debug for Pipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<R: Request> Pipeline<R> {
    /// Run the chain from the first handler.
    pub fn invoke(&mut self, request: &mut R, ctx: &mut RequestContext) -> HandlerResult {
        Next::new(&mut self.handlers).invoke(request, ctx)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// A ready-to-run chain of fresh async handler instances.
pub struct PipelineAsync<R: Request> {
    handlers: Vec<Box<dyn HandlerAsync<R>>>,
}

impl<R: Request> PipelineAsync<R> {
    /// Run the chain from the first handler.
    pub async fn invoke(&mut self, request: &mut R, ctx: &mut RequestContext) -> HandlerResult {
        NextAsync::new(&mut self.handlers).invoke(request, ctx).await
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
