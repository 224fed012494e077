//! Handler pipelines - ordered chains of handlers per request type.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    SubscriberRegistry                         │
//! │  request type → terminal handler factory                      │
//! │               + decorator descriptors {step, timing}          │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     PipelineBuilder                           │
//! │  Before handlers (step asc) → terminal → After (step asc)     │
//! │  plans cached per request type; clear_cache() for tests       │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Pipeline                               │
//! │  fresh handler instances per dispatch; each handler sees      │
//! │  handle(request, ctx, next) and decides whether to continue   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dispatch is explicit composition over an ordered handler sequence; a
//! handler that never calls `next.invoke(...)` short-circuits the rest of
//! the chain.

mod builder;
mod handler;
mod registry;

pub use builder::{Pipeline, PipelineAsync, PipelineBuilder};
pub use handler::{Handler, HandlerAsync, HandlerOutcome, HandlerResult, Next, NextAsync};
pub use registry::{HandlerTiming, SubscriberRegistry};
