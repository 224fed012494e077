mod channel;
mod context;
mod dispatcher;
mod error;
mod lock;
mod message;
mod outbox;
mod pipeline;
mod policy;
mod processor;
mod producer;
mod pump;
mod request;
mod subscription;

pub use channel::{Channel, ChannelAsync, ChannelError, InMemoryChannel};
pub use context::RequestContext;
pub use dispatcher::{ConsumerState, Dispatcher, DispatcherState};
pub use error::{ConfigurationError, DispatchError};
pub use lock::{DistributedLock, InMemoryDistributedLock, LockError};
pub use message::{
    Body, MapperRegistry, MappingError, Message, MessageHeader, MessageMapper, MessageType,
};
pub use outbox::{
    CircuitBreaker, ClearReport, InMemoryCircuitBreaker, InMemoryOutbox, Outbox, OutboxError,
    OutboxProducerMediator, OutboxRecord, OutboxSweeper, SweeperConfig, SweeperStats,
};
pub use pipeline::{
    Handler, HandlerAsync, HandlerOutcome, HandlerResult, HandlerTiming, Next, NextAsync,
    Pipeline, PipelineAsync, PipelineBuilder, SubscriberRegistry,
};
pub use policy::RetryPolicy;
pub use processor::CommandProcessor;
pub use producer::{InMemoryProducer, Producer, ProducerError, ProducerRegistry};
pub use pump::{Proactor, PumpExit, Reactor};
pub use request::{new_request_id, Request};
pub use subscription::{PumpKind, Subscription};
