//! Dispatch error taxonomy.
//!
//! Configuration problems surface when a pipeline is built, never mid-flight.
//! Everything a handler can fail with at dispatch time is a `DispatchError`;
//! deferral is *not* an error; handlers signal it through
//! `HandlerOutcome::Defer`.

use std::error::Error;
use std::fmt;

/// Error for bad or missing registrations.
///
/// Raised while assembling a pipeline, before any handler executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No handler registered for the request type.
    MissingHandler(String),
    /// A command must have exactly one terminal handler.
    AmbiguousCommandHandler { request_type: String, count: usize },
    /// A command registration was dispatched as an event, or vice versa.
    WrongRegistrationKind {
        request_type: String,
        expected: &'static str,
    },
    /// No message mapper registered for the request type.
    MissingMapper(String),
    /// The processor has no outbox mediator but was asked to post.
    MissingOutbox,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingHandler(t) => {
                write!(f, "no handler registered for request type {}", t)
            }
            ConfigurationError::AmbiguousCommandHandler {
                request_type,
                count,
            } => write!(
                f,
                "command {} must have exactly one handler, found {}",
                request_type, count
            ),
            ConfigurationError::WrongRegistrationKind {
                request_type,
                expected,
            } => write!(
                f,
                "request type {} is not registered as {}",
                request_type, expected
            ),
            ConfigurationError::MissingMapper(t) => {
                write!(f, "no message mapper registered for request type {}", t)
            }
            ConfigurationError::MissingOutbox => {
                write!(f, "command processor has no outbox mediator configured")
            }
        }
    }
}

impl Error for ConfigurationError {}

/// Error raised while dispatching a request through a pipeline.
#[derive(Debug)]
pub enum DispatchError {
    /// Bad or missing registration discovered at pipeline build.
    Configuration(ConfigurationError),
    /// Malformed request content; never worth retrying.
    Validation(String),
    /// Network/storage style fault; safe to retry or requeue.
    Transient(String),
    /// A handler failed with its own error type.
    Handler(Box<dyn Error + Send + Sync>),
    /// Several pipelines failed during a publish; holds every failure.
    Aggregate(Vec<DispatchError>),
}

impl DispatchError {
    /// Wrap an arbitrary handler error.
    pub fn handler(err: impl Error + Send + Sync + 'static) -> Self {
        DispatchError::Handler(Box::new(err))
    }

    /// Whether a retry or requeue could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Transient(_) => true,
            DispatchError::Aggregate(errors) => errors.iter().any(|e| e.is_transient()),
            _ => false,
        }
    }

    /// Whether the failure stems from a registration problem.
    pub fn is_configuration(&self) -> bool {
        match self {
            DispatchError::Configuration(_) => true,
            DispatchError::Aggregate(errors) => errors.iter().any(|e| e.is_configuration()),
            _ => false,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Configuration(e) => write!(f, "configuration error: {}", e),
            DispatchError::Validation(msg) => write!(f, "validation failed: {}", msg),
            DispatchError::Transient(msg) => write!(f, "transient failure: {}", msg),
            DispatchError::Handler(e) => write!(f, "handler failed: {}", e),
            DispatchError::Aggregate(errors) => {
                write!(f, "{} handler(s) failed during publish: ", errors.len())?;
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DispatchError::Configuration(e) => Some(e),
            DispatchError::Handler(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for DispatchError {
    fn from(err: ConfigurationError) -> Self {
        DispatchError::Configuration(err)
    }
}
