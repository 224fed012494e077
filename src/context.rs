//! Per-dispatch request context.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::message::MessageHeader;

/// Ephemeral state that rides along with one dispatch.
///
/// Created when a request enters the processor (or when a pump starts
/// servicing a message) and dropped when the dispatch ends. Never persisted.
pub struct RequestContext {
    /// Tracing span covering this dispatch.
    pub span: Span,
    /// Free-form values handlers may stash for handlers later in the chain.
    pub bag: HashMap<String, serde_json::Value>,
    /// Header of the broker message this dispatch originated from, if any.
    pub originating_message: Option<MessageHeader>,
    /// Signals host shutdown through pump, handlers, and producer sends.
    pub cancellation: CancellationToken,
}

impl RequestContext {
    /// Create a context for an in-process dispatch.
    pub fn new() -> Self {
        Self {
            span: Span::current(),
            bag: HashMap::new(),
            originating_message: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Create a context tied to a host-level cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            span: Span::current(),
            bag: HashMap::new(),
            originating_message: None,
            cancellation,
        }
    }

    /// Attach the header of the broker message that triggered this dispatch.
    pub fn with_originating_message(mut self, header: MessageHeader) -> Self {
        self.originating_message = Some(header);
        self
    }

    /// Whether the host has asked for shutdown.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
