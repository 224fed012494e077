use std::fmt;

/// Error type for channel operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel is at capacity.
    Full(String),
    /// The underlying transport failed.
    Transport(String),
    /// The channel's lock was poisoned.
    Poisoned(String),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Full(name) => write!(f, "channel '{}' is full", name),
            ChannelError::Transport(msg) => write!(f, "channel transport error: {}", msg),
            ChannelError::Poisoned(msg) => write!(f, "channel poisoned: {}", msg),
        }
    }
}

impl std::error::Error for ChannelError {}
