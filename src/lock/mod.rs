//! Distributed locking for singleton background work.

mod distributed;
mod error;
mod in_memory;

pub use distributed::DistributedLock;
pub use error::LockError;
pub use in_memory::InMemoryDistributedLock;
