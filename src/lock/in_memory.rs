use std::collections::HashMap;
use std::sync::Mutex;

use crate::request::new_request_id;

use super::{DistributedLock, LockError};

/// In-memory lock backed by a `HashMap<String, String>` of resource → token.
///
/// The default implementation for tests and single-process deployments:
/// "distributed" collapses to a process-wide map, but the token contract is
/// the same one a Redis- or Postgres-backed implementation would honor.
pub struct InMemoryDistributedLock {
    held: Mutex<HashMap<String, String>>,
}

impl InMemoryDistributedLock {
    pub fn new() -> Self {
        InMemoryDistributedLock {
            held: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_held(&self, resource: &str) -> bool {
        self.held.lock().unwrap().contains_key(resource)
    }
}

impl Default for InMemoryDistributedLock {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributedLock for InMemoryDistributedLock {
    fn obtain_lock(&self, resource: &str) -> Result<Option<String>, LockError> {
        let mut held = self
            .held
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        if held.contains_key(resource) {
            return Ok(None);
        }
        let token = new_request_id();
        held.insert(resource.to_string(), token.clone());
        Ok(Some(token))
    }

    fn release_lock(&self, resource: &str, token: &str) -> Result<(), LockError> {
        let mut held = self
            .held
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        match held.get(resource) {
            Some(current) if current == token => {
                held.remove(resource);
                Ok(())
            }
            Some(_) => Err(LockError::ReleaseFailed(format!(
                "resource '{}' is held under a different token",
                resource
            ))),
            None => Err(LockError::ReleaseFailed(format!(
                "resource '{}' is not held",
                resource
            ))),
        }
    }
}
