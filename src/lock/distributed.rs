use super::LockError;

/// A non-blocking lock over a named resource, shared across processes.
///
/// Implementations might use Redis SET NX, Postgres advisory locks, etcd
/// leases, etc. The returned token proves ownership: release requires the
/// token handed out at acquisition, so a process cannot release a lock that
/// another holder re-acquired in the meantime.
pub trait DistributedLock: Send + Sync {
    /// Try to acquire the lock on `resource` without blocking.
    /// Returns `Ok(Some(token))` when acquired, `Ok(None)` when held elsewhere.
    fn obtain_lock(&self, resource: &str) -> Result<Option<String>, LockError>;

    /// Release the lock on `resource` using the token from `obtain_lock`.
    fn release_lock(&self, resource: &str, token: &str) -> Result<(), LockError>;
}
