use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::message::Message;

use super::{Channel, ChannelAsync, ChannelError};

#[derive(Default)]
struct Inner {
    queue: VecDeque<Message>,
    acked: Vec<String>,
    rejected: Vec<String>,
    fail_next_receive: u32,
}

/// In-memory channel backed by `Mutex` + `Condvar`.
///
/// Cloning shares the queue, so a test can enqueue on one handle while a
/// pump consumes through another. Implements both [`Channel`] (blocking
/// receive on the condvar) and [`ChannelAsync`] (poll with a short async
/// sleep). Acknowledged and rejected ids are recorded for inspection.
#[derive(Clone)]
pub struct InMemoryChannel {
    name: String,
    capacity: Option<usize>,
    inner: Arc<(Mutex<Inner>, Condvar)>,
}

impl InMemoryChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: None,
            inner: Arc::new((Mutex::new(Inner::default()), Condvar::new())),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Put a message on the queue, as a broker delivery would.
    pub fn enqueue(&self, message: Message) -> Result<(), ChannelError> {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock
            .lock()
            .map_err(|e| ChannelError::Poisoned(e.to_string()))?;
        if let Some(capacity) = self.capacity {
            if inner.queue.len() >= capacity {
                return Err(ChannelError::Full(self.name.clone()));
            }
        }
        inner.queue.push_back(message);
        cvar.notify_one();
        Ok(())
    }

    /// Make the next `count` receives fail, simulating a broken transport.
    pub fn fail_next_receive(&self, count: u32) {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap().fail_next_receive = count;
    }

    /// Ids acknowledged so far.
    pub fn acked(&self) -> Vec<String> {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap().acked.clone()
    }

    /// Ids rejected so far.
    pub fn rejected(&self) -> Vec<String> {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap().rejected.clone()
    }

    pub fn len(&self) -> usize {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_scripted_failure(inner: &mut Inner) -> Result<(), ChannelError> {
        if inner.fail_next_receive > 0 {
            inner.fail_next_receive -= 1;
            return Err(ChannelError::Transport("scripted receive failure".into()));
        }
        Ok(())
    }

    fn ack_sync(&self, message: &Message) -> Result<(), ChannelError> {
        let (lock, _) = &*self.inner;
        lock.lock()
            .map_err(|e| ChannelError::Poisoned(e.to_string()))?
            .acked
            .push(message.id().to_string());
        Ok(())
    }

    fn reject_sync(&self, message: &Message) -> Result<(), ChannelError> {
        let (lock, _) = &*self.inner;
        lock.lock()
            .map_err(|e| ChannelError::Poisoned(e.to_string()))?
            .rejected
            .push(message.id().to_string());
        Ok(())
    }

    fn requeue_sync(&self, message: Message, delay: Duration) -> Result<bool, ChannelError> {
        if delay.is_zero() {
            self.enqueue(message)?;
            return Ok(true);
        }
        // Timer thread: re-enqueue after the delay without holding the pump.
        let channel = self.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            if let Err(err) = channel.enqueue(message) {
                tracing::warn!(channel = %channel.name, error = %err, "delayed requeue dropped");
            }
        });
        Ok(true)
    }

    fn purge_sync(&self) -> Result<(), ChannelError> {
        let (lock, _) = &*self.inner;
        lock.lock()
            .map_err(|e| ChannelError::Poisoned(e.to_string()))?
            .queue
            .clear();
        Ok(())
    }

    fn stop_sync(&self) -> Result<(), ChannelError> {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock
            .lock()
            .map_err(|e| ChannelError::Poisoned(e.to_string()))?;
        // Control message bypasses the capacity check; a full channel must
        // still be stoppable.
        inner.queue.push_back(Message::quit());
        cvar.notify_all();
        Ok(())
    }
}

impl Channel for InMemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&self, timeout: Duration) -> Result<Option<Message>, ChannelError> {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock
            .lock()
            .map_err(|e| ChannelError::Poisoned(e.to_string()))?;
        Self::take_scripted_failure(&mut inner)?;

        let deadline = Instant::now() + timeout;
        while inner.queue.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _timed_out) = cvar
                .wait_timeout(inner, deadline - now)
                .map_err(|e| ChannelError::Poisoned(e.to_string()))?;
            inner = guard;
        }
        Ok(inner.queue.pop_front())
    }

    fn acknowledge(&self, message: &Message) -> Result<(), ChannelError> {
        self.ack_sync(message)
    }

    fn reject(&self, message: &Message) -> Result<(), ChannelError> {
        self.reject_sync(message)
    }

    fn requeue(&self, message: Message, delay: Duration) -> Result<bool, ChannelError> {
        self.requeue_sync(message, delay)
    }

    fn purge(&self) -> Result<(), ChannelError> {
        self.purge_sync()
    }

    fn stop(&self) -> Result<(), ChannelError> {
        self.stop_sync()
    }
}

#[async_trait]
impl ChannelAsync for InMemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(&self, timeout: Duration) -> Result<Option<Message>, ChannelError> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let (lock, _) = &*self.inner;
                let mut inner = lock
                    .lock()
                    .map_err(|e| ChannelError::Poisoned(e.to_string()))?;
                Self::take_scripted_failure(&mut inner)?;
                if let Some(message) = inner.queue.pop_front() {
                    return Ok(Some(message));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn acknowledge(&self, message: &Message) -> Result<(), ChannelError> {
        self.ack_sync(message)
    }

    async fn reject(&self, message: &Message) -> Result<(), ChannelError> {
        self.reject_sync(message)
    }

    async fn requeue(&self, message: Message, delay: Duration) -> Result<bool, ChannelError> {
        self.requeue_sync(message, delay)
    }

    async fn purge(&self) -> Result<(), ChannelError> {
        self.purge_sync()
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        self.stop_sync()
    }
}
