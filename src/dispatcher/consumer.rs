use std::sync::Arc;
use std::thread::JoinHandle;

use tokio_util::sync::CancellationToken;

use crate::pump::PumpExit;

use super::state::{ConsumerState, StateCell};

pub(crate) enum ConsumerRunner {
    /// Reactor pump on a dedicated thread.
    Thread(JoinHandle<PumpExit>),
    /// Proactor pump as a task on the dispatcher runtime.
    Task(tokio::task::JoinHandle<PumpExit>),
}

/// One running pump under dispatcher supervision.
pub(crate) struct Consumer {
    pub name: String,
    pub subscription_name: String,
    pub state: Arc<StateCell>,
    pub cancellation: CancellationToken,
    /// Injects a `Quit` message so a pump blocked in receive wakes up.
    pub stopper: Box<dyn Fn() + Send + Sync>,
    pub runner: Option<ConsumerRunner>,
}

impl Consumer {
    pub fn state(&self) -> ConsumerState {
        self.state.get()
    }

    /// Stop the pump and wait for it to exit.
    ///
    /// Order matters: the quit message unblocks a pump sitting in a long
    /// receive, the cancellation covers a pump between messages.
    pub fn stop(&mut self, runtime: &tokio::runtime::Runtime) {
        if self.state() == ConsumerState::Stopped {
            return;
        }
        self.state.set(ConsumerState::Stopping);
        (self.stopper)();
        self.cancellation.cancel();

        let exit = match self.runner.take() {
            Some(ConsumerRunner::Thread(handle)) => handle.join().ok(),
            Some(ConsumerRunner::Task(handle)) => runtime.block_on(handle).ok(),
            None => None,
        };

        match exit {
            Some(exit) => {
                tracing::info!(consumer = %self.name, exit = ?exit, "consumer stopped")
            }
            None => tracing::warn!(consumer = %self.name, "consumer exited abnormally"),
        }
        self.state.set(ConsumerState::Stopped);
    }
}
