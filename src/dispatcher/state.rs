use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one consumer (one performer of one subscription).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerState {
    Awaiting,
    Running,
    Stopping,
    Stopped,
}

/// Aggregate lifecycle of the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatcherState {
    Awaiting,
    Running,
    Stopping,
    Stopped,
}

/// Atomic cell the pump writes and supervisors read while it runs.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ConsumerState::Awaiting as u8))
    }

    pub fn set(&self, state: ConsumerState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    pub fn get(&self) -> ConsumerState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConsumerState::Awaiting,
            1 => ConsumerState::Running,
            2 => ConsumerState::Stopping,
            _ => ConsumerState::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_round_trips_every_state() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ConsumerState::Awaiting);

        for state in [
            ConsumerState::Running,
            ConsumerState::Stopping,
            ConsumerState::Stopped,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }
}
