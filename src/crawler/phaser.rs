//! Completion barrier for one crawl depth
//!
//! A `Phaser` counts outstanding downloads and extractions. The controller
//! holds one permanent registration; every dispatched job holds a
//! [`PhaseTicket`] which arrives when it is consumed or dropped. When the
//! pending count reaches zero the controller is released and the phase
//! advances, leaving the barrier ready for the next depth.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug)]
struct PhaseState {
    phase: u64,
    pending: usize,
}

/// Phase-versioned pending-task counter with a single awaiting party
#[derive(Debug)]
pub struct Phaser {
    state: Mutex<PhaseState>,
    notify: Notify,
}

impl Phaser {
    /// Creates a barrier at phase 0 with the controller's own registration
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PhaseState {
                phase: 0,
                pending: 1,
            }),
            notify: Notify::new(),
        })
    }

    /// Registers one outstanding unit of work in the current phase
    pub fn register(self: &Arc<Self>) -> PhaseTicket {
        let phase = {
            let mut state = self.state.lock();
            state.pending += 1;
            state.phase
        };

        PhaseTicket {
            phaser: Arc::clone(self),
            phase,
        }
    }

    fn arrive(&self) {
        let drained = {
            let mut state = self.state.lock();
            state.pending = state.pending.saturating_sub(1);
            state.pending == 0
        };

        if drained {
            self.notify.notify_one();
        }
    }

    /// Arrives with the controller's registration and waits for the phase to drain
    ///
    /// Once every ticket of the phase has arrived, the phase number is
    /// advanced, the controller is re-registered for the next phase, and the
    /// new phase number is returned.
    pub async fn arrive_and_await_advance(&self) -> u64 {
        self.arrive();

        loop {
            let notified = self.notify.notified();

            {
                let mut state = self.state.lock();
                if state.pending == 0 {
                    state.phase += 1;
                    state.pending = 1;
                    return state.phase;
                }
            }

            notified.await;
        }
    }

    /// Returns the current phase number
    pub fn phase(&self) -> u64 {
        self.state.lock().phase
    }

    /// Returns the number of registered parties, the controller included
    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }
}

/// One registered unit of work; arrives on drop
#[derive(Debug)]
pub struct PhaseTicket {
    phaser: Arc<Phaser>,
    phase: u64,
}

impl PhaseTicket {
    /// Registers another unit of work in the same phase
    ///
    /// Used by a download to cover the extraction it hands off, before the
    /// download's own ticket arrives.
    pub fn fork(&self) -> PhaseTicket {
        self.phaser.register()
    }

    /// The phase this ticket was registered in
    pub fn phase(&self) -> u64 {
        self.phase
    }

    /// Arrives explicitly
    pub fn arrive(self) {
        drop(self);
    }
}

impl Drop for PhaseTicket {
    fn drop(&mut self) {
        self.phaser.arrive();
    }
}
