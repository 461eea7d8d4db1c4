use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::device::MidiBackend;
use crate::manager::DeviceManager;
use crate::output::MonitorOutput;
use crate::reconcile::{reconcile, ReconcileReport};

/// Phase of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Printing queued messages.
    Draining,
    /// Closing disconnected devices and opening new ones.
    Reconciling,
    /// Waiting for the next iteration.
    Idle,
}

/// Single-threaded consumer driving the drain / reconcile / wait cycle.
pub struct Monitor<B: MidiBackend, O: MonitorOutput> {
    manager: DeviceManager,
    backend: B,
    output: O,
    interval: Duration,
    state: LoopState,
}

impl<B: MidiBackend, O: MonitorOutput> Monitor<B, O> {
    /// Creates a monitor. `backend` must deliver its callbacks through a
    /// sink obtained from `manager`.
    pub fn new(manager: DeviceManager, backend: B, output: O, interval: Duration) -> Self {
        Self {
            manager,
            backend,
            output,
            interval,
            state: LoopState::Draining,
        }
    }

    pub fn manager(&self) -> &DeviceManager {
        &self.manager
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Prints every queued message. Returns how many were printed.
    pub fn drain(&mut self) -> usize {
        let output = &mut self.output;
        self.manager.drain_to(|record| output.message(&record))
    }

    /// Runs one reconciliation pass.
    pub fn reconcile(&mut self) -> ReconcileReport {
        reconcile(&self.manager, &mut self.backend, &mut self.output)
    }

    /// Performs the work of the current state and moves to the next one.
    pub fn step(&mut self) -> LoopState {
        self.state = match self.state {
            LoopState::Draining => {
                self.drain();
                LoopState::Reconciling
            }
            LoopState::Reconciling => {
                self.reconcile();
                LoopState::Idle
            }
            LoopState::Idle => {
                thread::sleep(self.interval);
                LoopState::Draining
            }
        };
        self.state
    }

    /// Drain followed by reconcile, without waiting.
    pub fn tick(&mut self) -> ReconcileReport {
        self.drain();
        let report = self.reconcile();
        self.state = LoopState::Idle;
        report
    }

    /// Loops until `running` is cleared, then shuts down.
    pub fn run(&mut self, running: &AtomicBool) {
        info!(interval = ?self.interval, "monitoring MIDI inputs");
        while running.load(Ordering::SeqCst) {
            self.step();
        }
        self.shutdown();
    }

    /// Prints what is still queued and closes every open device.
    ///
    /// Returns the number of devices closed. Calling it again closes nothing.
    pub fn shutdown(&mut self) -> usize {
        self.drain();
        let snapshot = self.manager.begin_pass();
        let remaining = self.manager.take_open_handles();
        let mut closed = 0;
        for handle in snapshot.closing.into_iter().chain(remaining) {
            self.backend.close(handle);
            self.output.device_closed(handle);
            closed += 1;
        }
        if closed > 0 {
            debug!(closed, "closed MIDI inputs on shutdown");
        }
        self.state = LoopState::Draining;
        closed
    }
}

impl<B: MidiBackend, O: MonitorOutput> Drop for Monitor<B, O> {
    fn drop(&mut self) {
        if !self.manager.open_handles().is_empty() || self.manager.pending_close_len() > 0 {
            self.shutdown();
        }
    }
}
