use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::DeviceHandle;
use crate::message::MidiRecord;

/// State shared between backend callbacks and the monitor thread.
///
/// All three structures live behind one lock so there is never a lock
/// ordering to get wrong.
#[derive(Debug, Default)]
struct DeviceState {
    queue: VecDeque<MidiRecord>,
    registry: Vec<DeviceHandle>,
    pending_close: Vec<DeviceHandle>,
}

/// Registry, pending-close set and message queue for the monitor.
///
/// Cloning is cheap and every clone refers to the same state. Backend
/// callbacks should be given a [`DeviceSink`] instead of the manager.
#[derive(Debug, Clone, Default)]
pub struct DeviceManager {
    state: Arc<Mutex<DeviceState>>,
}

/// Registry view taken at the start of a reconciliation pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PassSnapshot {
    /// Handles flagged as disconnected, already removed from the registry.
    pub closing: Vec<DeviceHandle>,
    /// Handles that remain open.
    pub open: Vec<DeviceHandle>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer half for backend callbacks.
    pub fn sink(&self) -> DeviceSink {
        DeviceSink {
            state: Arc::clone(&self.state),
        }
    }

    /// Empties the queue and hands every record to `sink` in arrival order.
    ///
    /// The lock is released before `sink` runs. Returns the number of records
    /// delivered.
    pub fn drain_to<F>(&self, mut sink: F) -> usize
    where
        F: FnMut(MidiRecord),
    {
        let drained = mem::take(&mut self.state.lock().queue);
        let count = drained.len();
        for record in drained {
            sink(record);
        }
        count
    }

    /// Adds an open handle to the registry. Registering twice is a no-op.
    pub fn register(&self, handle: DeviceHandle) {
        let mut state = self.state.lock();
        if !state.registry.contains(&handle) {
            state.registry.push(handle);
        }
    }

    /// Removes a handle from the registry, returning whether it was present.
    pub fn unregister(&self, handle: DeviceHandle) -> bool {
        let mut state = self.state.lock();
        let before = state.registry.len();
        state.registry.retain(|open| *open != handle);
        state.registry.len() != before
    }

    /// Drains the pending-close set, removes those handles from the registry
    /// and snapshots what is left, all in one critical section.
    ///
    /// Each pending handle is reported once even if the backend flagged it
    /// several times.
    pub fn begin_pass(&self) -> PassSnapshot {
        let mut state = self.state.lock();
        let mut closing = mem::take(&mut state.pending_close);
        // Most recent notification first, as the pending set is a stack.
        closing.reverse();
        let mut seen = Vec::with_capacity(closing.len());
        closing.retain(|handle| {
            if seen.contains(handle) {
                false
            } else {
                seen.push(*handle);
                true
            }
        });
        state.registry.retain(|open| !closing.contains(open));
        PassSnapshot {
            closing,
            open: state.registry.clone(),
        }
    }

    /// Copy of the registry.
    pub fn open_handles(&self) -> Vec<DeviceHandle> {
        self.state.lock().registry.clone()
    }

    /// Empties the registry and returns what it held. Used on shutdown.
    pub fn take_open_handles(&self) -> Vec<DeviceHandle> {
        mem::take(&mut self.state.lock().registry)
    }

    pub fn is_open(&self, handle: DeviceHandle) -> bool {
        self.state.lock().registry.contains(&handle)
    }

    pub fn pending_close_len(&self) -> usize {
        self.state.lock().pending_close.len()
    }
}

/// Producer handle given to backend callbacks.
///
/// Every method takes the shared lock only for the push itself and never
/// blocks on anything else.
#[derive(Debug, Clone)]
pub struct DeviceSink {
    state: Arc<Mutex<DeviceState>>,
}

impl DeviceSink {
    /// Queues one received message.
    pub fn push(&self, record: MidiRecord) {
        self.state.lock().queue.push_back(record);
    }

    /// Queues several messages from one driver packet, keeping their order
    /// and not letting other producers interleave with them.
    pub fn push_all<I>(&self, records: I)
    where
        I: IntoIterator<Item = MidiRecord>,
    {
        self.state.lock().queue.extend(records);
    }

    /// Flags a handle as disconnected. The next reconciliation pass closes it.
    pub fn notify_disconnected(&self, handle: DeviceHandle) {
        self.state.lock().pending_close.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceIdentity;

    fn record(n: u8) -> MidiRecord {
        MidiRecord::new(DeviceIdentity::new(1), 0x90, n, 0x7F)
    }

    #[test]
    fn drains_in_fifo_order() {
        let manager = DeviceManager::new();
        let sink = manager.sink();
        for n in 0..5 {
            sink.push(record(n));
        }
        let mut seen = Vec::new();
        assert_eq!(manager.drain_to(|r| seen.push(r)), 5);
        assert_eq!(seen, (0..5).map(record).collect::<Vec<_>>());
        assert_eq!(manager.drain_to(|_| panic!("queue should be empty")), 0);
    }

    #[test]
    fn unregister_missing_handle_is_harmless() {
        let manager = DeviceManager::new();
        let kept = DeviceHandle::from_raw(1);
        manager.register(kept);
        manager.register(kept);
        assert!(!manager.unregister(DeviceHandle::from_raw(2)));
        assert_eq!(manager.open_handles(), vec![kept]);
        assert!(manager.unregister(kept));
        assert!(!manager.unregister(kept));
        assert!(manager.open_handles().is_empty());
    }

    #[test]
    fn begin_pass_drains_pending_once() {
        let manager = DeviceManager::new();
        let sink = manager.sink();
        let a = DeviceHandle::from_raw(10);
        let b = DeviceHandle::from_raw(11);
        manager.register(a);
        manager.register(b);
        sink.notify_disconnected(a);
        sink.notify_disconnected(a);

        let snapshot = manager.begin_pass();
        assert_eq!(snapshot.closing, vec![a]);
        assert_eq!(snapshot.open, vec![b]);
        assert_eq!(manager.pending_close_len(), 0);

        let again = manager.begin_pass();
        assert!(again.closing.is_empty());
        assert_eq!(again.open, vec![b]);
    }
}
