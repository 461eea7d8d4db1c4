use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::device::{BackendError, DeviceHandle, DeviceIdentity, UNKNOWN_DEVICE_NAME};
use crate::manager::DeviceSink;

struct TrackedPort {
    port_id: String,
    identity: DeviceIdentity,
    name: String,
    disconnected: bool,
}

/// Bookkeeping for backends that identify ports by string id and have no
/// disconnect notification of their own.
///
/// Each enumeration is compared with the previous one: open ports whose id
/// vanished are reported through the sink once, and ids that were absent get
/// a fresh identity when they come back.
pub struct PortTracker {
    sink: DeviceSink,
    identities: HashMap<String, DeviceIdentity>,
    next_identity: u32,
    next_handle: u64,
    last_enumeration: Vec<String>,
    open: HashMap<DeviceHandle, TrackedPort>,
}

impl PortTracker {
    pub fn new(sink: DeviceSink) -> Self {
        Self {
            sink,
            identities: HashMap::new(),
            next_identity: 1,
            next_handle: 1,
            last_enumeration: Vec::new(),
            open: HashMap::new(),
        }
    }

    /// Records a fresh enumeration and returns the identity of each port, in
    /// the same order.
    pub fn observe(&mut self, port_ids: &[String]) -> Vec<DeviceIdentity> {
        let identities: Vec<_> = port_ids
            .iter()
            .map(|port_id| self.identity_for(port_id))
            .collect();

        let present: HashSet<&str> = port_ids.iter().map(String::as_str).collect();
        for (handle, port) in self.open.iter_mut() {
            if !port.disconnected && !present.contains(port.port_id.as_str()) {
                debug!(%handle, port = %port.port_id, "MIDI input disappeared");
                port.disconnected = true;
                self.sink.notify_disconnected(*handle);
            }
        }
        // A port that comes back later is a new device.
        self.identities
            .retain(|port_id, _| present.contains(port_id.as_str()));

        self.last_enumeration = port_ids.to_vec();
        identities
    }

    /// Port id at `index` in the last enumeration.
    pub fn port_at(&self, index: usize) -> Option<&str> {
        self.last_enumeration.get(index).map(String::as_str)
    }

    pub fn identity_for(&mut self, port_id: &str) -> DeviceIdentity {
        if let Some(identity) = self.identities.get(port_id) {
            return *identity;
        }
        let identity = DeviceIdentity::new(self.next_identity);
        self.next_identity = self.next_identity.wrapping_add(1);
        self.identities.insert(port_id.to_owned(), identity);
        identity
    }

    /// Allocates a handle for a port that was just connected.
    pub fn track(&mut self, port_id: String, identity: DeviceIdentity, name: String) -> DeviceHandle {
        let handle = DeviceHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        self.open.insert(
            handle,
            TrackedPort {
                port_id,
                identity,
                name,
                disconnected: false,
            },
        );
        handle
    }

    /// Forgets a handle, returning whether it was tracked.
    pub fn untrack(&mut self, handle: DeviceHandle) -> bool {
        self.open.remove(&handle).is_some()
    }

    pub fn resolve_identity(&self, handle: DeviceHandle) -> Result<DeviceIdentity, BackendError> {
        self.open
            .get(&handle)
            .filter(|port| !port.disconnected)
            .map(|port| port.identity)
            .ok_or(BackendError::StaleHandle(handle))
    }

    pub fn display_name(&self, handle: DeviceHandle) -> String {
        self.open
            .get(&handle)
            .map(|port| port.name.clone())
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::DeviceManager;

    fn ports(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| (*id).to_owned()).collect()
    }

    fn open_port(tracker: &mut PortTracker, port_id: &str) -> DeviceHandle {
        let identity = tracker.identity_for(port_id);
        tracker.track(port_id.to_owned(), identity, format!("{port_id} name"))
    }

    #[test]
    fn vanished_port_is_flagged_once() {
        let manager = DeviceManager::new();
        let mut tracker = PortTracker::new(manager.sink());
        tracker.observe(&ports(&["20:0", "24:0"]));
        let gone = open_port(&mut tracker, "20:0");
        let kept = open_port(&mut tracker, "24:0");
        manager.register(gone);
        manager.register(kept);

        tracker.observe(&ports(&["24:0"]));
        tracker.observe(&ports(&["24:0"]));
        assert_eq!(manager.pending_close_len(), 1);

        let snapshot = manager.begin_pass();
        assert_eq!(snapshot.closing, vec![gone]);
        assert_eq!(snapshot.open, vec![kept]);
    }

    #[test]
    fn returning_port_gets_new_identity() {
        let manager = DeviceManager::new();
        let mut tracker = PortTracker::new(manager.sink());
        let first = tracker.observe(&ports(&["20:0", "24:0"]));
        let same = tracker.observe(&ports(&["20:0", "24:0"]));
        assert_eq!(first, same);

        tracker.observe(&ports(&["24:0"]));
        let back = tracker.observe(&ports(&["24:0", "20:0"]));
        assert_eq!(back[0], first[1]);
        assert_ne!(back[1], first[0]);
        assert_eq!(tracker.port_at(1), Some("20:0"));
        assert_eq!(tracker.port_at(2), None);
    }

    #[test]
    fn flagged_handle_is_stale() {
        let manager = DeviceManager::new();
        let mut tracker = PortTracker::new(manager.sink());
        let identities = tracker.observe(&ports(&["20:0"]));
        let handle = open_port(&mut tracker, "20:0");
        assert_eq!(tracker.resolve_identity(handle).unwrap(), identities[0]);
        assert_eq!(tracker.display_name(handle), "20:0 name");

        tracker.observe(&[]);
        assert!(matches!(
            tracker.resolve_identity(handle),
            Err(BackendError::StaleHandle(h)) if h == handle
        ));
        assert_eq!(tracker.display_name(handle), "20:0 name");

        assert!(tracker.untrack(handle));
        assert!(!tracker.untrack(handle));
        assert_eq!(tracker.display_name(handle), UNKNOWN_DEVICE_NAME);
    }
}
