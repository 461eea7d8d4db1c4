use std::collections::HashSet;

use tracing::{debug, warn};

use crate::device::{DeviceIdentity, MidiBackend};
use crate::manager::DeviceManager;
use crate::output::MonitorOutput;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Devices opened and registered.
    pub opened: usize,
    /// Disconnected devices closed.
    pub closed: usize,
    /// Open attempts that failed; retried on the next pass.
    pub failed: usize,
    /// Whether enumeration itself failed.
    pub enumeration_failed: bool,
}

impl ReconcileReport {
    pub fn is_idle(&self) -> bool {
        self.opened == 0 && self.closed == 0 && self.failed == 0 && !self.enumeration_failed
    }
}

/// Brings the registry in line with the devices the backend reports.
///
/// Disconnected handles are taken out of the registry under the shared lock,
/// then closed. Every enumerated device whose identity is not already open is
/// opened and registered. The shared lock is never held across a backend
/// call, so callbacks keep flowing while devices are being opened.
///
/// A handle whose identity cannot be resolved counts as not open, which can
/// lead to a second open attempt for the same device. The backend is expected
/// to refuse or tolerate that.
pub fn reconcile<B, O>(manager: &DeviceManager, backend: &mut B, output: &mut O) -> ReconcileReport
where
    B: MidiBackend + ?Sized,
    O: MonitorOutput + ?Sized,
{
    let mut report = ReconcileReport::default();
    let snapshot = manager.begin_pass();

    for handle in snapshot.closing {
        backend.close(handle);
        output.device_closed(handle);
        report.closed += 1;
    }

    let active: HashSet<DeviceIdentity> = snapshot
        .open
        .iter()
        .filter_map(|&handle| match backend.resolve_identity(handle) {
            Ok(identity) => Some(identity),
            Err(err) => {
                debug!(%handle, %err, "dropping unresolved handle from active set");
                None
            }
        })
        .collect();

    let devices = match backend.enumerate() {
        Ok(devices) => devices,
        Err(err) => {
            warn!(%err, "MIDI device enumeration failed");
            report.enumeration_failed = true;
            return report;
        }
    };

    for device in devices
        .iter()
        .filter(|device| !active.contains(&device.identity))
    {
        match backend.open(device.index) {
            Ok(handle) => {
                manager.register(handle);
                let name = backend.display_name(handle);
                output.device_opened(&name, handle);
                report.opened += 1;
            }
            Err(err) => {
                debug!(index = %device.index, identity = %device.identity, %err, "skipping MIDI input");
                report.failed += 1;
            }
        }
    }

    if !report.is_idle() {
        debug!(?report, "reconciliation pass finished");
    }
    report
}
