use std::collections::HashMap;

use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::debug;

use crate::config::{IgnoreFilter, MonitorSettings};
use crate::device::{
    BackendError, DeviceHandle, DeviceIdentity, DeviceIndex, DeviceInfo, MidiBackend,
    UNKNOWN_DEVICE_NAME,
};
use crate::manager::DeviceSink;
use crate::message::split_packet;
use crate::ports::PortTracker;

impl From<IgnoreFilter> for Ignore {
    fn from(filter: IgnoreFilter) -> Self {
        match filter {
            IgnoreFilter::None => Ignore::None,
            IgnoreFilter::Sysex => Ignore::Sysex,
            IgnoreFilter::Time => Ignore::Time,
            IgnoreFilter::ActiveSense => Ignore::ActiveSense,
            IgnoreFilter::All => Ignore::All,
        }
    }
}

/// Backend implemented using the `midir` crate.
///
/// One driver client is kept for enumeration; `ports()` re-queries the
/// system on every call. Each open input needs its own client because
/// `connect` consumes it. midir has no disconnect notification, so
/// [`PortTracker`] reports ports that vanish from the enumeration.
pub struct MidirBackend {
    client_name: String,
    ignore: Ignore,
    sink: DeviceSink,
    scanner: Option<MidiInput>,
    tracker: PortTracker,
    connections: HashMap<DeviceHandle, MidiInputConnection<()>>,
}

impl MidirBackend {
    pub fn new(sink: DeviceSink, settings: &MonitorSettings) -> Self {
        Self {
            client_name: settings.client_name.clone(),
            ignore: settings.ignore.into(),
            tracker: PortTracker::new(sink.clone()),
            sink,
            scanner: None,
            connections: HashMap::new(),
        }
    }

    fn new_input(&self) -> Result<MidiInput, BackendError> {
        MidiInput::new(&self.client_name).map_err(|err| BackendError::Unavailable(err.to_string()))
    }
}

/// Returns the value in `slot`, creating it first if empty. A failed `init`
/// leaves the slot empty so the next call tries again.
fn get_or_try_init<T, E>(
    slot: &mut Option<T>,
    init: impl FnOnce() -> Result<T, E>,
) -> Result<&mut T, E> {
    let value = match slot.take() {
        Some(value) => value,
        None => init()?,
    };
    Ok(slot.insert(value))
}

impl MidiBackend for MidirBackend {
    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, BackendError> {
        let client_name = &self.client_name;
        let scanner = get_or_try_init(&mut self.scanner, || {
            MidiInput::new(client_name).map_err(|err| BackendError::Unavailable(err.to_string()))
        })?;

        let (port_ids, names): (Vec<String>, Vec<String>) = scanner
            .ports()
            .iter()
            .map(|port| {
                let name = scanner
                    .port_name(port)
                    .unwrap_or_else(|_| UNKNOWN_DEVICE_NAME.to_owned());
                (port.id(), name)
            })
            .unzip();

        let identities = self.tracker.observe(&port_ids);
        Ok(identities
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(index, (identity, name))| DeviceInfo {
                index: DeviceIndex(index),
                identity,
                name,
            })
            .collect())
    }

    fn open(&mut self, index: DeviceIndex) -> Result<DeviceHandle, BackendError> {
        let port_id = self
            .tracker
            .port_at(index.0)
            .map(str::to_owned)
            .ok_or(BackendError::UnknownDevice(index))?;
        let mut input = self.new_input()?;
        input.ignore(self.ignore);
        let port = input
            .ports()
            .into_iter()
            .find(|port| port.id() == port_id)
            .ok_or(BackendError::UnknownDevice(index))?;
        let name = input
            .port_name(&port)
            .unwrap_or_else(|_| UNKNOWN_DEVICE_NAME.to_owned());

        let identity = self.tracker.identity_for(&port_id);
        let sink = self.sink.clone();
        let connection = input
            .connect(
                &port,
                &format!("{}-in-{}", self.client_name, index),
                move |_timestamp, bytes, _| sink.push_all(split_packet(identity, bytes)),
                (),
            )
            .map_err(|err| BackendError::StartFailure {
                index,
                reason: err.to_string(),
            })?;

        let handle = self.tracker.track(port_id, identity, name);
        self.connections.insert(handle, connection);
        Ok(handle)
    }

    fn close(&mut self, handle: DeviceHandle) {
        self.connections.remove(&handle);
        if !self.tracker.untrack(handle) {
            debug!(%handle, "close on unknown MIDI handle");
        }
    }

    fn resolve_identity(&self, handle: DeviceHandle) -> Result<DeviceIdentity, BackendError> {
        self.tracker.resolve_identity(handle)
    }

    fn display_name(&self, handle: DeviceHandle) -> String {
        self.tracker.display_name(handle)
    }
}
