use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name reported when a backend cannot describe a device.
pub const UNKNOWN_DEVICE_NAME: &str = "unknown";

/// Ordinal of a device in the backend's current enumeration.
///
/// Only meaningful for the enumeration it came from; used when opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIndex(pub usize);

impl fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend-stable numeric identity of a physical or logical input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity(u32);

impl DeviceIdentity {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// Opaque token for one open input stream.
///
/// Backends convert their native handle into this type once, through
/// [`DeviceHandle::from_raw`], and back through [`DeviceHandle::into_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(u64);

impl DeviceHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A device as currently reported by the backend's enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub index: DeviceIndex,
    pub identity: DeviceIdentity,
    pub name: String,
}

/// Failures reported by a [`MidiBackend`].
///
/// None of these are fatal: the reconciliation pass skips the device and
/// tries again on the next pass.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The driver could not enumerate or open devices.
    #[error("MIDI backend unavailable: {0}")]
    Unavailable(String),
    /// The handle was invalidated by the backend.
    #[error("stale device handle {0}")]
    StaleHandle(DeviceHandle),
    /// The device opened but its input stream could not be started.
    #[error("failed to start input on device {index}: {reason}")]
    StartFailure { index: DeviceIndex, reason: String },
    /// The index is not part of the current enumeration.
    #[error("no MIDI input at index {0}")]
    UnknownDevice(DeviceIndex),
}

/// Platform MIDI input driver.
///
/// Implementations deliver data and disconnect notifications from their own
/// threads through a [`DeviceSink`](crate::manager::DeviceSink) handed to them
/// at construction; the methods here are only called from the monitor thread.
pub trait MidiBackend: Send {
    /// Devices visible to the OS right now.
    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, BackendError>;

    /// Open and start the input stream of the device at `index`.
    ///
    /// On error nothing stays open.
    fn open(&mut self, index: DeviceIndex) -> Result<DeviceHandle, BackendError>;

    /// Stop and release a device. Must tolerate handles that are already gone.
    fn close(&mut self, handle: DeviceHandle);

    /// Stable identity of the device behind `handle`.
    fn resolve_identity(&self, handle: DeviceHandle) -> Result<DeviceIdentity, BackendError>;

    /// Human readable name, or [`UNKNOWN_DEVICE_NAME`].
    fn display_name(&self, handle: DeviceHandle) -> String;
}
