//! MIDI input monitor.
//!
//! Backend callbacks push [`MidiRecord`]s and disconnect notifications into a
//! [`DeviceManager`]; a single [`Monitor`] thread drains the queue to its
//! output and reconciles the set of open devices with what the backend
//! currently reports.

pub mod backend_midir;
pub mod config;
pub mod device;
pub mod manager;
pub mod message;
pub mod monitor;
pub mod output;
pub mod ports;
pub mod reconcile;

pub use backend_midir::MidirBackend;
pub use config::{IgnoreFilter, MonitorSettings, SettingsError};
pub use device::{
    BackendError, DeviceHandle, DeviceIdentity, DeviceIndex, DeviceInfo, MidiBackend,
    UNKNOWN_DEVICE_NAME,
};
pub use manager::{DeviceManager, DeviceSink, PassSnapshot};
pub use message::{split_packet, MidiRecord};
pub use monitor::{LoopState, Monitor};
pub use output::{ConsoleOutput, LineOutput, MonitorOutput};
pub use ports::PortTracker;
pub use reconcile::{reconcile, ReconcileReport};
