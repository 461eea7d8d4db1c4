use std::io::{self, Write};

use crate::device::DeviceHandle;
use crate::message::MidiRecord;

/// Destination for the monitor's line output.
pub trait MonitorOutput {
    /// One received message.
    fn message(&mut self, record: &MidiRecord);

    /// A device was opened and registered.
    fn device_opened(&mut self, name: &str, handle: DeviceHandle);

    /// A device was closed and removed from the registry.
    fn device_closed(&mut self, handle: DeviceHandle);
}

/// Writes one line per event to any [`Write`] implementation.
///
/// Each line is written with a single call so concurrent writers to the same
/// stream never split a record.
#[derive(Debug)]
pub struct LineOutput<W: Write> {
    writer: W,
}

impl<W: Write> LineOutput<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: String) {
        if let Err(err) = writeln!(self.writer, "{line}").and_then(|()| self.writer.flush()) {
            tracing::warn!(?err, "failed to write monitor output");
        }
    }
}

impl<W: Write> MonitorOutput for LineOutput<W> {
    fn message(&mut self, record: &MidiRecord) {
        self.write_line(record.to_string());
    }

    fn device_opened(&mut self, name: &str, handle: DeviceHandle) {
        self.write_line(format!("Device opened: {name} at {handle}"));
    }

    fn device_closed(&mut self, handle: DeviceHandle) {
        self.write_line(format!("Device closed: {handle}"));
    }
}

/// Console output on standard output.
pub type ConsoleOutput = LineOutput<io::Stdout>;

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(io::stdout())
    }
}
