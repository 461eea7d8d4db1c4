use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::DeviceIdentity;

/// One short MIDI message together with the device it came from.
///
/// Records are immutable: every field is fixed at construction time and
/// missing data bytes are stored as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MidiRecord {
    source_id: DeviceIdentity,
    status: u8,
    data1: u8,
    data2: u8,
}

impl MidiRecord {
    /// Creates a record from its individual bytes.
    pub fn new(source_id: DeviceIdentity, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            source_id,
            status,
            data1,
            data2,
        }
    }

    /// Builds a record from a status byte followed by up to two data bytes.
    ///
    /// Bytes past the second data byte are ignored.
    pub fn from_bytes(source_id: DeviceIdentity, status: u8, data: &[u8]) -> Self {
        let data1 = data.first().copied().unwrap_or(0);
        let data2 = data.get(1).copied().unwrap_or(0);
        Self::new(source_id, status, data1, data2)
    }

    /// Builds a record from a driver word packing the message little-end first
    /// (status in bits 0..8, data1 in 8..16, data2 in 16..24).
    pub fn from_packed_word(source_id: DeviceIdentity, word: u32) -> Self {
        let [status, data1, data2, _] = word.to_le_bytes();
        Self::new(source_id, status, data1, data2)
    }

    /// Reverses [`MidiRecord::encode_u64`]. Bits 56..64 are ignored.
    pub fn from_encoded(encoded: u64) -> Self {
        let source_id = DeviceIdentity::new((encoded & 0xFFFF_FFFF) as u32);
        let status = (encoded >> 32) as u8;
        let data1 = (encoded >> 40) as u8;
        let data2 = (encoded >> 48) as u8;
        Self::new(source_id, status, data1, data2)
    }

    pub fn source_id(&self) -> DeviceIdentity {
        self.source_id
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn data1(&self) -> u8 {
        self.data1
    }

    pub fn data2(&self) -> u8 {
        self.data2
    }

    /// Packs the record into 64 bits: source id in bits 0..32, status in
    /// 32..40, data1 in 40..48 and data2 in 48..56.
    pub fn encode_u64(&self) -> u64 {
        u64::from(self.source_id.get())
            | u64::from(self.status) << 32
            | u64::from(self.data1) << 40
            | u64::from(self.data2) << 48
    }
}

impl fmt::Display for MidiRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:X}) {:02X} {:02X} {:02X}",
            self.source_id.get(),
            self.status,
            self.data1,
            self.data2
        )
    }
}

/// Splits a raw byte stream into short messages.
///
/// The first byte of the packet and every later byte with the high bit set
/// start a new record; the data bytes following it belong to that record.
/// A packet opening with data bytes (running status) is printed as-is, with
/// its first byte in the status position.
pub fn split_packet(source_id: DeviceIdentity, bytes: &[u8]) -> Vec<MidiRecord> {
    let mut records = Vec::new();
    let mut rest = bytes;

    while let Some((&status, tail)) = rest.split_first() {
        let data_len = tail.iter().take_while(|&&byte| byte < 0x80).count();
        let (data, next) = tail.split_at(data_len);
        records.push(MidiRecord::from_bytes(source_id, status, data));
        rest = next;
    }

    records
}
