//! CRC-8 used as the wire-level integrity field of ASCII packets.
//!
//! Polynomial `0x07`, initial value `0`, MSB-first, no final xor. That is the
//! catalogued CRC-8/SMBUS algorithm, which is what the pod firmware emits.

use crc::{Crc, CRC_8_SMBUS};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Checksum over `data`.
pub fn checksum(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

/// Parse a received checksum field (1 or 2 hex digits, either case).
pub fn parse_hex(field: &str) -> Option<u8> {
    if field.is_empty() || field.len() > 2 {
        return None;
    }
    u8::from_str_radix(field, 16).ok()
}

/// Checksum rendered the way the generator appends it.
pub fn to_hex(value: u8) -> String {
    format!("{:02X}", value)
}
