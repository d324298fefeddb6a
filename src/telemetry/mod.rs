//! # Pod telemetry protocol
//!
//! Everything between the raw text the transport hands over and the readings
//! the patient registry stores:
//!
//! ```text
//! fragment ─▶ framer ─▶ message ─▶ decode ─▶ Decoded ─▶ PatientReading ─▶ merge
//! ```
//!
//! - [`framer`] reassembles arbitrarily split fragments into messages
//! - [`terminator`] is the checksum/terminator automaton shared by framer and decoder
//! - [`packet`] decodes and encodes the fixed-width `L`/`T`/`S` packets
//! - [`json`] decodes JSON readings
//! - [`session`] ties one connection's buffer, decoder and registry together
//! - [`actor`] runs a session on its own task
//! - [`source`] produces fragments from capture files (and a serial port)

pub mod actor;
pub mod crc8;
pub mod error;
pub mod framer;
pub mod json;
pub mod packet;
pub mod session;
pub mod source;
pub mod terminator;
pub mod units;

use serde::Serialize;

pub use actor::{start_session, SessionHandle, SessionSnapshot};
pub use error::{SessionError, TelemetryError};
pub use framer::{CompleteMessage, FeedResult, StreamReassembler};
pub use json::JsonReading;
pub use packet::{ChecksumPolicy, PacketKind, ParsedPacket};
pub use session::{SessionEvent, TelemetrySession, TransportCapability};

use crate::patient::PatientReading;

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", content = "message", rename_all = "lowercase")]
pub enum Decoded {
    Packet(ParsedPacket),
    Json(JsonReading),
}

impl Decoded {
    /// Normalized reading carried by this message; Status packets carry none.
    /// ASCII packets have no clock of their own and are stamped `received_at`.
    pub fn reading(&self, received_at: i64) -> Option<PatientReading> {
        match self {
            Decoded::Packet(ParsedPacket::Live(packet)) => {
                Some(PatientReading::from_live(packet, received_at))
            }
            Decoded::Packet(ParsedPacket::Total(packet)) => {
                Some(PatientReading::from_total(packet, received_at))
            }
            Decoded::Packet(ParsedPacket::Status(_)) => None,
            Decoded::Json(reading) => Some(reading.to_reading(received_at)),
        }
    }
}

/// Decode one complete message: JSON when it opens with `{`, otherwise an
/// ASCII packet selected by its leader.
pub fn decode(message: &str, policy: ChecksumPolicy) -> Result<Decoded, TelemetryError> {
    let message = message.trim_end_matches(['\r', '\n']);
    if message.trim().is_empty() {
        return Err(TelemetryError::Empty);
    }
    if message.starts_with('{') {
        return json::decode_json(message).map(Decoded::Json);
    }
    packet::decode_packet(message, policy).map(Decoded::Packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::ReadingSource;

    #[test]
    fn dispatches_on_first_character() {
        let json = decode(r#"{"patientId":"p2","heart":{"bpm":77}}"#, ChecksumPolicy::Advisory).unwrap();
        assert!(matches!(json, Decoded::Json(_)));

        let wire = packet::fixtures::live("01", 85, 450).encode();
        let live = decode(&format!("{}\r\n", wire), ChecksumPolicy::Reject).unwrap();
        assert!(matches!(live, Decoded::Packet(ParsedPacket::Live(_))));

        assert_eq!(decode("  ", ChecksumPolicy::Advisory), Err(TelemetryError::Empty));
        assert_eq!(
            decode("hello", ChecksumPolicy::Advisory),
            Err(TelemetryError::UnknownKind('h'))
        );
    }

    #[test]
    fn readings_by_message_kind() {
        let wire = packet::fixtures::total("01").encode();
        let total = decode(&wire, ChecksumPolicy::Reject).unwrap();
        let reading = total.reading(7).unwrap();
        assert_eq!(reading.source, ReadingSource::Total);
        assert_eq!(reading.timestamp, 7);

        let json = decode(r#"{"patientId":"p2","timestamp":5}"#, ChecksumPolicy::Advisory).unwrap();
        assert_eq!(json.reading(7).unwrap().timestamp, 5);
    }

    #[test]
    fn decoded_serializes_with_format_tag() {
        let wire = packet::fixtures::live("01", 85, 450).encode();
        let decoded = decode(&wire, ChecksumPolicy::Advisory).unwrap();
        let value = serde_json::to_value(&decoded).unwrap();
        assert_eq!(value["format"], "packet");
        assert_eq!(value["message"]["kind"], "Live");
        assert_eq!(value["message"]["heart_rate"], 85);
    }
}
