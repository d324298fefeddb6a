//! One telemetry connection.
//!
//! A [`TelemetrySession`] owns the decode buffer and the patient registry of
//! a single transport connection. [`TelemetrySession::on_fragment`] is the
//! only entry point that mutates either, and it drains the buffer completely
//! before returning, so fragments are handled strictly one after the other.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::error::{SessionError, TelemetryError};
use super::framer::StreamReassembler;
use super::packet::{ChecksumPolicy, ParsedPacket, StatusPacket};
use super::{decode, Decoded};
use crate::config::Config;
use crate::logutil::escape_log;
use crate::metrics::{Metrics, Snapshot};
use crate::patient::{
    PatientReading, PatientRegistry, PatientSnapshot, ReadingMerger, ReadingSource,
};

/// Whether this host has a telemetry transport at all. Passed in at
/// construction instead of being detected globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCapability {
    Available,
    Unavailable,
}

impl TransportCapability {
    pub fn is_available(self) -> bool {
        matches!(self, TransportCapability::Available)
    }
}

/// What happened to the stream while handling one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ReadingApplied {
        patient_id: String,
        source: ReadingSource,
    },
    Status(StatusPacket),
    Rejected(TelemetryError),
    Overflow {
        discarded: usize,
    },
}

#[derive(Debug)]
pub struct TelemetrySession {
    capability: TransportCapability,
    policy: ChecksumPolicy,
    buffer_cap: usize,
    pod_aliases: BTreeMap<String, String>,
    framer: StreamReassembler,
    merger: ReadingMerger,
    registry: PatientRegistry,
    metrics: Metrics,
    session_id: Option<Uuid>,
    connected_at: Option<DateTime<Utc>>,
}

impl TelemetrySession {
    pub fn new(config: &Config, capability: TransportCapability) -> Self {
        Self {
            capability,
            policy: config.decoder.checksum_policy,
            buffer_cap: config.decoder.buffer_cap,
            pod_aliases: config.registry.pod_aliases.clone(),
            framer: StreamReassembler::new(
                config.decoder.buffer_cap,
                config.decoder.duplicate_window_len,
            ),
            merger: ReadingMerger::new(config.registry.merge_policy()),
            registry: PatientRegistry::new(),
            metrics: Metrics::new(),
            session_id: None,
            connected_at: None,
        }
    }

    /// Open the session for a new transport connection. Connecting twice
    /// keeps the current session.
    pub fn connect(&mut self) -> Result<Uuid, SessionError> {
        if !self.capability.is_available() {
            warn!("connect refused: no telemetry transport on this host");
            return Err(SessionError::TransportUnavailable);
        }
        if let Some(id) = self.session_id {
            debug!("session {} already connected", id);
            return Ok(id);
        }
        let id = Uuid::new_v4();
        self.session_id = Some(id);
        self.connected_at = Some(Utc::now());
        info!("telemetry session {} connected", id);
        Ok(id)
    }

    /// Close the session: partial messages and every patient are dropped.
    pub fn disconnect(&mut self) {
        let Some(id) = self.session_id.take() else {
            return;
        };
        self.framer.clear();
        self.registry.clear_all();
        self.connected_at = None;
        info!("telemetry session {} disconnected", id);
    }

    pub fn is_connected(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    /// Feed one transport fragment and apply every message it completes.
    pub fn on_fragment(
        &mut self,
        fragment: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.metrics.record_fragment(fragment.len());

        let feed = self.framer.feed(fragment);
        if feed.duplicate_trimmed {
            self.metrics.record_duplicate();
        }
        if feed.skipped > 0 {
            self.metrics.record_discarded(feed.skipped);
        }

        let timestamp = received_at.timestamp();
        let mut events = Vec::with_capacity(feed.messages.len());
        for message in feed.messages {
            self.metrics.record_message();
            let event = match decode(message.as_str(), self.policy) {
                Ok(decoded) => self.apply(decoded, timestamp),
                Err(err) => {
                    warn!("dropping message ({}): {}", err, escape_log(message.as_str()));
                    self.metrics.record_error(&err);
                    SessionEvent::Rejected(err)
                }
            };
            events.push(event);
        }

        if let Some(discarded) = feed.overflowed {
            let err = TelemetryError::BufferOverflow {
                discarded,
                cap: self.buffer_cap,
            };
            warn!("{}", err);
            self.metrics.record_error(&err);
            self.metrics.record_overflow();
            events.push(SessionEvent::Overflow { discarded });
        }
        Ok(events)
    }

    fn apply(&mut self, decoded: Decoded, timestamp: i64) -> SessionEvent {
        if let Decoded::Packet(packet) = &decoded {
            self.metrics.record_packet(packet.kind());
            if !packet.checksum().is_valid() {
                self.metrics.record_checksum_mismatch();
            }
        }
        let (patient_id, reading) = match decoded {
            Decoded::Packet(ParsedPacket::Live(packet)) => (
                self.patient_for_pod(&packet.pod_id),
                PatientReading::from_live(&packet, timestamp),
            ),
            Decoded::Packet(ParsedPacket::Total(packet)) => (
                self.patient_for_pod(&packet.pod_id),
                PatientReading::from_total(&packet, timestamp),
            ),
            Decoded::Packet(ParsedPacket::Status(status)) => {
                debug!("status from pod {}", escape_log(&status.pod_id));
                return SessionEvent::Status(status);
            }
            Decoded::Json(json) => {
                self.metrics.record_json();
                let reading = json.to_reading(timestamp);
                (json.patient_id, reading)
            }
        };
        let source = reading.source;
        self.merger.apply(&mut self.registry, &patient_id, reading);
        SessionEvent::ReadingApplied { patient_id, source }
    }

    fn patient_for_pod(&self, pod_id: &str) -> String {
        self.pod_aliases
            .get(pod_id)
            .cloned()
            .unwrap_or_else(|| pod_id.to_string())
    }

    pub fn patients(&self) -> Vec<PatientSnapshot> {
        self.registry.iter().map(|p| p.snapshot()).collect()
    }

    pub fn patient(&self, patient_id: &str) -> Option<PatientSnapshot> {
        self.registry.get(patient_id).map(|p| p.snapshot())
    }

    pub fn metrics(&self) -> Snapshot {
        self.metrics.snapshot()
    }

    /// Characters waiting in the decode buffer.
    pub fn buffered(&self) -> usize {
        self.framer.len()
    }
}
