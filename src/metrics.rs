//! Per-session decoder counters.
//!
//! Counters are plain atomics so the session can bump them from `&self`;
//! [`Metrics::snapshot`] copies them out for logging or the CLI.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::telemetry::error::TelemetryError;
use crate::telemetry::packet::PacketKind;

#[derive(Debug, Default)]
pub struct Metrics {
    fragments: AtomicU64,
    chars_received: AtomicU64,
    messages_framed: AtomicU64,
    live_packets: AtomicU64,
    total_packets: AtomicU64,
    status_packets: AtomicU64,
    json_readings: AtomicU64,
    decode_errors: AtomicU64,
    checksum_mismatches: AtomicU64,
    duplicates_trimmed: AtomicU64,
    overflows: AtomicU64,
    chars_discarded: AtomicU64,
    errors_by_kind: Mutex<BTreeMap<&'static str, u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fragment(&self, chars: usize) {
        self.fragments.fetch_add(1, Ordering::Relaxed);
        self.chars_received
            .fetch_add(chars as u64, Ordering::Relaxed);
    }

    pub fn record_message(&self) {
        self.messages_framed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet(&self, kind: PacketKind) {
        let counter = match kind {
            PacketKind::Live => &self.live_packets,
            PacketKind::Total => &self.total_packets,
            PacketKind::Status => &self.status_packets,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_json(&self) {
        self.json_readings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checksum_mismatch(&self) {
        self.checksum_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_trimmed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, chars: usize) {
        self.chars_discarded
            .fetch_add(chars as u64, Ordering::Relaxed);
    }

    /// Characters lost to an overflow reach [`Metrics::record_discarded`]
    /// with the rest of the feed's skipped text.
    pub fn record_overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a decode error under its kind label.
    pub fn record_error(&self, error: &TelemetryError) {
        if !matches!(error, TelemetryError::BufferOverflow { .. }) {
            self.decode_errors.fetch_add(1, Ordering::Relaxed);
        }
        if matches!(error, TelemetryError::ChecksumMismatch { .. }) {
            self.record_checksum_mismatch();
        }
        let mut by_kind = self
            .errors_by_kind
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *by_kind.entry(error.label()).or_default() += 1;
    }

    pub fn snapshot(&self) -> Snapshot {
        let errors_by_kind = self
            .errors_by_kind
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(kind, count)| (kind.to_string(), *count))
            .collect();
        Snapshot {
            fragments: self.fragments.load(Ordering::Relaxed),
            chars_received: self.chars_received.load(Ordering::Relaxed),
            messages_framed: self.messages_framed.load(Ordering::Relaxed),
            live_packets: self.live_packets.load(Ordering::Relaxed),
            total_packets: self.total_packets.load(Ordering::Relaxed),
            status_packets: self.status_packets.load(Ordering::Relaxed),
            json_readings: self.json_readings.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            checksum_mismatches: self.checksum_mismatches.load(Ordering::Relaxed),
            duplicates_trimmed: self.duplicates_trimmed.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            chars_discarded: self.chars_discarded.load(Ordering::Relaxed),
            errors_by_kind,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub fragments: u64,
    pub chars_received: u64,
    pub messages_framed: u64,
    pub live_packets: u64,
    pub total_packets: u64,
    pub status_packets: u64,
    pub json_readings: u64,
    pub decode_errors: u64,
    pub checksum_mismatches: u64,
    pub duplicates_trimmed: u64,
    pub overflows: u64,
    pub chars_discarded: u64,
    pub errors_by_kind: BTreeMap<String, u64>,
}
