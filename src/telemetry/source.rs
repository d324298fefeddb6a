//! Fragment sources.
//!
//! The decoder never sees the transport itself; it is handed text fragments.
//! This module produces them from a capture file (split into fixed-size
//! chunks the way the radio link delivers them), from a synthetic demo
//! stream built with the packet encoders, or, with the `serial` feature,
//! from a serial bridge.

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveTime};
use tokio::fs;

use super::packet::{
    Checksum, Coordinate, LivePacket, SmoothingWindow, StatusPacket, TotalPacket, WireNumber,
};
use crate::patient::StepSide;

/// Read a capture file as text. Invalid UTF-8 is replaced, not rejected.
pub async fn read_capture(path: &str) -> Result<String> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| anyhow!("Failed to read capture {}: {}", path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Split `text` into fragments of at most `chunk_size` characters.
pub fn chunk_fragments(text: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    let mut fragments = Vec::new();
    let mut start = 0;
    for (count, (idx, _)) in text.char_indices().enumerate() {
        if count > 0 && count % chunk_size == 0 {
            fragments.push(&text[start..idx]);
            start = idx;
        }
    }
    if start < text.len() {
        fragments.push(&text[start..]);
    }
    fragments
}

const NO_CHECKSUM: Checksum = Checksum {
    received: None,
    computed: 0,
};

/// Synthetic capture: one Status packet per pod, then `rounds` Live packets
/// per pod with a Total packet every third round. Totals end with a newline,
/// Live packets run on back to back.
pub fn demo_capture(pods: usize, rounds: usize) -> String {
    let start = NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default();
    let mut out = String::new();
    for pod in 0..pods {
        out.push_str(
            &StatusPacket {
                pod_id: pod_label(pod),
                gps_date: chrono::NaiveDate::from_ymd_opt(2024, 5, 17),
                gps_time: start,
                reserved: "000000000000".to_string(),
                checksum: NO_CHECKSUM,
            }
            .encode(),
        );
        out.push('\n');
    }
    for round in 0..rounds {
        let time = start + Duration::seconds(round as i64);
        for pod in 0..pods {
            out.push_str(&demo_live(pod, round, time).encode());
            if round % 3 == 2 {
                out.push_str(&demo_total(pod, round, time).encode());
                out.push('\n');
            }
        }
    }
    out
}

fn pod_label(pod: usize) -> String {
    format!("{:02}", (pod + 1) % 100)
}

fn demo_live(pod: usize, round: usize, time: NaiveTime) -> LivePacket {
    let drift = (round as f64) * 0.0001;
    LivePacket {
        pod_id: pod_label(pod),
        gps_time: time,
        gps_fix: round > 0,
        latitude: Coordinate {
            degrees: 48.137 + pod as f64 * 0.001 + drift,
            hemisphere: Some('N'),
        },
        longitude: Coordinate {
            degrees: 11.575 + drift,
            hemisphere: Some('E'),
        },
        smoothing: SmoothingWindow::default(),
        velocity: WireNumber::Scaled {
            raw: ((round * 13 + pod * 7) % 120) as u32,
            divisor: 10,
        },
        heart_rate: (70 + (round * 7 + pod * 11) % 90) as u16,
        metabolic_power: WireNumber::Scaled {
            raw: ((round * 37 + pod * 5) % 400) as u32,
            divisor: 10,
        },
        checksum: NO_CHECKSUM,
        double_terminator: false,
    }
}

fn demo_total(pod: usize, round: usize, time: NaiveTime) -> TotalPacket {
    let distance = (round * 42 + pod * 3) as u32;
    TotalPacket {
        pod_id: pod_label(pod),
        gps_time: time,
        gps_fix: true,
        player_load: WireNumber::Scaled {
            raw: (round * 3) as u32,
            divisor: 100,
        },
        total_distance_m: distance,
        hmdl_distance_m: distance / 10,
        zone6_distance_m: 0,
        zone5_distance_m: distance / 20,
        zone4_distance_m: distance / 8,
        zone6_count: 0,
        zone5_count: (round / 6) as u32,
        zone4_count: (round / 3) as u32,
        total_accelerations: (round / 2) as u32,
        total_decelerations: (round / 2) as u32,
        impacts: 0,
        step_balance_side: if pod % 2 == 0 {
            StepSide::Left
        } else {
            StepSide::Right
        },
        step_balance: WireNumber::Scaled {
            raw: 4900 + (round % 200) as u32,
            divisor: 100,
        },
        max_speed: WireNumber::Scaled {
            raw: 120,
            divisor: 10,
        },
        last_minute_max_speed: WireNumber::Scaled {
            raw: ((round * 13) % 120) as u32,
            divisor: 10,
        },
        rr_average_ms: 650 + (round % 100) as u32,
        max_heart_rate: 160,
        checksum: NO_CHECKSUM,
    }
}

/// Turns raw reads into text without splitting a character across two reads.
///
/// An incomplete sequence at the end of a read is held back until the next
/// one; bytes that can never be valid become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut text = String::with_capacity(self.pending.len());
        let mut rest = self.pending.as_slice();
        let mut held = Vec::new();
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            held = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        self.pending = held;
        text
    }

    /// Bytes waiting for the rest of their character.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Forward everything read from a serial bridge to a running session.
#[cfg(feature = "serial")]
pub fn spawn_serial_reader(
    port_name: &str,
    baud_rate: u32,
    handle: super::SessionHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    use std::io::Read;

    let mut port = serialport::new(port_name, baud_rate)
        .timeout(std::time::Duration::from_millis(500))
        .open()
        .map_err(|e| anyhow!("Failed to open serial port {}: {}", port_name, e))?;
    log::info!("Reading pod telemetry from {} at {} baud", port_name, baud_rate);

    Ok(tokio::task::spawn_blocking(move || {
        let mut buffer = [0u8; 256];
        let mut carry = Utf8Carry::new();
        loop {
            match port.read(&mut buffer) {
                Ok(0) => continue,
                Ok(n) => {
                    let text = carry.decode(&buffer[..n]);
                    if text.is_empty() {
                        continue;
                    }
                    if !handle.send_fragment(text) {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    log::error!("serial read failed: {}", e);
                    break;
                }
            }
        }
        log::info!("serial reader stopped");
    }))
}
