//! Normalized per-sample patient record.
//!
//! Every numeric field is optional: `None` means "not provided by this
//! packet", which is what lets a Total packet update a few fields without
//! wiping the ones only Live packets carry.

use serde::{Deserialize, Serialize};

use crate::telemetry::packet::{LivePacket, TotalPacket};
use crate::telemetry::units::knots_to_kmh;

/// Display placeholder used when no activity zone is known.
pub const DEFAULT_ACTIVITY_ZONE: &str = "Z1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepSide {
    #[default]
    Left,
    Right,
}

impl StepSide {
    /// Wire encoding in Total packets: `L`/`0` left, `R`/`1` right.
    pub fn from_wire(text: &str) -> Option<Self> {
        match text {
            "L" | "0" => Some(StepSide::Left),
            "R" | "1" => Some(StepSide::Right),
            _ => None,
        }
    }

    pub fn wire_char(self) -> char {
        match self {
            StepSide::Left => 'L',
            StepSide::Right => 'R',
        }
    }
}

/// Which kind of message produced a reading; decides the merge rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSource {
    Live,
    Total,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsReading {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub distance_total_m: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartReading {
    pub bpm: Option<f64>,
    pub rr_ms: Option<f64>,
    pub max_bpm_session: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReading {
    pub metabolic_power_wkg: Option<f64>,
    pub activity_zone: Option<String>,
    pub step_balance_side: Option<StepSide>,
    pub step_balance_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureReading {
    pub skin_c: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientReading {
    /// Epoch seconds.
    pub timestamp: i64,
    pub source: ReadingSource,
    pub gps: GpsReading,
    pub heart: HeartReading,
    pub movement: MovementReading,
    pub temperature: TemperatureReading,
}

impl PatientReading {
    pub fn empty(source: ReadingSource, timestamp: i64) -> Self {
        Self {
            timestamp,
            source,
            gps: GpsReading::default(),
            heart: HeartReading::default(),
            movement: MovementReading::default(),
            temperature: TemperatureReading::default(),
        }
    }

    /// Live sample. Position and speed are only trusted with a GPS fix.
    pub fn from_live(packet: &LivePacket, timestamp: i64) -> Self {
        let mut reading = Self::empty(ReadingSource::Live, timestamp);
        if packet.gps_fix {
            reading.gps.lat = Some(packet.latitude.degrees);
            reading.gps.lon = Some(packet.longitude.degrees);
            reading.gps.speed_kmh = Some(knots_to_kmh(packet.velocity.value()));
        }
        reading.heart.bpm = Some(f64::from(packet.heart_rate));
        reading.movement.metabolic_power_wkg = Some(packet.metabolic_power.value());
        reading
    }

    /// Cumulative counters from a Total packet; only the fields it carries are set.
    pub fn from_total(packet: &TotalPacket, timestamp: i64) -> Self {
        let mut reading = Self::empty(ReadingSource::Total, timestamp);
        reading.gps.distance_total_m = Some(f64::from(packet.total_distance_m));
        reading.heart.rr_ms = Some(f64::from(packet.rr_average_ms));
        reading.heart.max_bpm_session = Some(f64::from(packet.max_heart_rate));
        reading.movement.step_balance_side = Some(packet.step_balance_side);
        reading.movement.step_balance_percent = Some(packet.step_balance.value());
        reading
    }

    /// Activity zone for display, falling back to the placeholder.
    pub fn activity_zone(&self) -> &str {
        self.movement
            .activity_zone
            .as_deref()
            .unwrap_or(DEFAULT_ACTIVITY_ZONE)
    }

    pub fn step_balance_side(&self) -> StepSide {
        self.movement.step_balance_side.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::packet::fixtures;

    #[test]
    fn live_packet_normalizes_units() {
        let packet = fixtures::live("01", 85, 450);
        let reading = PatientReading::from_live(&packet, 1_700_000_000);
        assert_eq!(reading.source, ReadingSource::Live);
        assert_eq!(reading.heart.bpm, Some(85.0));
        assert_eq!(reading.movement.metabolic_power_wkg, Some(45.0));
        let speed = reading.gps.speed_kmh.unwrap();
        assert!((speed - 12.3 * 1.852).abs() < 1e-9);
        assert!(reading.gps.distance_total_m.is_none());
        assert!(reading.heart.max_bpm_session.is_none());
    }

    #[test]
    fn live_without_fix_has_no_position() {
        let mut packet = fixtures::live("01", 85, 450);
        packet.gps_fix = false;
        let reading = PatientReading::from_live(&packet, 0);
        assert_eq!(reading.gps.lat, None);
        assert_eq!(reading.gps.speed_kmh, None);
        assert_eq!(reading.heart.bpm, Some(85.0));
    }

    #[test]
    fn total_packet_sets_only_cumulative_fields() {
        let packet = fixtures::total("01");
        let reading = PatientReading::from_total(&packet, 5);
        assert_eq!(reading.gps.distance_total_m, Some(4321.0));
        assert_eq!(reading.heart.max_bpm_session, Some(181.0));
        assert_eq!(reading.heart.rr_ms, Some(712.0));
        assert_eq!(reading.movement.step_balance_side, Some(StepSide::Right));
        assert_eq!(reading.heart.bpm, None);
        assert_eq!(reading.gps.lat, None);
    }

    #[test]
    fn display_defaults() {
        let reading = PatientReading::empty(ReadingSource::Json, 0);
        assert_eq!(reading.activity_zone(), "Z1");
        assert_eq!(reading.step_balance_side(), StepSide::Left);
    }

    #[test]
    fn serializes_camel_case() {
        let mut reading = PatientReading::empty(ReadingSource::Live, 1);
        reading.gps.speed_kmh = Some(3.5);
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["gps"]["speedKmh"], 3.5);
        assert_eq!(json["source"], "live");
        assert!(json["temperature"]["skinC"].is_null());
    }
}
