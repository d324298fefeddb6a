//! JSON-encoded readings.
//!
//! Newer bridges send readings already converted to physical units:
//!
//! ```json
//! {"patientId":"p2","timestamp":1700000000,
//!  "gps":{"lat":48.1,"lon":11.5,"speedKmh":7.2,"distanceTotalM":1200},
//!  "heart":{"bpm":77,"rrMs":780,"maxBpmSession":150},
//!  "movement":{"metabolicPowerWkg":4.5,"activityZone":"Z2","stepBalanceSide":"left","stepBalancePercent":50.5},
//!  "temperature":{"skinC":33.1}}
//! ```
//!
//! Only the patient identifier (`patientId`, or `patient_id`) is required.
//! Absent numeric fields stay `None`; absent strings fall back to the display
//! defaults (`"Z1"`, `left`) when read through [`PatientReading`].

use serde::{Deserialize, Serialize};

use super::error::TelemetryError;
use crate::patient::{
    GpsReading, HeartReading, MovementReading, PatientReading, ReadingSource, TemperatureReading,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReading {
    #[serde(alias = "patient_id")]
    pub patient_id: String,
    /// Epoch seconds; receive time is used when absent.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub gps: GpsReading,
    #[serde(default)]
    pub heart: HeartReading,
    #[serde(default)]
    pub movement: MovementReading,
    #[serde(default)]
    pub temperature: TemperatureReading,
}

impl JsonReading {
    /// Normalized reading, stamped with `received_at` when the message had no timestamp.
    pub fn to_reading(&self, received_at: i64) -> PatientReading {
        let mut movement = self.movement.clone();
        if movement
            .activity_zone
            .as_deref()
            .is_some_and(|zone| zone.trim().is_empty())
        {
            movement.activity_zone = None;
        }
        PatientReading {
            timestamp: self
                .timestamp
                .filter(|ts| ts.is_finite() && *ts > 0.0)
                .map(|ts| ts as i64)
                .unwrap_or(received_at),
            source: ReadingSource::Json,
            gps: self.gps.clone(),
            heart: self.heart.clone(),
            movement,
            temperature: self.temperature.clone(),
        }
    }
}

/// Parse one complete JSON message.
pub fn decode_json(message: &str) -> Result<JsonReading, TelemetryError> {
    let reading: JsonReading =
        serde_json::from_str(message).map_err(|e| TelemetryError::MalformedJson(e.to_string()))?;
    if reading.patient_id.trim().is_empty() {
        return Err(TelemetryError::MalformedJson(
            "empty patient identifier".to_string(),
        ));
    }
    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::StepSide;

    #[test]
    fn minimal_reading_defaults_everything_else() {
        let reading = decode_json(r#"{"patientId":"p2","heart":{"bpm":77}}"#).unwrap();
        assert_eq!(reading.patient_id, "p2");
        assert_eq!(reading.heart.bpm, Some(77.0));
        assert_eq!(reading.heart.rr_ms, None);
        assert_eq!(reading.gps, GpsReading::default());
        assert_eq!(reading.timestamp, None);

        let normalized = reading.to_reading(42);
        assert_eq!(normalized.timestamp, 42);
        assert_eq!(normalized.activity_zone(), "Z1");
        assert_eq!(normalized.step_balance_side(), StepSide::Left);
        assert_eq!(normalized.source, ReadingSource::Json);
    }

    #[test]
    fn snake_case_identifier_is_accepted() {
        let reading = decode_json(r#"{"patient_id":"p9","timestamp":1700000000}"#).unwrap();
        assert_eq!(reading.patient_id, "p9");
        assert_eq!(reading.to_reading(1).timestamp, 1_700_000_000);
    }

    #[test]
    fn full_reading() {
        let text = r#"{"patientId":"p1","timestamp":1700000100,
            "gps":{"lat":48.1,"lon":11.5,"speedKmh":7.2,"distanceTotalM":1200},
            "heart":{"bpm":90,"rrMs":660,"maxBpmSession":171},
            "movement":{"metabolicPowerWkg":4.5,"activityZone":"Z3","stepBalanceSide":"right","stepBalancePercent":49.5},
            "temperature":{"skinC":33.1}}"#;
        let reading = decode_json(text).unwrap().to_reading(0);
        assert_eq!(reading.gps.distance_total_m, Some(1200.0));
        assert_eq!(reading.activity_zone(), "Z3");
        assert_eq!(reading.movement.step_balance_side, Some(StepSide::Right));
        assert_eq!(reading.temperature.skin_c, Some(33.1));
    }

    #[test]
    fn missing_identifier_is_malformed() {
        assert!(matches!(
            decode_json(r#"{"heart":{"bpm":77}}"#),
            Err(TelemetryError::MalformedJson(_))
        ));
        assert!(matches!(
            decode_json(r#"{"patientId":"  "}"#),
            Err(TelemetryError::MalformedJson(_))
        ));
        assert!(matches!(
            decode_json(r#"{"patientId":"p1""#),
            Err(TelemetryError::MalformedJson(_))
        ));
    }

    #[test]
    fn blank_zone_falls_back_to_placeholder() {
        let reading = decode_json(r#"{"patientId":"p1","movement":{"activityZone":""}}"#)
            .unwrap()
            .to_reading(0);
        assert_eq!(reading.movement.activity_zone, None);
        assert_eq!(reading.activity_zone(), "Z1");
    }
}
