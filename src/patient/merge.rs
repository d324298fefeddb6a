//! Reading merge engine.
//!
//! Live and JSON readings are complete samples and are appended. Total
//! packets only carry cumulative counters, so they are folded field by field
//! into the patient's latest reading instead of starting a new one.

use log::debug;

use crate::logutil::escape_log;

use super::{
    Patient, PatientReading, PatientRegistry, ReadingSource, StepSide, DEFAULT_ACTIVITY_ZONE,
    DEFAULT_HISTORY_WINDOW,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    /// Readings kept per patient.
    pub history_window: usize,
    /// In a Total merge, an incoming `0` leaves the existing value alone.
    pub zero_means_unset: bool,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            zero_means_unset: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadingMerger {
    policy: MergePolicy,
}

impl ReadingMerger {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Apply `partial` to `patient_id`, creating the patient on first contact.
    pub fn apply<'r>(
        &self,
        registry: &'r mut PatientRegistry,
        patient_id: &str,
        partial: PatientReading,
    ) -> &'r Patient {
        let patient = registry.get_or_create(patient_id);
        let merged = match (partial.source, patient.readings.back_mut()) {
            (ReadingSource::Total, Some(latest)) => {
                self.merge_into(latest, &partial);
                true
            }
            _ => false,
        };
        if merged {
            debug!(
                "Merged total counters into latest reading of {}",
                escape_log(&patient.id)
            );
        } else {
            patient.readings.push_back(partial);
        }
        let window = self.policy.history_window.max(1);
        while patient.readings.len() > window {
            patient.readings.pop_front();
        }
        patient
    }

    fn merge_into(&self, existing: &mut PatientReading, incoming: &PatientReading) {
        let zero = self.policy.zero_means_unset;
        merge_number(&mut existing.gps.lat, incoming.gps.lat, zero);
        merge_number(&mut existing.gps.lon, incoming.gps.lon, zero);
        merge_number(&mut existing.gps.speed_kmh, incoming.gps.speed_kmh, zero);
        merge_number(
            &mut existing.gps.distance_total_m,
            incoming.gps.distance_total_m,
            zero,
        );
        merge_number(&mut existing.heart.bpm, incoming.heart.bpm, zero);
        merge_number(&mut existing.heart.rr_ms, incoming.heart.rr_ms, zero);
        merge_number(
            &mut existing.heart.max_bpm_session,
            incoming.heart.max_bpm_session,
            zero,
        );
        merge_number(
            &mut existing.movement.metabolic_power_wkg,
            incoming.movement.metabolic_power_wkg,
            zero,
        );
        merge_number(
            &mut existing.movement.step_balance_percent,
            incoming.movement.step_balance_percent,
            zero,
        );
        merge_number(
            &mut existing.temperature.skin_c,
            incoming.temperature.skin_c,
            zero,
        );
        merge_label(
            &mut existing.movement.activity_zone,
            incoming.movement.activity_zone.as_ref(),
            &DEFAULT_ACTIVITY_ZONE.to_string(),
        );
        merge_label(
            &mut existing.movement.step_balance_side,
            incoming.movement.step_balance_side.as_ref(),
            &StepSide::default(),
        );
    }
}

fn merge_number(existing: &mut Option<f64>, incoming: Option<f64>, zero_means_unset: bool) {
    match incoming {
        Some(value) if zero_means_unset && value == 0.0 => {}
        Some(value) => *existing = Some(value),
        None => {}
    }
}

/// Placeholder values only fill a gap; they never replace a real value.
fn merge_label<T: Clone + PartialEq + IsBlank>(
    existing: &mut Option<T>,
    incoming: Option<&T>,
    placeholder: &T,
) {
    let Some(value) = incoming.filter(|v| !v.is_blank()) else {
        return;
    };
    if value != placeholder || existing.is_none() {
        *existing = Some(value.clone());
    }
}

trait IsBlank {
    fn is_blank(&self) -> bool;
}

impl IsBlank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl IsBlank for StepSide {
    fn is_blank(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(bpm: f64, timestamp: i64) -> PatientReading {
        let mut reading = PatientReading::empty(ReadingSource::Live, timestamp);
        reading.heart.bpm = Some(bpm);
        reading.gps.speed_kmh = Some(10.0);
        reading
    }

    fn total() -> PatientReading {
        PatientReading::empty(ReadingSource::Total, 99)
    }

    #[test]
    fn zero_in_total_keeps_existing_value() {
        let mut registry = PatientRegistry::new();
        let merger = ReadingMerger::default();
        merger.apply(&mut registry, "p1", live(82.0, 1));

        let mut partial = total();
        partial.heart.bpm = Some(0.0);
        partial.gps.distance_total_m = Some(1500.0);
        let patient = merger.apply(&mut registry, "p1", partial);

        assert_eq!(patient.history_len(), 1);
        let latest = patient.latest().unwrap();
        assert_eq!(latest.heart.bpm, Some(82.0));
        assert_eq!(latest.gps.distance_total_m, Some(1500.0));
        assert_eq!(latest.gps.speed_kmh, Some(10.0));
        assert_eq!(latest.timestamp, 1);
        assert_eq!(latest.source, ReadingSource::Live);
    }

    #[test]
    fn zero_overwrites_when_policy_allows() {
        let mut registry = PatientRegistry::new();
        let merger = ReadingMerger::new(MergePolicy {
            zero_means_unset: false,
            ..MergePolicy::default()
        });
        merger.apply(&mut registry, "p1", live(82.0, 1));
        let mut partial = total();
        partial.heart.bpm = Some(0.0);
        let patient = merger.apply(&mut registry, "p1", partial);
        assert_eq!(patient.latest().unwrap().heart.bpm, Some(0.0));
    }

    #[test]
    fn total_without_prior_reading_is_appended() {
        let mut registry = PatientRegistry::new();
        let mut partial = total();
        partial.heart.max_bpm_session = Some(170.0);
        let patient = ReadingMerger::default().apply(&mut registry, "p1", partial);
        assert_eq!(patient.history_len(), 1);
        assert_eq!(patient.latest().unwrap().source, ReadingSource::Total);
    }

    #[test]
    fn live_readings_append_and_window_is_bounded() {
        let mut registry = PatientRegistry::new();
        let merger = ReadingMerger::default();
        for i in 0..10 {
            merger.apply(&mut registry, "p1", live(60.0 + i as f64, i));
        }
        let patient = registry.get("p1").unwrap();
        assert_eq!(patient.history_len(), DEFAULT_HISTORY_WINDOW);
        let first = patient.readings().next().unwrap();
        assert_eq!(first.timestamp, 4);
        assert_eq!(patient.latest().unwrap().heart.bpm, Some(69.0));
    }

    #[test]
    fn placeholders_fill_gaps_but_never_override() {
        let mut registry = PatientRegistry::new();
        let merger = ReadingMerger::default();
        merger.apply(&mut registry, "p1", live(80.0, 1));

        let mut partial = total();
        partial.movement.activity_zone = Some("Z1".to_string());
        partial.movement.step_balance_side = Some(StepSide::Right);
        merger.apply(&mut registry, "p1", partial);
        let latest = registry.get("p1").unwrap().latest().unwrap().clone();
        assert_eq!(latest.movement.activity_zone.as_deref(), Some("Z1"));
        assert_eq!(latest.movement.step_balance_side, Some(StepSide::Right));

        let mut partial = total();
        partial.movement.activity_zone = Some("Z4".to_string());
        merger.apply(&mut registry, "p1", partial);

        let mut partial = total();
        partial.movement.activity_zone = Some(String::new());
        partial.movement.step_balance_side = Some(StepSide::Left);
        let patient = merger.apply(&mut registry, "p1", partial);
        let latest = patient.latest().unwrap();
        assert_eq!(latest.activity_zone(), "Z4");
        assert_eq!(latest.step_balance_side(), StepSide::Right);
    }

    #[test]
    fn patients_are_kept_apart() {
        let mut registry = PatientRegistry::new();
        let merger = ReadingMerger::default();
        merger.apply(&mut registry, "p1", live(70.0, 1));
        merger.apply(&mut registry, "p2", live(90.0, 1));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("p2").unwrap().latest().unwrap().heart.bpm,
            Some(90.0)
        );
    }
}
