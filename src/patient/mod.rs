//! Patients and their reading history.
//!
//! A [`Patient`] is created the first time one of its pods (or a JSON reading
//! naming it) is seen on a connection, and every patient is dropped again when
//! that connection goes away. Readings are written only through
//! [`ReadingMerger`].

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

pub mod merge;
mod reading;

pub use merge::{MergePolicy, ReadingMerger};
pub use reading::{
    GpsReading, HeartReading, MovementReading, PatientReading, ReadingSource, StepSide,
    TemperatureReading, DEFAULT_ACTIVITY_ZONE,
};

/// Readings kept per patient unless configured otherwise.
pub const DEFAULT_HISTORY_WINDOW: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: String,
    pub is_connected: bool,
    readings: VecDeque<PatientReading>,
}

impl Patient {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            is_connected: true,
            readings: VecDeque::new(),
        }
    }

    /// Oldest first.
    pub fn readings(&self) -> impl Iterator<Item = &PatientReading> {
        self.readings.iter()
    }

    pub fn latest(&self) -> Option<&PatientReading> {
        self.readings.back()
    }

    pub fn history_len(&self) -> usize {
        self.readings.len()
    }

    pub fn snapshot(&self) -> PatientSnapshot {
        PatientSnapshot {
            id: self.id.clone(),
            is_connected: self.is_connected,
            activity_zone: self
                .latest()
                .map(|r| r.activity_zone())
                .unwrap_or(DEFAULT_ACTIVITY_ZONE)
                .to_string(),
            step_balance_side: self
                .latest()
                .map(PatientReading::step_balance_side)
                .unwrap_or_default(),
            latest: self.latest().cloned(),
            history: self.readings.iter().cloned().collect(),
        }
    }
}

/// Read-only view handed to the display layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    pub id: String,
    pub is_connected: bool,
    pub activity_zone: String,
    pub step_balance_side: StepSide,
    pub latest: Option<PatientReading>,
    pub history: Vec<PatientReading>,
}

/// Patients of one connection, keyed by patient id.
#[derive(Debug, Default)]
pub struct PatientRegistry {
    patients: BTreeMap<String, Patient>,
}

impl PatientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, patient_id: &str) -> &mut Patient {
        if !self.patients.contains_key(patient_id) {
            log::info!("New patient {}", crate::logutil::escape_log(patient_id));
        }
        self.patients
            .entry(patient_id.to_string())
            .or_insert_with(|| Patient::new(patient_id))
    }

    pub fn get(&self, patient_id: &str) -> Option<&Patient> {
        self.patients.get(patient_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Drop every patient. Called when the transport disconnects.
    pub fn clear_all(&mut self) {
        if !self.patients.is_empty() {
            log::info!("Clearing {} patient(s)", self.patients.len());
        }
        self.patients.clear();
    }
}
