//! Merge rules as seen through a session: Live appends, Total folds in.

mod common;

use std::collections::BTreeMap;

use common::{at, connected_session, live_packet, total_packet};
use podlink::config::Config;
use podlink::patient::{PatientReading, PatientRegistry, ReadingMerger, ReadingSource, StepSide};

#[test]
fn test_total_counters_fold_into_latest_live_reading() {
    let mut session = connected_session(&Config::default());
    session
        .on_fragment(&live_packet("01", 82, 450).encode(), at(1_000))
        .unwrap();
    session
        .on_fragment(&total_packet("01", 1500, 176).encode(), at(1_005))
        .unwrap();

    let patient = session.patient("01").unwrap();
    assert_eq!(patient.history.len(), 1);
    let latest = patient.latest.unwrap();
    assert_eq!(latest.source, ReadingSource::Live);
    assert_eq!(latest.timestamp, 1_000);
    assert_eq!(latest.heart.bpm, Some(82.0));
    assert_eq!(latest.heart.max_bpm_session, Some(176.0));
    assert_eq!(latest.gps.distance_total_m, Some(1500.0));
    assert_eq!(latest.movement.step_balance_side, Some(StepSide::Right));
    // rr average of 0 on the wire is "not measured"
    assert_eq!(latest.heart.rr_ms, None);
}

#[test]
fn test_zero_in_total_does_not_clear_a_value() {
    let mut registry = PatientRegistry::new();
    let merger = ReadingMerger::default();

    let mut live = PatientReading::empty(ReadingSource::Live, 1);
    live.heart.bpm = Some(82.0);
    merger.apply(&mut registry, "p1", live);

    let mut total = PatientReading::empty(ReadingSource::Total, 2);
    total.heart.bpm = Some(0.0);
    let patient = merger.apply(&mut registry, "p1", total);

    assert_eq!(patient.latest().unwrap().heart.bpm, Some(82.0));
}

#[test]
fn test_history_window_comes_from_config() {
    let mut config = Config::default();
    config.registry.history_window = 3;
    let mut session = connected_session(&config);

    for (i, bpm) in [60u16, 61, 62, 63, 64].into_iter().enumerate() {
        session
            .on_fragment(&live_packet("02", bpm, 10).encode(), at(i as i64))
            .unwrap();
    }
    let patient = session.patient("02").unwrap();
    let bpms: Vec<Option<f64>> = patient.history.iter().map(|r| r.heart.bpm).collect();
    assert_eq!(bpms, vec![Some(62.0), Some(63.0), Some(64.0)]);
}

#[test]
fn test_pod_aliases_route_packets_to_patients() {
    let mut config = Config::default();
    config.registry.pod_aliases =
        BTreeMap::from([("07".to_string(), "ward-3-bed-2".to_string())]);
    let mut session = connected_session(&config);

    session
        .on_fragment(&live_packet("07", 99, 10).encode(), at(1))
        .unwrap();
    session
        .on_fragment(&total_packet("07", 800, 150).encode(), at(2))
        .unwrap();

    assert!(session.patient("07").is_none());
    let patient = session.patient("ward-3-bed-2").unwrap();
    assert_eq!(patient.history.len(), 1);
    assert_eq!(patient.latest.unwrap().gps.distance_total_m, Some(800.0));
}

#[test]
fn test_disconnect_clears_patients() {
    let mut session = connected_session(&Config::default());
    session
        .on_fragment(&live_packet("01", 70, 10).encode(), at(1))
        .unwrap();
    assert_eq!(session.patients().len(), 1);

    session.disconnect();
    assert!(session.patients().is_empty());
    assert!(session.on_fragment("L01", at(2)).is_err());
}
