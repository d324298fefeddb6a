//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use podlink::config::Config;
use podlink::patient::StepSide;
use podlink::telemetry::packet::{
    Checksum, Coordinate, LivePacket, SmoothingWindow, TotalPacket, WireNumber,
};
use podlink::telemetry::{TelemetrySession, TransportCapability};

/// A bare-coordinate Live packet for pod `01` as a bridge delivers it.
pub const EXAMPLE_FRAGMENTS: [&str; 13] = [
    "L01120000", "1050.0000", "0000", "0000", "01250.000", "0000", "0000", "00500", "00000",
    "00000", "085", "00450", "A3D",
];

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn connected_session(config: &Config) -> TelemetrySession {
    let mut session = TelemetrySession::new(config, TransportCapability::Available);
    session.connect().expect("transport available");
    session
}

fn unsigned() -> Checksum {
    Checksum {
        received: None,
        computed: 0,
    }
}

pub fn live_packet(pod: &str, heart_rate: u16, power_tenths: u32) -> LivePacket {
    LivePacket {
        pod_id: pod.to_string(),
        gps_time: NaiveTime::from_hms_opt(9, 30, 15).unwrap(),
        gps_fix: true,
        latitude: Coordinate {
            degrees: 48.1372,
            hemisphere: Some('N'),
        },
        longitude: Coordinate {
            degrees: 11.5755,
            hemisphere: Some('E'),
        },
        smoothing: SmoothingWindow::default(),
        velocity: WireNumber::Scaled {
            raw: 54,
            divisor: 10,
        },
        heart_rate,
        metabolic_power: WireNumber::Scaled {
            raw: power_tenths,
            divisor: 10,
        },
        checksum: unsigned(),
        double_terminator: false,
    }
}

/// Total packet carrying `heart_rate_max` and nothing else of interest;
/// counters a test does not care about are zero.
pub fn total_packet(pod: &str, distance_m: u32, heart_rate_max: u16) -> TotalPacket {
    TotalPacket {
        pod_id: pod.to_string(),
        gps_time: NaiveTime::from_hms_opt(9, 30, 20).unwrap(),
        gps_fix: true,
        player_load: WireNumber::Scaled {
            raw: 0,
            divisor: 100,
        },
        total_distance_m: distance_m,
        hmdl_distance_m: 0,
        zone6_distance_m: 0,
        zone5_distance_m: 0,
        zone4_distance_m: 0,
        zone6_count: 0,
        zone5_count: 0,
        zone4_count: 0,
        total_accelerations: 0,
        total_decelerations: 0,
        impacts: 0,
        step_balance_side: StepSide::Right,
        step_balance: WireNumber::Scaled {
            raw: 5120,
            divisor: 100,
        },
        max_speed: WireNumber::Scaled {
            raw: 0,
            divisor: 10,
        },
        last_minute_max_speed: WireNumber::Scaled {
            raw: 0,
            divisor: 10,
        },
        rr_average_ms: 0,
        max_heart_rate: u32::from(heart_rate_max),
        checksum: unsigned(),
    }
}
