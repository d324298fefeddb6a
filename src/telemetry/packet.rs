//! Fixed-width positional ASCII packets emitted by the sensor pod.
//!
//! Three kinds share one shape, `<leader><fields><checksum hex><terminator>`:
//!
//! | Kind   | Leader | Body (after leader)                                               | Terminator |
//! |--------|--------|-------------------------------------------------------------------|------------|
//! | Live   | `L`    | pod, time, fix, lat, 2 prev lat, lon, 2 prev lon, vel, 2 prev vel, hr, power | `D`/`DD` |
//! | Total  | `T`    | pod, time, fix, load, distances, zone counts, acc/dec/impacts, step balance, speeds, rr, max hr | `D` |
//! | Status | `S`    | pod, date, time, 12-char reserved block                           | `D`        |
//!
//! The checksum is CRC-8 over everything before it (leader included), see
//! [`crc8`](super::crc8). Numeric subfields that older firmware sends as scaled
//! integers and newer firmware as literal decimals are kept as [`WireNumber`].

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::crc8;
use super::error::TelemetryError;
use super::terminator::{scan_tail, TailScan};
use super::units::{self, format_degree_minutes};
use crate::patient::StepSide;

const HEADER_LEN: usize = 10; // leader + pod(2) + time(6) + fix(1)
const LAT_START: usize = HEADER_LEN;
const COORD_WINDOW: usize = 11;
const BARE_LAT_WIDTH: usize = 8;
const BARE_LON_WIDTH: usize = 9;
const PREV_COORD_WIDTH: usize = 4;
const VELOCITY_WIDTH: usize = 5;
const HEART_RATE_WIDTH: usize = 3;
const POWER_WIDTH: usize = 5;
/// Live body after the longitude: prevLon x2, vel x3, hr, power.
const LIVE_TRAILER: usize = 2 * PREV_COORD_WIDTH + 3 * VELOCITY_WIDTH + HEART_RATE_WIDTH + POWER_WIDTH;

const TOTAL_BODY_LEN: usize = 72;
const STATUS_BODY_LEN: usize = 27;
const STATUS_RESERVED_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PacketKind {
    Live,
    Total,
    Status,
}

impl PacketKind {
    pub fn from_leader(leader: char) -> Option<Self> {
        match leader {
            'L' => Some(PacketKind::Live),
            'T' => Some(PacketKind::Total),
            'S' => Some(PacketKind::Status),
            _ => None,
        }
    }

    pub fn leader(self) -> char {
        match self {
            PacketKind::Live => 'L',
            PacketKind::Total => 'T',
            PacketKind::Status => 'S',
        }
    }

    /// Shortest possible message of this kind: smallest body plus a terminator.
    pub fn min_len(self) -> usize {
        match self {
            PacketKind::Live => HEADER_LEN + BARE_LAT_WIDTH + 2 * PREV_COORD_WIDTH + BARE_LON_WIDTH + LIVE_TRAILER + 1,
            PacketKind::Total => TOTAL_BODY_LEN + 1,
            PacketKind::Status => STATUS_BODY_LEN + 1,
        }
    }

    /// Whether `DD` at the end may be a double terminator rather than a hex `D`
    /// followed by the terminator.
    fn allows_double_terminator(self) -> bool {
        matches!(self, PacketKind::Live)
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Live => "Live",
            PacketKind::Total => "Total",
            PacketKind::Status => "Status",
        };
        f.write_str(name)
    }
}

/// Length of the fixed-width body (everything before the checksum), or `None`
/// while too little text is present to tell. Live bodies vary with the
/// coordinate encoding, so both hemisphere lookahead windows must be visible.
pub fn body_len(kind: PacketKind, text: &str) -> Option<usize> {
    match kind {
        PacketKind::Live => {
            let lat_width = coordinate_width(text, LAT_START, ['N', 'S'], BARE_LAT_WIDTH)?;
            let lon_start = LAT_START + lat_width + 2 * PREV_COORD_WIDTH;
            let lon_width = coordinate_width(text, lon_start, ['E', 'W'], BARE_LON_WIDTH)?;
            Some(lon_start + lon_width + LIVE_TRAILER)
        }
        PacketKind::Total => Some(TOTAL_BODY_LEN),
        PacketKind::Status => Some(STATUS_BODY_LEN),
    }
}

fn coordinate_width(text: &str, start: usize, letters: [char; 2], bare: usize) -> Option<usize> {
    let window = text.as_bytes().get(start..start + COORD_WINDOW)?;
    Some(
        window
            .iter()
            .position(|&b| b == letters[0] as u8 || b == letters[1] as u8)
            .map(|pos| pos + 1)
            .unwrap_or(bare),
    )
}

/// Numeric subfield sent either as a scaled integer (historic firmware) or as a
/// literal decimal (newer firmware). Which one is decided per field by the
/// presence of a `.`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum WireNumber {
    Scaled { raw: u32, divisor: u32 },
    Decimal { value: f64, places: u8 },
}

impl WireNumber {
    /// Generator-side constructor for the scaled-integer form.
    pub fn scaled(value: f64, divisor: u32) -> Self {
        WireNumber::Scaled {
            raw: (value * f64::from(divisor)).round().max(0.0) as u32,
            divisor,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            WireNumber::Scaled { raw, divisor: 10 } => units::scaled_tenths_to_unit(f64::from(raw)),
            WireNumber::Scaled { raw, divisor: 100 } => units::huncents_to_percent(f64::from(raw)),
            WireNumber::Scaled { raw, divisor } => f64::from(raw) / f64::from(divisor.max(1)),
            WireNumber::Decimal { value, .. } => value,
        }
    }

    fn parse(field: &'static str, text: &str, divisor: u32) -> Result<Self, TelemetryError> {
        let trimmed = text.trim();
        if let Some(dot) = trimmed.find('.') {
            let value: f64 = trimmed
                .parse()
                .map_err(|_| TelemetryError::invalid(field, text))?;
            if value < 0.0 || !value.is_finite() {
                return Err(TelemetryError::invalid(field, text));
            }
            let places = (trimmed.len() - dot - 1) as u8;
            Ok(WireNumber::Decimal { value, places })
        } else {
            Ok(WireNumber::Scaled {
                raw: parse_digits(field, trimmed)?,
                divisor,
            })
        }
    }

    fn encode(&self, width: usize) -> String {
        match *self {
            WireNumber::Scaled { raw, .. } => format!("{:0width$}", raw, width = width),
            WireNumber::Decimal { value, places } => {
                let text = format!("{:0width$.places$}", value, width = width, places = places as usize);
                match text.strip_prefix('0') {
                    Some(rest) if text.len() > width && rest.starts_with('.') => rest.to_string(),
                    _ => text,
                }
            }
        }
    }
}

fn parse_digits(field: &'static str, text: &str) -> Result<u32, TelemetryError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TelemetryError::invalid(field, text));
    }
    text.parse().map_err(|_| TelemetryError::invalid(field, text))
}

/// Received checksum next to the one computed over the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Checksum {
    pub received: Option<u8>,
    pub computed: u8,
}

impl Checksum {
    pub fn is_valid(&self) -> bool {
        self.received == Some(self.computed)
    }
}

/// What to do with a packet whose checksum does not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumPolicy {
    /// Keep the packet, log and count the mismatch.
    #[default]
    Advisory,
    /// Discard the packet with [`TelemetryError::ChecksumMismatch`].
    Reject,
}

/// A degree-minute coordinate as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    /// Signed decimal degrees.
    pub degrees: f64,
    /// Hemisphere letter when the lettered encoding was used.
    pub hemisphere: Option<char>,
}

/// Previous-sample windows carried for downstream smoothing; raw wire integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SmoothingWindow {
    pub prev_lat: [u32; 2],
    pub prev_lon: [u32; 2],
    pub prev_velocity: [u32; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivePacket {
    pub pod_id: String,
    pub gps_time: NaiveTime,
    pub gps_fix: bool,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub smoothing: SmoothingWindow,
    /// Speed over ground in knots.
    pub velocity: WireNumber,
    pub heart_rate: u16,
    /// Metabolic power, W/kg.
    pub metabolic_power: WireNumber,
    pub checksum: Checksum,
    pub double_terminator: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalPacket {
    pub pod_id: String,
    pub gps_time: NaiveTime,
    pub gps_fix: bool,
    pub player_load: WireNumber,
    pub total_distance_m: u32,
    pub hmdl_distance_m: u32,
    pub zone6_distance_m: u32,
    pub zone5_distance_m: u32,
    pub zone4_distance_m: u32,
    pub zone6_count: u32,
    pub zone5_count: u32,
    pub zone4_count: u32,
    pub total_accelerations: u32,
    pub total_decelerations: u32,
    pub impacts: u32,
    pub step_balance_side: StepSide,
    /// Step balance, percent.
    pub step_balance: WireNumber,
    /// Session max speed, knots.
    pub max_speed: WireNumber,
    /// Max speed over the last minute, knots.
    pub last_minute_max_speed: WireNumber,
    pub rr_average_ms: u32,
    pub max_heart_rate: u32,
    pub checksum: Checksum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPacket {
    pub pod_id: String,
    /// `None` while the receiver has no date yet (`000000`).
    pub gps_date: Option<NaiveDate>,
    pub gps_time: NaiveTime,
    pub reserved: String,
    pub checksum: Checksum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ParsedPacket {
    Live(LivePacket),
    Total(TotalPacket),
    Status(StatusPacket),
}

impl ParsedPacket {
    pub fn kind(&self) -> PacketKind {
        match self {
            ParsedPacket::Live(_) => PacketKind::Live,
            ParsedPacket::Total(_) => PacketKind::Total,
            ParsedPacket::Status(_) => PacketKind::Status,
        }
    }

    pub fn pod_id(&self) -> &str {
        match self {
            ParsedPacket::Live(p) => &p.pod_id,
            ParsedPacket::Total(p) => &p.pod_id,
            ParsedPacket::Status(p) => &p.pod_id,
        }
    }

    pub fn checksum(&self) -> Checksum {
        match self {
            ParsedPacket::Live(p) => p.checksum,
            ParsedPacket::Total(p) => p.checksum,
            ParsedPacket::Status(p) => p.checksum,
        }
    }
}

/// Sequential reader over a fixed-width body.
struct Fields<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str) -> Self {
        // skip the leader
        Self { text, pos: 1 }
    }

    fn take(&mut self, field: &'static str, width: usize) -> Result<&'a str, TelemetryError> {
        let value = self
            .text
            .get(self.pos..self.pos + width)
            .ok_or_else(|| TelemetryError::invalid(field, self.text.get(self.pos..).unwrap_or("")))?;
        self.pos += width;
        Ok(value)
    }

    fn digits(&mut self, field: &'static str, width: usize) -> Result<u32, TelemetryError> {
        let text = self.take(field, width)?;
        parse_digits(field, text)
    }

    fn number(&mut self, field: &'static str, width: usize, divisor: u32) -> Result<WireNumber, TelemetryError> {
        let text = self.take(field, width)?;
        WireNumber::parse(field, text, divisor)
    }

    fn time(&mut self) -> Result<NaiveTime, TelemetryError> {
        let text = self.take("gps_time", 6)?;
        NaiveTime::parse_from_str(text, "%H%M%S").map_err(|_| TelemetryError::invalid("gps_time", text))
    }

    fn fix(&mut self) -> Result<bool, TelemetryError> {
        match self.take("gps_fix", 1)? {
            "1" | "A" => Ok(true),
            "0" | "V" => Ok(false),
            other => Err(TelemetryError::invalid("gps_fix", other)),
        }
    }

    fn pod_id(&mut self) -> Result<String, TelemetryError> {
        let text = self.take("pod_id", 2)?;
        if !text.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(TelemetryError::invalid("pod_id", text));
        }
        Ok(text.to_string())
    }

    fn coordinate(
        &mut self,
        field: &'static str,
        width: usize,
        parse: fn(&str) -> Option<f64>,
    ) -> Result<Coordinate, TelemetryError> {
        let text = self.take(field, width)?;
        let degrees = parse(text).ok_or_else(|| TelemetryError::invalid(field, text))?;
        let hemisphere = text.chars().last().filter(|c| c.is_ascii_alphabetic());
        Ok(Coordinate { degrees, hemisphere })
    }
}

/// Decode one complete ASCII packet.
pub fn decode_packet(message: &str, policy: ChecksumPolicy) -> Result<ParsedPacket, TelemetryError> {
    let leader = message.chars().next().ok_or(TelemetryError::Empty)?;
    let kind = PacketKind::from_leader(leader).ok_or(TelemetryError::UnknownKind(leader))?;

    let body = body_len(kind, message).ok_or(TelemetryError::Truncated {
        kind,
        len: message.len(),
        min: kind.min_len(),
    })?;
    if message.len() <= body {
        return Err(TelemetryError::Truncated {
            kind,
            len: message.len(),
            min: body + 1,
        });
    }
    let body_text = message
        .get(..body)
        .ok_or_else(|| TelemetryError::invalid("body", message))?;
    let tail = message
        .get(body..)
        .ok_or_else(|| TelemetryError::invalid("checksum", message))?;

    let (checksum, double_terminator) = resolve_checksum(kind, body_text, tail)?;
    if !checksum.is_valid() {
        match policy {
            ChecksumPolicy::Reject => {
                return Err(TelemetryError::ChecksumMismatch {
                    received: checksum.received,
                    computed: checksum.computed,
                })
            }
            ChecksumPolicy::Advisory => warn!(
                "{} packet checksum mismatch: received {:?}, computed {:02X}",
                kind, checksum.received, checksum.computed
            ),
        }
    }

    match kind {
        PacketKind::Live => decode_live(body_text, checksum, double_terminator).map(ParsedPacket::Live),
        PacketKind::Total => decode_total(body_text, checksum).map(ParsedPacket::Total),
        PacketKind::Status => decode_status(body_text, checksum).map(ParsedPacket::Status),
    }
}

/// Split the tail into checksum digits and terminator, using the CRC to settle
/// the Live `DD` ambiguity. Returns the checksum and whether the packet ended
/// with a double terminator.
fn resolve_checksum(kind: PacketKind, body: &str, tail: &str) -> Result<(Checksum, bool), TelemetryError> {
    let computed = crc8::checksum(body.as_bytes());
    let (end, doubled) = match scan_tail(tail, true) {
        TailScan::Complete { end, doubled } => (end, doubled),
        TailScan::Pending | TailScan::Invalid => return Err(TelemetryError::MissingTerminator { kind }),
    };
    if end < tail.len() {
        debug!("{} packet: ignoring {} chars after terminator", kind, tail.len() - end);
    }

    // The automaton only accepts ASCII hex and `D` up to `end`.
    let single = crc8::parse_hex(&tail[..end - 1]);
    if !doubled || !kind.allows_double_terminator() || single == Some(computed) {
        return Ok((
            Checksum {
                received: single,
                computed,
            },
            false,
        ));
    }
    let received = crc8::parse_hex(&tail[..end - 2]);
    Ok((Checksum { received, computed }, true))
}

fn decode_live(body: &str, checksum: Checksum, double_terminator: bool) -> Result<LivePacket, TelemetryError> {
    let lat_width = coordinate_width(body, LAT_START, ['N', 'S'], BARE_LAT_WIDTH).unwrap_or(BARE_LAT_WIDTH);
    let lon_start = LAT_START + lat_width + 2 * PREV_COORD_WIDTH;
    let lon_width = coordinate_width(body, lon_start, ['E', 'W'], BARE_LON_WIDTH).unwrap_or(BARE_LON_WIDTH);

    let mut fields = Fields::new(body);
    let pod_id = fields.pod_id()?;
    let gps_time = fields.time()?;
    let gps_fix = fields.fix()?;
    let latitude = fields.coordinate("latitude", lat_width, units::parse_latitude)?;
    let prev_lat = [
        fields.digits("prev_lat", PREV_COORD_WIDTH)?,
        fields.digits("prev_lat", PREV_COORD_WIDTH)?,
    ];
    let longitude = fields.coordinate("longitude", lon_width, units::parse_longitude)?;
    let prev_lon = [
        fields.digits("prev_lon", PREV_COORD_WIDTH)?,
        fields.digits("prev_lon", PREV_COORD_WIDTH)?,
    ];
    let velocity = fields.number("velocity", VELOCITY_WIDTH, 10)?;
    let prev_velocity = [
        fields.digits("prev_velocity", VELOCITY_WIDTH)?,
        fields.digits("prev_velocity", VELOCITY_WIDTH)?,
    ];
    let heart_rate = fields.digits("heart_rate", HEART_RATE_WIDTH)? as u16;
    let metabolic_power = fields.number("metabolic_power", POWER_WIDTH, 10)?;

    Ok(LivePacket {
        pod_id,
        gps_time,
        gps_fix,
        latitude,
        longitude,
        smoothing: SmoothingWindow {
            prev_lat,
            prev_lon,
            prev_velocity,
        },
        velocity,
        heart_rate,
        metabolic_power,
        checksum,
        double_terminator,
    })
}

fn decode_total(body: &str, checksum: Checksum) -> Result<TotalPacket, TelemetryError> {
    let mut f = Fields::new(body);
    Ok(TotalPacket {
        pod_id: f.pod_id()?,
        gps_time: f.time()?,
        gps_fix: f.fix()?,
        player_load: f.number("player_load", 5, 100)?,
        total_distance_m: f.digits("total_distance", 5)?,
        hmdl_distance_m: f.digits("hmdl_distance", 5)?,
        zone6_distance_m: f.digits("zone6_distance", 4)?,
        zone5_distance_m: f.digits("zone5_distance", 4)?,
        zone4_distance_m: f.digits("zone4_distance", 4)?,
        zone6_count: f.digits("zone6_count", 2)?,
        zone5_count: f.digits("zone5_count", 3)?,
        zone4_count: f.digits("zone4_count", 3)?,
        total_accelerations: f.digits("total_accelerations", 3)?,
        total_decelerations: f.digits("total_decelerations", 3)?,
        impacts: f.digits("impacts", 2)?,
        step_balance_side: {
            let text = f.take("step_balance_side", 1)?;
            StepSide::from_wire(text).ok_or_else(|| TelemetryError::invalid("step_balance_side", text))?
        },
        step_balance: f.number("step_balance", 4, 100)?,
        max_speed: f.number("max_speed", 4, 10)?,
        last_minute_max_speed: f.number("last_minute_max_speed", 4, 10)?,
        rr_average_ms: f.digits("rr_average", 3)?,
        max_heart_rate: f.digits("max_heart_rate", 3)?,
        checksum,
    })
}

fn decode_status(body: &str, checksum: Checksum) -> Result<StatusPacket, TelemetryError> {
    let mut f = Fields::new(body);
    let pod_id = f.pod_id()?;
    let date_text = f.take("gps_date", 6)?;
    let gps_date = if date_text == "000000" {
        None
    } else {
        Some(
            NaiveDate::parse_from_str(date_text, "%y%m%d")
                .map_err(|_| TelemetryError::invalid("gps_date", date_text))?,
        )
    };
    let gps_time = f.time()?;
    let reserved = f.take("reserved", STATUS_RESERVED_WIDTH)?.to_string();
    Ok(StatusPacket {
        pod_id,
        gps_date,
        gps_time,
        reserved,
        checksum,
    })
}

fn finish(mut body: String, double_terminator: bool) -> String {
    let crc = crc8::checksum(body.as_bytes());
    body.push_str(&crc8::to_hex(crc));
    body.push('D');
    if double_terminator {
        body.push('D');
    }
    body
}

fn encode_coordinate(coord: &Coordinate, lat: bool) -> String {
    let (positive, negative, bare_width, lettered_width, decimals) = if lat {
        ('N', 'S', BARE_LAT_WIDTH, 10, 5)
    } else {
        ('E', 'W', BARE_LON_WIDTH, 9, 3)
    };
    if coord.hemisphere.is_none() && coord.degrees >= 0.0 {
        let deg = coord.degrees.floor();
        let packed = deg * 100.0 + (coord.degrees - deg) * 60.0;
        format!("{:0width$.3}", packed, width = bare_width)
    } else {
        format_degree_minutes(coord.degrees, positive, negative, lettered_width, decimals)
    }
}

fn format_time(time: &NaiveTime) -> String {
    time.format("%H%M%S").to_string()
}

impl LivePacket {
    /// Wire form, as the pod firmware would emit it (checksum recomputed).
    pub fn encode(&self) -> String {
        let w = &self.smoothing;
        let body = format!(
            "L{}{}{}{}{:04}{:04}{}{:04}{:04}{}{:05}{:05}{:03}{}",
            self.pod_id,
            format_time(&self.gps_time),
            if self.gps_fix { '1' } else { '0' },
            encode_coordinate(&self.latitude, true),
            w.prev_lat[0],
            w.prev_lat[1],
            encode_coordinate(&self.longitude, false),
            w.prev_lon[0],
            w.prev_lon[1],
            self.velocity.encode(VELOCITY_WIDTH),
            w.prev_velocity[0],
            w.prev_velocity[1],
            self.heart_rate,
            self.metabolic_power.encode(POWER_WIDTH),
        );
        finish(body, self.double_terminator)
    }
}

impl TotalPacket {
    pub fn encode(&self) -> String {
        let body = format!(
            "T{}{}{}{}{:05}{:05}{:04}{:04}{:04}{:02}{:03}{:03}{:03}{:03}{:02}{}{}{}{}{:03}{:03}",
            self.pod_id,
            format_time(&self.gps_time),
            if self.gps_fix { '1' } else { '0' },
            self.player_load.encode(5),
            self.total_distance_m,
            self.hmdl_distance_m,
            self.zone6_distance_m,
            self.zone5_distance_m,
            self.zone4_distance_m,
            self.zone6_count,
            self.zone5_count,
            self.zone4_count,
            self.total_accelerations,
            self.total_decelerations,
            self.impacts,
            self.step_balance_side.wire_char(),
            self.step_balance.encode(4),
            self.max_speed.encode(4),
            self.last_minute_max_speed.encode(4),
            self.rr_average_ms,
            self.max_heart_rate,
        );
        finish(body, false)
    }
}

impl StatusPacket {
    pub fn encode(&self) -> String {
        let date = self
            .gps_date
            .map(|d| d.format("%y%m%d").to_string())
            .unwrap_or_else(|| "000000".to_string());
        let body = format!(
            "S{}{}{}{:0<12}",
            self.pod_id,
            date,
            format_time(&self.gps_time),
            self.reserved
        );
        finish(body, false)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    const BARE_LIVE_BODY: &str =
        "L011200001050.00000000000001250.0000000000000500000000000008500450";

    fn bare_live(tail: &str) -> String {
        format!("{}{}", BARE_LIVE_BODY, tail)
    }

    #[test]
    fn bare_live_layout() {
        assert_eq!(BARE_LIVE_BODY.len(), 66);
        assert_eq!(body_len(PacketKind::Live, &bare_live("A3D")), Some(66));
        assert_eq!(PacketKind::Live.min_len(), 67);
    }

    #[test]
    fn decodes_bare_live_packet() {
        let packet = decode_packet(&bare_live("A3D"), ChecksumPolicy::Advisory).unwrap();
        let ParsedPacket::Live(live) = packet else {
            panic!("expected live packet");
        };
        assert_eq!(live.pod_id, "01");
        assert_eq!(live.heart_rate, 85);
        assert_eq!(live.gps_time, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert!(live.gps_fix);
        assert_eq!(live.latitude.hemisphere, None);
        assert!((live.velocity.value() - 50.0).abs() < 1e-9);
        assert!((live.metabolic_power.value() - 45.0).abs() < 1e-9);
        assert_eq!(live.checksum.received, Some(0xA3));
        assert_eq!(live.checksum.computed, 0x73);
        assert!(!live.checksum.is_valid());
        assert!(!live.double_terminator);
    }

    #[test]
    fn reject_policy_discards_bad_checksum() {
        let err = decode_packet(&bare_live("A3D"), ChecksumPolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            TelemetryError::ChecksumMismatch {
                received: Some(0xA3),
                computed: 0x73
            }
        );
        assert!(decode_packet(&bare_live("73D"), ChecksumPolicy::Reject).is_ok());
    }

    #[test]
    fn live_double_terminator() {
        let packet = decode_packet(&bare_live("73DD"), ChecksumPolicy::Reject).unwrap();
        let ParsedPacket::Live(live) = packet else {
            panic!("expected live packet");
        };
        assert!(live.double_terminator);
        assert!(live.checksum.is_valid());
    }

    #[test]
    fn truncated_and_unterminated() {
        assert!(matches!(
            decode_packet("L01120000", ChecksumPolicy::Advisory),
            Err(TelemetryError::Truncated { kind: PacketKind::Live, len: 9, .. })
        ));
        assert_eq!(
            decode_packet(BARE_LIVE_BODY, ChecksumPolicy::Advisory),
            Err(TelemetryError::Truncated {
                kind: PacketKind::Live,
                len: 66,
                min: 67
            })
        );
        assert_eq!(
            decode_packet(&bare_live("A3"), ChecksumPolicy::Advisory),
            Err(TelemetryError::MissingTerminator {
                kind: PacketKind::Live
            })
        );
    }

    #[test]
    fn unknown_leader() {
        assert_eq!(
            decode_packet("X0123", ChecksumPolicy::Advisory),
            Err(TelemetryError::UnknownKind('X'))
        );
    }

    #[test]
    fn invalid_heart_rate_field() {
        let mut text = BARE_LIVE_BODY.to_string();
        text.replace_range(58..61, "8x5");
        text.push_str("00D");
        assert!(matches!(
            decode_packet(&text, ChecksumPolicy::Advisory),
            Err(TelemetryError::InvalidField { field: "heart_rate", .. })
        ));
    }

    #[test]
    fn live_round_trips_pod_heart_rate_and_power() {
        for (pod, hr, power) in [("01", 85, 450), ("A7", 0, 0), ("99", 212, 99999), ("3C", 61, 7)] {
            let wire = fixtures::live(pod, hr, power).encode();
            let packet = decode_packet(&wire, ChecksumPolicy::Reject).unwrap();
            let ParsedPacket::Live(live) = packet else {
                panic!("expected live packet");
            };
            assert_eq!(live.pod_id, pod);
            assert_eq!(live.heart_rate, hr);
            assert_eq!(
                live.metabolic_power,
                WireNumber::Scaled {
                    raw: power,
                    divisor: 10
                }
            );
            assert_eq!(live.latitude.hemisphere, Some('N'));
            assert!((live.latitude.degrees - (48.0 + 7.038 / 60.0)).abs() < 1e-6);
            assert_eq!(live.encode(), wire);
        }
    }

    #[test]
    fn southern_western_live_packet() {
        let mut packet = fixtures::live("05", 120, 300);
        packet.latitude = Coordinate {
            degrees: -(33.0 + 51.5 / 60.0),
            hemisphere: Some('S'),
        };
        packet.longitude = Coordinate {
            degrees: -(74.0 + 0.6 / 60.0),
            hemisphere: Some('W'),
        };
        let wire = packet.encode();
        let ParsedPacket::Live(live) = decode_packet(&wire, ChecksumPolicy::Reject).unwrap() else {
            panic!("expected live packet");
        };
        assert!((live.latitude.degrees + 33.0 + 51.5 / 60.0).abs() < 1e-6);
        assert!((live.longitude.degrees + 74.0 + 0.6 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn total_packet_round_trip() {
        let wire = fixtures::total("02").encode();
        assert_eq!(wire.len(), TOTAL_BODY_LEN + 3);
        let ParsedPacket::Total(total) = decode_packet(&wire, ChecksumPolicy::Reject).unwrap() else {
            panic!("expected total packet");
        };
        assert_eq!(total.pod_id, "02");
        assert_eq!(total.total_distance_m, 4321);
        assert_eq!(total.step_balance_side, StepSide::Right);
        assert!((total.step_balance.value() - 50.12).abs() < 1e-9);
        assert!((total.player_load.value() - 12.34).abs() < 1e-9);
        assert_eq!(total.max_heart_rate, 181);
        assert_eq!(total.rr_average_ms, 712);
    }

    #[test]
    fn total_packet_with_literal_decimals() {
        let mut packet = fixtures::total("02");
        packet.player_load = WireNumber::Decimal {
            value: 0.001,
            places: 3,
        };
        packet.step_balance = WireNumber::Decimal {
            value: 7.12,
            places: 2,
        };
        let wire = packet.encode();
        assert!(wire.contains(".001"));
        assert!(wire.contains("7.12"));
        let ParsedPacket::Total(total) = decode_packet(&wire, ChecksumPolicy::Reject).unwrap() else {
            panic!("expected total packet");
        };
        assert!((total.player_load.value() - 0.001).abs() < 1e-12);
        assert!((total.step_balance.value() - 7.12).abs() < 1e-12);
        assert!(matches!(total.step_balance, WireNumber::Decimal { places: 2, .. }));
    }

    #[test]
    fn status_packet_round_trip() {
        let packet = StatusPacket {
            pod_id: "01".to_string(),
            gps_date: NaiveDate::from_ymd_opt(2024, 3, 9),
            gps_time: NaiveTime::from_hms_opt(8, 15, 30).unwrap(),
            reserved: "0000DIAG0000".to_string(),
            checksum: Checksum {
                received: None,
                computed: 0,
            },
        };
        let wire = packet.encode();
        assert_eq!(wire.len(), STATUS_BODY_LEN + 3);
        assert!(wire.starts_with("S01240309081530"));
        let ParsedPacket::Status(status) = decode_packet(&wire, ChecksumPolicy::Reject).unwrap() else {
            panic!("expected status packet");
        };
        assert_eq!(status.gps_date, packet.gps_date);
        assert_eq!(status.reserved, "0000DIAG0000");
    }

    #[test]
    fn status_without_date() {
        let body = "S01000000000000000000000000";
        let wire = format!("{}{}D", body, crc8::to_hex(crc8::checksum(body.as_bytes())));
        let ParsedPacket::Status(status) = decode_packet(&wire, ChecksumPolicy::Reject).unwrap() else {
            panic!("expected status packet");
        };
        assert_eq!(status.gps_date, None);
    }

    #[test]
    fn single_d_grammar_keeps_hex_d_in_checksum() {
        // Find a Total body whose checksum ends in hex 'D' and check the run
        // "xDD" is read as checksum "xD" plus one terminator.
        let mut packet = fixtures::total("02");
        for distance in 0..2000u32 {
            packet.total_distance_m = distance;
            let wire = packet.encode();
            if wire.ends_with("DD") {
                let decoded = decode_packet(&wire, ChecksumPolicy::Reject).unwrap();
                assert!(decoded.checksum().is_valid());
                return;
            }
        }
        panic!("no checksum ending in D found");
    }
}
