//! Coordinate and unit converters for pod wire fields.
//!
//! Coordinates arrive as degree-minute text, either with a trailing hemisphere
//! letter (`4807.03800N`, `01131.000E`) or as a bare fixed-width number that is
//! already signed (positive = North/East).

const KMH_PER_KNOT: f64 = 1.852;

/// Degree-minute latitude (`DDMM.MMMMM[N|S]`) to signed decimal degrees.
pub fn parse_latitude(field: &str) -> Option<f64> {
    parse_degree_minutes(field, 'N', 'S', 90.0)
}

/// Degree-minute longitude (`DDDMM.MMM[E|W]`) to signed decimal degrees.
pub fn parse_longitude(field: &str) -> Option<f64> {
    parse_degree_minutes(field, 'E', 'W', 180.0)
}

fn parse_degree_minutes(field: &str, positive: char, negative: char, limit: f64) -> Option<f64> {
    let field = field.trim();
    let (number, hemisphere_sign) = match field.chars().last()? {
        c if c == positive => (&field[..field.len() - 1], 1.0),
        c if c == negative => (&field[..field.len() - 1], -1.0),
        _ => (field, 1.0),
    };
    let raw: f64 = number.parse().ok()?;
    if !raw.is_finite() {
        return None;
    }
    let sign = hemisphere_sign * raw.signum();
    let raw = raw.abs();
    let degrees = (raw / 100.0).floor();
    let minutes = raw - degrees * 100.0;
    if minutes >= 60.0 {
        return None;
    }
    let decimal = degrees + minutes / 60.0;
    if decimal > limit {
        return None;
    }
    Some(sign * decimal)
}

/// Signed decimal degrees back to the lettered wire form, `width` digits and
/// `decimals` minute decimals before the hemisphere letter.
pub(crate) fn format_degree_minutes(
    value: f64,
    positive: char,
    negative: char,
    width: usize,
    decimals: usize,
) -> String {
    let letter = if value < 0.0 { negative } else { positive };
    let value = value.abs();
    let degrees = value.floor();
    let minutes = (value - degrees) * 60.0;
    let packed = degrees * 100.0 + minutes;
    format!("{:0width$.decimals$}{}", packed, letter, width = width, decimals = decimals)
}

pub fn knots_to_kmh(knots: f64) -> f64 {
    knots * KMH_PER_KNOT
}

/// Integer wire value carrying tenths (`00450` -> 45.0).
pub fn scaled_tenths_to_unit(raw: f64) -> f64 {
    raw / 10.0
}

/// Integer wire value carrying hundredths of a percent (`5012` -> 50.12).
pub fn huncents_to_percent(raw: f64) -> f64 {
    raw / 100.0
}
