//! Status, calibration and acknowledgement records.
//!
//! Records are flat JSON objects written straight into fixed-capacity
//! [`heapless::String`] buffers. Field order and precision are stable:
//!
//! ```text
//! {"hasGpsFix":true,"satellites":9,"currentLat":-32.940931,"currentLon":151.718029,
//!  "altitude":45.20,"heading":87.5,"distance":412.3,"bearing":92.1,"hdop":0.90,
//!  "vdop":1.20,"pdop":1.50,"targetLat":-32.941000,"targetLon":151.722000,
//!  "state":"navigating"}
//! ```
//!
//! Non-finite numbers are written as `null`. The target coordinates are `null`
//! unless the snapshot is navigating.

use core::fmt::{self, Write};

use heapless::String;

use super::TelemetryError;
use super::inbound::Command;
use crate::consts::{AUX_CAPACITY, STATUS_CAPACITY};
use crate::geo::normalize_bearing;
use crate::model::{CalibrationSample, NavigationSnapshot, SensorStatus};

/// A serialized status record.
pub type StatusRecord = String<STATUS_CAPACITY>;

/// A serialized calibration or acknowledgement record.
pub type AuxRecord = String<AUX_CAPACITY>;

fn write_number<W: Write>(out: &mut W, value: f64, precision: usize) -> fmt::Result {
    if value.is_finite() {
        write!(out, "{:.*}", precision, value)
    } else {
        out.write_str("null")
    }
}

fn write_field<W: Write>(out: &mut W, key: &str, value: f64, precision: usize) -> fmt::Result {
    write!(out, ",\"{}\":", key)?;
    write_number(out, value, precision)
}

/// Writes a compass angle in `[0, 360)` at one decimal, so `359.96` reads `0.0`.
fn write_angle<W: Write>(out: &mut W, key: &str, degrees: f64) -> fmt::Result {
    let tenths = libm::round(normalize_bearing(degrees) * 10.0);
    let degrees = if tenths >= 3600.0 { 0.0 } else { tenths / 10.0 };
    write_field(out, key, degrees, 1)
}

fn write_status<W: Write>(
    out: &mut W,
    snapshot: &NavigationSnapshot,
    sensors: &SensorStatus,
) -> fmt::Result {
    let position = &sensors.position;
    write!(
        out,
        "{{\"hasGpsFix\":{},\"satellites\":{}",
        position.fix_valid, position.satellites
    )?;
    write_field(out, "currentLat", position.latitude, 6)?;
    write_field(out, "currentLon", position.longitude, 6)?;
    write_field(out, "altitude", position.altitude_m, 2)?;
    write_angle(out, "heading", sensors.heading.0)?;
    write_field(out, "distance", snapshot.distance_m, 1)?;
    write_angle(out, "bearing", snapshot.bearing_deg)?;
    write_field(out, "hdop", position.hdop, 2)?;
    write_field(out, "vdop", position.vdop, 2)?;
    write_field(out, "pdop", position.pdop, 2)?;

    match snapshot.target.filter(|_| snapshot.is_navigating()) {
        Some(target) => {
            write_field(out, "targetLat", target.latitude, 6)?;
            write_field(out, "targetLon", target.longitude, 6)?;
        }
        None => out.write_str(",\"targetLat\":null,\"targetLon\":null")?,
    }

    write!(out, ",\"state\":\"{}\"}}", snapshot.state.as_str())
}

/// Serializes the full status record for one cycle.
pub fn status_record(
    snapshot: &NavigationSnapshot,
    sensors: &SensorStatus,
) -> Result<StatusRecord, TelemetryError> {
    let mut out = StatusRecord::new();
    write_status(&mut out, snapshot, sensors).map_err(|_| TelemetryError::Overflow)?;
    Ok(out)
}

/// The minimal record sent when the full one cannot be produced or framed.
///
/// Always fits and always validates.
pub fn essential_record(sensors: &SensorStatus) -> StatusRecord {
    let mut out = StatusRecord::new();
    let _ = write!(
        out,
        "{{\"hasGpsFix\":{},\"satellites\":{}}}",
        sensors.position.fix_valid, sensors.position.satellites
    );
    out
}

/// Serializes the status record and checks it with [`validate`].
pub fn checked_status_record(
    snapshot: &NavigationSnapshot,
    sensors: &SensorStatus,
) -> Result<StatusRecord, TelemetryError> {
    let record = status_record(snapshot, sensors)?;
    validate(&record)?;
    Ok(record)
}

/// Serializes one magnetometer calibration sample, 3 decimals per value.
pub fn calibration_record(sample: &CalibrationSample) -> Result<AuxRecord, TelemetryError> {
    let fields = [
        ("x", sample.x),
        ("y", sample.y),
        ("z", sample.z),
        ("minX", sample.min_x),
        ("minY", sample.min_y),
        ("minZ", sample.min_z),
        ("maxX", sample.max_x),
        ("maxY", sample.max_y),
        ("maxZ", sample.max_z),
    ];

    let mut out = AuxRecord::new();
    let mut emit = || -> fmt::Result {
        for (i, (key, value)) in fields.iter().enumerate() {
            out.write_str(if i == 0 { "{" } else { "," })?;
            write!(out, "\"{}\":", key)?;
            write_number(&mut out, f64::from(*value), 3)?;
        }
        out.write_char('}')
    };
    emit().map_err(|_| TelemetryError::Overflow)?;
    Ok(out)
}

/// Serializes the acknowledgement of an accepted command: `{"ack":"TOKEN"}`.
pub fn ack_record(command: Command) -> AuxRecord {
    let mut out = AuxRecord::new();
    let _ = write!(out, "{{\"ack\":\"{}\"}}", command.as_str());
    out
}

/// Literal fragments that only a broken serializer would produce.
const ARTIFACTS: [&str; 5] = ["true.", "false.", "null.", "NaN", "inf"];

/// Checks that `record` is a single well-formed object.
///
/// - starts with `{` and ends with `}`
/// - braces and brackets balance outside string literals
/// - every string literal is terminated
/// - no malformed literal such as `false.` or `NaN` appears outside strings
pub fn validate(record: &str) -> Result<(), TelemetryError> {
    let bytes = record.as_bytes();
    if bytes.first() != Some(&b'{') || bytes.last() != Some(&b'}') {
        return Err(TelemetryError::Malformed);
    }

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1).ok_or(TelemetryError::Malformed)?;
                // the outermost object closes exactly once, at the very end
                if depth == 0 && i + 1 != bytes.len() {
                    return Err(TelemetryError::Malformed);
                }
            }
            _ => {
                let rest = &bytes[i..];
                if ARTIFACTS.iter().any(|a| rest.starts_with(a.as_bytes())) {
                    return Err(TelemetryError::Malformed);
                }
            }
        }
    }

    if in_string || depth != 0 {
        return Err(TelemetryError::Malformed);
    }
    Ok(())
}
