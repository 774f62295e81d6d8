//! Parsing of inbound writes.
//!
//! Two write-only endpoints feed the helm: waypoints as
//! `$GPS,<lat>,<lon>,<alt>*` and command tokens. Writes longer than
//! [`MAX_WRITE_LEN`] bytes are refused outright.
//!
//! Commands are bare tokens matched exactly, except `SAVE_CAL:<values>`,
//! which carries the app's calibration result after its prefix.

use core::str::FromStr;

use thiserror::Error;

use crate::consts::{
    MAX_WRITE_LEN, SAVE_CALIBRATION_PREFIX, WAYPOINT_PREFIX, WAYPOINT_TERMINATOR,
};

/// Reasons an inbound write is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ParseError {
    /// The write is empty.
    #[error("empty write")]
    Empty,
    /// The write exceeds the endpoint's size limit.
    #[error("write of {0} bytes exceeds the endpoint limit")]
    TooLong(usize),
    /// The write is not valid UTF-8.
    #[error("write is not valid utf-8")]
    NotUtf8,
    /// The waypoint does not start with `$GPS,`.
    #[error("missing waypoint prefix")]
    MissingPrefix,
    /// The waypoint does not end with `*`.
    #[error("missing waypoint terminator")]
    MissingTerminator,
    /// The waypoint does not have exactly three fields.
    #[error("expected 3 waypoint fields")]
    FieldCount,
    /// A waypoint field is not a finite number.
    #[error("invalid numeric field")]
    InvalidNumber,
    /// The token is not part of the command vocabulary.
    #[error("unknown command")]
    UnknownCommand,
}

/// A parsed waypoint write. Coordinates are not range checked here.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct WaypointRequest {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude_m: f64,
}

fn as_str(bytes: &[u8]) -> Result<&str, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }
    if bytes.len() > MAX_WRITE_LEN {
        return Err(ParseError::TooLong(bytes.len()));
    }
    core::str::from_utf8(bytes).map_err(|_| ParseError::NotUtf8)
}

fn parse_field(field: &str) -> Result<f64, ParseError> {
    let value = f64::from_str(field).map_err(|_| ParseError::InvalidNumber)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParseError::InvalidNumber)
    }
}

/// Parses a `$GPS,<lat>,<lon>,<alt>*` write.
///
/// ```
/// use helm::telemetry::parse_waypoint;
///
/// let wp = parse_waypoint(b"$GPS,-32.940931,151.718029,45.2*").unwrap();
/// assert_eq!(wp.latitude, -32.940931);
/// assert!(parse_waypoint(b"$GPS,-32.9,151.7*").is_err());
/// ```
pub fn parse_waypoint(bytes: &[u8]) -> Result<WaypointRequest, ParseError> {
    let text = as_str(bytes)?;
    let body = text
        .strip_prefix(WAYPOINT_PREFIX)
        .ok_or(ParseError::MissingPrefix)?
        .strip_suffix(WAYPOINT_TERMINATOR)
        .ok_or(ParseError::MissingTerminator)?;

    let mut fields = body.split(',');
    let (Some(lat), Some(lon), Some(alt), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(ParseError::FieldCount);
    };

    Ok(WaypointRequest {
        latitude: parse_field(lat)?,
        longitude: parse_field(lon)?,
        altitude_m: parse_field(alt)?,
    })
}

/// The command vocabulary of the command endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Command {
    /// `NAV_ENABLE`
    NavEnable,
    /// `NAV_DISABLE`
    NavDisable,
    /// `START_CAL`
    StartCalibration,
    /// `STOP_CAL`
    StopCalibration,
    /// `RF_PAIR_START`
    RfPairStart,
    /// `RF_PAIR_COMPLETE`
    RfPairComplete,
    /// `RF_PAIR_CANCEL`
    RfPairCancel,
    /// `SAVE_CAL:<values>`; see [`calibration_values`].
    SaveCalibration,
}

impl Command {
    /// Every bare command token, in wire order. [`Command::SaveCalibration`]
    /// carries values and is not listed.
    pub const ALL: [Command; 7] = [
        Command::NavEnable,
        Command::NavDisable,
        Command::StartCalibration,
        Command::StopCalibration,
        Command::RfPairStart,
        Command::RfPairComplete,
        Command::RfPairCancel,
    ];

    /// The wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::NavEnable => "NAV_ENABLE",
            Command::NavDisable => "NAV_DISABLE",
            Command::StartCalibration => "START_CAL",
            Command::StopCalibration => "STOP_CAL",
            Command::RfPairStart => "RF_PAIR_START",
            Command::RfPairComplete => "RF_PAIR_COMPLETE",
            Command::RfPairCancel => "RF_PAIR_CANCEL",
            Command::SaveCalibration => "SAVE_CAL",
        }
    }

    /// Parses a command write. Surrounding whitespace is ignored, the token
    /// itself must match exactly.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        as_str(bytes)?.trim().parse()
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(SAVE_CALIBRATION_PREFIX) {
            return Ok(Command::SaveCalibration);
        }
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(ParseError::UnknownCommand)
    }
}

/// The values of a `SAVE_CAL:<values>` write, passed on unparsed.
///
/// `None` for any other write.
pub fn calibration_values(bytes: &[u8]) -> Option<&str> {
    as_str(bytes)
        .ok()?
        .trim()
        .strip_prefix(SAVE_CALIBRATION_PREFIX)
}
