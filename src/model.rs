//! Data shared between the navigation core and its collaborators.
//!
//! Samples ([`Position`], [`HeadingSample`]) are supplied by external sensor
//! code once per cycle and never retained. [`Waypoint`] is owned by the
//! navigation engine. [`NavigationSnapshot`] is derived every update and handed
//! to the correction controller, the telemetry channel and any display.

use core::fmt;

/// A position fix as reported by the external GPS collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude above mean sea level in meters.
    pub altitude_m: f64,
    /// Satellites used in the solution.
    pub satellites: u8,
    /// Horizontal dilution of precision.
    pub hdop: f64,
    /// Vertical dilution of precision.
    pub vdop: f64,
    /// Position (3D) dilution of precision.
    pub pdop: f64,
    /// Whether the receiver reports a valid solution.
    ///
    /// When `false` every derived navigation quantity is undefined.
    pub fix_valid: bool,
    /// Milliseconds since the receiver produced this sample.
    pub age_ms: u32,
}

impl Position {
    /// A valid, fresh fix at the given coordinates with good DOP values.
    pub fn fix(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: 0.0,
            satellites: 8,
            hdop: 1.0,
            vdop: 1.0,
            pdop: 1.0,
            fix_valid: true,
            age_ms: 0,
        }
    }

    /// A sample without a valid solution.
    pub fn no_fix() -> Self {
        Self::default()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}°, {:.6}°)", self.latitude, self.longitude)
    }
}

/// Calibrated heading in degrees, `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct HeadingSample(pub f64);

impl HeadingSample {
    /// Heading in degrees, normalized into `[0, 360)`.
    pub fn degrees(self) -> f64 {
        crate::geo::normalize_bearing(self.0)
    }
}

impl From<f64> for HeadingSample {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// The single navigation target.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Waypoint {
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
    /// Altitude in meters. Informational only.
    pub altitude_m: f64,
    /// Clock reading (ms) at which the target was accepted.
    pub set_at_ms: u64,
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}°, {:.6}°, {:.1} m)",
            self.latitude, self.longitude, self.altitude_m
        )
    }
}

/// Navigation state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum NavigationState {
    /// No target, navigation disabled, or a safety interlock is holding.
    #[default]
    Idle,
    /// Steering toward the target.
    Navigating,
    /// Within the arrival radius of the current target. Terminal for that target.
    Arrived,
}

impl NavigationState {
    /// Lowercase name used on the telemetry wire.
    pub fn as_str(self) -> &'static str {
        match self {
            NavigationState::Idle => "idle",
            NavigationState::Navigating => "navigating",
            NavigationState::Arrived => "arrived",
        }
    }
}

/// Why the engine is not navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum BlockReason {
    /// No target has been set.
    NoTarget,
    /// Navigation has not been enabled, or was disabled.
    Disabled,
    /// The GPS has no valid solution.
    NoFix,
    /// Horizontal DOP is at or above the configured threshold.
    DopExceeded,
    /// The GPS sample is older than the staleness bound.
    StaleSample,
    /// The companion application is not connected.
    Disconnected,
    /// The current target has been reached.
    Arrived,
}

/// The navigation result of one update, recomputed from scratch every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct NavigationSnapshot {
    /// Great-circle distance to the target in meters. `0.0` without a target or fix.
    pub distance_m: f64,
    /// Initial bearing to the target, `[0, 360)`. `0.0` without a target or fix.
    pub bearing_deg: f64,
    /// Signed turn from heading to bearing, `(-180, 180]`.
    pub relative_angle_deg: f64,
    /// State after this update.
    pub state: NavigationState,
    /// Present whenever `state` is not [`NavigationState::Navigating`].
    pub reason_if_blocked: Option<BlockReason>,
    /// The active target, if any.
    pub target: Option<Waypoint>,
}

impl NavigationSnapshot {
    /// Whether the snapshot may drive actuation.
    pub fn is_navigating(&self) -> bool {
        self.state == NavigationState::Navigating
    }
}

/// Sensor readings reported alongside navigation in the status record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct SensorStatus {
    /// The position sample of the current cycle.
    pub position: Position,
    /// The heading sample of the current cycle.
    pub heading: HeadingSample,
}

/// One magnetometer reading plus the running calibration bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct CalibrationSample {
    /// Raw X reading.
    pub x: f32,
    /// Raw Y reading.
    pub y: f32,
    /// Raw Z reading.
    pub z: f32,
    /// Minimum X seen so far.
    pub min_x: f32,
    /// Minimum Y seen so far.
    pub min_y: f32,
    /// Minimum Z seen so far.
    pub min_z: f32,
    /// Maximum X seen so far.
    pub max_x: f32,
    /// Maximum Y seen so far.
    pub max_y: f32,
    /// Maximum Z seen so far.
    pub max_z: f32,
}
