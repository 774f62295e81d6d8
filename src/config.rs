//! Runtime configuration.
//!
//! Every policy knob of the helm lives in one of these plain structs. The
//! [`Default`] impls are built from [`crate::consts`]; firmware usually keeps
//! the defaults and overrides single fields:
//!
//! ```
//! use helm::config::HelmConfig;
//!
//! let mut config = HelmConfig::default();
//! config.navigation.arrival_radius_m = 8.0;
//! config.correction.repeat_count = 5;
//! ```
//!
//! The RF pulse timings are deliberately absent: they belong to the receiver's
//! protocol and are fixed in [`crate::consts`].

use crate::consts::{
    DEFAULT_ARRIVAL_RADIUS_M, DEFAULT_BUSY_RETRIES, DEFAULT_DUPLICATE_INTERVAL_MS,
    DEFAULT_HEADING_TOLERANCE_DEG, DEFAULT_INTER_FRAGMENT_DELAY_MS, DEFAULT_MAX_DOP,
    DEFAULT_MAX_SAMPLE_AGE_MS, DEFAULT_MIN_CORRECTION_INTERVAL_MS, INITIAL_MTU, MAX_MTU,
    RF_DEFAULT_REPEATS,
};

/// Navigation engine policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationConfig {
    /// Distance at or below which the target counts as reached, in meters.
    pub arrival_radius_m: f64,
    /// Navigation requires horizontal DOP strictly below this value.
    pub max_dop: f64,
    /// Samples older than this are treated as a lost fix, in ms.
    pub max_sample_age_ms: u32,
    /// Whether a disconnected companion app blocks navigation.
    pub require_connection: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            arrival_radius_m: DEFAULT_ARRIVAL_RADIUS_M,
            max_dop: DEFAULT_MAX_DOP,
            max_sample_age_ms: DEFAULT_MAX_SAMPLE_AGE_MS,
            require_connection: true,
        }
    }
}

/// Heading correction policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionConfig {
    /// Corrections fire only when `|relative angle|` is strictly greater, in degrees.
    pub tolerance_deg: f64,
    /// Minimum spacing between two issued corrections, in ms.
    pub min_interval_ms: u64,
    /// Bursts sent per correction.
    pub repeat_count: u8,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            tolerance_deg: DEFAULT_HEADING_TOLERANCE_DEG,
            min_interval_ms: DEFAULT_MIN_CORRECTION_INTERVAL_MS,
            repeat_count: RF_DEFAULT_REPEATS,
        }
    }
}

/// Telemetry channel policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryConfig {
    /// Payload size assumed before anything is learned, in bytes.
    pub initial_mtu: u16,
    /// Upper bound for the learned payload size, in bytes.
    pub max_mtu: u16,
    /// Delay between consecutive fragments, in ms.
    pub inter_fragment_delay_ms: u32,
    /// An unchanged status record is not resent before this interval, in ms.
    pub duplicate_interval_ms: u64,
    /// Times a busy transport is waited on (1 ms each) before the send fails.
    pub busy_retries: u32,
    /// Send payloads above the effective MTU whole and learn from the result.
    ///
    /// Only for transports that refuse oversize notifications with
    /// [`TransportError::PayloadTooLarge`](crate::telemetry::TransportError).
    /// Stacks that truncate silently must leave this off.
    pub probe_mtu: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            initial_mtu: INITIAL_MTU,
            max_mtu: MAX_MTU,
            inter_fragment_delay_ms: DEFAULT_INTER_FRAGMENT_DELAY_MS,
            duplicate_interval_ms: DEFAULT_DUPLICATE_INTERVAL_MS,
            busy_retries: DEFAULT_BUSY_RETRIES,
            probe_mtu: false,
        }
    }
}

/// Complete helm configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HelmConfig {
    /// See [`NavigationConfig`].
    pub navigation: NavigationConfig,
    /// See [`CorrectionConfig`].
    pub correction: CorrectionConfig,
    /// See [`TelemetryConfig`].
    pub telemetry: TelemetryConfig,
}
