//! Navigation and safety state machine.
//!
//! [`NavigationEngine`] owns the single target and the
//! [`NavigationState`]. Each [`update()`](NavigationEngine::update) consumes one
//! position and heading sample and produces a [`NavigationSnapshot`].
//!
//! ## Transitions
//!
//! | From | To | When |
//! |------|----|------|
//! | `Idle` | `Navigating` | target set, enabled, fix valid, fresh, `hdop < max_dop`, app connected |
//! | `Navigating` | `Arrived` | distance ≤ arrival radius (navigation is force-disabled) |
//! | `Navigating` | `Idle` | any interlock trips, or [`set_enabled(false)`](NavigationEngine::set_enabled) |
//! | `Arrived` | `Idle` | a new target via [`set_target()`](NavigationEngine::set_target) |
//! | any | `Idle` | [`clear_target()`](NavigationEngine::clear_target) |
//!
//! Interlocks take priority over every other transition in the same update.
//! They leave `enabled` untouched, so navigation resumes by itself once the
//! inputs are valid again. The engine never panics: bad input only keeps it out
//! of `Navigating` and is reported through
//! [`NavigationSnapshot::reason_if_blocked`].

use thiserror::Error;

use crate::config::NavigationConfig;
use crate::geo::{distance_m, initial_bearing, is_valid_coordinate, relative_angle};
use crate::model::{
    BlockReason, HeadingSample, NavigationSnapshot, NavigationState, Position, Waypoint,
};

/// Why a target was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TargetError {
    /// Latitude outside `[-90, 90]` or not finite.
    #[error("latitude out of range")]
    LatitudeOutOfRange,
    /// Longitude outside `[-180, 180]` or not finite.
    #[error("longitude out of range")]
    LongitudeOutOfRange,
    /// Altitude is not finite.
    #[error("altitude is not a finite number")]
    InvalidAltitude,
}

/// The navigation state machine.
///
/// ```
/// use helm::model::{HeadingSample, NavigationState, Position};
/// use helm::navigation::NavigationEngine;
///
/// let mut engine = NavigationEngine::default();
/// engine.set_connected(true);
/// engine.set_target(-32.940931, 151.718029, 45.2, 0).unwrap();
/// engine.update(&Position::fix(-32.95, 151.70), HeadingSample(0.0));
/// assert!(engine.set_enabled(true));
///
/// let snapshot = engine.update(&Position::fix(-32.95, 151.70), HeadingSample(0.0));
/// assert_eq!(snapshot.state, NavigationState::Navigating);
/// ```
#[derive(Debug, Clone)]
pub struct NavigationEngine {
    config: NavigationConfig,
    target: Option<Waypoint>,
    enabled: bool,
    connected: bool,
    state: NavigationState,
    last_fix_valid: bool,
    snapshot: NavigationSnapshot,
}

impl Default for NavigationEngine {
    fn default() -> Self {
        Self::new(NavigationConfig::default())
    }
}

impl NavigationEngine {
    /// Creates an idle engine with no target.
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            config,
            target: None,
            enabled: false,
            connected: false,
            state: NavigationState::Idle,
            last_fix_valid: false,
            snapshot: NavigationSnapshot {
                reason_if_blocked: Some(BlockReason::NoTarget),
                ..NavigationSnapshot::default()
            },
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> NavigationState {
        self.state
    }

    /// The active target, if any.
    pub fn target(&self) -> Option<&Waypoint> {
        self.target.as_ref()
    }

    /// Whether navigation is enabled. Enabled does not imply `Navigating`.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the current target has been reached.
    pub fn has_arrived(&self) -> bool {
        self.state == NavigationState::Arrived
    }

    /// The snapshot produced by the last [`update()`](Self::update).
    pub fn snapshot(&self) -> &NavigationSnapshot {
        &self.snapshot
    }

    /// Replaces the target.
    ///
    /// Out-of-range or non-finite coordinates are rejected and leave the engine
    /// untouched. Setting a target while `Arrived` returns the engine to `Idle`;
    /// navigation must then be re-enabled explicitly.
    pub fn set_target(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude_m: f64,
        now_ms: u64,
    ) -> Result<(), TargetError> {
        if !(-90.0..=90.0).contains(&latitude) {
            debug!("rejected target: latitude {}", latitude);
            return Err(TargetError::LatitudeOutOfRange);
        }
        if !(-180.0..=180.0).contains(&longitude) {
            debug!("rejected target: longitude {}", longitude);
            return Err(TargetError::LongitudeOutOfRange);
        }
        if !altitude_m.is_finite() {
            return Err(TargetError::InvalidAltitude);
        }

        self.target = Some(Waypoint {
            latitude,
            longitude,
            altitude_m,
            set_at_ms: now_ms,
        });
        if self.state == NavigationState::Arrived {
            self.state = NavigationState::Idle;
        }
        info!("new target set: {}, {}", latitude, longitude);
        Ok(())
    }

    /// Drops the target, disables navigation and returns to `Idle`.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.enabled = false;
        self.state = NavigationState::Idle;
        info!("target cleared");
    }

    /// Enables or disables navigation.
    ///
    /// Enabling is a silent no-op (returning `false`) without a target, without
    /// a valid fix on the last update, or after arrival at the current target.
    /// Disabling always succeeds and immediately leaves `Navigating`.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if !enabled {
            self.enabled = false;
            if self.state == NavigationState::Navigating {
                self.state = NavigationState::Idle;
                info!("navigation disabled");
            }
            return true;
        }

        if self.target.is_none() || !self.last_fix_valid || self.state == NavigationState::Arrived
        {
            debug!("enable ignored: no target, no fix, or already arrived");
            return false;
        }
        self.enabled = true;
        info!("navigation enabled");
        true
    }

    /// Records the companion app connection state.
    ///
    /// A disconnect leaves `Navigating` immediately when connections are required.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if !connected
            && self.config.require_connection
            && self.state == NavigationState::Navigating
        {
            self.state = NavigationState::Idle;
            warn!("app disconnected, navigation suspended");
        }
    }

    /// Recomputes the snapshot from the current sample and applies transitions.
    pub fn update(&mut self, position: &Position, heading: HeadingSample) -> NavigationSnapshot {
        self.last_fix_valid = position.fix_valid;

        let Some(target) = self.target else {
            self.state = NavigationState::Idle;
            self.snapshot = NavigationSnapshot {
                reason_if_blocked: Some(BlockReason::NoTarget),
                ..NavigationSnapshot::default()
            };
            return self.snapshot;
        };

        let geometry = (position.fix_valid
            && is_valid_coordinate(position.latitude, position.longitude))
        .then(|| {
            let distance = distance_m(
                position.latitude,
                position.longitude,
                target.latitude,
                target.longitude,
            );
            let bearing = initial_bearing(
                position.latitude,
                position.longitude,
                target.latitude,
                target.longitude,
            );
            (distance, bearing)
        });

        let reason = match self.state {
            NavigationState::Arrived => Some(BlockReason::Arrived),
            NavigationState::Idle | NavigationState::Navigating => {
                match (self.interlock(position), geometry) {
                    (Some(reason), _) => {
                        if self.state == NavigationState::Navigating {
                            warn!("navigation suspended: {:?}", reason);
                        }
                        self.state = NavigationState::Idle;
                        Some(reason)
                    }
                    (None, Some((distance, _))) if distance <= self.config.arrival_radius_m => {
                        self.state = NavigationState::Arrived;
                        self.enabled = false;
                        info!("destination reached ({} m)", distance);
                        Some(BlockReason::Arrived)
                    }
                    (None, Some(_)) => {
                        if self.state == NavigationState::Idle {
                            info!("navigating to {}", target);
                        }
                        self.state = NavigationState::Navigating;
                        None
                    }
                    // Fix flagged valid but with impossible coordinates.
                    (None, None) => {
                        self.state = NavigationState::Idle;
                        Some(BlockReason::NoFix)
                    }
                }
            }
        };

        let (distance_m, bearing_deg) = geometry.unwrap_or((0.0, 0.0));
        let relative_angle_deg = if geometry.is_some() {
            relative_angle(bearing_deg, heading.degrees())
        } else {
            0.0
        };

        self.snapshot = NavigationSnapshot {
            distance_m,
            bearing_deg,
            relative_angle_deg,
            state: self.state,
            reason_if_blocked: reason,
            target: Some(target),
        };
        self.snapshot
    }

    /// First interlock that forbids navigating with this sample, if any.
    fn interlock(&self, position: &Position) -> Option<BlockReason> {
        if !self.enabled {
            Some(BlockReason::Disabled)
        } else if !position.fix_valid {
            Some(BlockReason::NoFix)
        } else if position.age_ms > self.config.max_sample_age_ms {
            Some(BlockReason::StaleSample)
        } else if !(position.hdop < self.config.max_dop) {
            Some(BlockReason::DopExceeded)
        } else if self.config.require_connection && !self.connected {
            Some(BlockReason::Disconnected)
        } else {
            None
        }
    }
}
