//! Heading correction policy.
//!
//! [`HeadingCorrectionController`] turns a [`NavigationSnapshot`] into at most
//! one [`RfCommand`] per cycle. Its only state is the time of the last issued
//! correction; the clock reading is passed in by the caller.

use crate::config::CorrectionConfig;
use crate::model::NavigationSnapshot;
use crate::rf::{CommandTransmitter, RfCommand};

/// Decides when and which way to nudge the motor.
#[derive(Debug, Clone)]
pub struct HeadingCorrectionController {
    config: CorrectionConfig,
    last_correction_ms: Option<u64>,
}

impl Default for HeadingCorrectionController {
    fn default() -> Self {
        Self::new(CorrectionConfig::default())
    }
}

impl HeadingCorrectionController {
    /// Creates a controller that has never issued a correction.
    pub fn new(config: CorrectionConfig) -> Self {
        Self {
            config,
            last_correction_ms: None,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Clock reading of the last issued correction.
    pub fn last_correction_ms(&self) -> Option<u64> {
        self.last_correction_ms
    }

    /// Returns the command to issue for `snapshot` at `now_ms`, if any.
    ///
    /// - only while `Navigating`
    /// - only when `|relative angle| > tolerance` (strictly)
    /// - only when at least `min_interval_ms` passed since the last issued correction
    /// - positive angle turns right, negative turns left
    ///
    /// A returned command counts as issued: the debounce window restarts at `now_ms`.
    pub fn evaluate(&mut self, snapshot: &NavigationSnapshot, now_ms: u64) -> Option<RfCommand> {
        if !snapshot.is_navigating() {
            return None;
        }

        let angle = snapshot.relative_angle_deg;
        if !(angle.abs() > self.config.tolerance_deg) {
            trace!("on course ({} deg)", angle);
            return None;
        }

        if let Some(last) = self.last_correction_ms {
            if now_ms.saturating_sub(last) < self.config.min_interval_ms {
                return None;
            }
        }

        let command = if angle > 0.0 {
            RfCommand::Right
        } else {
            RfCommand::Left
        };
        self.last_correction_ms = Some(now_ms);
        debug!("correcting {:?} (off by {} deg)", command, angle);
        Some(command)
    }

    /// Evaluates `snapshot` and sends the resulting command through `transmitter`.
    ///
    /// The debounce timestamp is recorded before the (blocking) transmission
    /// starts. Returns the command that was attempted.
    pub fn correct<T: CommandTransmitter>(
        &mut self,
        snapshot: &NavigationSnapshot,
        now_ms: u64,
        transmitter: &mut T,
    ) -> Option<RfCommand> {
        let command = self.evaluate(snapshot, now_ms)?;
        let _ = transmitter.transmit(command, self.config.repeat_count);
        Some(command)
    }

    /// Forgets the last correction so the next evaluation may fire immediately.
    pub fn reset(&mut self) {
        self.last_correction_ms = None;
    }
}
