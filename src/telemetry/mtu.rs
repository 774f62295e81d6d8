//! Effective MTU estimation.
//!
//! The transport reports at most a negotiated ATT MTU; some stacks never do.
//! [`MtuEstimator`] starts from a conservative size and moves to the
//! negotiated payload when one is reported. With probing enabled it also
//! learns upward from notifications that went through, never above the
//! configured maximum. A size the transport refused becomes a ceiling so it
//! is not probed again.

use crate::consts::ATT_HEADER_LEN;

/// Tracks the largest payload known to fit in one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct MtuEstimator {
    initial: u16,
    max: u16,
    effective: u16,
    ceiling: u16,
}

impl MtuEstimator {
    /// Starts at `initial` bytes, never learning beyond `max`.
    pub fn new(initial: u16, max: u16) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            effective: initial,
            ceiling: max,
        }
    }

    /// Largest payload known to fit, in bytes.
    pub fn effective(&self) -> u16 {
        self.effective
    }

    /// Largest payload that may still be tried, in bytes.
    pub fn ceiling(&self) -> u16 {
        self.ceiling
    }

    /// Applies a negotiated ATT MTU. The usable payload is 3 bytes smaller.
    pub fn set_negotiated(&mut self, att_mtu: u16) {
        let payload = att_mtu.saturating_sub(ATT_HEADER_LEN).clamp(self.initial, self.max);
        self.effective = payload;
        self.ceiling = payload;
        info!("mtu negotiated: {} byte payload", payload);
    }

    /// Whether a single notification of `len` bytes is worth attempting
    /// although it exceeds the effective MTU.
    pub fn should_probe(&self, len: usize) -> bool {
        len > usize::from(self.effective) && len <= usize::from(self.ceiling)
    }

    /// Records that a single notification of `len` bytes went through.
    pub fn record_success(&mut self, len: usize) {
        let len = u16::try_from(len).unwrap_or(u16::MAX).min(self.ceiling);
        if len > self.effective {
            debug!("mtu raised {} -> {}", self.effective, len);
            self.effective = len;
        }
    }

    /// Records that the transport refused a notification of `len` bytes.
    pub fn record_rejection(&mut self, len: usize) {
        let limit = u16::try_from(len)
            .unwrap_or(u16::MAX)
            .saturating_sub(1)
            .max(self.initial);
        self.ceiling = self.ceiling.min(limit);
        self.effective = self.effective.min(self.ceiling);
        debug!("mtu ceiling lowered to {}", self.ceiling);
    }

    /// Forgets everything learned, for a new connection.
    pub fn reset(&mut self) {
        self.effective = self.initial;
        self.ceiling = self.max;
    }
}

impl Default for MtuEstimator {
    fn default() -> Self {
        Self::new(crate::consts::INITIAL_MTU, crate::consts::MAX_MTU)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_conservative() {
        let mtu = MtuEstimator::default();
        assert_eq!(mtu.effective(), 20);
        assert_eq!(mtu.ceiling(), 512);
    }

    #[test]
    fn test_negotiation_sets_payload_size() {
        let mut mtu = MtuEstimator::default();
        mtu.set_negotiated(185);
        assert_eq!(mtu.effective(), 182);
        assert!(!mtu.should_probe(200));

        mtu.set_negotiated(1024);
        assert_eq!(mtu.effective(), 512);

        mtu.set_negotiated(10);
        assert_eq!(mtu.effective(), 20);
    }

    #[test]
    fn test_learns_from_successful_sends() {
        let mut mtu = MtuEstimator::default();
        assert!(mtu.should_probe(300));
        mtu.record_success(300);
        assert_eq!(mtu.effective(), 300);

        // smaller successes never lower the estimate
        mtu.record_success(50);
        assert_eq!(mtu.effective(), 300);

        mtu.record_success(4_000);
        assert_eq!(mtu.effective(), 512);
    }

    #[test]
    fn test_rejection_caps_probing() {
        let mut mtu = MtuEstimator::default();
        mtu.record_rejection(300);
        assert_eq!(mtu.ceiling(), 299);
        assert!(!mtu.should_probe(300));
        assert!(mtu.should_probe(299));

        mtu.record_success(299);
        assert_eq!(mtu.effective(), 299);

        mtu.record_rejection(250);
        assert_eq!(mtu.effective(), 249);

        mtu.reset();
        assert_eq!(mtu.effective(), 20);
        assert_eq!(mtu.ceiling(), 512);
    }
}
