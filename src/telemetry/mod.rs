//! Telemetry link protocol.
//!
//! The companion application talks to the helm over a connection oriented
//! link with four logical endpoints (see [`channel::Endpoint`]). This module
//! groups the pieces of that protocol:
//!
//! - [`status`]: the canonical status record, its validator and the
//!   essential-status fallback, plus the calibration and ack records
//! - [`frame`]: fragmentation of oversized records and receiver-side reassembly
//! - [`mtu`]: the effective payload size estimator
//! - [`inbound`]: waypoint and command parsing
//! - [`channel`]: [`TelemetryChannel`](channel::TelemetryChannel), which ties
//!   the above to a [`Transport`](channel::Transport)
//!
//! ## Fragment header
//!
//! ```text
//! +----------+-----------+-----------+-----------+-----------------+
//! | sequence |   total   | total_len | total_len |  payload chunk  |
//! |  index   | fragments | high byte | low byte  | (mtu - 4) bytes |
//! +----------+-----------+-----------+-----------+-----------------+
//! ```

use thiserror::Error;

pub mod channel;
pub mod frame;
pub mod inbound;
pub mod mtu;
pub mod status;

pub use channel::{Endpoint, Inbound, PublishOutcome, TelemetryChannel, Transport, TransportError};
pub use frame::{FrameHeader, Reassembler, fragment};
pub use inbound::{Command, ParseError, WaypointRequest, calibration_values, parse_waypoint};
pub use mtu::MtuEstimator;

/// Errors raised while building or framing outbound records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TelemetryError {
    /// The record did not fit its fixed-capacity buffer.
    #[error("record exceeds buffer capacity")]
    Overflow,
    /// The record failed structural validation.
    #[error("record is malformed")]
    Malformed,
    /// The record would need more than 255 fragments.
    #[error("record needs more than 255 fragments")]
    TooManyFragments,
    /// The payload size leaves no room after the fragment header.
    #[error("mtu of {0} bytes cannot carry a fragment")]
    MtuTooSmall(u16),
    /// A received fragment does not continue the current series.
    #[error("fragment out of sequence")]
    OutOfSequence,
    /// A received fragment is shorter than its header or inconsistent with it.
    #[error("fragment is malformed")]
    BadFragment,
}
