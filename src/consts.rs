//! Constants used across the helm protocol implementation.
//!
//! This module defines the protocol-wide constants for the two wire protocols
//! the helm speaks (the trolling-motor RF remote and the telemetry link), as
//! well as the defaults used to build the runtime configuration.
//!
//! ## Key Concepts
//!
//! - **RF timings**: pulse-width durations reverse engineered from the hardware
//!   remote. They are part of the receiver's protocol, not tunables.
//! - **RF codes**: a 40-bit address field shared by all commands followed by a
//!   50-bit command field, sent MSB first.
//! - **Fragment header**: 4 bytes prepended to every fragment of an oversized
//!   status record.
//! - **Endpoint limits**: maximum write sizes for the inbound endpoints.
//! - **Defaults**: navigation, correction and telemetry policy defaults.

/// Duration of the synchronization pulse that opens every RF burst, in µs.
pub const RF_SYNC_PULSE_US: u32 = 170;

/// Gap following the synchronization pulse, in µs.
pub const RF_SYNC_GAP_US: u32 = 114;

/// Duration of the short half of a data bit, in µs.
///
/// A `1` bit is `RF_LONG_PULSE_US` high then `RF_SHORT_PULSE_US` low.
/// A `0` bit is `RF_SHORT_PULSE_US` high then `RF_LONG_PULSE_US` low.
pub const RF_SHORT_PULSE_US: u32 = 50;

/// Duration of the long half of a data bit, in µs.
pub const RF_LONG_PULSE_US: u32 = 102;

/// Time given to the radio to settle after entering transmit mode, in µs.
pub const RF_TX_SETTLE_US: u32 = 1_000;

/// Idle tail held after the last data bit before leaving transmit mode, in µs.
pub const RF_TAIL_GAP_US: u32 = 2_000;

/// Pause between two repeated bursts, in ms.
pub const RF_REPEAT_PAUSE_MS: u32 = 50;

/// Number of bursts sent for one correction unless configured otherwise.
pub const RF_DEFAULT_REPEATS: u8 = 3;

/// Width of the address field, in bits.
pub const RF_ADDRESS_BITS: u8 = 40;

/// Width of the command field, in bits.
pub const RF_COMMAND_BITS: u8 = 50;

/// Total number of data bits in one burst.
pub const RF_DATA_BITS: u8 = RF_ADDRESS_BITS + RF_COMMAND_BITS;

/// Address field recognized by the motor's receiver. Shared by every command.
pub const RF_ADDRESS_CODE: u64 = 0x80_0057_6d76;

/// Command field for a right turn. Only the low [`RF_COMMAND_BITS`] are sent.
pub const RF_RIGHT_CODE: u64 = 0xf_7e07_7723_ba90;

/// Command field for a left turn. Only the low [`RF_COMMAND_BITS`] are sent.
pub const RF_LEFT_CODE: u64 = 0xf_7e07_7723_ea84;

/// Mean earth radius used by the spherical model, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default arrival radius, in meters.
pub const DEFAULT_ARRIVAL_RADIUS_M: f64 = 5.0;

/// Default horizontal DOP threshold. Navigation requires `hdop < threshold`.
pub const DEFAULT_MAX_DOP: f64 = 5.0;

/// Default maximum age of a GPS sample before it is considered stale, in ms.
pub const DEFAULT_MAX_SAMPLE_AGE_MS: u32 = 2_000;

/// Default heading tolerance, in degrees. Corrections require `|angle| > tolerance`.
pub const DEFAULT_HEADING_TOLERANCE_DEG: f64 = 15.0;

/// Default minimum spacing between two issued corrections, in ms.
pub const DEFAULT_MIN_CORRECTION_INTERVAL_MS: u64 = 2_000;

/// Length of the fragment header, in bytes.
///
/// Layout: `[sequence_index, total_fragments, total_len_hi, total_len_lo]`.
pub const FRAGMENT_HEADER_LEN: usize = 4;

/// Maximum number of fragments a single record may be split into.
pub const MAX_FRAGMENTS: usize = u8::MAX as usize;

/// Largest payload the telemetry link is ever trusted to carry in one notification.
pub const MAX_MTU: u16 = 512;

/// Conservative starting payload size (default ATT MTU of 23 minus the 3-byte ATT header).
pub const INITIAL_MTU: u16 = 20;

/// Bytes consumed by the ATT header in every notification.
pub const ATT_HEADER_LEN: u16 = 3;

/// Capacity of the status record buffer, in bytes.
pub const STATUS_CAPACITY: usize = MAX_MTU as usize;

/// Capacity of a single outbound frame, in bytes.
pub const FRAME_CAPACITY: usize = MAX_MTU as usize;

/// Capacity of an acknowledgement or calibration record, in bytes.
pub const AUX_CAPACITY: usize = 192;

/// Maximum accepted size of a write on the waypoint or command endpoints.
pub const MAX_WRITE_LEN: usize = 32;

/// Default delay between two fragments of the same record, in ms.
pub const DEFAULT_INTER_FRAGMENT_DELAY_MS: u32 = 20;

/// Default interval below which an unchanged status record is not resent, in ms.
pub const DEFAULT_DUPLICATE_INTERVAL_MS: u64 = 500;

/// Default number of 1 ms waits on a busy transport before a send is abandoned.
pub const DEFAULT_BUSY_RETRIES: u32 = 50;

/// Prefix of an inbound waypoint write.
pub const WAYPOINT_PREFIX: &str = "$GPS,";

/// Terminator of an inbound waypoint write.
pub const WAYPOINT_TERMINATOR: char = '*';

/// Prefix of the command that hands back calibration values, `SAVE_CAL:<values>`.
pub const SAVE_CALIBRATION_PREFIX: &str = "SAVE_CAL:";

/// Number of pending audible cues kept before the oldest is dropped.
pub const CUE_QUEUE_LEN: usize = 8;
