//! Pulse-width encoder for the trolling motor's 433 MHz remote.
//!
//! This module provides [`RfEncoder`], which reproduces the two steering
//! commands of the motor's handheld remote bit for bit by toggling the data
//! line of an FSK/OOK transmitter in continuous mode.
//!
//! ## Burst layout
//!
//! ```text
//!  PTT  ___/‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾\___
//!  DATA ______/‾‾‾‾‾\____/‾‾‾‾\__/‾‾\____ ... _____________________
//!         1ms   sync  gap   "1"    "0"     90 bits   2ms tail
//! ```
//!
//! - sync: [`RF_SYNC_PULSE_US`] high, [`RF_SYNC_GAP_US`] low
//! - `1`: [`RF_LONG_PULSE_US`] high, [`RF_SHORT_PULSE_US`] low
//! - `0`: [`RF_SHORT_PULSE_US`] high, [`RF_LONG_PULSE_US`] low
//! - 40 address bits then 50 command bits, MSB first
//!
//! Bursts are repeated with a [`RF_REPEAT_PAUSE_MS`] pause because the
//! receiver only latches a command after several identical bursts.
//!
//! ## Blocking
//!
//! [`transmit()`](RfEncoder::transmit) owns the calling thread for the whole
//! transmission (about 150 ms for three repeats). Timing fidelity requires
//! uninterrupted control of the data line, so nothing else runs meanwhile.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, ErrorKind, ErrorType, OutputPin};
use thiserror::Error;

use crate::consts::{
    RF_ADDRESS_BITS, RF_ADDRESS_CODE, RF_COMMAND_BITS, RF_DATA_BITS, RF_LEFT_CODE,
    RF_LONG_PULSE_US, RF_REPEAT_PAUSE_MS, RF_RIGHT_CODE, RF_SHORT_PULSE_US, RF_SYNC_GAP_US,
    RF_SYNC_PULSE_US, RF_TAIL_GAP_US, RF_TX_SETTLE_US,
};

/// A steering command understood by the motor's receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RfCommand {
    /// Turn to port.
    Left,
    /// Turn to starboard.
    Right,
}

impl RfCommand {
    /// The 50-bit command field.
    pub const fn command_code(self) -> u64 {
        match self {
            RfCommand::Left => RF_LEFT_CODE,
            RfCommand::Right => RF_RIGHT_CODE,
        }
    }

    /// The data bits of one burst, MSB first: address field then command field.
    pub fn bits(self) -> CodeBits {
        CodeBits {
            command: self.command_code(),
            index: 0,
        }
    }
}

/// Iterator over the [`RF_DATA_BITS`] data bits of a burst.
#[derive(Debug, Clone)]
pub struct CodeBits {
    command: u64,
    index: u8,
}

impl Iterator for CodeBits {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.index >= RF_DATA_BITS {
            return None;
        }
        let bit = if self.index < RF_ADDRESS_BITS {
            let shift = RF_ADDRESS_BITS - 1 - self.index;
            (RF_ADDRESS_CODE >> shift) & 1
        } else {
            let shift = RF_COMMAND_BITS - 1 - (self.index - RF_ADDRESS_BITS);
            (self.command >> shift) & 1
        };
        self.index += 1;
        Some(bit != 0)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (RF_DATA_BITS - self.index) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for CodeBits {}

/// Errors raised while driving the transmitter lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RfError {
    /// The data line refused a level change.
    #[error("data line error: {0:?}")]
    DataLine(ErrorKind),
    /// The transmit-enable line refused a level change.
    #[error("transmit-enable line error: {0:?}")]
    Ptt(ErrorKind),
}

/// Anything that can put a steering command on the air.
///
/// Implemented by [`RfEncoder`]; the seam lets the correction logic be driven
/// against a recording fake.
pub trait CommandTransmitter {
    /// Whether the radio path has been initialized.
    fn is_ready(&self) -> bool;

    /// Sends `command` `repeats` times. Returns `true` if every burst went out.
    ///
    /// A transmitter that is not ready must return `false` without side effects.
    fn transmit(&mut self, command: RfCommand, repeats: u8) -> bool;
}

/// Placeholder transmit-enable pin for radios that key themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPtt;

impl ErrorType for NoPtt {
    type Error = Infallible;
}

impl OutputPin for NoPtt {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Bit-banged pulse-width encoder for the motor remote protocol.
///
/// ## Type Parameters
///
/// - `TX`: data line of the transmitter ([`OutputPin`]); high = carrier on
/// - `PTT`: transmit-enable line ([`OutputPin`]), or [`NoPtt`]
/// - `D`: microsecond delay provider ([`DelayNs`])
///
/// ## Example
///
/// ```rust
/// # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
/// # use embedded_hal_mock::eh1::delay::NoopDelay;
/// use helm::rf::{CommandTransmitter, RfCommand, RfEncoder};
///
/// # let mut expected = vec![PinTransaction::set(PinState::Low)];
/// # expected.extend((0..91).flat_map(|_| [PinTransaction::set(PinState::High), PinTransaction::set(PinState::Low)]));
/// # let tx_pin = Pin::new(&expected);
/// let mut encoder = RfEncoder::without_ptt(tx_pin, NoopDelay::new());
/// assert!(encoder.is_ready());
/// assert!(encoder.transmit(RfCommand::Right, 1));
/// # let (mut tx, _, _) = encoder.release();
/// # tx.done();
/// ```
#[derive(Debug)]
pub struct RfEncoder<TX, PTT, D>
where
    TX: OutputPin,
    PTT: OutputPin,
    D: DelayNs,
{
    tx: TX,
    ptt: Option<PTT>,
    delay: D,
    ptt_inverted: bool,
    ready: bool,

    /// Bursts sent in full.
    pub tx_good: u16,

    /// Transmissions abandoned because a line refused a level change.
    pub tx_failed: u16,
}

impl<TX, D> RfEncoder<TX, NoPtt, D>
where
    TX: OutputPin,
    D: DelayNs,
{
    /// Creates an encoder for a transmitter without a transmit-enable line.
    pub fn without_ptt(tx: TX, delay: D) -> Self {
        Self::new(tx, None, delay, None)
    }
}

impl<TX, PTT, D> RfEncoder<TX, PTT, D>
where
    TX: OutputPin,
    PTT: OutputPin,
    D: DelayNs,
{
    /// Creates a new encoder and drives both lines to their idle level.
    ///
    /// # Arguments
    /// - `tx`: data line
    /// - `ptt`: optional transmit-enable line
    /// - `delay`: delay provider with microsecond resolution
    /// - `ptt_inverted`: whether the transmit-enable line is active low
    ///
    /// # Notes
    /// If either line cannot be driven idle the encoder reports
    /// [`is_ready()`](CommandTransmitter::is_ready) as `false` and every
    /// transmission becomes a no-op.
    pub fn new(tx: TX, ptt: Option<PTT>, delay: D, ptt_inverted: Option<bool>) -> Self {
        let mut encoder = Self {
            tx,
            ptt,
            delay,
            ptt_inverted: ptt_inverted.unwrap_or(false),
            ready: false,
            tx_good: 0,
            tx_failed: 0,
        };
        encoder.ready = match encoder.idle_lines() {
            Ok(()) => true,
            Err(e) => {
                warn!("RF encoder not ready: {:?}", e);
                false
            }
        };
        encoder
    }

    /// Gives the pins and the delay provider back.
    pub fn release(self) -> (TX, Option<PTT>, D) {
        (self.tx, self.ptt, self.delay)
    }

    /// Duration of one burst, including transmit-enable settling and tail, in µs.
    pub fn burst_duration_us(&self) -> u32 {
        let settle = if self.ptt.is_some() { RF_TX_SETTLE_US } else { 0 };
        settle
            + RF_SYNC_PULSE_US
            + RF_SYNC_GAP_US
            + RF_DATA_BITS as u32 * (RF_LONG_PULSE_US + RF_SHORT_PULSE_US)
            + RF_TAIL_GAP_US
    }

    /// Duration of a transmission of `repeats` bursts, in µs.
    pub fn transmission_duration_us(&self, repeats: u8) -> u32 {
        let repeats = repeats as u32;
        repeats * self.burst_duration_us() + repeats.saturating_sub(1) * RF_REPEAT_PAUSE_MS * 1_000
    }

    fn write_tx(&mut self, high: bool) -> Result<(), RfError> {
        let result = if high {
            self.tx.set_high()
        } else {
            self.tx.set_low()
        };
        result.map_err(|e| RfError::DataLine(e.kind()))
    }

    fn write_ptt(&mut self, on: bool) -> Result<(), RfError> {
        let level = if self.ptt_inverted { !on } else { on };
        if let Some(ref mut ptt) = self.ptt {
            let result = if level { ptt.set_high() } else { ptt.set_low() };
            result.map_err(|e| RfError::Ptt(e.kind()))?;
        }
        Ok(())
    }

    fn idle_lines(&mut self) -> Result<(), RfError> {
        self.write_tx(false)?;
        self.write_ptt(false)
    }

    fn pulse(&mut self, high_us: u32, low_us: u32) -> Result<(), RfError> {
        self.write_tx(true)?;
        self.delay.delay_us(high_us);
        self.write_tx(false)?;
        self.delay.delay_us(low_us);
        Ok(())
    }

    fn send_burst(&mut self, command: RfCommand) -> Result<(), RfError> {
        if self.ptt.is_some() {
            self.write_ptt(true)?;
            self.delay.delay_us(RF_TX_SETTLE_US);
        }

        self.pulse(RF_SYNC_PULSE_US, RF_SYNC_GAP_US)?;
        for bit in command.bits() {
            if bit {
                self.pulse(RF_LONG_PULSE_US, RF_SHORT_PULSE_US)?;
            } else {
                self.pulse(RF_SHORT_PULSE_US, RF_LONG_PULSE_US)?;
            }
        }

        self.delay.delay_us(RF_TAIL_GAP_US);
        self.write_ptt(false)
    }
}

impl<TX, PTT, D> CommandTransmitter for RfEncoder<TX, PTT, D>
where
    TX: OutputPin,
    PTT: OutputPin,
    D: DelayNs,
{
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn transmit(&mut self, command: RfCommand, repeats: u8) -> bool {
        if !self.ready {
            warn!("cannot transmit {:?}: RF encoder not ready", command);
            return false;
        }

        info!("transmitting {:?} ({} repeats)", command, repeats);
        for repeat in 0..repeats {
            if let Err(e) = self.send_burst(command) {
                warn!("RF burst aborted: {:?}", e);
                self.tx_failed = self.tx_failed.wrapping_add(1);
                // Never leave the carrier keyed.
                if self.idle_lines().is_err() {
                    self.ready = false;
                }
                return false;
            }
            self.tx_good = self.tx_good.wrapping_add(1);
            if repeat + 1 < repeats {
                self.delay.delay_ms(RF_REPEAT_PAUSE_MS);
            }
        }
        true
    }
}
