//! # helm
//!
//! A portable, `no_std` navigation core for a small craft steered by a
//! trolling motor's 433 MHz remote.
//!
//! The crate fuses a position fix and a compass heading into a steering
//! decision, drives the motor by bit-banging its remote control protocol, and
//! reports status to a companion application over a small-payload,
//! notify-style link (BLE GATT or similar):
//!
//! - [`navigation`]: target tracking, arrival detection and safety interlocks
//! - [`correction`]: when and which way to turn, with debouncing
//! - [`rf`]: the pulse-width remote protocol over `embedded-hal` pins
//! - [`telemetry`]: status records, fragmentation, MTU learning, inbound parsing
//! - [`helm`]: the control loop tying it all together
//!
//! ## Crate features
//! | Feature            | Description |
//! |--------------------|-------------|
//! | `std`              | Links `std` instead of building `#![no_std]` |
//! | `shared` (default) | [`shared`] engine cell over `critical-section` |
//! | `defmt-0-3`        | Uses `defmt` logging |
//! | `log`              | Uses `log` logging |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use helm::{Helm, HelmConfig, RfEncoder};
//!
//! let radio = RfEncoder::new(tx_pin, Some(ptt_pin), delay_a, None);
//! let mut helm = Helm::new(HelmConfig::default(), radio, ble, delay_b, clock);
//! loop {
//!     let report = helm.tick(&gps.position(), compass.heading());
//!     if let Some(cue) = helm.poll_cue() {
//!         buzzer.play(cue.melody());
//!     }
//! }
//! ```
//!
//! ## Integration Notes
//!
//! - RF transmissions block the loop for about 150 ms with the default three
//!   repeats; keep other time-critical work off this thread
//! - Transport callbacks should call into the [`Helm`] (or the [`shared`]
//!   engine) only between ticks, never during one
//! - Sensor acquisition, calibration arithmetic, display and the companion app
//!   are out of scope and live behind plain data types
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod fmt;

#[cfg(feature = "shared")]
pub use critical_section;
pub use heapless;

pub mod clock;
pub mod config;
pub mod consts;
pub mod correction;
pub mod cue;
pub mod geo;
pub mod helm;
pub mod model;
pub mod navigation;
pub mod rf;
#[cfg(feature = "shared")]
pub mod shared;
pub mod telemetry;

pub use crate::config::HelmConfig;
pub use crate::helm::{CommandHandler, Helm};
pub use crate::rf::{CommandTransmitter, RfCommand, RfEncoder};
