//! The control loop driver.
//!
//! [`Helm`] owns every piece of the navigation core and sequences one cycle
//! per [`tick()`](Helm::tick):
//!
//! 1. sample the clock once
//! 2. [`NavigationEngine::update`]
//! 3. [`HeadingCorrectionController::correct`], which may block on the RF link
//! 4. [`TelemetryChannel::publish`] with this cycle's snapshot
//!
//! Transport events ([`on_connect`](Helm::on_connect),
//! [`on_disconnect`](Helm::on_disconnect), [`on_write`](Helm::on_write)) are
//! dispatched synchronously and run to completion between ticks.
//!
//! ```
//! # use embedded_hal_mock::eh1::delay::NoopDelay;
//! use helm::clock::MockClock;
//! use helm::config::HelmConfig;
//! use helm::helm::Helm;
//! use helm::model::{HeadingSample, Position};
//! use helm::rf::{CommandTransmitter, RfCommand};
//! use helm::telemetry::{Endpoint, Transport, TransportError};
//!
//! struct Radio;
//! impl CommandTransmitter for Radio {
//!     fn is_ready(&self) -> bool { true }
//!     fn transmit(&mut self, _: RfCommand, _: u8) -> bool { true }
//! }
//!
//! struct Link;
//! impl Transport for Link {
//!     fn notify(&mut self, _: Endpoint, _: &[u8]) -> nb::Result<(), TransportError> { Ok(()) }
//! }
//!
//! let mut helm = Helm::new(HelmConfig::default(), Radio, Link, NoopDelay::new(), MockClock::new());
//! helm.on_connect();
//! helm.on_write(Endpoint::Waypoint, b"$GPS,-32.940931,151.718029,45.2*");
//! let report = helm.tick(&Position::fix(-32.95, 151.70), HeadingSample(0.0));
//! assert!(!report.snapshot.is_navigating());
//! ```

use embedded_hal::delay::DelayNs;

use crate::clock::Clock;
use crate::config::HelmConfig;
use crate::correction::HeadingCorrectionController;
use crate::cue::{Cue, CueQueue};
use crate::model::{
    CalibrationSample, HeadingSample, NavigationSnapshot, NavigationState, Position, SensorStatus,
};
use crate::navigation::NavigationEngine;
use crate::rf::{CommandTransmitter, RfCommand};
use crate::telemetry::{
    Command, Endpoint, Inbound, PublishOutcome, TelemetryChannel, Transport, calibration_values,
};

/// Receiver for commands the navigation core does not handle itself.
///
/// Magnetometer calibration and RF pairing live outside the core. Every
/// method defaults to doing nothing.
pub trait CommandHandler {
    /// `START_CAL` was received.
    fn start_calibration(&mut self) {}
    /// `STOP_CAL` was received.
    fn stop_calibration(&mut self) {}
    /// `SAVE_CAL:<values>` was received; `values` is everything after the colon.
    fn save_calibration(&mut self, _values: &str) {}
    /// `RF_PAIR_START` was received.
    fn pairing_start(&mut self) {}
    /// `RF_PAIR_COMPLETE` was received.
    fn pairing_complete(&mut self) {}
    /// `RF_PAIR_CANCEL` was received.
    fn pairing_cancel(&mut self) {}
}

/// A [`CommandHandler`] that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommands;

impl CommandHandler for NoCommands {}

/// What one [`tick()`](Helm::tick) did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// The snapshot of this cycle.
    pub snapshot: NavigationSnapshot,
    /// The correction sent this cycle, if any.
    pub correction: Option<RfCommand>,
    /// The fate of this cycle's status record.
    pub publish: PublishOutcome,
}

/// The navigation core wired to its collaborators.
#[derive(Debug)]
pub struct Helm<X, T, D, C, H = NoCommands> {
    engine: NavigationEngine,
    controller: HeadingCorrectionController,
    transmitter: X,
    channel: TelemetryChannel<T, D>,
    clock: C,
    handler: H,
    cues: CueQueue,
    had_fix: Option<bool>,
}

impl<X, T, D, C> Helm<X, T, D, C, NoCommands>
where
    X: CommandTransmitter,
    T: Transport,
    D: DelayNs,
    C: Clock,
{
    /// Wires a new helm. No target, navigation disabled, app disconnected.
    pub fn new(config: HelmConfig, transmitter: X, transport: T, delay: D, clock: C) -> Self {
        Self {
            engine: NavigationEngine::new(config.navigation),
            controller: HeadingCorrectionController::new(config.correction),
            transmitter,
            channel: TelemetryChannel::new(transport, delay, config.telemetry),
            clock,
            handler: NoCommands,
            cues: CueQueue::new(),
            had_fix: None,
        }
    }
}

impl<X, T, D, C, H> Helm<X, T, D, C, H>
where
    X: CommandTransmitter,
    T: Transport,
    D: DelayNs,
    C: Clock,
    H: CommandHandler,
{
    /// Replaces the command handler.
    pub fn with_handler<H2: CommandHandler>(self, handler: H2) -> Helm<X, T, D, C, H2> {
        Helm {
            engine: self.engine,
            controller: self.controller,
            transmitter: self.transmitter,
            channel: self.channel,
            clock: self.clock,
            handler,
            cues: self.cues,
            had_fix: self.had_fix,
        }
    }

    /// The navigation engine.
    pub fn engine(&self) -> &NavigationEngine {
        &self.engine
    }

    /// Exclusive access to the navigation engine.
    pub fn engine_mut(&mut self) -> &mut NavigationEngine {
        &mut self.engine
    }

    /// The correction controller.
    pub fn controller(&self) -> &HeadingCorrectionController {
        &self.controller
    }

    /// The RF transmitter.
    pub fn transmitter(&self) -> &X {
        &self.transmitter
    }

    /// The telemetry channel.
    pub fn channel(&self) -> &TelemetryChannel<T, D> {
        &self.channel
    }

    /// Exclusive access to the telemetry channel.
    pub fn channel_mut(&mut self) -> &mut TelemetryChannel<T, D> {
        &mut self.channel
    }

    /// The command handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Runs one control cycle.
    pub fn tick(&mut self, position: &Position, heading: HeadingSample) -> CycleReport {
        let now_ms = self.clock.now_ms();

        match (self.had_fix, position.fix_valid) {
            (Some(true), false) => {
                warn!("GPS fix lost");
                self.cues.push(Cue::GpsFixLost);
            }
            (None | Some(false), true) => {
                info!("GPS fix acquired ({} satellites)", position.satellites);
                self.cues.push(Cue::GpsFixed);
            }
            _ => {}
        }
        self.had_fix = Some(position.fix_valid);

        let was_arrived = self.engine.has_arrived();
        let snapshot = self.engine.update(position, heading);
        if !was_arrived && snapshot.state == NavigationState::Arrived {
            self.cues.push(Cue::DestinationReached);
        }

        let correction = self
            .controller
            .correct(&snapshot, now_ms, &mut self.transmitter);

        let sensors = SensorStatus {
            position: *position,
            heading,
        };
        let publish = self.channel.publish(&snapshot, &sensors, now_ms);

        CycleReport {
            snapshot,
            correction,
            publish,
        }
    }

    /// The companion app connected.
    pub fn on_connect(&mut self) {
        info!("app connected");
        self.engine.set_connected(true);
        self.channel.on_connect();
        self.cues.push(Cue::AppConnected);
    }

    /// The companion app disconnected.
    pub fn on_disconnect(&mut self) {
        info!("app disconnected");
        self.engine.set_connected(false);
        self.channel.on_disconnect();
        self.cues.push(Cue::AppDisconnected);
    }

    /// The transport negotiated an ATT MTU.
    pub fn on_mtu_negotiated(&mut self, att_mtu: u16) {
        self.channel.on_mtu_negotiated(att_mtu);
    }

    /// Handles a write on one of the inbound endpoints.
    ///
    /// Returns the decoded write, or `None` if it was discarded.
    pub fn on_write(&mut self, endpoint: Endpoint, bytes: &[u8]) -> Option<Inbound> {
        let inbound = self.channel.handle_write(endpoint, bytes)?;
        match inbound {
            Inbound::Waypoint(waypoint) => {
                let accepted = self.engine.set_target(
                    waypoint.latitude,
                    waypoint.longitude,
                    waypoint.altitude_m,
                    self.clock.now_ms(),
                );
                match accepted {
                    Ok(()) => self.cues.push(Cue::WaypointSet),
                    Err(e) => debug!("waypoint rejected: {}", e),
                }
            }
            Inbound::Command(command) => self.dispatch(command, bytes),
        }
        Some(inbound)
    }

    fn dispatch(&mut self, command: Command, bytes: &[u8]) {
        match command {
            Command::NavEnable => {
                if self.engine.set_enabled(true) {
                    self.cues.push(Cue::NavigationEnabled);
                }
            }
            Command::NavDisable => {
                let _ = self.engine.set_enabled(false);
            }
            Command::StartCalibration => self.handler.start_calibration(),
            Command::StopCalibration => self.handler.stop_calibration(),
            Command::SaveCalibration => self
                .handler
                .save_calibration(calibration_values(bytes).unwrap_or_default()),
            Command::RfPairStart => self.handler.pairing_start(),
            Command::RfPairComplete => self.handler.pairing_complete(),
            Command::RfPairCancel => self.handler.pairing_cancel(),
        }

        if let Err(e) = self.channel.send_ack(command) {
            warn!("ack for {} not sent: {}", command.as_str(), e);
        }
    }

    /// Streams a calibration sample while calibration mode is active.
    pub fn publish_calibration(&mut self, sample: &CalibrationSample) -> PublishOutcome {
        self.channel.publish_calibration(sample)
    }

    /// Takes the oldest pending audible cue.
    pub fn poll_cue(&mut self) -> Option<Cue> {
        self.cues.pop()
    }
}

#[cfg(test)]
mod tests {
    #[allow(unused_extern_crates)]
    extern crate std;

    use super::*;
    use crate::clock::MockClock;
    use crate::consts::EARTH_RADIUS_M;
    use crate::model::BlockReason;
    use crate::telemetry::TransportError;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::vec::Vec;

    const TARGET: (f64, f64) = (-32.940931, 151.718029);
    const WAYPOINT: &[u8] = b"$GPS,-32.940931,151.718029,45.2*";

    #[derive(Debug, Default)]
    struct FakeRadio {
        sent: Vec<RfCommand>,
    }

    impl CommandTransmitter for FakeRadio {
        fn is_ready(&self) -> bool {
            true
        }

        fn transmit(&mut self, command: RfCommand, _repeats: u8) -> bool {
            self.sent.push(command);
            true
        }
    }

    #[derive(Debug, Default)]
    struct FakeLink {
        sent: Vec<(Endpoint, Vec<u8>)>,
    }

    impl Transport for FakeLink {
        fn notify(&mut self, endpoint: Endpoint, payload: &[u8]) -> nb::Result<(), TransportError> {
            self.sent.push((endpoint, payload.to_vec()));
            Ok(())
        }
    }

    impl FakeLink {
        fn on(&self, endpoint: Endpoint) -> Vec<&[u8]> {
            self.sent
                .iter()
                .filter(|(e, _)| *e == endpoint)
                .map(|(_, p)| p.as_slice())
                .collect()
        }
    }

    #[derive(Debug, Default)]
    struct RecordingHandler {
        calls: Vec<&'static str>,
        saved: Option<String>,
    }

    impl CommandHandler for RecordingHandler {
        fn start_calibration(&mut self) {
            self.calls.push("start_cal");
        }
        fn pairing_complete(&mut self) {
            self.calls.push("pair_complete");
        }
        fn save_calibration(&mut self, values: &str) {
            self.calls.push("save_cal");
            self.saved = Some(values.into());
        }
    }

    type TestHelm<'a> = Helm<FakeRadio, FakeLink, NoopDelay, &'a MockClock>;

    fn helm(clock: &MockClock) -> TestHelm<'_> {
        Helm::new(
            HelmConfig::default(),
            FakeRadio::default(),
            FakeLink::default(),
            NoopDelay::new(),
            clock,
        )
    }

    /// A fix `meters` due south of the target.
    fn south_of_target(meters: f64) -> Position {
        let degrees = (meters / EARTH_RADIUS_M).to_degrees();
        Position::fix(TARGET.0 - degrees, TARGET.1)
    }

    /// Connects with a full-size negotiated MTU so records go out whole.
    fn connect(helm: &mut TestHelm<'_>) {
        helm.on_connect();
        helm.on_mtu_negotiated(515);
    }

    fn drain(helm: &mut TestHelm<'_>) -> Vec<Cue> {
        core::iter::from_fn(|| helm.poll_cue()).collect()
    }

    /// Connected, target set, one fix seen and navigation enabled.
    fn navigating(clock: &MockClock) -> TestHelm<'_> {
        let mut helm = helm(clock);
        connect(&mut helm);
        let _ = helm.on_write(Endpoint::Waypoint, WAYPOINT);
        let _ = helm.tick(&south_of_target(200.0), HeadingSample(0.0));
        let _ = helm.on_write(Endpoint::CalibrationCommand, b"NAV_ENABLE");
        let _ = drain(&mut helm);
        helm
    }

    #[test]
    fn test_cycle_corrects_then_publishes() {
        let clock = MockClock::new();
        let mut helm = navigating(&clock);

        // due north of us, heading east: turn left
        clock.advance(100);
        let report = helm.tick(&south_of_target(200.0), HeadingSample(90.0));
        assert_eq!(report.snapshot.state, NavigationState::Navigating);
        assert_eq!(report.correction, Some(RfCommand::Left));
        assert_ne!(report.publish, PublishOutcome::Inactive);
        assert_eq!(helm.transmitter().sent, [RfCommand::Left]);

        let status = helm.channel().transport().on(Endpoint::Status);
        let last = std::str::from_utf8(status.last().unwrap()).unwrap();
        assert!(last.contains("\"state\":\"navigating\""));
        assert!(last.contains("\"targetLat\":-32.940931"));

        // debounced on the next cycle
        clock.advance(100);
        let report = helm.tick(&south_of_target(190.0), HeadingSample(90.0));
        assert_eq!(report.correction, None);
    }

    #[test]
    fn test_fix_loss_stops_corrections() {
        let clock = MockClock::new();
        let mut helm = navigating(&clock);

        clock.advance(5_000);
        let report = helm.tick(&Position::no_fix(), HeadingSample(90.0));
        assert_eq!(report.snapshot.state, NavigationState::Idle);
        assert_eq!(report.snapshot.reason_if_blocked, Some(BlockReason::NoFix));
        assert_eq!(report.correction, None);
        assert!(helm.transmitter().sent.is_empty());
        assert_eq!(drain(&mut helm), [Cue::GpsFixLost]);

        clock.advance(1_000);
        let report = helm.tick(&south_of_target(200.0), HeadingSample(90.0));
        assert_eq!(report.snapshot.state, NavigationState::Navigating);
        assert_eq!(drain(&mut helm), [Cue::GpsFixed]);
    }

    #[test]
    fn test_arrival_queues_cue_once() {
        let clock = MockClock::new();
        let mut helm = navigating(&clock);

        let report = helm.tick(&south_of_target(4.0), HeadingSample(0.0));
        assert_eq!(report.snapshot.state, NavigationState::Arrived);
        let _ = helm.tick(&south_of_target(3.0), HeadingSample(0.0));
        assert_eq!(drain(&mut helm), [Cue::DestinationReached]);
        assert!(!helm.engine().is_enabled());

        // re-enabling without a new target does nothing
        let _ = helm.on_write(Endpoint::CalibrationCommand, b"NAV_ENABLE");
        assert!(drain(&mut helm).is_empty());
        assert!(helm.engine().has_arrived());
    }

    #[test]
    fn test_disconnect_suspends_navigation() {
        let clock = MockClock::new();
        let mut helm = navigating(&clock);

        helm.on_disconnect();
        let report = helm.tick(&south_of_target(200.0), HeadingSample(90.0));
        assert_eq!(report.snapshot.reason_if_blocked, Some(BlockReason::Disconnected));
        assert_eq!(report.correction, None);
        assert_eq!(report.publish, PublishOutcome::Inactive);

        helm.on_connect();
        let report = helm.tick(&south_of_target(200.0), HeadingSample(90.0));
        assert!(report.snapshot.is_navigating());
        assert_eq!(drain(&mut helm), [Cue::AppDisconnected, Cue::AppConnected]);
    }

    #[test]
    fn test_waypoint_write_sets_target() {
        let clock = MockClock::new();
        clock.set(42);
        let mut helm = helm(&clock);

        assert!(helm.on_write(Endpoint::Waypoint, WAYPOINT).is_some());
        let target = helm.engine().target().copied().unwrap();
        assert_eq!((target.latitude, target.longitude), TARGET);
        assert_eq!(target.altitude_m, 45.2);
        assert_eq!(target.set_at_ms, 42);
        assert_eq!(drain(&mut helm), [Cue::WaypointSet]);

        // decodes, but the engine refuses the latitude
        assert!(helm.on_write(Endpoint::Waypoint, b"$GPS,999,0,0*").is_some());
        assert_eq!(helm.engine().target().copied(), Some(target));
        assert!(drain(&mut helm).is_empty());

        assert!(helm.on_write(Endpoint::Waypoint, b"$GPS,1,2*").is_none());
    }

    #[test]
    fn test_commands_are_dispatched_and_acked() {
        let clock = MockClock::new();
        let mut helm = helm(&clock).with_handler(RecordingHandler::default());
        helm.on_connect();
        helm.on_mtu_negotiated(515);

        let _ = helm.on_write(Endpoint::CalibrationCommand, b"START_CAL");
        let _ = helm.on_write(Endpoint::CalibrationCommand, b"RF_PAIR_COMPLETE");
        let _ = helm.on_write(Endpoint::CalibrationCommand, b"BOGUS");
        assert_eq!(helm.handler().calls, ["start_cal", "pair_complete"]);

        let acks = helm.channel().transport().on(Endpoint::CalibrationData);
        assert_eq!(
            acks,
            [
                b"{\"ack\":\"START_CAL\"}".as_slice(),
                b"{\"ack\":\"RF_PAIR_COMPLETE\"}".as_slice(),
            ]
        );
        assert!(helm.channel().transport().on(Endpoint::Status).is_empty());

        // calibration mode was entered by START_CAL
        let outcome = helm.publish_calibration(&CalibrationSample::default());
        assert_eq!(outcome, PublishOutcome::Single);
    }

    #[test]
    fn test_save_calibration_ends_calibration_mode() {
        let clock = MockClock::new();
        let mut helm = helm(&clock).with_handler(RecordingHandler::default());
        helm.on_connect();
        helm.on_mtu_negotiated(515);

        let _ = helm.on_write(Endpoint::CalibrationCommand, b"START_CAL");
        assert_eq!(
            helm.on_write(Endpoint::CalibrationCommand, b"SAVE_CAL:-21.4,7.9,3.2"),
            Some(Inbound::Command(Command::SaveCalibration))
        );
        assert_eq!(helm.handler().calls, ["start_cal", "save_cal"]);
        assert_eq!(helm.handler().saved.as_deref(), Some("-21.4,7.9,3.2"));
        assert!(!helm.channel().is_calibrating());
        assert_eq!(
            helm.publish_calibration(&CalibrationSample::default()),
            PublishOutcome::Inactive
        );

        let acks = helm.channel().transport().on(Endpoint::CalibrationData);
        assert_eq!(acks.last().copied(), Some(b"{\"ack\":\"SAVE_CAL\"}".as_slice()));
    }

    #[test]
    fn test_nav_disable_command() {
        let clock = MockClock::new();
        let mut helm = navigating(&clock);
        assert!(helm.engine().is_enabled());

        let _ = helm.on_write(Endpoint::CalibrationCommand, b"NAV_DISABLE");
        assert!(!helm.engine().is_enabled());
        let report = helm.tick(&south_of_target(200.0), HeadingSample(90.0));
        assert_eq!(report.snapshot.reason_if_blocked, Some(BlockReason::Disabled));
        assert_eq!(report.correction, None);
    }
}
