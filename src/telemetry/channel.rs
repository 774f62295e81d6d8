//! The telemetry channel.
//!
//! [`TelemetryChannel`] sits between the helm and a [`Transport`]. Outbound it
//! publishes the status record once per cycle (with duplicate suppression),
//! the calibration stream while calibration mode is active, and command
//! acknowledgements. Inbound it turns raw endpoint writes into [`Inbound`]
//! events.
//!
//! ## Sizing
//!
//! Every notification goes through the same policy:
//!
//! 1. payloads within the effective MTU go out whole
//! 2. with [`TelemetryConfig::probe_mtu`] set, larger payloads up to the probe
//!    ceiling are tried whole too, and a success raises the estimate
//! 3. a payload the transport refuses as too large lowers the ceiling
//! 4. anything else is fragmented, with a fixed delay after each frame
//!
//! A transport that stays busy is waited on for at most
//! [`TelemetryConfig::busy_retries`] milliseconds before the send fails.
//!
//! A status record that cannot be framed is replaced by the essential record.

use embedded_hal::delay::DelayNs;
use thiserror::Error;

use super::TelemetryError;
use super::frame::fragment;
use super::inbound::{Command, ParseError, WaypointRequest, parse_waypoint};
use super::mtu::MtuEstimator;
use super::status::{
    StatusRecord, ack_record, calibration_record, checked_status_record, essential_record,
};
use crate::config::TelemetryConfig;
use crate::model::{CalibrationSample, NavigationSnapshot, SensorStatus};

/// The logical endpoints of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Endpoint {
    /// Write-only, `$GPS,<lat>,<lon>,<alt>*`.
    Waypoint,
    /// Notify-only status stream.
    Status,
    /// Write-only command tokens.
    CalibrationCommand,
    /// Notify-only calibration stream and command acknowledgements.
    CalibrationData,
}

/// Errors reported by a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TransportError {
    /// The notification exceeds what the link can carry.
    #[error("payload too large for the link")]
    PayloadTooLarge,
    /// No peer is connected.
    #[error("no peer connected")]
    Disconnected,
    /// Any other failure of the underlying stack.
    #[error("transport failure")]
    Other,
}

/// A notify-capable link to the companion application.
///
/// `notify` returns [`nb::Error::WouldBlock`] while the stack's transmit queue
/// is full; the channel retries a bounded number of times.
pub trait Transport {
    /// Sends one notification on `endpoint`.
    fn notify(&mut self, endpoint: Endpoint, payload: &[u8]) -> nb::Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn notify(&mut self, endpoint: Endpoint, payload: &[u8]) -> nb::Result<(), TransportError> {
        T::notify(self, endpoint, payload)
    }
}

/// Errors from a single outbound send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ChannelError {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The record could not be built or framed.
    #[error(transparent)]
    Framing(#[from] TelemetryError),
}

/// Result of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum PublishOutcome {
    /// Sent as one notification.
    Single,
    /// Sent as this many fragments.
    Fragmented(u8),
    /// The essential record was sent in place of the full one.
    Essential,
    /// Identical to the previous record and within the suppression interval.
    Duplicate,
    /// Nothing to do: disconnected, or the stream is not active.
    Inactive,
    /// The send failed; the record will be retried next cycle.
    Failed(ChannelError),
}

/// A decoded inbound write.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Inbound {
    /// A new target.
    Waypoint(WaypointRequest),
    /// A recognized command token.
    Command(Command),
}

/// Status publisher and inbound decoder over a [`Transport`].
#[derive(Debug)]
pub struct TelemetryChannel<T, D> {
    transport: T,
    delay: D,
    config: TelemetryConfig,
    mtu: MtuEstimator,
    connected: bool,
    calibrating: bool,
    last_record: Option<StatusRecord>,
    last_sent_ms: u64,
}

impl<T: Transport, D: DelayNs> TelemetryChannel<T, D> {
    /// Creates a disconnected channel.
    pub fn new(transport: T, delay: D, config: TelemetryConfig) -> Self {
        Self {
            transport,
            delay,
            config,
            mtu: MtuEstimator::new(config.initial_mtu, config.max_mtu),
            connected: false,
            calibrating: false,
            last_record: None,
            last_sent_ms: 0,
        }
    }

    /// Whether a peer is connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether calibration mode is active.
    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// The payload size estimator.
    pub fn mtu(&self) -> &MtuEstimator {
        &self.mtu
    }

    /// Shared access to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exclusive access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Releases the transport and delay.
    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }

    /// A peer connected. Size learning starts over.
    pub fn on_connect(&mut self) {
        self.connected = true;
        self.mtu.reset();
        self.last_record = None;
    }

    /// The peer went away. Calibration mode ends with the connection.
    pub fn on_disconnect(&mut self) {
        self.connected = false;
        self.calibrating = false;
        self.mtu.reset();
        self.last_record = None;
    }

    /// The transport negotiated an ATT MTU of `att_mtu` bytes.
    pub fn on_mtu_negotiated(&mut self, att_mtu: u16) {
        self.mtu.set_negotiated(att_mtu);
    }

    /// Decodes a write on `endpoint`.
    ///
    /// Malformed or oversized writes, and writes to notify-only endpoints,
    /// are dropped. Calibration commands also toggle calibration mode.
    pub fn handle_write(&mut self, endpoint: Endpoint, bytes: &[u8]) -> Option<Inbound> {
        let decoded: Result<Inbound, ParseError> = match endpoint {
            Endpoint::Waypoint => parse_waypoint(bytes).map(Inbound::Waypoint),
            Endpoint::CalibrationCommand => Command::parse(bytes).map(Inbound::Command),
            Endpoint::Status | Endpoint::CalibrationData => {
                debug!("ignoring write to notify-only endpoint {:?}", endpoint);
                return None;
            }
        };

        match decoded {
            Ok(Inbound::Command(Command::StartCalibration)) => self.calibrating = true,
            Ok(Inbound::Command(Command::StopCalibration | Command::SaveCalibration)) => {
                self.calibrating = false
            }
            Ok(_) => {}
            Err(e) => {
                debug!("discarding write on {:?}: {}", endpoint, e);
                return None;
            }
        }
        decoded.ok()
    }

    /// Publishes the status record for this cycle.
    pub fn publish(
        &mut self,
        snapshot: &NavigationSnapshot,
        sensors: &SensorStatus,
        now_ms: u64,
    ) -> PublishOutcome {
        if !self.connected {
            return PublishOutcome::Inactive;
        }

        let (record, mut degraded) = match checked_status_record(snapshot, sensors) {
            Ok(record) => (record, false),
            Err(e) => {
                warn!("status record rejected ({}), sending essential status", e);
                (essential_record(sensors), true)
            }
        };

        let unchanged = self.last_record.as_ref() == Some(&record);
        if unchanged && now_ms.saturating_sub(self.last_sent_ms) < self.config.duplicate_interval_ms
        {
            return PublishOutcome::Duplicate;
        }

        let (record, result) = match self.send(Endpoint::Status, &record) {
            Err(ChannelError::Framing(e)) if !degraded => {
                warn!("status record not framed ({}), sending essential status", e);
                degraded = true;
                let essential = essential_record(sensors);
                let result = self.send(Endpoint::Status, &essential);
                (essential, result)
            }
            result => (record, result),
        };

        match result {
            Ok(frames) => {
                self.last_record = Some(record);
                self.last_sent_ms = now_ms;
                match (degraded, frames) {
                    (true, _) => PublishOutcome::Essential,
                    (false, 1) => PublishOutcome::Single,
                    (false, n) => PublishOutcome::Fragmented(n),
                }
            }
            Err(e) => {
                warn!("status publish failed: {}", e);
                PublishOutcome::Failed(e)
            }
        }
    }

    /// Streams one calibration sample. Only active in calibration mode.
    pub fn publish_calibration(&mut self, sample: &CalibrationSample) -> PublishOutcome {
        if !self.connected || !self.calibrating {
            return PublishOutcome::Inactive;
        }
        let result = calibration_record(sample)
            .map_err(ChannelError::from)
            .and_then(|record| self.send(Endpoint::CalibrationData, &record));
        match result {
            Ok(1) => PublishOutcome::Single,
            Ok(n) => PublishOutcome::Fragmented(n),
            Err(e) => PublishOutcome::Failed(e),
        }
    }

    /// Acknowledges an accepted command on the calibration data endpoint.
    pub fn send_ack(&mut self, command: Command) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(TransportError::Disconnected.into());
        }
        let record = ack_record(command);
        self.send(Endpoint::CalibrationData, &record).map(|_| ())
    }

    /// Sends `payload` on `endpoint` whole or fragmented. Returns the frame count.
    fn send(&mut self, endpoint: Endpoint, payload: &str) -> Result<u8, ChannelError> {
        let payload = payload.as_bytes();
        let len = payload.len();

        let fits = len <= usize::from(self.mtu.effective());
        if fits || (self.config.probe_mtu && self.mtu.should_probe(len)) {
            match self.notify(endpoint, payload) {
                Ok(()) => {
                    self.mtu.record_success(len);
                    return Ok(1);
                }
                Err(TransportError::PayloadTooLarge) => self.mtu.record_rejection(len),
                Err(e) => return Err(e.into()),
            }
        }

        let frames = fragment(payload, self.mtu.effective())?;
        let total = frames.total();
        trace!("sending {} bytes as {} fragments", len, total);
        for frame in frames {
            self.notify(endpoint, &frame.to_vec())?;
            self.delay.delay_ms(self.config.inter_fragment_delay_ms);
        }
        Ok(total)
    }

    fn notify(&mut self, endpoint: Endpoint, payload: &[u8]) -> Result<(), TransportError> {
        let mut waits = 0;
        loop {
            match self.transport.notify(endpoint, payload) {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) if waits < self.config.busy_retries => {
                    waits += 1;
                    self.delay.delay_ms(1);
                }
                Err(nb::Error::WouldBlock) => {
                    warn!("transport busy on {:?} after {} retries", endpoint, waits);
                    return Err(TransportError::Other);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #[allow(unused_extern_crates)]
    extern crate std;

    use super::*;
    use crate::model::{HeadingSample, NavigationState, Position, Waypoint};
    use crate::telemetry::frame::Reassembler;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::vec;
    use std::vec::Vec;

    #[derive(Debug, Default)]
    struct FakeTransport {
        sent: Vec<(Endpoint, Vec<u8>)>,
        /// Notifications larger than this are refused.
        limit: Option<usize>,
        /// Calls answered with `WouldBlock` before accepting.
        busy: usize,
        fail: Option<TransportError>,
    }

    impl Transport for FakeTransport {
        fn notify(&mut self, endpoint: Endpoint, payload: &[u8]) -> nb::Result<(), TransportError> {
            if self.busy > 0 {
                self.busy -= 1;
                return Err(nb::Error::WouldBlock);
            }
            if let Some(e) = self.fail {
                return Err(nb::Error::Other(e));
            }
            if self.limit.is_some_and(|limit| payload.len() > limit) {
                return Err(nb::Error::Other(TransportError::PayloadTooLarge));
            }
            self.sent.push((endpoint, payload.to_vec()));
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct CountingDelay {
        total_ms: u32,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, _ns: u32) {}

        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms;
        }
    }

    type TestChannel = TelemetryChannel<FakeTransport, NoopDelay>;

    fn connected(transport: FakeTransport, config: TelemetryConfig) -> TestChannel {
        let mut channel = TelemetryChannel::new(transport, NoopDelay, config);
        channel.on_connect();
        channel
    }

    /// Connected with a full-size negotiated MTU.
    fn channel(transport: FakeTransport) -> TestChannel {
        let mut channel = connected(transport, TelemetryConfig::default());
        channel.on_mtu_negotiated(515);
        channel
    }

    fn probing() -> TelemetryConfig {
        TelemetryConfig {
            probe_mtu: true,
            ..TelemetryConfig::default()
        }
    }

    fn reassemble(sent: &[(Endpoint, Vec<u8>)]) -> Option<Vec<u8>> {
        let mut rx = Reassembler::<512>::new();
        let mut complete = None;
        for (_, frame) in sent {
            if let Some(record) = rx.push(frame).unwrap() {
                complete = Some(record.to_vec());
            }
        }
        complete
    }

    fn sensors() -> SensorStatus {
        SensorStatus {
            position: Position::fix(-32.940931, 151.718029),
            heading: HeadingSample(90.0),
        }
    }

    fn snapshot() -> NavigationSnapshot {
        NavigationSnapshot {
            distance_m: 120.0,
            bearing_deg: 45.0,
            relative_angle_deg: -45.0,
            state: NavigationState::Navigating,
            reason_if_blocked: None,
            target: Some(Waypoint {
                latitude: -32.94,
                longitude: 151.72,
                altitude_m: 0.0,
                set_at_ms: 0,
            }),
        }
    }

    fn status_len() -> usize {
        checked_status_record(&snapshot(), &sensors()).unwrap().len()
    }

    #[test]
    fn test_publish_requires_connection() {
        let mut channel = TelemetryChannel::new(
            FakeTransport::default(),
            NoopDelay,
            TelemetryConfig::default(),
        );
        assert_eq!(
            channel.publish(&snapshot(), &sensors(), 0),
            PublishOutcome::Inactive
        );
        assert!(channel.transport().sent.is_empty());
    }

    #[test]
    fn test_record_over_initial_mtu_is_fragmented() {
        let mut channel = connected(FakeTransport::default(), TelemetryConfig::default());
        let len = status_len();
        assert!(len > 20);

        assert_eq!(
            channel.publish(&snapshot(), &sensors(), 0),
            PublishOutcome::Fragmented(len.div_ceil(20 - 4) as u8)
        );
        assert_eq!(channel.mtu().effective(), 20);
        assert!(channel.transport().sent.iter().all(|(_, f)| f.len() <= 20));

        let record = checked_status_record(&snapshot(), &sensors()).unwrap();
        assert_eq!(
            reassemble(&channel.transport().sent).as_deref(),
            Some(record.as_bytes())
        );
    }

    #[test]
    fn test_probing_learns_mtu() {
        let mut channel = connected(FakeTransport::default(), probing());
        assert_eq!(
            channel.publish(&snapshot(), &sensors(), 0),
            PublishOutcome::Single
        );
        assert_eq!(usize::from(channel.mtu().effective()), status_len());
        let (endpoint, payload) = &channel.transport().sent[0];
        assert_eq!(*endpoint, Endpoint::Status);
        assert_eq!(payload.len(), status_len());
    }

    #[test]
    fn test_rejected_probe_falls_back_to_fragments() {
        let mut channel = connected(
            FakeTransport {
                limit: Some(100),
                ..FakeTransport::default()
            },
            probing(),
        );
        let len = status_len();
        let expected = len.div_ceil(20 - 4) as u8;

        assert_eq!(
            channel.publish(&snapshot(), &sensors(), 0),
            PublishOutcome::Fragmented(expected)
        );
        assert_eq!(usize::from(channel.mtu().ceiling()), len - 1);

        for (endpoint, frame) in &channel.transport().sent {
            assert_eq!(*endpoint, Endpoint::Status);
            assert!(frame.len() <= 20);
        }
        let record = checked_status_record(&snapshot(), &sensors()).unwrap();
        assert_eq!(
            reassemble(&channel.transport().sent).as_deref(),
            Some(record.as_bytes())
        );
    }

    #[test]
    fn test_negotiated_mtu_fragments_without_probing() {
        let mut channel = channel(FakeTransport::default());
        channel.on_mtu_negotiated(103);
        let len = status_len();
        assert!(len > 100);
        assert_eq!(
            channel.publish(&snapshot(), &sensors(), 0),
            PublishOutcome::Fragmented(len.div_ceil(96) as u8)
        );
        assert!(channel.transport().sent.iter().all(|(_, f)| f.len() <= 100));
    }

    #[test]
    fn test_fragment_delay_applies_per_frame() {
        let mut channel = TelemetryChannel::new(
            FakeTransport::default(),
            CountingDelay::default(),
            TelemetryConfig::default(),
        );
        channel.on_connect();
        channel.on_mtu_negotiated(103);

        let frames = match channel.publish(&snapshot(), &sensors(), 0) {
            PublishOutcome::Fragmented(n) => n,
            other => panic!("unexpected outcome {:?}", other),
        };
        let (_, delay) = channel.release();
        assert_eq!(delay.total_ms, u32::from(frames) * 20);
    }

    #[test]
    fn test_duplicate_suppression() {
        let mut channel = channel(FakeTransport::default());
        assert_eq!(channel.publish(&snapshot(), &sensors(), 1_000), PublishOutcome::Single);
        assert_eq!(channel.publish(&snapshot(), &sensors(), 1_200), PublishOutcome::Duplicate);
        assert_eq!(channel.publish(&snapshot(), &sensors(), 1_499), PublishOutcome::Duplicate);
        assert_eq!(channel.publish(&snapshot(), &sensors(), 1_500), PublishOutcome::Single);

        // a changed record goes out immediately
        let mut changed = snapshot();
        changed.distance_m = 119.0;
        assert_eq!(channel.publish(&changed, &sensors(), 1_510), PublishOutcome::Single);
        assert_eq!(channel.transport().sent.len(), 3);
    }

    #[test]
    fn test_would_block_is_retried() {
        let mut channel = channel(FakeTransport {
            busy: 3,
            ..FakeTransport::default()
        });
        assert_eq!(channel.publish(&snapshot(), &sensors(), 0), PublishOutcome::Single);
        assert_eq!(channel.transport().sent.len(), 1);
    }

    #[test]
    fn test_busy_transport_gives_up() {
        let mut channel = TelemetryChannel::new(
            FakeTransport {
                busy: usize::MAX,
                ..FakeTransport::default()
            },
            CountingDelay::default(),
            TelemetryConfig::default(),
        );
        channel.on_connect();
        channel.on_mtu_negotiated(515);

        assert_eq!(
            channel.publish(&snapshot(), &sensors(), 0),
            PublishOutcome::Failed(ChannelError::Transport(TransportError::Other))
        );
        assert!(channel.transport().sent.is_empty());

        channel.transport_mut().busy = 0;
        assert_eq!(channel.publish(&snapshot(), &sensors(), 10), PublishOutcome::Single);
        let (_, delay) = channel.release();
        assert_eq!(delay.total_ms, 50);
    }

    #[test]
    fn test_transport_failure_is_retried_next_cycle() {
        let mut channel = channel(FakeTransport {
            fail: Some(TransportError::Other),
            ..FakeTransport::default()
        });
        assert_eq!(
            channel.publish(&snapshot(), &sensors(), 0),
            PublishOutcome::Failed(ChannelError::Transport(TransportError::Other))
        );

        channel.transport_mut().fail = None;
        assert_eq!(channel.publish(&snapshot(), &sensors(), 10), PublishOutcome::Single);
    }

    #[test]
    fn test_unframeable_record_degrades_to_essential() {
        let mut status = sensors();
        status.position.altitude_m = 9_999_999.0;
        let mut far = snapshot();
        far.distance_m = 9_999_999.0;
        assert!(checked_status_record(&far, &status).unwrap().len() > 255);

        // one payload byte per fragment: the full record needs more than 255
        let mut channel = channel(FakeTransport {
            limit: Some(5),
            ..FakeTransport::default()
        });
        channel.mtu = MtuEstimator::new(5, 512);

        assert_eq!(channel.publish(&far, &status, 0), PublishOutcome::Essential);
        let essential = essential_record(&status);
        assert_eq!(
            reassemble(&channel.transport().sent).as_deref(),
            Some(essential.as_bytes())
        );
    }

    #[test]
    fn test_inbound_waypoint_and_commands() {
        let mut channel = channel(FakeTransport::default());
        assert_eq!(
            channel.handle_write(Endpoint::Waypoint, b"$GPS,-32.940931,151.718029,45.2*"),
            Some(Inbound::Waypoint(WaypointRequest {
                latitude: -32.940931,
                longitude: 151.718029,
                altitude_m: 45.2,
            }))
        );
        assert_eq!(channel.handle_write(Endpoint::Waypoint, b"$GPS,1,2*"), None);
        assert_eq!(
            channel.handle_write(Endpoint::CalibrationCommand, b"NAV_ENABLE"),
            Some(Inbound::Command(Command::NavEnable))
        );
        assert_eq!(channel.handle_write(Endpoint::CalibrationCommand, b"FOO"), None);
        assert_eq!(channel.handle_write(Endpoint::Status, b"NAV_ENABLE"), None);
    }

    #[test]
    fn test_calibration_stream_gated_by_mode() {
        let mut channel = channel(FakeTransport::default());
        let sample = CalibrationSample::default();
        assert_eq!(channel.publish_calibration(&sample), PublishOutcome::Inactive);

        assert!(channel.handle_write(Endpoint::CalibrationCommand, b"START_CAL").is_some());
        assert!(channel.is_calibrating());
        assert_eq!(channel.publish_calibration(&sample), PublishOutcome::Single);
        assert_eq!(channel.transport().sent[0].0, Endpoint::CalibrationData);

        assert!(channel.handle_write(Endpoint::CalibrationCommand, b"STOP_CAL").is_some());
        assert_eq!(channel.publish_calibration(&sample), PublishOutcome::Inactive);

        let _ = channel.handle_write(Endpoint::CalibrationCommand, b"START_CAL");
        assert_eq!(
            channel.handle_write(Endpoint::CalibrationCommand, b"SAVE_CAL:1,2,3"),
            Some(Inbound::Command(Command::SaveCalibration))
        );
        assert!(!channel.is_calibrating());

        let _ = channel.handle_write(Endpoint::CalibrationCommand, b"START_CAL");
        channel.on_disconnect();
        assert!(!channel.is_calibrating());
    }

    #[test]
    fn test_ack_on_calibration_endpoint() {
        let mut channel = channel(FakeTransport::default());
        channel.send_ack(Command::NavDisable).unwrap();
        assert_eq!(
            channel.transport().sent,
            vec![(Endpoint::CalibrationData, b"{\"ack\":\"NAV_DISABLE\"}".to_vec())]
        );

        channel.on_disconnect();
        assert_eq!(
            channel.send_ack(Command::NavEnable),
            Err(ChannelError::Transport(TransportError::Disconnected))
        );
    }
}
