//! Audible cues.
//!
//! The helm reports noteworthy events (fix gained or lost, app connected,
//! waypoint accepted, arrival) as [`Cue`]s. Playback is left to the firmware:
//! each cue maps to a fixed melody of [`Tone`]s that a buzzer driver plays in
//! order. A tone of 0 Hz is a rest.

use heapless::Deque;

use crate::consts::CUE_QUEUE_LEN;

/// One note of a melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Tone {
    /// Frequency in Hz. `0` is silence.
    pub freq_hz: u16,
    /// Duration in ms.
    pub duration_ms: u16,
}

impl Tone {
    const fn note(freq_hz: u16, duration_ms: u16) -> Self {
        Self {
            freq_hz,
            duration_ms,
        }
    }

    const fn rest(duration_ms: u16) -> Self {
        Self::note(0, duration_ms)
    }

    /// Whether this tone is silence.
    pub fn is_rest(&self) -> bool {
        self.freq_hz == 0
    }
}

const NAVIGATION_ENABLED: [Tone; 8] = [
    Tone::note(150, 200),
    Tone::rest(50),
    Tone::note(200, 200),
    Tone::rest(50),
    Tone::note(250, 400),
    Tone::rest(100),
    Tone::note(392, 150),
    Tone::note(523, 300),
];

const WAYPOINT_SET: [Tone; 7] = [
    Tone::note(800, 100),
    Tone::rest(100),
    Tone::note(800, 100),
    Tone::rest(50),
    Tone::note(440, 150),
    Tone::note(523, 200),
    Tone::note(659, 250),
];

const GPS_FIX_LOST: [Tone; 9] = [
    Tone::note(523, 300),
    Tone::rest(100),
    Tone::note(440, 300),
    Tone::rest(100),
    Tone::note(349, 300),
    Tone::rest(100),
    Tone::note(150, 800),
    Tone::rest(200),
    Tone::note(150, 400),
];

const GPS_FIXED: [Tone; 10] = [
    Tone::note(800, 80),
    Tone::rest(120),
    Tone::note(800, 80),
    Tone::rest(120),
    Tone::note(800, 80),
    // includes the pause before the arpeggio
    Tone::rest(220),
    Tone::note(262, 150),
    Tone::note(330, 150),
    Tone::note(392, 150),
    Tone::note(523, 300),
];

const APP_CONNECTED: [Tone; 8] = [
    Tone::note(392, 120),
    Tone::note(523, 120),
    Tone::rest(80),
    Tone::note(659, 120),
    Tone::note(392, 120),
    Tone::rest(80),
    Tone::note(523, 200),
    Tone::note(659, 300),
];

const APP_DISCONNECTED: [Tone; 7] = [
    Tone::note(330, 200),
    Tone::rest(50),
    Tone::note(262, 200),
    Tone::rest(100),
    Tone::note(200, 400),
    Tone::rest(100),
    Tone::note(150, 600),
];

const DESTINATION_REACHED: [Tone; 10] = [
    Tone::note(523, 150),
    Tone::note(587, 150),
    Tone::note(659, 150),
    Tone::rest(100),
    Tone::note(523, 150),
    Tone::note(587, 150),
    Tone::note(659, 150),
    Tone::rest(100),
    Tone::note(392, 200),
    Tone::note(523, 400),
];

/// An event worth announcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Cue {
    /// Navigation was switched on.
    NavigationEnabled,
    /// A new target was accepted.
    WaypointSet,
    /// The GPS lost its fix.
    GpsFixLost,
    /// The GPS acquired a fix.
    GpsFixed,
    /// The companion app connected.
    AppConnected,
    /// The companion app disconnected.
    AppDisconnected,
    /// The target was reached.
    DestinationReached,
}

impl Cue {
    /// The melody for this cue.
    pub fn melody(self) -> &'static [Tone] {
        match self {
            Cue::NavigationEnabled => &NAVIGATION_ENABLED,
            Cue::WaypointSet => &WAYPOINT_SET,
            Cue::GpsFixLost => &GPS_FIX_LOST,
            Cue::GpsFixed => &GPS_FIXED,
            Cue::AppConnected => &APP_CONNECTED,
            Cue::AppDisconnected => &APP_DISCONNECTED,
            Cue::DestinationReached => &DESTINATION_REACHED,
        }
    }

    /// Total playback time, rests included, in ms.
    pub fn duration_ms(self) -> u32 {
        self.melody().iter().map(|t| u32::from(t.duration_ms)).sum()
    }
}

/// Bounded FIFO of pending cues. When full, the oldest cue is dropped.
#[derive(Debug, Default)]
pub struct CueQueue {
    pending: Deque<Cue, CUE_QUEUE_LEN>,
}

impl CueQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self {
            pending: Deque::new(),
        }
    }

    /// Queues `cue`, evicting the oldest pending cue if necessary.
    pub fn push(&mut self, cue: Cue) {
        if self.pending.is_full() {
            let _ = self.pending.pop_front();
        }
        let _ = self.pending.push_back(cue);
    }

    /// Takes the oldest pending cue.
    pub fn pop(&mut self) -> Option<Cue> {
        self.pending.pop_front()
    }

    /// Number of pending cues.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no cue is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_melody_durations() {
        assert_eq!(Cue::NavigationEnabled.duration_ms(), 1_450);
        assert_eq!(Cue::WaypointSet.duration_ms(), 950);
        assert_eq!(Cue::GpsFixLost.duration_ms(), 2_600);
        assert_eq!(Cue::GpsFixed.duration_ms(), 1_450);
        assert_eq!(Cue::AppConnected.duration_ms(), 1_140);
        assert_eq!(Cue::AppDisconnected.duration_ms(), 1_650);
        assert_eq!(Cue::DestinationReached.duration_ms(), 1_700);
    }

    #[test]
    fn test_melodies_end_on_a_note() {
        for cue in [Cue::NavigationEnabled, Cue::WaypointSet, Cue::DestinationReached] {
            let last = cue.melody().last().unwrap();
            assert!(!last.is_rest());
        }
        assert_eq!(Cue::GpsFixLost.melody()[6], Tone { freq_hz: 150, duration_ms: 800 });
    }

    #[test]
    fn test_queue_drops_oldest() {
        let mut queue = CueQueue::new();
        assert!(queue.is_empty());
        queue.push(Cue::AppConnected);
        for _ in 0..CUE_QUEUE_LEN {
            queue.push(Cue::WaypointSet);
        }
        assert_eq!(queue.len(), CUE_QUEUE_LEN);
        assert_eq!(queue.pop(), Some(Cue::WaypointSet));

        queue.push(Cue::DestinationReached);
        let mut last = None;
        while let Some(cue) = queue.pop() {
            last = Some(cue);
        }
        assert_eq!(last, Some(Cue::DestinationReached));
    }
}
