//! Fragmentation of oversized records.
//!
//! A record larger than the effective MTU is split into at most 255 frames,
//! each a [`FrameHeader`] followed by a contiguous chunk of `mtu - 4` payload
//! bytes (the last chunk may be shorter). Frames carry no checksum and are
//! never acknowledged; the receiver detects a complete series from the header.
//!
//! [`Reassembler`] is the receiving side. The helm never receives fragments
//! itself; it exists for host tooling and tests.

use heapless::Vec;

use super::TelemetryError;
use crate::consts::{FRAGMENT_HEADER_LEN, FRAME_CAPACITY, MAX_FRAGMENTS};

/// The 4-byte header prepended to every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct FrameHeader {
    /// Zero-based position of the frame in its series.
    pub index: u8,
    /// Number of frames in the series.
    pub total: u8,
    /// Length of the complete record, in bytes.
    pub total_len: u16,
}

impl FrameHeader {
    /// Encodes the header as `[index, total, len_hi, len_lo]`.
    pub fn to_bytes(self) -> [u8; FRAGMENT_HEADER_LEN] {
        let [hi, lo] = self.total_len.to_be_bytes();
        [self.index, self.total, hi, lo]
    }

    /// Splits a received frame into its header and chunk.
    pub fn parse(frame: &[u8]) -> Option<(FrameHeader, &[u8])> {
        if frame.len() < FRAGMENT_HEADER_LEN {
            return None;
        }
        let (header, chunk) = frame.split_at(FRAGMENT_HEADER_LEN);
        Some((
            FrameHeader {
                index: header[0],
                total: header[1],
                total_len: u16::from_be_bytes([header[2], header[3]]),
            },
            chunk,
        ))
    }
}

/// One outbound frame: a header and a borrowed chunk of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    /// The frame header.
    pub header: FrameHeader,
    /// This frame's slice of the record.
    pub chunk: &'a [u8],
}

impl Fragment<'_> {
    /// Header and chunk as one contiguous buffer, ready for the transport.
    pub fn to_vec(&self) -> Vec<u8, FRAME_CAPACITY> {
        let mut out = Vec::new();
        // capacity is checked when the fragments are planned
        let _ = out.extend_from_slice(&self.header.to_bytes());
        let _ = out.extend_from_slice(self.chunk);
        out
    }
}

/// Iterator over the frames of one record, in sequence order.
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    payload: &'a [u8],
    chunk_len: usize,
    total: u8,
    next: u8,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let start = usize::from(self.next) * self.chunk_len;
        let end = (start + self.chunk_len).min(self.payload.len());
        let fragment = Fragment {
            header: FrameHeader {
                index: self.next,
                total: self.total,
                total_len: self.payload.len() as u16,
            },
            chunk: &self.payload[start..end],
        };
        self.next += 1;
        Some(fragment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.total - self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Fragments<'_> {}

impl Fragments<'_> {
    /// Number of frames in the series.
    pub fn total(&self) -> u8 {
        self.total
    }
}

/// Plans the frames needed to send `payload` with an effective MTU of `mtu` bytes.
///
/// Fails when the MTU leaves no room for payload after the header, or when
/// the record would need more than 255 frames.
///
/// ```
/// use helm::telemetry::fragment;
///
/// let record = [b'x'; 300];
/// let frames = fragment(&record, 182).unwrap();
/// assert_eq!(frames.len(), 2);
/// ```
pub fn fragment(payload: &[u8], mtu: u16) -> Result<Fragments<'_>, TelemetryError> {
    let frame_len = usize::from(mtu).min(FRAME_CAPACITY);
    if frame_len <= FRAGMENT_HEADER_LEN {
        return Err(TelemetryError::MtuTooSmall(mtu));
    }
    if payload.len() > usize::from(u16::MAX) {
        return Err(TelemetryError::TooManyFragments);
    }

    let chunk_len = frame_len - FRAGMENT_HEADER_LEN;
    let total = payload.len().div_ceil(chunk_len).max(1);
    if total > MAX_FRAGMENTS {
        return Err(TelemetryError::TooManyFragments);
    }

    Ok(Fragments {
        payload,
        chunk_len,
        total: total as u8,
        next: 0,
    })
}

/// Rebuilds records from frames received in order.
///
/// A frame with index 0 always starts a new series, discarding any partial
/// one. A frame that does not continue the current series is rejected and
/// the partial record dropped. Discarding a series that never completes is
/// left to the caller, via [`reset`](Reassembler::reset).
#[derive(Debug, Default)]
pub struct Reassembler<const N: usize> {
    buffer: Vec<u8, N>,
    current: Option<FrameHeader>,
}

impl<const N: usize> Reassembler<N> {
    /// An empty reassembler.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            current: None,
        }
    }

    /// Whether a partial record is pending.
    pub fn in_progress(&self) -> bool {
        self.current.is_some()
    }

    /// Drops any partial record.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.current = None;
    }

    /// Feeds one frame. Returns the complete record once its last frame arrives.
    pub fn push(&mut self, frame: &[u8]) -> Result<Option<&[u8]>, TelemetryError> {
        let (header, chunk) = FrameHeader::parse(frame).ok_or(TelemetryError::BadFragment)?;
        if header.total == 0 || header.index >= header.total {
            self.reset();
            return Err(TelemetryError::BadFragment);
        }

        if header.index == 0 {
            self.reset();
        } else {
            match self.current {
                Some(current)
                    if current.index + 1 == header.index
                        && current.total == header.total
                        && current.total_len == header.total_len => {}
                _ => {
                    self.reset();
                    return Err(TelemetryError::OutOfSequence);
                }
            }
        }

        let fits = self.buffer.len() + chunk.len() <= usize::from(header.total_len);
        if !fits || self.buffer.extend_from_slice(chunk).is_err() {
            self.reset();
            return Err(TelemetryError::BadFragment);
        }
        self.current = Some(header);

        if header.index + 1 < header.total {
            return Ok(None);
        }

        self.current = None;
        if self.buffer.len() != usize::from(header.total_len) {
            self.buffer.clear();
            return Err(TelemetryError::BadFragment);
        }
        Ok(Some(&self.buffer))
    }
}
