//! Capture container parsing
//!
//! Reads raw timestamped frames out of the two supported container formats:
//!
//! - **Classic**: a 24-byte global header whose magic is 0xA1B2C3D4 (or the
//!   byte-swapped 0xD4C3B2A1), then 16-byte per-frame headers of seconds,
//!   microseconds, captured length and original length, all little-endian.
//! - **Block**: self-describing blocks. Any non-classic magic routes here.
//!   Enhanced packet blocks (type 6) carry interface id, a high/low split
//!   64-bit microsecond timestamp, captured length and original length; every
//!   other block type is skipped whole using its declared total length.
//!
//! The reader is deliberately forgiving: real capture archives routinely
//! contain runt frames (captured length below the 14-byte link header), which
//! are skipped, and occasionally end mid-header, which halts the pass while
//! keeping everything read so far. A declared length over [`MAX_FRAME_LEN`]
//! means the stream itself is corrupt and also halts with salvage. The caller
//! consumes tagged [`FrameOutcome`]s and applies policy; nothing here panics
//! or allocates per frame.

use crate::types::{ContainerFormat, Timestamp};
use std::sync::atomic::{AtomicBool, Ordering};

/// Safety bound on a frame's declared captured length
pub const MAX_FRAME_LEN: u32 = 50_000;

/// Minimum viable captured length: one link-layer (Ethernet) header
pub const MIN_FRAME_LEN: u32 = 14;

/// Classic container global header size
const CLASSIC_GLOBAL_HEADER_LEN: usize = 24;

/// Classic container per-frame header size
const CLASSIC_FRAME_HEADER_LEN: usize = 16;

/// Block prologue: type + total length
const BLOCK_PROLOGUE_LEN: usize = 8;

/// Enhanced packet block header size including the prologue
const PACKET_BLOCK_HEADER_LEN: usize = 28;

/// Block type carrying a captured frame
const PACKET_BLOCK_TYPE: u32 = 6;

/// One raw frame as stored in the capture
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    /// Ordinal of this frame among emitted frames
    pub number: usize,
    /// Frame timestamp in the container's native representation
    pub timestamp: Timestamp,
    /// Captured bytes: link/IP/UDP headers followed by the protocol payload
    pub payload: &'a [u8],
}

/// Why a frame was skipped without ending the pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Captured length below the minimum link-layer header size
    RuntFrame { declared: u32 },
    /// A block type that does not carry a frame (section header, interface
    /// description, ...)
    ForeignBlock { block_type: u32 },
}

/// Why the pass stopped before the end of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The cooperative abort flag was raised
    Aborted,
    /// Fewer bytes remain than a required header needs
    Truncated { remaining: usize },
    /// A declared captured length above the safety bound
    OversizeFrame { declared: u32 },
    /// A block whose declared total length cannot be advanced over
    CorruptBlock { total_length: u32 },
    /// A fragment header declared a size smaller than itself
    BadFragment { declared: u16 },
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::Aborted => write!(f, "aborted by caller"),
            HaltReason::Truncated { remaining } => {
                write!(f, "stream cut short with {remaining} bytes remaining")
            }
            HaltReason::OversizeFrame { declared } => {
                write!(f, "enormous frame ({declared} bytes declared)")
            }
            HaltReason::CorruptBlock { total_length } => {
                write!(f, "unusable block total length {total_length}")
            }
            HaltReason::BadFragment { declared } => {
                write!(f, "fragment declared {declared} bytes, below its own header size")
            }
        }
    }
}

/// Outcome of advancing the reader by one frame
#[derive(Debug)]
pub enum FrameOutcome<'a> {
    /// A frame with a viable captured length
    Frame(RawFrame<'a>),
    /// Frame skipped, pass continues
    Skip(SkipReason),
    /// Pass over; everything already emitted stays valid
    Halt(HaltReason),
}

/// Restartable cursor over the frames of a capture held in memory
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
    format: ContainerFormat,
    frame_no: usize,
    done: bool,
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

impl<'a> FrameReader<'a> {
    /// Sniff the container format and position the cursor at the first frame
    pub fn new(data: &'a [u8]) -> Self {
        let format = if data.len() >= 4 {
            ContainerFormat::sniff(read_u32_le(data, 0))
        } else {
            ContainerFormat::Block
        };
        let pos = match format {
            ContainerFormat::Classic => CLASSIC_GLOBAL_HEADER_LEN.min(data.len()),
            ContainerFormat::Block => 0,
        };
        Self { data, pos, format, frame_no: 0, done: false }
    }

    /// The sniffed container format
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Advance to the next frame
    ///
    /// Returns `None` at a clean end of stream and after any halt. The abort
    /// flag is checked here, between frames, so a frame already being decoded
    /// by the caller always completes.
    pub fn next_outcome(&mut self, abort: &AtomicBool) -> Option<FrameOutcome<'a>> {
        if self.done || self.pos >= self.data.len() {
            return None;
        }
        if abort.load(Ordering::Relaxed) {
            self.done = true;
            return Some(FrameOutcome::Halt(HaltReason::Aborted));
        }
        match self.format {
            ContainerFormat::Classic => Some(self.next_classic()),
            ContainerFormat::Block => Some(self.next_block()),
        }
    }

    fn halt(&mut self, reason: HaltReason) -> FrameOutcome<'a> {
        self.done = true;
        FrameOutcome::Halt(reason)
    }

    fn next_classic(&mut self) -> FrameOutcome<'a> {
        let remaining = self.data.len() - self.pos;
        if remaining < CLASSIC_FRAME_HEADER_LEN {
            return self.halt(HaltReason::Truncated { remaining });
        }

        let sec = read_u32_le(self.data, self.pos);
        let usec = read_u32_le(self.data, self.pos + 4);
        let incl_len = read_u32_le(self.data, self.pos + 8);
        self.pos += CLASSIC_FRAME_HEADER_LEN;

        if incl_len > MAX_FRAME_LEN {
            return self.halt(HaltReason::OversizeFrame { declared: incl_len });
        }
        if incl_len < MIN_FRAME_LEN {
            self.pos = (self.pos + incl_len as usize).min(self.data.len());
            return FrameOutcome::Skip(SkipReason::RuntFrame { declared: incl_len });
        }
        if self.data.len() - self.pos < incl_len as usize {
            let remaining = self.data.len() - self.pos;
            return self.halt(HaltReason::Truncated { remaining });
        }

        let payload = &self.data[self.pos..self.pos + incl_len as usize];
        self.pos += incl_len as usize;
        let number = self.frame_no;
        self.frame_no += 1;
        FrameOutcome::Frame(RawFrame {
            number,
            timestamp: Timestamp::Classic { sec, usec },
            payload,
        })
    }

    fn next_block(&mut self) -> FrameOutcome<'a> {
        let block_start = self.pos;
        let remaining = self.data.len() - block_start;
        if remaining < BLOCK_PROLOGUE_LEN {
            return self.halt(HaltReason::Truncated { remaining });
        }

        let block_type = read_u32_le(self.data, block_start);
        let total_length = read_u32_le(self.data, block_start + 4);
        if (total_length as usize) < BLOCK_PROLOGUE_LEN {
            return self.halt(HaltReason::CorruptBlock { total_length });
        }
        let block_end = block_start + total_length as usize;
        if block_end > self.data.len() {
            return self.halt(HaltReason::Truncated { remaining });
        }

        if block_type != PACKET_BLOCK_TYPE {
            self.pos = block_end;
            return FrameOutcome::Skip(SkipReason::ForeignBlock { block_type });
        }
        if remaining < PACKET_BLOCK_HEADER_LEN {
            return self.halt(HaltReason::Truncated { remaining });
        }

        let high = read_u32_le(self.data, block_start + 12);
        let low = read_u32_le(self.data, block_start + 16);
        let captured_len = read_u32_le(self.data, block_start + 20);

        if captured_len > MAX_FRAME_LEN {
            return self.halt(HaltReason::OversizeFrame { declared: captured_len });
        }
        if captured_len < MIN_FRAME_LEN {
            self.pos = block_end;
            return FrameOutcome::Skip(SkipReason::RuntFrame { declared: captured_len });
        }
        let payload_start = block_start + PACKET_BLOCK_HEADER_LEN;
        if payload_start + captured_len as usize > block_end {
            return self.halt(HaltReason::CorruptBlock { total_length });
        }

        let payload = &self.data[payload_start..payload_start + captured_len as usize];
        self.pos = block_end;
        let number = self.frame_no;
        self.frame_no += 1;
        FrameOutcome::Frame(RawFrame {
            number,
            timestamp: Timestamp::Block { high, low },
            payload,
        })
    }
}
