//! Capture ingestion loop
//!
//! Drives the full decode pipeline: container frames through header stripping
//! and protocol parsing into assembled [`CaptureRecord`]s. Frame-level
//! outcomes are tagged (frame / skip / halt) and handled by the policy match
//! here rather than by exceptions bubbling out of the parsers; a halt keeps
//! every record emitted before it.

use crate::capture::container::{FrameOutcome, FrameReader, HaltReason, RawFrame};
use crate::capture::fragment::{read_fragment, FragmentError};
use crate::capture::net::decode_frame;
use crate::capture::proto::{read_opcode, read_optional_headers, TransportHeader};
use crate::capture::record::{CaptureRecord, OpenBlob};
use crate::error::{ReplayError, Result};
use crate::types::ContainerFormat;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tracing::{debug, info, warn};

/// How fragments are grouped back into records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyMode {
    /// Every frame carries a complete fragment set; frames failing the
    /// completeness check are discarded
    PerFrame,
    /// Blobs may span frames; an open table accumulates partial blobs and
    /// each record is emitted the moment its set completes
    Streaming,
}

/// Result of one ingestion pass
#[derive(Debug)]
pub struct LoadOutcome {
    /// Assembled records, in ingestion order
    pub records: Vec<CaptureRecord>,
    /// Container format the capture was stored in
    pub format: ContainerFormat,
    /// Why the pass stopped early, if it did; records remain valid
    pub halted: Option<HaltReason>,
    /// Frames processed, skips included
    pub frames: usize,
}

impl LoadOutcome {
    /// Fail outright instead of salvaging when the pass halted early
    ///
    /// For inputs that must decode completely, like the canonical login
    /// template.
    pub fn strict(self) -> Result<Vec<CaptureRecord>> {
        match self.halted {
            None => Ok(self.records),
            Some(HaltReason::Truncated { remaining }) => Err(ReplayError::TruncatedStream {
                frame: self.frames,
                remaining,
            }),
            Some(reason) => Err(ReplayError::CorruptCapture {
                frame: self.frames,
                reason: reason.to_string(),
            }),
        }
    }
}

/// Ingest a capture held in memory
///
/// `abort` is checked between frames; raising it ends the pass with
/// [`HaltReason::Aborted`] and the records emitted so far.
pub fn load_capture(data: &[u8], mode: ReassemblyMode, abort: &AtomicBool) -> LoadOutcome {
    let mut reader = FrameReader::new(data);
    let format = reader.format();
    let mut records: Vec<CaptureRecord> = Vec::new();
    let mut open: HashMap<u64, OpenBlob> = HashMap::new();
    let mut halted = None;
    let mut frames = 0usize;
    let mut skipped = 0usize;

    while let Some(outcome) = reader.next_outcome(abort) {
        match outcome {
            FrameOutcome::Frame(frame) => {
                frames += 1;
                if let Some(reason) = ingest_frame(&frame, mode, &mut open, &mut records) {
                    warn!(frame = frame.number, %reason, "ingestion halted");
                    halted = Some(reason);
                    break;
                }
            }
            FrameOutcome::Skip(reason) => {
                skipped += 1;
                debug!(?reason, "frame skipped");
            }
            FrameOutcome::Halt(reason) => {
                warn!(%reason, "ingestion halted");
                halted = Some(reason);
                break;
            }
        }
    }

    if !open.is_empty() {
        debug!(blobs = open.len(), "dropping blobs that never completed");
    }
    info!(
        frames,
        skipped,
        records = records.len(),
        halted = halted.is_some(),
        "capture ingested"
    );

    LoadOutcome { records, format, halted, frames: frames + skipped }
}

/// Ingest a capture from disk
pub fn load_capture_file<P: AsRef<Path>>(
    path: P,
    mode: ReassemblyMode,
    abort: &AtomicBool,
) -> Result<LoadOutcome> {
    let data = std::fs::read(path.as_ref())?;
    info!(path = %path.as_ref().display(), bytes = data.len(), "loading capture");
    Ok(load_capture(&data, mode, abort))
}

/// Decode one frame into the record stream; `Some` halts the pass
fn ingest_frame(
    frame: &RawFrame<'_>,
    mode: ReassemblyMode,
    open: &mut HashMap<u64, OpenBlob>,
    records: &mut Vec<CaptureRecord>,
) -> Option<HaltReason> {
    let Some(datagram) = decode_frame(frame.payload) else {
        return None; // foreign traffic
    };

    let mut cur = Cursor::new(datagram.payload);
    let Ok(transport) = TransportHeader::read(&mut cur) else {
        debug!(frame = frame.number, "datagram too short for transport header");
        return None;
    };
    let headers = match read_optional_headers(transport.flags, &mut cur) {
        Ok(headers) => headers,
        Err(e) => {
            debug!(frame = frame.number, error = %e, "optional headers malformed");
            return None;
        }
    };

    if !transport.has_fragments() {
        // Bare transport traffic (acks, handshakes, time sync) carries no
        // game message and is only interesting in per-frame decoding.
        if mode == ReassemblyMode::PerFrame {
            let data = datagram.payload[cur.position() as usize..].to_vec();
            if data.len() < 4 {
                return None;
            }
            let mut opcode_cur = Cursor::new(data.as_slice());
            let Ok(opcode) = read_opcode(&mut opcode_cur) else {
                return None;
            };
            records.push(CaptureRecord {
                index: records.len(),
                direction: datagram.direction,
                timestamp: frame.timestamp,
                data,
                opcodes: vec![opcode],
                headers,
                notes: None,
                queue_id: 0,
                fragment_count: 0,
            });
        }
        return None;
    }

    match mode {
        ReassemblyMode::PerFrame => {
            let mut blob = OpenBlob::default();
            while (cur.position() as usize) < datagram.payload.len() {
                match read_fragment(&mut cur) {
                    Ok(fragment) => {
                        blob.push(fragment, datagram.direction, frame.timestamp, &headers)
                    }
                    Err(e) => {
                        debug!(frame = frame.number, ?e, "frame discarded mid-fragment");
                        return None;
                    }
                }
            }
            if let Some(record) = finish_blob(&mut blob, records.len()) {
                records.push(record);
            } else {
                debug!(frame = frame.number, "incomplete fragment set, frame discarded");
            }
            None
        }
        ReassemblyMode::Streaming => {
            while (cur.position() as usize) < datagram.payload.len() {
                let fragment = match read_fragment(&mut cur) {
                    Ok(fragment) => fragment,
                    Err(FragmentError::BadSize { declared }) => {
                        return Some(HaltReason::BadFragment { declared });
                    }
                    Err(FragmentError::Truncated) => {
                        debug!(frame = frame.number, "fragment stream cut short");
                        return None;
                    }
                };
                let blob_id = fragment.header.blob_id;
                let blob = open.entry(blob_id).or_default();
                blob.push(fragment, datagram.direction, frame.timestamp, &headers);
                if let Some(record) = finish_blob(blob, records.len()) {
                    open.remove(&blob_id);
                    records.push(record);
                }
            }
            None
        }
    }
}

fn finish_blob(blob: &mut OpenBlob, index: usize) -> Option<CaptureRecord> {
    let (data, direction, timestamp, queue_id, fragment_count) = blob.try_finish()?;
    let mut opcodes = Vec::new();
    let mut opcode_cur = Cursor::new(data.as_slice());
    if let Ok(opcode) = read_opcode(&mut opcode_cur) {
        opcodes.push(opcode);
    }
    Some(CaptureRecord {
        index,
        direction,
        timestamp,
        data,
        opcodes,
        headers: std::mem::take(&mut blob.headers),
        notes: None,
        queue_id,
        fragment_count,
    })
}
