//! Real-time paced record emission
//!
//! The scheduler walks the active record range one synthetic second per tick.
//! A tick computes its target second (capture start + elapsed), emits every
//! inbound record at the cursor whose timestamp matches it, in file order,
//! and advances the cursor past everything examined. Two opcode kinds
//! addressed to the controlled character are rewritten just before emission
//! so the client does not reject them as stale.
//!
//! `tick()` is public and deterministic; [`ReplayScheduler::run`] drives it on
//! a spawned thread at the configured interval for live playback.

use crate::capture::CaptureRecord;
use crate::types::Opcode;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Flag byte cleared in movement events before emission
const MOVEMENT_FLAG_OFFSET: usize = 14;

/// Live-session abstraction the scheduler emits into
pub trait OutboundSink {
    /// Queue one assembled message for delivery to the client
    fn enqueue(&self, data: Vec<u8>, queue_id: u16);
}

/// One emitted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub data: Vec<u8>,
    pub queue_id: u16,
}

/// Channel-backed sink for wiring the scheduler to a session worker
pub struct ChannelSink {
    tx: Sender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<OutboundMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl OutboundSink for ChannelSink {
    fn enqueue(&self, data: Vec<u8>, queue_id: u16) {
        // A dropped receiver just means the session went away mid-playback.
        let _ = self.tx.send(OutboundMessage { data, queue_id });
    }
}

/// Mutable playback state, one per live session
///
/// Mutated by scheduler ticks and by the session's pause/resume/seek calls;
/// always behind the session's mutex.
#[derive(Debug, Clone, Copy)]
pub struct ReplayState {
    /// Next record index to examine
    pub cursor: usize,
    /// Synthetic seconds since playback started
    pub elapsed_secs: u32,
    pub paused: bool,
    /// Cursor snapshot at pause time, for the resume rebase
    pub paused_cursor: usize,
    /// Incrementing stamp written into rewritten position updates
    pub stamp: u16,
    pub finished: bool,
}

impl ReplayState {
    pub fn new(cursor: usize) -> Self {
        Self {
            cursor,
            elapsed_secs: 0,
            paused: false,
            paused_cursor: cursor,
            stamp: 0,
            finished: false,
        }
    }
}

/// Clock-driven single-timeline player over a fixed record range
pub struct ReplayScheduler<S> {
    records: Arc<Vec<CaptureRecord>>,
    state: Arc<Mutex<ReplayState>>,
    /// Exclusive end of the active range
    range_end: usize,
    /// Capture start time, whole seconds
    start_seconds: u32,
    /// Subject id whose records get the anti-staleness rewrites
    character_id: Option<u32>,
    sink: S,
}

impl<S: OutboundSink> ReplayScheduler<S> {
    pub fn new(
        records: Arc<Vec<CaptureRecord>>,
        state: Arc<Mutex<ReplayState>>,
        range_end: usize,
        start_seconds: u32,
        character_id: Option<u32>,
        sink: S,
    ) -> Self {
        let range_end = range_end.min(records.len());
        Self { records, state, range_end, start_seconds, character_id, sink }
    }

    /// Run one tick; returns how many records were emitted
    ///
    /// A paused or finished session ticks as a no-op. Completion is reached
    /// when the active range's final record is at or before the target
    /// second.
    pub fn tick(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        if state.paused || state.finished {
            return 0;
        }

        let target = self.start_seconds + state.elapsed_secs;
        let mut emitted = 0usize;
        let mut cursor = state.cursor;

        while cursor < self.range_end {
            let record = &self.records[cursor];
            if record.seconds() > target {
                break;
            }
            if record.direction.is_inbound() && record.seconds() == target {
                let data = self.rewrite(record, &mut state);
                trace!(index = record.index, second = target, "emitting record");
                self.sink.enqueue(data, record.queue_id);
                emitted += 1;
            }
            cursor += 1;
        }

        state.cursor = cursor;
        state.elapsed_secs += 1;

        if self.range_end == 0 || self.records[self.range_end - 1].seconds() <= target {
            info!(second = target, "playback complete");
            state.finished = true;
        }
        emitted
    }

    /// Apply the anti-staleness rewrites, cloning the record bytes
    fn rewrite(&self, record: &CaptureRecord, state: &mut ReplayState) -> Vec<u8> {
        let mut data = record.data.clone();
        let subject = data
            .get(4..8)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        if self.character_id.is_none() || subject != self.character_id {
            return data;
        }

        match record.opcode() {
            Some(Opcode::UpdatePosition) if data.len() >= 2 => {
                state.stamp = state.stamp.wrapping_add(1);
                let end = data.len();
                data[end - 2..].copy_from_slice(&state.stamp.to_le_bytes());
            }
            Some(Opcode::MovementEvent) if data.len() > MOVEMENT_FLAG_OFFSET => {
                data[MOVEMENT_FLAG_OFFSET] = 0;
            }
            _ => {}
        }
        data
    }

    /// Drive ticks on a spawned thread until completion or the stop flag
    pub fn run(self, interval: Duration, stop: Arc<AtomicBool>) -> JoinHandle<()>
    where
        S: Send + 'static,
    {
        std::thread::spawn(move || {
            debug!(?interval, "replay thread started");
            while !stop.load(Ordering::Relaxed) {
                self.tick();
                if self.state.lock().unwrap().finished {
                    break;
                }
                std::thread::sleep(interval);
            }
            debug!("replay thread stopped");
        })
    }
}
