//! Live replay sessions
//!
//! [`ReplaySession`] is the surface the command layer drives: load a capture,
//! pick a login instance, list markers, seek, pause/resume, and hand a sink
//! to the scheduler. One session owns one capture timeline and one
//! [`ReplayState`]; nothing here is process-global, so independent sessions
//! can coexist in one process.

pub mod patch;
pub mod scheduler;
pub mod segment;

pub use patch::{SyntheticLogin, TemplateLayout};
pub use scheduler::{ChannelSink, OutboundMessage, OutboundSink, ReplayScheduler, ReplayState};
pub use segment::{InstanceBounds, MarkerKind, SessionMarker};

use crate::capture::{load_capture_file, CaptureRecord, HaltReason, ReassemblyMode};
use crate::config::ReplayConfig;
use crate::error::Result;
use crate::types::Timestamp;
use segment::SegmentScan;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// What a load produced, for the command layer
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub record_count: usize,
    pub login_instance_count: u32,
    pub markers: Vec<SessionMarker>,
}

/// One loaded capture wired up for replay
#[derive(Debug)]
pub struct ReplaySession {
    records: Arc<Vec<CaptureRecord>>,
    scan: SegmentScan,
    bounds: InstanceBounds,
    state: Arc<Mutex<ReplayState>>,
    config: ReplayConfig,
    /// Why ingestion stopped early, if it did
    halted: Option<HaltReason>,
}

impl ReplaySession {
    /// Load a capture from disk and prepare it for replay
    ///
    /// Blocking: ingestion, segmentation and (when the capture begins
    /// mid-session) login synthesis all complete before this returns. The
    /// instance from the config is selected; captures without a login
    /// handshake require the canonical template at the configured path.
    pub fn load<P: AsRef<Path>>(path: P, config: ReplayConfig) -> Result<Self> {
        let abort = AtomicBool::new(false);
        let outcome = load_capture_file(path, ReassemblyMode::Streaming, &abort)?;
        if let Some(reason) = outcome.halted {
            warn!(%reason, "capture loaded with salvage");
        }
        Self::from_records(outcome.records, outcome.halted, config)
    }

    /// Build a session from an already-ingested record sequence
    pub fn from_records(
        records: Vec<CaptureRecord>,
        halted: Option<HaltReason>,
        config: ReplayConfig,
    ) -> Result<Self> {
        let scan = segment::scan(&records);

        let (timeline, scan, bounds) = if scan.has_login_event() {
            let bounds = segment::select_instance(&records, &scan, config.initial_login_instance);
            (records, scan, bounds)
        } else {
            info!("no login handshake in capture, synthesizing one from the template");
            let template = patch::load_template(&config.login_template_path)?;
            let start_time = records
                .first()
                .map(|r| r.timestamp)
                .unwrap_or(Timestamp::Classic { sec: 0, usec: 0 });
            let synthetic = patch::synthesize_login(
                template,
                &records,
                start_time,
                &TemplateLayout::canonical(),
            )?;

            let mut timeline = synthetic.records;
            let offset = timeline.len();
            for mut record in records {
                record.index += offset;
                timeline.push(record);
            }
            let rescan = segment::scan(&timeline);
            let bounds = InstanceBounds {
                instance: if rescan.has_login_event() { 1 } else { 0 },
                start: synthetic.start_index,
                end: timeline.len(),
                start_time: timeline[synthetic.start_index].timestamp,
                character_id: Some(synthetic.character_id),
                resume_index: Some(synthetic.resume_index),
                has_login: false,
            };
            (timeline, rescan, bounds)
        };

        if let (Some(first), Some(last)) = (timeline.first(), timeline.last()) {
            info!(
                records = timeline.len(),
                instances = scan.login_count(),
                start = %first.timestamp.to_datetime(),
                duration_secs = last.seconds().saturating_sub(first.seconds()),
                "capture ready for replay"
            );
        }

        Ok(Self {
            state: Arc::new(Mutex::new(ReplayState::new(bounds.start))),
            records: Arc::new(timeline),
            scan,
            bounds,
            config,
            halted,
        })
    }

    /// Load outcome for the command layer
    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            record_count: self.records.len(),
            login_instance_count: self.scan.login_count(),
            markers: self.scan.markers.clone(),
        }
    }

    /// All markers, in record order
    pub fn markers(&self) -> &[SessionMarker] {
        &self.scan.markers
    }

    /// Bounds of the active instance
    pub fn bounds(&self) -> InstanceBounds {
        self.bounds
    }

    /// Why ingestion stopped early, if it did; records before it are loaded
    pub fn halted(&self) -> Option<HaltReason> {
        self.halted
    }

    /// Current record cursor
    pub fn cursor(&self) -> usize {
        self.state.lock().unwrap().cursor
    }

    /// Switch to another login instance and rewind playback to its start
    ///
    /// An ordinal beyond the detected count falls back to instance 1. On the
    /// synthesized-login path the spliced timeline is the only instance and
    /// the call is a no-op.
    pub fn select_login_instance(&mut self, ordinal: u32) {
        if !self.bounds.has_login {
            return;
        }
        self.bounds = segment::select_instance(&self.records, &self.scan, ordinal);
        *self.state.lock().unwrap() = ReplayState::new(self.bounds.start);
    }

    fn teleports(&self) -> &[usize] {
        self.scan.instance_teleports(self.bounds.instance)
    }

    /// Jump to the next teleport marker of the active instance
    ///
    /// Looks strictly past the cursor; returns `false` and leaves state
    /// untouched when no marker remains in range.
    pub fn seek_next_teleport(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let next = self
            .teleports()
            .iter()
            .find(|&&index| index > state.cursor && index < self.bounds.end)
            .copied();
        match next {
            Some(index) => {
                state.cursor = index;
                true
            }
            None => false,
        }
    }

    /// Jump to the Nth teleport marker (1-based) of the active instance
    pub fn seek_teleport(&self, ordinal: u32) -> bool {
        let teleports = self.teleports();
        if ordinal == 0 || ordinal as usize > teleports.len() {
            return false;
        }
        self.state.lock().unwrap().cursor = teleports[(ordinal - 1) as usize];
        true
    }

    /// Stop the clock, keeping the cursor
    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        state.paused = true;
        state.paused_cursor = state.cursor;
    }

    /// Restart the clock
    ///
    /// If the cursor moved while paused (a seek), the elapsed baseline is
    /// recomputed from the cursor's timestamp so subsequent ticks stay
    /// aligned with the capture clock.
    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        if state.cursor != state.paused_cursor {
            if let Some(record) = self.records.get(state.cursor) {
                state.elapsed_secs = record
                    .seconds()
                    .saturating_sub(self.bounds.start_time.seconds() + 1);
            }
        }
        state.paused = false;
    }

    /// The client finished its login handshake; continue from the recorded
    /// resume point
    pub fn notify_login_complete(&self) {
        if let Some(index) = self.bounds.resume_index {
            info!(index, "login complete, resuming after handshake");
            self.state.lock().unwrap().cursor = index;
        }
    }

    /// Build the scheduler for this session's active range
    pub fn scheduler<S: OutboundSink>(&self, sink: S) -> ReplayScheduler<S> {
        ReplayScheduler::new(
            Arc::clone(&self.records),
            Arc::clone(&self.state),
            self.bounds.end,
            self.bounds.start_time.seconds(),
            self.bounds.character_id,
            sink,
        )
    }

    /// Tick interval from the session config, for [`ReplayScheduler::run`]
    pub fn tick_interval(&self) -> std::time::Duration {
        self.config.tick_interval()
    }
}
