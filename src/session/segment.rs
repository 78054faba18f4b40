//! Session segmentation: login instances and teleport markers
//!
//! One forward scan over the decoded record sequence finds every login
//! instance (opened by an enter-game-ready event, 1-based) and every teleport,
//! scoped to the instance open at that point. The scan output is immutable;
//! instance bounds are resolved on demand against it.

use crate::capture::CaptureRecord;
use crate::types::{Opcode, Timestamp};
use std::collections::HashMap;
use tracing::debug;

/// What a marker points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Login,
    Teleport,
}

/// One point of interest in the record sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMarker {
    pub kind: MarkerKind,
    /// Index into the record sequence
    pub record_index: usize,
    /// 1-based login instance this marker belongs to; 0 for teleports seen
    /// before the first login
    pub login_instance: u32,
}

/// Result of the segmentation scan, built once per load
#[derive(Debug, Default)]
pub struct SegmentScan {
    /// All markers in record order
    pub markers: Vec<SessionMarker>,
    /// Record index of each instance's opening ready event, in order
    pub login_indexes: Vec<usize>,
    /// Teleport record indexes per instance ordinal (0 = pre-login)
    pub teleports: HashMap<u32, Vec<usize>>,
}

impl SegmentScan {
    /// Number of login instances detected
    pub fn login_count(&self) -> u32 {
        self.login_indexes.len() as u32
    }

    /// Whether the capture contains a login handshake at all
    pub fn has_login_event(&self) -> bool {
        !self.login_indexes.is_empty()
    }

    /// Teleport record indexes of one instance, in record order
    pub fn instance_teleports(&self, instance: u32) -> &[usize] {
        self.teleports.get(&instance).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Scan the record sequence for login and teleport boundaries
pub fn scan(records: &[CaptureRecord]) -> SegmentScan {
    let mut out = SegmentScan::default();
    let mut open_instance = 0u32;

    for record in records {
        match record.opcode() {
            Some(Opcode::EnterGameServerReady) => {
                open_instance += 1;
                out.login_indexes.push(record.index);
                out.markers.push(SessionMarker {
                    kind: MarkerKind::Login,
                    record_index: record.index,
                    login_instance: open_instance,
                });
            }
            Some(Opcode::PlayerTeleport) => {
                out.teleports.entry(open_instance).or_default().push(record.index);
                out.markers.push(SessionMarker {
                    kind: MarkerKind::Teleport,
                    record_index: record.index,
                    login_instance: open_instance,
                });
            }
            _ => {}
        }
    }

    debug!(
        instances = out.login_indexes.len(),
        markers = out.markers.len(),
        "segmentation scan complete"
    );
    out
}

/// Resolved playback range of one login instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceBounds {
    /// Selected ordinal (after out-of-range defaulting), 0 on the no-login path
    pub instance: u32,
    /// Index of the first record in range
    pub start: usize,
    /// Exclusive end index; the terminating exit-game record is in range
    pub end: usize,
    /// Timestamp of the first record in range
    pub start_time: Timestamp,
    /// Character id from the opening ready record, when one exists
    pub character_id: Option<u32>,
    /// First login-complete notification at/after the start
    pub resume_index: Option<usize>,
    /// False when the capture holds no login at all (patcher path)
    pub has_login: bool,
}

fn record_subject_id(record: &CaptureRecord) -> Option<u32> {
    let bytes = record.data.get(4..8)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Resolve the playback bounds of the requested login instance
///
/// A requested ordinal beyond the detected count falls back to instance 1.
/// The last instance (and a sole instance) always runs to end of file; any
/// earlier instance ends at its first subsequent exit-game record.
pub fn select_instance(
    records: &[CaptureRecord],
    scan: &SegmentScan,
    requested: u32,
) -> InstanceBounds {
    let first_time = records
        .first()
        .map(|r| r.timestamp)
        .unwrap_or(Timestamp::Classic { sec: 0, usec: 0 });

    if !scan.has_login_event() {
        return InstanceBounds {
            instance: 0,
            start: 0,
            end: records.len(),
            start_time: first_time,
            character_id: None,
            resume_index: None,
            has_login: false,
        };
    }

    let count = scan.login_count();
    let instance = if requested == 0 || requested > count { 1 } else { requested };
    let start = scan.login_indexes[(instance - 1) as usize];

    let end = if instance == count {
        records.len()
    } else {
        records[start..]
            .iter()
            .find(|r| r.leads_with(Opcode::ExitGame))
            .map(|r| r.index + 1)
            .unwrap_or(records.len())
    };

    let resume_index = records[start..end]
        .iter()
        .find(|r| r.leads_with(Opcode::LoginCompleteNotification))
        .map(|r| r.index);

    InstanceBounds {
        instance,
        start,
        end,
        start_time: records[start].timestamp,
        character_id: record_subject_id(&records[start]),
        resume_index,
        has_login: true,
    }
}
