//! Canonical login template synthesis
//!
//! Captures that begin mid-session carry no login handshake, and the client
//! cannot render world state without one. This module takes a fixed reference
//! capture (the canonical login template), rewrites the character identity,
//! world position and sequencing stamps inside it to match the target capture,
//! and hands back a reduced record sequence to prepend to the timeline.
//!
//! Everything here is coupled to one frozen protocol layout through
//! [`TemplateLayout`]; a layout change means swapping the template file and
//! this offset table, nothing else.

use crate::capture::{load_capture_file, CaptureRecord, ReassemblyMode};
use crate::error::{ReplayError, Result};
use crate::types::{Opcode, Timestamp};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tracing::{debug, info, warn};

/// Fixed byte-offset table for one frozen template layout
///
/// Record positions index into the template's decoded record sequence; byte
/// offsets index into those records' assembled payloads.
#[derive(Debug, Clone)]
pub struct TemplateLayout {
    /// Records embedding the character id at [`Self::CHARACTER_ID_OFFSET`]
    /// in addition to every game-event record: create-player,
    /// create-object-player, set-state
    pub identity_records: [usize; 3],
    /// The record creating the player's own world object
    pub player_object_record: usize,
    /// The starting-gear record carrying a wielder id
    pub robe_record: usize,
    /// Wielder id offset within the robe record
    pub wielder_offset: usize,
    /// Cell id offset within the player object record; x/y/z follow as f32s
    pub position_offset: usize,
    /// Instance-sequence stamp offset within the player object record
    pub object_stamp_offset: usize,
    /// The set-state record, carrying the same stamp
    pub set_state_record: usize,
    /// Stamp offset within the set-state record
    pub state_stamp_offset: usize,
    /// Template positions removed before splicing, applied in order
    pub removed_records: [usize; 3],
    /// Playback start index after removal
    pub start_index: usize,
    /// Resume-after-login index after removal
    pub resume_index: usize,
}

impl TemplateLayout {
    /// Character id offset shared by all identity-bearing records
    pub const CHARACTER_ID_OFFSET: usize = 4;

    /// Layout of the bundled canonical login template
    pub fn canonical() -> Self {
        Self {
            identity_records: [19, 20, 33],
            player_object_record: 20,
            robe_record: 21,
            wielder_offset: 0x93,
            position_offset: 252,
            object_stamp_offset: 0x13C,
            set_state_record: 33,
            state_stamp_offset: 0xC,
            // stale attribute update, autonomous position, welcome message
            removed_records: [34, 31, 18],
            start_index: 7,
            resume_index: 29,
        }
    }

    fn max_record(&self) -> usize {
        let mut max = self.set_state_record;
        for &i in self.identity_records.iter().chain(self.removed_records.iter()) {
            max = max.max(i);
        }
        max.max(self.player_object_record).max(self.robe_record)
    }
}

/// A starting world position lifted from the target capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub cell_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// The patched template, ready to prepend to the target timeline
#[derive(Debug)]
pub struct SyntheticLogin {
    /// Patched, reduced template records
    pub records: Vec<CaptureRecord>,
    /// Index playback starts from within the combined timeline
    pub start_index: usize,
    /// Resume-after-login index within the combined timeline
    pub resume_index: usize,
    /// Inferred character id the template was patched to
    pub character_id: u32,
}

fn subject_id(record: &CaptureRecord) -> Option<u32> {
    let bytes = record.data.get(4..8)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Infer the controlled character's id from the target capture
///
/// Looks at every move-to-state event immediately followed by a movement
/// event and takes the movement event's subject id; the most frequent id wins,
/// ties broken by first occurrence among the maximum.
pub fn infer_character_id(records: &[CaptureRecord]) -> Option<u32> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    let mut first_seen: Vec<u32> = Vec::new();

    for pair in records.windows(2) {
        if pair[0].leads_with(Opcode::MoveToState) && pair[1].leads_with(Opcode::MovementEvent) {
            if let Some(id) = subject_id(&pair[1]) {
                if !counts.contains_key(&id) {
                    first_seen.push(id);
                }
                *counts.entry(id).or_insert(0) += 1;
            }
        }
    }

    let best = counts.values().copied().max()?;
    first_seen.into_iter().find(|id| counts[id] == best)
}

/// Find the character's starting position in the target capture
///
/// The first update-position event whose subject matches carries a u32 flags
/// word, then the cell id and the three coordinates.
pub fn starting_position(records: &[CaptureRecord], character_id: u32) -> Option<Position> {
    for record in records {
        if !record.leads_with(Opcode::UpdatePosition) || subject_id(record) != Some(character_id) {
            continue;
        }
        let body = record.data.get(12..28)?;
        return Some(Position {
            cell_id: u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
            x: f32::from_le_bytes([body[4], body[5], body[6], body[7]]),
            y: f32::from_le_bytes([body[8], body[9], body[10], body[11]]),
            z: f32::from_le_bytes([body[12], body[13], body[14], body[15]]),
        });
    }
    None
}

/// Lift the instance-sequence stamp from the target capture
///
/// The stamp comes from the first movement-event record addressed to the
/// character, two bytes directly after the subject id.
pub fn instance_stamp(records: &[CaptureRecord], character_id: u32) -> Option<[u8; 2]> {
    let signature = Opcode::MovementEvent.raw().to_le_bytes();
    let guid = character_id.to_le_bytes();
    records
        .iter()
        .find(|r| r.data.get(0..4) == Some(&signature[..]) && r.data.get(4..8) == Some(&guid[..]))
        .and_then(|r| r.data.get(8..10))
        .map(|b| [b[0], b[1]])
}

/// Load the canonical login template capture
///
/// The template must decode completely: any salvage halt becomes a hard
/// error here, unlike ordinary capture loads.
pub fn load_template<P: AsRef<Path>>(path: P) -> Result<Vec<CaptureRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ReplayError::MissingTemplate { path: path.to_path_buf() });
    }
    let abort = AtomicBool::new(false);
    load_capture_file(path, ReassemblyMode::Streaming, &abort)?.strict()
}

fn write_bytes(record: &mut CaptureRecord, offset: usize, bytes: &[u8]) -> Result<()> {
    let end = offset + bytes.len();
    let slot = record.data.get_mut(offset..end).ok_or_else(|| {
        ReplayError::MalformedTemplate(format!(
            "record {} too short for a write at offset {offset:#X}",
            record.index
        ))
    })?;
    slot.copy_from_slice(bytes);
    Ok(())
}

/// Patch the template against the target capture and reduce it for splicing
///
/// The returned records carry the target's start timestamp and contiguous
/// indices from 0; the caller appends the (re-indexed) target records after
/// them.
pub fn synthesize_login(
    mut template: Vec<CaptureRecord>,
    target: &[CaptureRecord],
    start_time: Timestamp,
    layout: &TemplateLayout,
) -> Result<SyntheticLogin> {
    if template.len() <= layout.max_record() {
        return Err(ReplayError::MalformedTemplate(format!(
            "template has {} records, layout needs {}",
            template.len(),
            layout.max_record() + 1
        )));
    }

    let character_id = match infer_character_id(target) {
        Some(id) => id,
        None => {
            warn!("no movement pairs in target capture, character id unresolved");
            0
        }
    };
    let guid = character_id.to_le_bytes();
    let position = starting_position(target, character_id);
    let stamp = instance_stamp(target, character_id);
    debug!(character_id, ?position, "patching login template");

    let event_signature = Opcode::GameEvent.raw().to_le_bytes();
    for record in template.iter_mut() {
        if record.data.get(0..4) == Some(&event_signature[..]) {
            write_bytes(record, TemplateLayout::CHARACTER_ID_OFFSET, &guid)?;
        }
    }
    for &index in &layout.identity_records {
        write_bytes(&mut template[index], TemplateLayout::CHARACTER_ID_OFFSET, &guid)?;
    }
    write_bytes(&mut template[layout.robe_record], layout.wielder_offset, &guid)?;

    if let Some(position) = position {
        let record = &mut template[layout.player_object_record];
        write_bytes(record, layout.position_offset, &position.cell_id.to_le_bytes())?;
        write_bytes(record, layout.position_offset + 4, &position.x.to_le_bytes())?;
        write_bytes(record, layout.position_offset + 8, &position.y.to_le_bytes())?;
        write_bytes(record, layout.position_offset + 12, &position.z.to_le_bytes())?;
    }
    if let Some(stamp) = stamp {
        write_bytes(&mut template[layout.player_object_record], layout.object_stamp_offset, &stamp)?;
        write_bytes(&mut template[layout.set_state_record], layout.state_stamp_offset, &stamp)?;
    }

    for record in template.iter_mut() {
        record.timestamp = start_time;
    }

    // Remove the records that would fight the injected state. Order matters:
    // each removal shifts the positions behind it.
    for &index in &layout.removed_records {
        template.remove(index);
    }
    for (i, record) in template.iter_mut().enumerate() {
        record.index = i;
    }

    info!(records = template.len(), character_id, "synthetic login spliced");
    Ok(SyntheticLogin {
        records: template,
        start_index: layout.start_index,
        resume_index: layout.resume_index,
        character_id,
    })
}
