//! Core data types shared across ingestion and replay
//!
//! This module contains the fundamental value types used throughout the
//! crate:
//!
//! - [`ContainerFormat`] - Which of the two capture container formats a file uses
//! - [`Timestamp`] - Per-record time, in the representation native to the container
//! - [`Direction`] - Whether a frame travelled client-to-server or server-to-client
//! - [`Opcode`] - Closed enumeration of the game message opcodes the pipeline
//!   cares about, with an `Other` catch-all carrying the raw value
//!
//! Opcode descriptions are derived on demand via [`std::fmt::Display`] rather
//! than being formatted during decode.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Container format of a loaded capture file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// Classic container: global header with magic 0xA1B2C3D4 / 0xD4C3B2A1,
    /// 16-byte per-frame headers
    Classic,
    /// Block-based container: self-describing blocks, any other magic
    Block,
}

impl ContainerFormat {
    /// Sniff the container format from the first four bytes of a file
    pub fn sniff(magic: u32) -> Self {
        match magic {
            0xA1B2_C3D4 | 0xD4C3_B2A1 => ContainerFormat::Classic,
            _ => ContainerFormat::Block,
        }
    }
}

/// Per-record timestamp, mirroring the container it was read from
///
/// Exactly one representation is used for every record of a capture,
/// determined by the container format of the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Classic container: seconds + microseconds since the epoch
    Classic { sec: u32, usec: u32 },
    /// Block container: a 64-bit microsecond count split into high/low words
    Block { high: u32, low: u32 },
}

impl Timestamp {
    /// Total microseconds since the epoch
    pub fn micros(&self) -> u64 {
        match *self {
            Timestamp::Classic { sec, usec } => u64::from(sec) * 1_000_000 + u64::from(usec),
            Timestamp::Block { high, low } => (u64::from(high) << 32) | u64::from(low),
        }
    }

    /// Whole seconds since the epoch
    ///
    /// Replay pacing and segmentation compare records at second granularity,
    /// so both representations normalize through this.
    pub fn seconds(&self) -> u32 {
        match *self {
            Timestamp::Classic { sec, .. } => sec,
            Timestamp::Block { .. } => (self.micros() / 1_000_000) as u32,
        }
    }

    /// Wall-clock time of this record, for duration reporting
    pub fn to_datetime(&self) -> DateTime<Utc> {
        let micros = self.micros();
        Utc.timestamp_opt((micros / 1_000_000) as i64, ((micros % 1_000_000) * 1000) as u32)
            .single()
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
    }
}

/// Direction of a captured frame relative to the game server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server: destination port in the game-server band
    Outbound,
    /// Server to client
    Inbound,
}

impl Direction {
    /// True for server-to-client traffic, the only direction replayed
    pub fn is_inbound(&self) -> bool {
        matches!(self, Direction::Inbound)
    }
}

/// Game message opcodes recognized by segmentation, patching and replay
///
/// Any opcode outside this set is preserved as `Other` with its raw value so
/// nothing is lost, but the pipeline never needs to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Client requests to enter the game world
    EnterGame,
    /// Client leaves the game world
    ExitGame,
    /// Server signals it is ready for the character to enter; opens a login instance
    EnterGameServerReady,
    /// Client reports the login handshake finished
    LoginCompleteNotification,
    /// Discontinuous position change
    PlayerTeleport,
    /// Client movement intent
    MoveToState,
    /// Server-side movement event
    MovementEvent,
    /// Server position update for an object
    UpdatePosition,
    /// Client autonomous position report
    AutonomousPosition,
    /// Ordered game-event wrapper (object id + sequence header)
    GameEvent,
    /// Ordered game-action wrapper (sequence header)
    GameAction,
    /// Anything else, raw value preserved
    Other(u32),
}

impl Opcode {
    /// Map a raw wire value to an opcode
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0xF657 => Opcode::EnterGame,
            0xF653 => Opcode::ExitGame,
            0xF7DF => Opcode::EnterGameServerReady,
            0xF7C8 => Opcode::LoginCompleteNotification,
            0xF751 => Opcode::PlayerTeleport,
            0xF61C => Opcode::MoveToState,
            0xF74C => Opcode::MovementEvent,
            0xF748 => Opcode::UpdatePosition,
            0xF753 => Opcode::AutonomousPosition,
            0xF7B0 => Opcode::GameEvent,
            0xF7B1 => Opcode::GameAction,
            other => Opcode::Other(other),
        }
    }

    /// The raw wire value
    pub fn raw(&self) -> u32 {
        match *self {
            Opcode::EnterGame => 0xF657,
            Opcode::ExitGame => 0xF653,
            Opcode::EnterGameServerReady => 0xF7DF,
            Opcode::LoginCompleteNotification => 0xF7C8,
            Opcode::PlayerTeleport => 0xF751,
            Opcode::MoveToState => 0xF61C,
            Opcode::MovementEvent => 0xF74C,
            Opcode::UpdatePosition => 0xF748,
            Opcode::AutonomousPosition => 0xF753,
            Opcode::GameEvent => 0xF7B0,
            Opcode::GameAction => 0xF7B1,
            Opcode::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Opcode::EnterGame => write!(f, "EnterGame"),
            Opcode::ExitGame => write!(f, "ExitGame"),
            Opcode::EnterGameServerReady => write!(f, "EnterGameServerReady"),
            Opcode::LoginCompleteNotification => write!(f, "LoginCompleteNotification"),
            Opcode::PlayerTeleport => write!(f, "PlayerTeleport"),
            Opcode::MoveToState => write!(f, "MoveToState"),
            Opcode::MovementEvent => write!(f, "MovementEvent"),
            Opcode::UpdatePosition => write!(f, "UpdatePosition"),
            Opcode::AutonomousPosition => write!(f, "AutonomousPosition"),
            Opcode::GameEvent => write!(f, "GameEvent"),
            Opcode::GameAction => write!(f, "GameAction"),
            Opcode::Other(raw) => write!(f, "Opcode({raw:#06X})"),
        }
    }
}
