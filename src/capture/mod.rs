//! Capture ingestion: container frames to assembled message records
//!
//! The pipeline runs strictly downward: [`container`] yields raw timestamped
//! frames, [`net`] strips link/IP/UDP headers and filters to game traffic,
//! [`proto`] parses the transport header and optional sub-headers, and
//! [`fragment`] merges blob fragments back into complete messages. [`loader`]
//! drives the whole pass and applies the skip/halt policies.

pub mod container;
pub mod fragment;
pub mod loader;
pub mod net;
pub mod proto;
pub mod record;

pub use container::{FrameOutcome, FrameReader, HaltReason, RawFrame, SkipReason};
pub use loader::{load_capture, load_capture_file, LoadOutcome, ReassemblyMode};
pub use record::CaptureRecord;
