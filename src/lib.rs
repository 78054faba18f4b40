//! # pcap-replay: Game Protocol Capture Replay
//!
//! Ingests recorded UDP game-protocol captures, reassembles the application
//! messages that were fragmented across physical packets, segments the
//! capture into login/teleport-bounded playback regions, and replays the
//! reconstructed message stream into a live session with real-time pacing
//! and targeted byte-level rewriting.
//!
//! ## Architecture
//!
//! - **Capture**: container parsing, header stripping, protocol decoding and
//!   fragment reassembly, flowing strictly downward into an ordered record
//!   sequence
//! - **Session**: segmentation into login instances and teleport markers,
//!   synthetic-login patching for captures that begin mid-session, and the
//!   tick-driven replay scheduler
//! - **Communication**: a crossbeam channel sink carries emitted messages to
//!   the session worker
//!
//! Captures without a login handshake need the canonical login template
//! capture (`basic-login.pcap` by default) next to the working directory; its
//! path lives in [`config::ReplayConfig`].
//!
//! ## Example
//!
//! ```ignore
//! use pcap_replay::{
//!     config::ReplayConfig,
//!     session::{ChannelSink, ReplaySession},
//! };
//! use std::sync::{atomic::AtomicBool, Arc};
//!
//! fn main() -> pcap_replay::Result<()> {
//!     let config = ReplayConfig::load_or_default("replay.toml");
//!     let session = ReplaySession::load("my-capture.pcap", config)?;
//!     println!(
//!         "{} records, {} login instance(s)",
//!         session.summary().record_count,
//!         session.summary().login_instance_count,
//!     );
//!
//!     let (sink, outbound) = ChannelSink::new();
//!     let stop = Arc::new(AtomicBool::new(false));
//!     let player = session.scheduler(sink).run(session.tick_interval(), stop);
//!
//!     for message in outbound {
//!         // hand message.data / message.queue_id to the live connection
//!     }
//!     player.join().unwrap();
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use error::{ReplayError, Result};
pub use session::{LoadSummary, ReplaySession};
pub use types::{ContainerFormat, Direction, Opcode, Timestamp};
