//! Integration tests for capture ingestion: container parsing through
//! reassembled records

mod common;

use common::builders::CaptureBuilder;
use pcap_replay::capture::{load_capture, load_capture_file, HaltReason, ReassemblyMode};
use pcap_replay::{ContainerFormat, Direction, Opcode};
use std::sync::atomic::AtomicBool;

fn ingest(data: &[u8], mode: ReassemblyMode) -> pcap_replay::capture::LoadOutcome {
    common::init_tracing();
    let abort = AtomicBool::new(false);
    load_capture(data, mode, &abort)
}

#[test]
fn synthetic_stream_round_trips_every_frame() {
    let mut builder = CaptureBuilder::new();
    let count = 25u32;
    for i in 0..count {
        builder = builder.inbound_message(
            100 + i,
            u64::from(i) + 1,
            &common::builders::message(0xF7DF, 0x5001_0001, 4),
        );
    }
    let outcome = ingest(&builder.build(), ReassemblyMode::PerFrame);

    assert!(outcome.halted.is_none());
    assert_eq!(outcome.format, ContainerFormat::Classic);
    assert_eq!(outcome.records.len(), count as usize);
    for (i, record) in outcome.records.iter().enumerate() {
        assert_eq!(record.index, i);
        assert_eq!(record.seconds(), 100 + i as u32);
        assert_eq!(record.direction, Direction::Inbound);
    }
}

#[test]
fn oversize_frame_halts_keeping_earlier_records() {
    let data = CaptureBuilder::new()
        .inbound_message(10, 1, &common::builders::message(0xF7DF, 1, 0))
        .inbound_message(11, 2, &common::builders::message(0xF751, 1, 0))
        .bare_header(12, 60_000)
        .inbound_message(13, 3, &common::builders::message(0xF653, 1, 0))
        .build();
    let outcome = ingest(&data, ReassemblyMode::Streaming);

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.halted, Some(HaltReason::OversizeFrame { declared: 60_000 }));
}

#[test]
fn runt_frame_skipped_without_halting() {
    let data = CaptureBuilder::new()
        .inbound_message(10, 1, &common::builders::message(0xF7DF, 1, 0))
        .frame(11, &[0xAA; 6]) // below the 14-byte link header minimum
        .inbound_message(12, 2, &common::builders::message(0xF751, 1, 0))
        .build();
    let outcome = ingest(&data, ReassemblyMode::Streaming);

    assert!(outcome.halted.is_none());
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[1].opcode(), Some(Opcode::PlayerTeleport));
}

#[test]
fn stream_ending_mid_header_halts_with_salvage() {
    let data = CaptureBuilder::new()
        .inbound_message(10, 1, &common::builders::message(0xF7DF, 1, 0))
        .raw(&[0u8; 9])
        .build();
    let outcome = ingest(&data, ReassemblyMode::Streaming);

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.halted, Some(HaltReason::Truncated { remaining: 9 }));
}

#[test]
fn streaming_mode_reassembles_interleaved_blobs() {
    let long_a = common::builders::message(0xF7C8, 0x5001_0001, 40);
    let long_b = common::builders::message(0xF748, 0x5001_0001, 40);
    let (a_head, a_tail) = long_a.split_at(20);
    let (b_head, b_tail) = long_b.split_at(20);

    let data = CaptureBuilder::new()
        .inbound_fragment(10, 0xA, 0, 2, a_head)
        .inbound_fragment(10, 0xB, 0, 2, b_head)
        .inbound_fragment(11, 0xB, 1, 2, b_tail)
        .inbound_fragment(12, 0xA, 1, 2, a_tail)
        .build();
    let outcome = ingest(&data, ReassemblyMode::Streaming);

    assert!(outcome.halted.is_none());
    assert_eq!(outcome.records.len(), 2);
    // emission order follows completion, blob B first
    assert_eq!(outcome.records[0].data, long_b);
    assert_eq!(outcome.records[1].data, long_a);
    // timestamps come from each blob's opening fragment
    assert_eq!(outcome.records[0].seconds(), 10);
    assert_eq!(outcome.records[1].seconds(), 10);
}

#[test]
fn per_frame_mode_drops_cross_frame_blobs() {
    let long = common::builders::message(0xF7C8, 1, 40);
    let (head, tail) = long.split_at(20);
    let data = CaptureBuilder::new()
        .inbound_fragment(10, 0xA, 0, 2, head)
        .inbound_fragment(11, 0xA, 1, 2, tail)
        .inbound_message(12, 0xB, &common::builders::message(0xF751, 1, 0))
        .build();
    let outcome = ingest(&data, ReassemblyMode::PerFrame);

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].opcode(), Some(Opcode::PlayerTeleport));
}

#[test]
fn outbound_frames_keep_their_direction() {
    let data = CaptureBuilder::new()
        .outbound_message(10, 1, &common::builders::message(0xF657, 1, 0))
        .inbound_message(11, 2, &common::builders::message(0xF7DF, 1, 0))
        .build();
    let outcome = ingest(&data, ReassemblyMode::Streaming);

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].direction, Direction::Outbound);
    assert_eq!(outcome.records[0].opcode(), Some(Opcode::EnterGame));
    assert_eq!(outcome.records[1].direction, Direction::Inbound);
}

#[test]
fn load_from_disk_matches_in_memory() {
    let data = CaptureBuilder::new()
        .inbound_message(10, 1, &common::builders::message(0xF7DF, 1, 0))
        .build();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.pcap");
    std::fs::write(&path, &data).unwrap();

    let abort = AtomicBool::new(false);
    let from_disk = load_capture_file(&path, ReassemblyMode::Streaming, &abort).unwrap();
    let in_memory = ingest(&data, ReassemblyMode::Streaming);
    assert_eq!(from_disk.records.len(), in_memory.records.len());
    assert_eq!(from_disk.records[0].data, in_memory.records[0].data);
}
