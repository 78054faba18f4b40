//! Link/IP/UDP header stripping and game-traffic filtering
//!
//! Frames come off the container as raw Ethernet captures. Only IPv4/UDP
//! traffic touching the game-server port band is of interest; everything else
//! is foreign traffic that happened to share the wire and is silently skipped
//! by the ingestion loop.

use crate::types::Direction;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

/// First port of the game-server band
pub const GAME_PORT_FIRST: u16 = 9000;

/// Last port of the game-server band
pub const GAME_PORT_LAST: u16 = 9013;

const ETHERNET_HEADER_LEN: u64 = 14;
const ETHERTYPE_IPV4: u16 = 0x0800;
// IPv4 options do not occur on this traffic; the header is consumed at its
// fixed 20-byte size.
const IPV4_HEADER_LEN: u64 = 20;
const IP_PROTO_UDP: u8 = 17;

/// One frame reduced to its game-protocol payload
#[derive(Debug, Clone, Copy)]
pub struct GameDatagram<'a> {
    /// Outbound when the destination port is in the game band
    pub direction: Direction,
    /// Protocol payload: transport header, optional headers, fragments
    pub payload: &'a [u8],
}

fn in_game_band(port: u16) -> bool {
    (GAME_PORT_FIRST..=GAME_PORT_LAST).contains(&port)
}

/// Strip Ethernet/IPv4/UDP headers and classify direction
///
/// Returns `None` for anything that is not game traffic: wrong ethertype,
/// non-UDP, ports outside the band, or a frame too short to hold the headers.
pub fn decode_frame(frame: &[u8]) -> Option<GameDatagram<'_>> {
    let mut cur = Cursor::new(frame);

    cur.seek(SeekFrom::Start(ETHERNET_HEADER_LEN - 2)).ok()?;
    let ethertype = cur.read_u16::<BigEndian>().ok()?;
    if ethertype != ETHERTYPE_IPV4 {
        return None;
    }

    let ip_start = ETHERNET_HEADER_LEN;
    cur.seek(SeekFrom::Start(ip_start + 9)).ok()?;
    let proto = cur.read_u8().ok()?;
    if proto != IP_PROTO_UDP {
        return None;
    }

    let udp_start = ip_start + IPV4_HEADER_LEN;
    cur.seek(SeekFrom::Start(udp_start)).ok()?;
    let source_port = cur.read_u16::<BigEndian>().ok()?;
    let dest_port = cur.read_u16::<BigEndian>().ok()?;

    let outbound = in_game_band(dest_port);
    let inbound = in_game_band(source_port);
    if !outbound && !inbound {
        return None;
    }

    let payload_start = (udp_start + 8) as usize;
    if payload_start > frame.len() {
        return None;
    }

    Some(GameDatagram {
        direction: if outbound { Direction::Outbound } else { Direction::Inbound },
        payload: &frame[payload_start..],
    })
}
