//! Game transport header and optional sub-header parsing
//!
//! Every game datagram starts with a 20-byte transport header whose flags
//! word doubles as a bitmask of optional sub-headers. The sub-headers carry
//! no length markers of their own (the logon handshake's trailing auth blob
//! is the single exception), so they must be consumed strictly in mask order,
//! each at its known width, before the fragment stream or single message that
//! follows.
//!
//! Message opcodes are a 4-byte value, optionally wrapped in up to two
//! ordered-event headers that are skipped transparently to reach the real
//! opcode.

use crate::types::Opcode;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Seek, SeekFrom};

/// Flag bit: the payload after the optional headers is a fragment stream
pub const HAS_FRAGMENTS: u32 = 0x0000_0004;

/// Optional sub-header flag bits, in parse order
pub mod flags {
    pub const SERVER_SWITCH: u32 = 0x0000_0100;
    pub const LOGON_SERVER_ADDR: u32 = 0x0000_0200;
    pub const EMPTY_HEADER_1: u32 = 0x0000_0400;
    pub const REFERRAL: u32 = 0x0000_0800;
    pub const NAK: u32 = 0x0000_1000;
    pub const EMPTY_ACK: u32 = 0x0000_2000;
    pub const PAK: u32 = 0x0000_4000;
    pub const EMPTY_HEADER_2: u32 = 0x0000_8000;
    pub const LOGON: u32 = 0x0001_0000;
    pub const WORLD_LOGIN: u32 = 0x0002_0000;
    pub const CONNECT: u32 = 0x0004_0000;
    pub const CONNECT_RESPONSE: u32 = 0x0008_0000;
    pub const NET_ERROR: u32 = 0x0010_0000;
    pub const NET_ERROR_DISCONNECT: u32 = 0x0020_0000;
    pub const COMMAND_ACK: u32 = 0x0040_0000;
    pub const TIME_SYNC: u32 = 0x0100_0000;
    pub const ECHO_REQUEST: u32 = 0x0200_0000;
    pub const ECHO_RESPONSE: u32 = 0x0400_0000;
    pub const FLOW: u32 = 0x0800_0000;
}

/// The 20-byte transport header at the start of every game datagram
#[derive(Debug, Clone, Copy)]
pub struct TransportHeader {
    pub sequence: u32,
    /// Optional-header bitmask; bit 0x4 marks a fragment stream
    pub flags: u32,
    pub checksum: u32,
    pub recipient: u16,
    pub time_since_last: u16,
    pub payload_size: u16,
    pub table: u16,
}

impl TransportHeader {
    /// Parse the transport header from the start of a datagram payload
    pub fn read(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(Self {
            sequence: cur.read_u32::<LittleEndian>()?,
            flags: cur.read_u32::<LittleEndian>()?,
            checksum: cur.read_u32::<LittleEndian>()?,
            recipient: cur.read_u16::<LittleEndian>()?,
            time_since_last: cur.read_u16::<LittleEndian>()?,
            payload_size: cur.read_u16::<LittleEndian>()?,
            table: cur.read_u16::<LittleEndian>()?,
        })
    }

    /// Whether the remainder of the datagram is a fragment stream
    pub fn has_fragments(&self) -> bool {
        self.flags & HAS_FRAGMENTS != 0
    }
}

/// One parsed optional sub-header
///
/// Only shape is retained; payloads the pipeline never interprets are
/// consumed and dropped. Human-readable descriptions come from `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalHeader {
    ServerSwitch,
    LogonServerAddr,
    EmptyHeader1,
    Referral,
    /// Negative-ack sequence list (entry count retained for diagnostics)
    Nak(u32),
    /// Empty-ack sequence list
    EmptyAck(u32),
    Pak,
    EmptyHeader2,
    /// Logon handshake; the auth blob length is embedded in the header
    Logon { auth_len: u32 },
    WorldLogin,
    Connect,
    ConnectResponse,
    NetError,
    NetErrorDisconnect,
    CommandAck,
    TimeSync,
    EchoRequest,
    EchoResponse,
    Flow,
}

impl std::fmt::Display for OptionalHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionalHeader::ServerSwitch => write!(f, "Server Switch"),
            OptionalHeader::LogonServerAddr => write!(f, "Logon Server Addr"),
            OptionalHeader::EmptyHeader1 => write!(f, "Empty Header 1"),
            OptionalHeader::Referral => write!(f, "Referral"),
            OptionalHeader::Nak(n) => write!(f, "Nak[{n}]"),
            OptionalHeader::EmptyAck(n) => write!(f, "Empty Ack[{n}]"),
            OptionalHeader::Pak => write!(f, "Pak"),
            OptionalHeader::EmptyHeader2 => write!(f, "Empty Header 2"),
            OptionalHeader::Logon { auth_len } => write!(f, "Logon[{auth_len}]"),
            OptionalHeader::WorldLogin => write!(f, "World Login"),
            OptionalHeader::Connect => write!(f, "Connect"),
            OptionalHeader::ConnectResponse => write!(f, "Connect Response"),
            OptionalHeader::NetError => write!(f, "Net Error"),
            OptionalHeader::NetErrorDisconnect => write!(f, "Net Error Disconnect"),
            OptionalHeader::CommandAck => write!(f, "Command Ack"),
            OptionalHeader::TimeSync => write!(f, "Time Sync"),
            OptionalHeader::EchoRequest => write!(f, "Echo Request"),
            OptionalHeader::EchoResponse => write!(f, "Echo Response"),
            OptionalHeader::Flow => write!(f, "Flow"),
        }
    }
}

/// Render a parsed header list the way diagnostics expect it
pub fn describe_headers(headers: &[OptionalHeader]) -> String {
    headers
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn skip(cur: &mut Cursor<&[u8]>, len: u64) -> io::Result<()> {
    let pos = cur.seek(SeekFrom::Current(len as i64))?;
    if pos > cur.get_ref().len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "optional header overruns datagram",
        ));
    }
    Ok(())
}

fn read_seq_id_list(cur: &mut Cursor<&[u8]>) -> io::Result<u32> {
    let count = cur.read_u32::<LittleEndian>()?;
    skip(cur, u64::from(count) * 4)?;
    Ok(count)
}

/// Consume every optional sub-header flagged in `header_flags`, in mask order
///
/// The blocks are concatenated positionally with no delimiters, so each one
/// is consumed at exactly its fixed width (the logon auth blob's length is
/// read out of the handshake itself).
pub fn read_optional_headers(
    header_flags: u32,
    cur: &mut Cursor<&[u8]>,
) -> io::Result<Vec<OptionalHeader>> {
    let mut headers = Vec::new();

    if header_flags & flags::SERVER_SWITCH != 0 {
        skip(cur, 8)?; // sequence + switch type
        headers.push(OptionalHeader::ServerSwitch);
    }
    if header_flags & flags::LOGON_SERVER_ADDR != 0 {
        skip(cur, 16)?; // sockaddr_in
        headers.push(OptionalHeader::LogonServerAddr);
    }
    if header_flags & flags::EMPTY_HEADER_1 != 0 {
        headers.push(OptionalHeader::EmptyHeader1);
    }
    if header_flags & flags::REFERRAL != 0 {
        skip(cur, 28)?; // cookie + sockaddr_in + server id + padding
        headers.push(OptionalHeader::Referral);
    }
    if header_flags & flags::NAK != 0 {
        let count = read_seq_id_list(cur)?;
        headers.push(OptionalHeader::Nak(count));
    }
    if header_flags & flags::EMPTY_ACK != 0 {
        let count = read_seq_id_list(cur)?;
        headers.push(OptionalHeader::EmptyAck(count));
    }
    if header_flags & flags::PAK != 0 {
        skip(cur, 4)?;
        headers.push(OptionalHeader::Pak);
    }
    if header_flags & flags::EMPTY_HEADER_2 != 0 {
        headers.push(OptionalHeader::EmptyHeader2);
    }
    if header_flags & flags::LOGON != 0 {
        skip(cur, 12)?; // client version, flags, timestamp
        let auth_len = cur.read_u32::<LittleEndian>()?;
        skip(cur, u64::from(auth_len))?;
        headers.push(OptionalHeader::Logon { auth_len });
    }
    if header_flags & flags::WORLD_LOGIN != 0 {
        skip(cur, 4)?;
        headers.push(OptionalHeader::WorldLogin);
    }
    if header_flags & flags::CONNECT != 0 {
        skip(cur, 32)?; // server time, cookie, net id, seeds
        headers.push(OptionalHeader::Connect);
    }
    if header_flags & flags::CONNECT_RESPONSE != 0 {
        skip(cur, 4)?;
        headers.push(OptionalHeader::ConnectResponse);
    }
    if header_flags & flags::NET_ERROR != 0 {
        skip(cur, 8)?;
        headers.push(OptionalHeader::NetError);
    }
    if header_flags & flags::NET_ERROR_DISCONNECT != 0 {
        skip(cur, 8)?;
        headers.push(OptionalHeader::NetErrorDisconnect);
    }
    if header_flags & flags::COMMAND_ACK != 0 {
        skip(cur, 8)?;
        headers.push(OptionalHeader::CommandAck);
    }
    if header_flags & flags::TIME_SYNC != 0 {
        skip(cur, 8)?; // f64 server time
        headers.push(OptionalHeader::TimeSync);
    }
    if header_flags & flags::ECHO_REQUEST != 0 {
        skip(cur, 4)?; // f32 client time
        headers.push(OptionalHeader::EchoRequest);
    }
    if header_flags & flags::ECHO_RESPONSE != 0 {
        skip(cur, 8)?; // f32 client time + f32 holding time
        headers.push(OptionalHeader::EchoResponse);
    }
    if header_flags & flags::FLOW != 0 {
        skip(cur, 6)?; // bytes received + interval
        headers.push(OptionalHeader::Flow);
    }

    Ok(headers)
}

/// Read a message opcode, unwrapping ordered-event wrappers
///
/// A game-event wrapper carries an 8-byte object/sequence header, a
/// game-action wrapper a 4-byte sequence header; the real opcode follows.
pub fn read_opcode(cur: &mut Cursor<&[u8]>) -> io::Result<Opcode> {
    let mut raw = cur.read_u32::<LittleEndian>()?;
    if Opcode::from_raw(raw) == Opcode::GameEvent {
        skip(cur, 8)?;
        raw = cur.read_u32::<LittleEndian>()?;
    }
    if Opcode::from_raw(raw) == Opcode::GameAction {
        skip(cur, 4)?;
        raw = cur.read_u32::<LittleEndian>()?;
    }
    Ok(Opcode::from_raw(raw))
}
