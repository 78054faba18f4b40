//! Builders producing wire-accurate capture bytes for tests
//!
//! Everything is layered the way real captures are: classic container frames
//! wrapping Ethernet/IPv4/UDP, a game transport header, and a fragment stream
//! carrying the message bytes.

/// Game-server port used for inbound traffic in fixtures
pub const SERVER_PORT: u16 = 9000;
/// Client-side ephemeral port used in fixtures
pub const CLIENT_PORT: u16 = 51234;

/// Transport flag marking a fragment stream
pub const HAS_FRAGMENTS: u32 = 0x4;

/// Builder for a classic-container capture file
pub struct CaptureBuilder {
    data: Vec<u8>,
}

impl CaptureBuilder {
    pub fn new() -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(&0xA1B2_C3D4u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 20]);
        Self { data }
    }

    /// Append one frame with the standard 16-byte header
    pub fn frame(mut self, sec: u32, payload: &[u8]) -> Self {
        self.data.extend_from_slice(&sec.to_le_bytes());
        self.data.extend_from_slice(&0u32.to_le_bytes());
        self.data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    /// Append a frame header declaring `declared` bytes without any payload
    pub fn bare_header(mut self, sec: u32, declared: u32) -> Self {
        self.data.extend_from_slice(&sec.to_le_bytes());
        self.data.extend_from_slice(&0u32.to_le_bytes());
        self.data.extend_from_slice(&declared.to_le_bytes());
        self.data.extend_from_slice(&declared.to_le_bytes());
        self
    }

    /// Append raw trailing bytes, for truncation fixtures
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Append an inbound game frame carrying one complete single-fragment
    /// message
    pub fn inbound_message(self, sec: u32, blob_id: u64, message: &[u8]) -> Self {
        let frag = fragment(blob_id, 0, 1, message);
        self.frame(sec, &game_frame(SERVER_PORT, CLIENT_PORT, &transport(HAS_FRAGMENTS, &frag)))
    }

    /// Append an outbound game frame carrying one complete single-fragment
    /// message
    pub fn outbound_message(self, sec: u32, blob_id: u64, message: &[u8]) -> Self {
        let frag = fragment(blob_id, 0, 1, message);
        self.frame(sec, &game_frame(CLIENT_PORT, SERVER_PORT, &transport(HAS_FRAGMENTS, &frag)))
    }

    /// Append an inbound game frame carrying one fragment of a larger blob
    pub fn inbound_fragment(
        self,
        sec: u32,
        blob_id: u64,
        index: u16,
        count: u16,
        payload: &[u8],
    ) -> Self {
        let frag = fragment(blob_id, index, count, payload);
        self.frame(sec, &game_frame(SERVER_PORT, CLIENT_PORT, &transport(HAS_FRAGMENTS, &frag)))
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for CaptureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Ethernet + IPv4 + UDP envelope around a game datagram
pub fn game_frame(source_port: u16, dest_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; 12];
    out.extend_from_slice(&0x0800u16.to_be_bytes()); // IPv4
    let mut ip = [0u8; 20];
    ip[9] = 17; // UDP
    out.extend_from_slice(&ip);
    out.extend_from_slice(&source_port.to_be_bytes());
    out.extend_from_slice(&dest_port.to_be_bytes());
    out.extend_from_slice(&((payload.len() as u16 + 8).to_be_bytes()));
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// 20-byte game transport header followed by the body
pub fn transport(flags: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&1u32.to_le_bytes()); // sequence
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // checksum
    out.extend_from_slice(&[0u8; 4]); // recipient + time since last
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // table
    out.extend_from_slice(body);
    out
}

/// 16-byte fragment header followed by the payload
pub fn fragment(blob_id: u64, index: u16, count: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&blob_id.to_le_bytes());
    out.extend_from_slice(&3u16.to_le_bytes()); // queue id
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&((payload.len() as u16 + 16).to_le_bytes()));
    out.extend_from_slice(&index.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Message bytes: opcode, subject id, zero tail
pub fn message(opcode: u32, subject: u32, tail_len: usize) -> Vec<u8> {
    let mut out = opcode.to_le_bytes().to_vec();
    out.extend_from_slice(&subject.to_le_bytes());
    out.resize(8 + tail_len, 0);
    out
}
