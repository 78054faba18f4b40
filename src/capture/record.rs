//! Assembled capture records
//!
//! A [`CaptureRecord`] is one complete application message: an assembled blob
//! (or a single non-fragmented message) together with the metadata replay and
//! segmentation need. Records carry their position in the overall ingestion
//! order; that order is what the scheduler walks.

use crate::capture::fragment::{try_assemble, BlobFragment};
use crate::capture::proto::OptionalHeader;
use crate::types::{Direction, Opcode, Timestamp};

/// One complete application message recovered from the capture
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    /// Position in ingestion order
    pub index: usize,
    /// Direction of the frame(s) that carried this message
    pub direction: Direction,
    /// Frame timestamp attributed to this message (the carrying frame, or
    /// the frame with its opening fragment when assembled across frames)
    pub timestamp: Timestamp,
    /// Assembled message bytes, opcode first
    pub data: Vec<u8>,
    /// Opcodes seen in this record, wrapper headers unwrapped
    pub opcodes: Vec<Opcode>,
    /// Optional sub-headers of the carrying datagram, for diagnostics
    pub headers: Vec<OptionalHeader>,
    /// Free-form ingestion notes (decode anomalies and the like)
    pub notes: Option<String>,
    /// Delivery queue of the blob, 0 for non-fragmented messages
    pub queue_id: u16,
    /// Number of fragments this message was assembled from
    pub fragment_count: u16,
}

impl CaptureRecord {
    /// The leading opcode, if the record decoded one
    pub fn opcode(&self) -> Option<Opcode> {
        self.opcodes.first().copied()
    }

    /// Whether this record leads with the given opcode
    pub fn leads_with(&self, opcode: Opcode) -> bool {
        self.opcode() == Some(opcode)
    }

    /// Whole-second timestamp, the granularity replay paces at
    pub fn seconds(&self) -> u32 {
        self.timestamp.seconds()
    }
}

/// A blob still being collected from the fragment stream
///
/// Direction and timestamp come from the frame carrying fragment index 0; a
/// blob whose opening fragment arrives late picks them up then.
#[derive(Debug, Default)]
pub struct OpenBlob {
    pub fragments: Vec<BlobFragment>,
    pub direction: Option<Direction>,
    pub timestamp: Option<Timestamp>,
    pub headers: Vec<OptionalHeader>,
}

impl OpenBlob {
    /// Add a fragment, capturing frame metadata from the opening fragment
    pub fn push(
        &mut self,
        fragment: BlobFragment,
        direction: Direction,
        timestamp: Timestamp,
        headers: &[OptionalHeader],
    ) {
        if fragment.header.index == 0 {
            self.direction = Some(direction);
            self.timestamp = Some(timestamp);
            self.headers = headers.to_vec();
        }
        self.fragments.push(fragment);
    }

    /// Assemble into message bytes if the fragment set is complete
    ///
    /// On success the blob is consumed; returns the message data together
    /// with the queue id and fragment count for the record.
    pub fn try_finish(&mut self) -> Option<(Vec<u8>, Direction, Timestamp, u16, u16)> {
        let data = try_assemble(&mut self.fragments)?;
        let direction = self.direction?;
        let timestamp = self.timestamp?;
        let queue_id = self.fragments[0].header.queue_id;
        let count = self.fragments[0].header.count;
        Some((data, direction, timestamp, queue_id, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fragment::{FragmentHeader, FRAGMENT_HEADER_LEN};

    fn fragment(index: u16, count: u16, payload: &[u8]) -> BlobFragment {
        BlobFragment {
            header: FragmentHeader {
                blob_id: 0x77,
                queue_id: 9,
                count,
                size: FRAGMENT_HEADER_LEN + payload.len() as u16,
                index,
            },
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_open_blob_metadata_from_opening_fragment() {
        let mut blob = OpenBlob::default();
        let ts0 = Timestamp::Classic { sec: 5, usec: 0 };
        let ts1 = Timestamp::Classic { sec: 6, usec: 0 };

        blob.push(fragment(1, 2, b"tail"), Direction::Outbound, ts1, &[]);
        assert!(blob.try_finish().is_none());
        assert!(blob.direction.is_none());

        blob.push(fragment(0, 2, b"head"), Direction::Inbound, ts0, &[]);
        let (data, direction, timestamp, queue_id, count) = blob.try_finish().unwrap();
        assert_eq!(data, b"headtail");
        assert_eq!(direction, Direction::Inbound);
        assert_eq!(timestamp, ts0);
        assert_eq!(queue_id, 9);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_record_leading_opcode() {
        let record = CaptureRecord {
            index: 0,
            direction: Direction::Inbound,
            timestamp: Timestamp::Classic { sec: 1, usec: 0 },
            data: vec![0x51, 0xF7, 0, 0],
            opcodes: vec![Opcode::PlayerTeleport],
            headers: Vec::new(),
            notes: None,
            queue_id: 0,
            fragment_count: 0,
        };
        assert!(record.leads_with(Opcode::PlayerTeleport));
        assert!(!record.leads_with(Opcode::ExitGame));
        assert_eq!(record.seconds(), 1);
    }
}
