//! Blob fragments and reassembly
//!
//! Large application messages ("blobs") are split into fragments for
//! transmission. Each fragment carries a 16-byte header: the 64-bit blob id
//! (top bit = ephemeral flag, with embedded ordering-type and sequence-id
//! fields), the queue id, the declared total fragment count, the declared
//! fragment size (inclusive of the header itself) and the fragment's index
//! within the blob.
//!
//! A blob is complete exactly when the collected indices are {0..count-1}
//! with no gaps. Fragments may arrive out of order and duplicated; both are
//! tolerated. Trailing blobs that never complete are normal in real captures
//! and are dropped, not reported.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Size of the fragment header on the wire
pub const FRAGMENT_HEADER_LEN: u16 = 16;

/// Blob id bit carrying the ephemeral flag
pub const EPHEMERAL_FLAG: u64 = 0x8000_0000_0000_0000;

const ORDERING_TYPE_MASK: u64 = 0x1F00_0000_0000_0000;
const SEQUENCE_ID_MASK: u64 = 0x00FF_0000_FFFF_FFFF;

/// Whether a blob id has its ephemeral flag set
pub fn is_ephemeral(blob_id: u64) -> bool {
    blob_id & EPHEMERAL_FLAG != 0
}

/// The ordering-type field embedded in a blob id
pub fn ordering_type(blob_id: u64) -> u64 {
    blob_id & ORDERING_TYPE_MASK
}

/// The sequence id embedded in a blob id
pub fn sequence_id(blob_id: u64) -> u64 {
    blob_id & SEQUENCE_ID_MASK
}

/// Parsed fragment header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Blob this fragment belongs to
    pub blob_id: u64,
    /// Delivery queue classifier
    pub queue_id: u16,
    /// Declared total number of fragments in the blob
    pub count: u16,
    /// Declared size of this fragment including the header
    pub size: u16,
    /// Index of this fragment within the blob
    pub index: u16,
}

/// One fragment: header plus payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFragment {
    pub header: FragmentHeader,
    pub payload: Vec<u8>,
}

/// Why a fragment could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentError {
    /// The datagram ended inside the fragment header
    Truncated,
    /// Declared size smaller than the header itself; the stream cannot be
    /// advanced past this point
    BadSize { declared: u16 },
}

/// Read one fragment from a datagram cursor
///
/// The payload is `declared size - 16` bytes; if the datagram holds fewer,
/// the remainder is taken as-is (captures are routinely clipped).
pub fn read_fragment(cur: &mut Cursor<&[u8]>) -> Result<BlobFragment, FragmentError> {
    let header = FragmentHeader {
        blob_id: cur.read_u64::<LittleEndian>().map_err(|_| FragmentError::Truncated)?,
        queue_id: cur.read_u16::<LittleEndian>().map_err(|_| FragmentError::Truncated)?,
        count: cur.read_u16::<LittleEndian>().map_err(|_| FragmentError::Truncated)?,
        size: cur.read_u16::<LittleEndian>().map_err(|_| FragmentError::Truncated)?,
        index: cur.read_u16::<LittleEndian>().map_err(|_| FragmentError::Truncated)?,
    };

    if header.size < FRAGMENT_HEADER_LEN {
        return Err(FragmentError::BadSize { declared: header.size });
    }

    let declared = usize::from(header.size - FRAGMENT_HEADER_LEN);
    let start = cur.position() as usize;
    let available = cur.get_ref().len().saturating_sub(start);
    let take = declared.min(available);
    let payload = cur.get_ref()[start..start + take].to_vec();
    cur.set_position((start + take) as u64);

    Ok(BlobFragment { header, payload })
}

/// Assemble a blob if its fragment set is complete
///
/// Sorts by fragment index, removes duplicate indices, and verifies the
/// remaining set covers exactly {0..declared count - 1} before concatenating
/// the payloads in index order. Returns `None` while fragments are missing.
/// Duplicates are dropped up front so they can never stand in for an index
/// that was never received.
pub fn try_assemble(fragments: &mut Vec<BlobFragment>) -> Option<Vec<u8>> {
    if fragments.is_empty() {
        return None;
    }
    fragments.sort_by_key(|f| f.header.index);
    fragments.dedup_by_key(|f| f.header.index);

    let declared = fragments[0].header.count;
    if declared == 0 {
        return None;
    }
    let last = fragments[fragments.len() - 1].header.index;
    if fragments.len() != usize::from(declared)
        || fragments[0].header.index != 0
        || last != declared - 1
    {
        return None;
    }

    let total: usize = fragments.iter().map(|f| f.payload.len()).sum();
    let mut data = Vec::with_capacity(total);
    for fragment in fragments.iter() {
        data.extend_from_slice(&fragment.payload);
    }
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fragment(blob_id: u64, index: u16, count: u16, payload: &[u8]) -> BlobFragment {
        BlobFragment {
            header: FragmentHeader {
                blob_id,
                queue_id: 3,
                count,
                size: FRAGMENT_HEADER_LEN + payload.len() as u16,
                index,
            },
            payload: payload.to_vec(),
        }
    }

    fn encode(frag: &BlobFragment) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&frag.header.blob_id.to_le_bytes());
        out.extend_from_slice(&frag.header.queue_id.to_le_bytes());
        out.extend_from_slice(&frag.header.count.to_le_bytes());
        out.extend_from_slice(&frag.header.size.to_le_bytes());
        out.extend_from_slice(&frag.header.index.to_le_bytes());
        out.extend_from_slice(&frag.payload);
        out
    }

    #[test]
    fn test_blob_id_fields() {
        let id = EPHEMERAL_FLAG | 0x0300_0000_0000_0000 | 0x0042_0000_0000_1234;
        assert!(is_ephemeral(id));
        assert_eq!(ordering_type(id), 0x0300_0000_0000_0000);
        assert_eq!(sequence_id(id), 0x0042_0000_0000_1234);
        assert!(!is_ephemeral(id & !EPHEMERAL_FLAG));
    }

    #[test]
    fn test_read_fragment_round_trip() {
        let frag = fragment(0x10, 1, 4, b"hello");
        let bytes = encode(&frag);
        let mut cur = Cursor::new(bytes.as_slice());
        let parsed = read_fragment(&mut cur).unwrap();
        assert_eq!(parsed, frag);
        assert_eq!(cur.position() as usize, bytes.len());
    }

    #[test]
    fn test_read_fragment_bad_size() {
        let mut frag = fragment(0x10, 0, 1, b"");
        frag.header.size = 12;
        let bytes = encode(&frag);
        let mut cur = Cursor::new(bytes.as_slice());
        assert_eq!(
            read_fragment(&mut cur),
            Err(FragmentError::BadSize { declared: 12 })
        );
    }

    #[test]
    fn test_read_fragment_truncated_header() {
        let bytes = [0u8; 10];
        let mut cur = Cursor::new(bytes.as_slice());
        assert_eq!(read_fragment(&mut cur), Err(FragmentError::Truncated));
    }

    #[test]
    fn test_assemble_incomplete() {
        let mut frags = vec![fragment(1, 0, 3, b"aa"), fragment(1, 2, 3, b"cc")];
        assert_eq!(try_assemble(&mut frags), None);
    }

    #[test]
    fn test_duplicate_does_not_mask_gap() {
        // index 1 never arrived; the duplicate of index 0 must not stand in
        // for it
        let mut frags = vec![
            fragment(1, 0, 3, b"aa"),
            fragment(1, 0, 3, b"aa"),
            fragment(1, 2, 3, b"cc"),
        ];
        assert_eq!(try_assemble(&mut frags), None);
        // the real middle fragment completes the blob
        frags.push(fragment(1, 1, 3, b"bb"));
        assert_eq!(try_assemble(&mut frags), Some(b"aabbcc".to_vec()));
    }

    #[test]
    fn test_assemble_missing_first() {
        let mut frags = vec![fragment(1, 1, 2, b"bb"), fragment(1, 1, 2, b"bb")];
        assert_eq!(try_assemble(&mut frags), None);
    }

    #[test]
    fn test_assemble_in_index_order() {
        let mut frags = vec![
            fragment(1, 2, 3, b"cc"),
            fragment(1, 0, 3, b"aa"),
            fragment(1, 1, 3, b"bb"),
        ];
        assert_eq!(try_assemble(&mut frags), Some(b"aabbcc".to_vec()));
    }

    proptest! {
        // Reassembly is order-independent and duplicate-tolerant: any
        // permutation of the fragments, with any one fragment injected twice,
        // assembles to the same payload.
        #[test]
        fn prop_assemble_any_permutation(
            order in Just((0u16..6).collect::<Vec<u16>>()).prop_shuffle(),
            dup in 0u16..6,
        ) {
            let payloads: Vec<Vec<u8>> =
                (0u8..6).map(|i| vec![i; usize::from(i) + 1]).collect();
            let expected: Vec<u8> = payloads.concat();

            let mut frags: Vec<BlobFragment> = order
                .iter()
                .map(|&i| fragment(9, i, 6, &payloads[usize::from(i)]))
                .collect();
            frags.push(fragment(9, dup, 6, &payloads[usize::from(dup)]));

            prop_assert_eq!(try_assemble(&mut frags), Some(expected));
        }
    }
}
