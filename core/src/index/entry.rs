//! Fixed size index entries: a zero padded key, the record offset and the link to the previous
//! head of the same chain, followed by a CRC32 of those bytes.

use crate::crc::{add_crc32, check_crc};

/// Bytes following the key: record offset, next link and crc.
const ENTRY_TAIL_SIZE: usize = 8 + 8 + 4;

/// Size of an entry for a key capacity.
pub(crate) fn entry_size(key_capacity: u16) -> usize {
    key_capacity as usize + ENTRY_TAIL_SIZE
}

/// Longest key (in bytes) an entry stores, one byte is always left as a terminator.
pub(crate) fn max_key_len(key_capacity: u16) -> usize {
    (key_capacity as usize).saturating_sub(1)
}

/// Cut bytes down to what an entry with key_capacity can hold.
pub(crate) fn truncate_key(key: &[u8], key_capacity: u16) -> &[u8] {
    let max = max_key_len(key_capacity);
    if key.len() > max {
        &key[..max]
    } else {
        key
    }
}

/// A decoded entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub key: Vec<u8>,
    pub record_offset: u64,
    pub next: u64,
}

/// Encode an entry into buffer (which must be entry_size(key_capacity) long).
pub(crate) fn encode_entry(
    buffer: &mut [u8],
    key_capacity: u16,
    key: &[u8],
    record_offset: u64,
    next: u64,
) {
    let cap = key_capacity as usize;
    let key = truncate_key(key, key_capacity);
    buffer[..cap].fill(0);
    buffer[..key.len()].copy_from_slice(key);
    let mut pos = cap;
    buffer[pos..(pos + 8)].copy_from_slice(&record_offset.to_le_bytes());
    pos += 8;
    buffer[pos..(pos + 8)].copy_from_slice(&next.to_le_bytes());
    add_crc32(buffer);
}

/// Decode an entry, None if the crc does not match.
pub(crate) fn decode_entry(buffer: &[u8], key_capacity: u16) -> Option<Entry> {
    if !check_crc(buffer) {
        return None;
    }
    let cap = key_capacity as usize;
    let key_len = buffer[..cap].iter().position(|b| *b == 0).unwrap_or(cap);
    let mut buf64 = [0_u8; 8];
    let mut pos = cap;
    buf64.copy_from_slice(&buffer[pos..(pos + 8)]);
    let record_offset = u64::from_le_bytes(buf64);
    pos += 8;
    buf64.copy_from_slice(&buffer[pos..(pos + 8)]);
    let next = u64::from_le_bytes(buf64);
    Some(Entry {
        key: buffer[..key_len].to_vec(),
        record_offset,
        next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EMPTY_SLOT;

    #[test]
    fn test_entry_encode_decode() {
        let mut buffer = vec![0_u8; entry_size(16)];
        encode_entry(&mut buffer, 16, b"Graph Theory", 4096, EMPTY_SLOT);
        let entry = decode_entry(&buffer, 16).unwrap();
        assert_eq!(entry.key, b"Graph Theory");
        assert_eq!(entry.record_offset, 4096);
        assert_eq!(entry.next, EMPTY_SLOT);
    }

    #[test]
    fn test_long_key_truncated() {
        let mut buffer = vec![0_u8; entry_size(8)];
        encode_entry(&mut buffer, 8, b"abcdefghijkl", 1, 2);
        let entry = decode_entry(&buffer, 8).unwrap();
        assert_eq!(entry.key, b"abcdefg");
        assert_eq!(truncate_key(b"abc", 8), b"abc");
    }

    #[test]
    fn test_corrupt_entry() {
        let mut buffer = vec![0_u8; entry_size(8)];
        encode_entry(&mut buffer, 8, b"key", 1, 2);
        buffer[9] ^= 0xff;
        assert!(decode_entry(&buffer, 8).is_none());
        assert!(decode_entry(&vec![0_u8; entry_size(8)], 8).is_none());
    }
}
