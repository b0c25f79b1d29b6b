//! CRC32 helpers for the fixed size index records.  The CRC code always occupies the last four
//! bytes of a record in little endian format and covers every byte before it.

/// True if the trailing crc32 of buffer matches the rest of the buffer.
/// Buffers too short to hold a CRC and at least one byte of data never check.
pub(crate) fn check_crc(buffer: &[u8]) -> bool {
    let len = buffer.len();
    if len < 5 {
        return false;
    }
    let (data, code) = buffer.split_at(len - 4);
    let mut buf32 = [0_u8; 4];
    buf32.copy_from_slice(code);
    crc32fast::hash(data) == u32::from_le_bytes(buf32)
}

/// Overwrite the last four bytes of buffer with the crc32 of the bytes before them.
pub(crate) fn add_crc32(buffer: &mut [u8]) {
    let len = buffer.len();
    if len < 4 {
        return;
    }
    let crc32 = crc32fast::hash(&buffer[..len - 4]);
    buffer[len - 4..].copy_from_slice(&crc32.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_detects_flip() {
        let mut buffer = vec![7_u8; 32];
        add_crc32(&mut buffer);
        assert!(check_crc(&buffer));
        buffer[3] ^= 0x10;
        assert!(!check_crc(&buffer));
    }

    #[test]
    fn test_short_buffers() {
        let mut tiny = [0_u8; 3];
        add_crc32(&mut tiny);
        assert_eq!(tiny, [0_u8; 3]);
        assert!(!check_crc(&[0_u8; 4]));
    }
}
