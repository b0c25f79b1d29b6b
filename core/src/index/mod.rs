//! The on-disk index: a fixed header, a table of bucket slots and an append only region of
//! fixed size entries.  All "pointers" are byte offsets into the index file.
//!
//! ```text
//! 0                    header (HEADER_SIZE bytes, written once)
//! bucket_table_offset  bucket_count slots, each the u64 offset of the newest entry in its chain
//! entry_region_offset  entries appended in build order, each linking to the previous chain head
//! ```
//!
//! All integers are little endian.  Changing any size or field order invalidates existing files
//! (bump VERSION).

use std::io;
use std::io::{Read, Seek, SeekFrom, Write};

pub mod builder;
pub(crate) mod chain_iter;
pub(crate) mod entry;
pub mod header;
pub mod probe;
pub mod reader;

/// Slot or link value meaning "no entry".  Same bit pattern as -1 in a signed field.
pub const EMPTY_SLOT: u64 = u64::MAX;
/// Size of one bucket slot (a u64 entry offset).
pub const BUCKET_SLOT_SIZE: usize = 8;

/// Read the head entry offset of the slot at slot_pos.
pub(crate) fn read_bucket_head<R: Read + Seek>(source: &mut R, slot_pos: u64) -> io::Result<u64> {
    source.seek(SeekFrom::Start(slot_pos))?;
    let mut buf64 = [0_u8; 8];
    source.read_exact(&mut buf64)?;
    Ok(u64::from_le_bytes(buf64))
}

/// Write the whole bucket table starting at table_pos.
pub(crate) fn write_bucket_table<W: Write + Seek>(
    sync: &mut W,
    table_pos: u64,
    heads: &[u64],
) -> io::Result<()> {
    let mut buffer = vec![0_u8; heads.len() * BUCKET_SLOT_SIZE];
    for (slot, head) in buffer.chunks_exact_mut(BUCKET_SLOT_SIZE).zip(heads) {
        slot.copy_from_slice(&head.to_le_bytes());
    }
    sync.seek(SeekFrom::Start(table_pos))?;
    sync.write_all(&buffer)?;
    Ok(())
}
