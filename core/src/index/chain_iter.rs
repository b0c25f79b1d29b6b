//! Iterates the entries of one bucket chain, newest first.

use crate::index::entry::{decode_entry, Entry};
use crate::index::EMPTY_SLOT;
use std::io::{Read, Seek, SeekFrom};

/// Follows next links from a bucket head.  Stops at the empty sentinel, on an io error, a crc
/// failure or a link that does not point at an older entry inside the entry region.  Links always
/// point to lower offsets so a corrupt file can not make this loop.
pub(crate) struct ChainIter<'src, R: Read + Seek + ?Sized> {
    index_file: &'src mut R,
    buffer: Vec<u8>,
    key_capacity: u16,
    entry_region_offset: u64,
    entry_region_end: u64,
    next_pos: u64,
    // Offset of the previously returned entry, the next one must be strictly below it.
    last_pos: u64,
    failed: bool,
}

impl<'src, R: Read + Seek + ?Sized> ChainIter<'src, R> {
    pub(crate) fn new(
        index_file: &'src mut R,
        head: u64,
        key_capacity: u16,
        entry_region_offset: u64,
        entry_region_end: u64,
    ) -> Self {
        let buffer = vec![0_u8; crate::index::entry::entry_size(key_capacity)];
        Self {
            index_file,
            buffer,
            key_capacity,
            entry_region_offset,
            entry_region_end,
            next_pos: head,
            last_pos: u64::MAX,
            failed: false,
        }
    }

    /// True if the chain ended early because of a bad link, io error or crc failure.
    pub(crate) fn failed(&self) -> bool {
        self.failed
    }

    fn valid_pos(&self, pos: u64) -> bool {
        pos >= self.entry_region_offset
            && pos < self.last_pos
            && pos
                .checked_add(self.buffer.len() as u64)
                .map(|end| end <= self.entry_region_end)
                .unwrap_or(false)
    }

    fn fail(&mut self) -> Option<Entry> {
        self.failed = true;
        self.next_pos = EMPTY_SLOT;
        None
    }
}

impl<'src, R: Read + Seek + ?Sized> Iterator for ChainIter<'src, R> {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_pos == EMPTY_SLOT {
            return None;
        }
        let pos = self.next_pos;
        if !self.valid_pos(pos) {
            return self.fail();
        }
        if self.index_file.seek(SeekFrom::Start(pos)).is_err()
            || self.index_file.read_exact(&mut self.buffer[..]).is_err()
        {
            return self.fail();
        }
        match decode_entry(&self.buffer, self.key_capacity) {
            Some(entry) => {
                self.last_pos = pos;
                self.next_pos = entry.next;
                Some(entry)
            }
            None => self.fail(),
        }
    }
}
