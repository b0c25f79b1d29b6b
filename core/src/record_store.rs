//! Read access to the newline delimited record store (a CSV file with a header line).

use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Buffered reader over the record store that knows the byte offset of every line it returns.
pub struct RecordStore {
    reader: BufReader<File>,
    len: u64,
    pos: u64,
}

impl RecordStore {
    /// Open the record store at path for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            len,
            pos: 0,
        })
    }

    /// Size of the record store in bytes when opened.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if the record store has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the next line into buf (line terminator removed).  Returns the offset the line
    /// started at or None at end of file.
    pub fn next_line(&mut self, buf: &mut Vec<u8>) -> io::Result<Option<u64>> {
        buf.clear();
        let start = self.pos;
        let read = self.reader.read_until(b'\n', buf)?;
        if read == 0 {
            return Ok(None);
        }
        self.pos += read as u64;
        strip_line_end(buf);
        Ok(Some(start))
    }

    /// Read the line starting at offset, None if offset is at or past the end of the file.
    /// Invalid UTF-8 is replaced, not rejected.
    pub fn read_line_at(&mut self, offset: u64) -> io::Result<Option<String>> {
        if offset != self.pos {
            self.reader.seek(SeekFrom::Start(offset))?;
            self.pos = offset;
        }
        let mut buf = Vec::new();
        Ok(self
            .next_line(&mut buf)?
            .map(|_| String::from_utf8_lossy(&buf).into_owned()))
    }
}

fn strip_line_end(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}
