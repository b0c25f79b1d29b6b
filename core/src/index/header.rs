//! Contains the index header structure and code.

use crate::crc::{add_crc32, check_crc};
use crate::error::LoadHeaderError;
use crate::fxhasher::FxHasher;
use crate::index::entry::entry_size;
use crate::index::BUCKET_SLOT_SIZE;
use crate::index_config::IndexConfig;
use crate::key_hasher::KeyHasher;
use std::hash::{BuildHasher, Hasher};
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};

/// Size of an index header.
pub const HEADER_SIZE: usize = 72;
/// Current on-disk format version.
pub const VERSION: u16 = 1;
const TYPE_ID: &[u8; 8] = b"tidx.idx";

/// Header for an index file.  Written once at offset 0 when the index is built, it is the only
/// source of truth for where the bucket table and entries live.
/// The header is followed by a CRC32 checksum value to verify it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    version: u16,
    bucket_count: u32,
    key_capacity: u16,
    bucket_table_offset: u64,
    entry_region_offset: u64,
    record_store_len: u64,
    salt: u64,
    pepper: u64,
}

impl IndexHeader {
    /// Return a header for a fresh index built from config.
    /// record_store_len is the size of the record store at build time.
    pub fn new<S: BuildHasher + Default>(
        config: &IndexConfig,
        record_store_len: u64,
        hasher: &KeyHasher<S>,
    ) -> Self {
        let bucket_count = config.bucket_count;
        let salt = Self::salt(bucket_count, config.key_capacity);
        Self {
            version: VERSION,
            bucket_count,
            key_capacity: config.key_capacity,
            bucket_table_offset: HEADER_SIZE as u64,
            entry_region_offset: Self::entry_region_for(bucket_count),
            record_store_len,
            salt,
            pepper: hasher.pepper(salt),
        }
    }

    /// Salt is always derived with FxHasher so it does not depend on the hasher being checked.
    fn salt(bucket_count: u32, key_capacity: u16) -> u64 {
        let mut fx_hasher = FxHasher::default();
        fx_hasher.write(TYPE_ID);
        fx_hasher.write_u32(bucket_count);
        fx_hasher.write_u16(key_capacity);
        fx_hasher.finish()
    }

    fn entry_region_for(bucket_count: u32) -> u64 {
        (HEADER_SIZE + bucket_count as usize * BUCKET_SLOT_SIZE) as u64
    }

    /// Load an IndexHeader from a file.  This will seek to the beginning and leave the file
    /// positioned after the header.
    pub fn load_header<R: Read + Seek>(source: &mut R) -> Result<Self, LoadHeaderError> {
        source.seek(SeekFrom::Start(0))?;
        let mut buffer = [0_u8; HEADER_SIZE];
        let mut buf16 = [0_u8; 2];
        let mut buf32 = [0_u8; 4];
        let mut buf64 = [0_u8; 8];
        source.read_exact(&mut buffer[..])?;
        if !check_crc(&buffer[..]) {
            return Err(LoadHeaderError::CrcFailed);
        }
        if &buffer[0..8] != TYPE_ID {
            return Err(LoadHeaderError::InvalidType);
        }
        let mut pos = 8;
        buf16.copy_from_slice(&buffer[pos..(pos + 2)]);
        let version = u16::from_le_bytes(buf16);
        pos += 2;
        if version != VERSION {
            return Err(LoadHeaderError::InvalidVersion(version));
        }
        buf32.copy_from_slice(&buffer[pos..(pos + 4)]);
        let bucket_count = u32::from_le_bytes(buf32);
        pos += 4;
        buf16.copy_from_slice(&buffer[pos..(pos + 2)]);
        let key_capacity = u16::from_le_bytes(buf16);
        pos += 2;
        buf64.copy_from_slice(&buffer[pos..(pos + 8)]);
        let bucket_table_offset = u64::from_le_bytes(buf64);
        pos += 8;
        buf64.copy_from_slice(&buffer[pos..(pos + 8)]);
        let entry_region_offset = u64::from_le_bytes(buf64);
        pos += 8;
        buf64.copy_from_slice(&buffer[pos..(pos + 8)]);
        let record_store_len = u64::from_le_bytes(buf64);
        pos += 8;
        buf64.copy_from_slice(&buffer[pos..(pos + 8)]);
        let salt = u64::from_le_bytes(buf64);
        pos += 8;
        buf64.copy_from_slice(&buffer[pos..(pos + 8)]);
        let pepper = u64::from_le_bytes(buf64);
        let header = Self {
            version,
            bucket_count,
            key_capacity,
            bucket_table_offset,
            entry_region_offset,
            record_store_len,
            salt,
            pepper,
        };
        if !header.valid_layout() {
            return Err(LoadHeaderError::InvalidLayout);
        }
        Ok(header)
    }

    /// A 0 bucket count is tolerated here (the reader falls back to a default) so only the parts
    /// that do not depend on it are checked in that case.
    fn valid_layout(&self) -> bool {
        if self.bucket_table_offset != HEADER_SIZE as u64 || self.key_capacity < 2 {
            return false;
        }
        if self.bucket_count == 0 {
            self.entry_region_offset >= HEADER_SIZE as u64
        } else {
            self.entry_region_offset == Self::entry_region_for(self.bucket_count)
        }
    }

    /// Write this header at the start of sync.
    pub fn write_header<W: Write + Seek>(&self, sync: &mut W) -> Result<(), io::Error> {
        let mut buffer = [0_u8; HEADER_SIZE];
        let mut pos = 0;
        buffer[pos..8].copy_from_slice(TYPE_ID);
        pos += 8;
        buffer[pos..(pos + 2)].copy_from_slice(&self.version.to_le_bytes());
        pos += 2;
        buffer[pos..(pos + 4)].copy_from_slice(&self.bucket_count.to_le_bytes());
        pos += 4;
        buffer[pos..(pos + 2)].copy_from_slice(&self.key_capacity.to_le_bytes());
        pos += 2;
        buffer[pos..(pos + 8)].copy_from_slice(&self.bucket_table_offset.to_le_bytes());
        pos += 8;
        buffer[pos..(pos + 8)].copy_from_slice(&self.entry_region_offset.to_le_bytes());
        pos += 8;
        buffer[pos..(pos + 8)].copy_from_slice(&self.record_store_len.to_le_bytes());
        pos += 8;
        buffer[pos..(pos + 8)].copy_from_slice(&self.salt.to_le_bytes());
        pos += 8;
        buffer[pos..(pos + 8)].copy_from_slice(&self.pepper.to_le_bytes());
        pos += 8;
        // Reserved bytes stay zero up to the crc.
        assert!(pos <= HEADER_SIZE - 4);
        add_crc32(&mut buffer[..]);
        sync.seek(SeekFrom::Start(0))?;
        sync.write_all(&buffer)?;
        Ok(())
    }

    /// Error unless this index was built with a hasher that agrees with hasher.
    pub fn verify_hasher<S: BuildHasher + Default>(
        &self,
        hasher: &KeyHasher<S>,
    ) -> Result<(), LoadHeaderError> {
        if hasher.pepper(self.salt) == self.pepper {
            Ok(())
        } else {
            Err(LoadHeaderError::InvalidHasher)
        }
    }

    /// Copy of this header with a replacement bucket count, used when the stored count is corrupt.
    pub fn with_bucket_count(mut self, bucket_count: u32) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    /// File format version.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Number of buckets in this index file.
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// Bytes reserved for each key.
    pub fn key_capacity(&self) -> u16 {
        self.key_capacity
    }

    /// Offset of the first bucket slot.
    pub fn bucket_table_offset(&self) -> u64 {
        self.bucket_table_offset
    }

    /// Offset of the first entry.
    pub fn entry_region_offset(&self) -> u64 {
        self.entry_region_offset
    }

    /// Size of the record store when the index was built.
    pub fn record_store_len(&self) -> u64 {
        self.record_store_len
    }

    /// File offset of bucket's slot.
    pub fn bucket_slot_offset(&self, bucket: u32) -> u64 {
        self.bucket_table_offset + bucket as u64 * BUCKET_SLOT_SIZE as u64
    }

    /// Size in bytes of one entry in this file.
    pub fn entry_size(&self) -> usize {
        entry_size(self.key_capacity)
    }
}
