//! A stable 64 bit port of the FxHasher used by the Rust compiler.
//!
//! The index file records bucket ids, so the key hasher has to produce the same value for the same
//! bytes on every run and every platform.  The std `DefaultHasher` is randomly keyed per process
//! and can NOT be used here.  Words are always read little endian and `usize` is widened to `u64`
//! so an index built on one machine can be searched on another.

use std::hash::{BuildHasherDefault, Hasher};

const SEED: u64 = 0x51_7c_c1_b7_27_22_0a_95;

/// Fast, non-cryptographic, stable hasher.
#[derive(Debug, Default, Clone, Copy)]
pub struct FxHasher {
    hash: u64,
}

/// Build hasher for [`FxHasher`], the default for the index builder and reader.
pub type FxBuildHasher = BuildHasherDefault<FxHasher>;

impl FxHasher {
    #[inline]
    fn add_to_hash(&mut self, word: u64) {
        self.hash = (self.hash.rotate_left(5) ^ word).wrapping_mul(SEED);
    }
}

impl Hasher for FxHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(8);
        for chunk in &mut chunks {
            let mut buf64 = [0_u8; 8];
            buf64.copy_from_slice(chunk);
            self.add_to_hash(u64::from_le_bytes(buf64));
        }
        let mut rest = chunks.remainder();
        if rest.len() >= 4 {
            let mut buf32 = [0_u8; 4];
            buf32.copy_from_slice(&rest[..4]);
            self.add_to_hash(u32::from_le_bytes(buf32) as u64);
            rest = &rest[4..];
        }
        if rest.len() >= 2 {
            let mut buf16 = [0_u8; 2];
            buf16.copy_from_slice(&rest[..2]);
            self.add_to_hash(u16::from_le_bytes(buf16) as u64);
            rest = &rest[2..];
        }
        if let Some(byte) = rest.first() {
            self.add_to_hash(*byte as u64);
        }
    }

    #[inline]
    fn write_u8(&mut self, i: u8) {
        self.add_to_hash(i as u64);
    }

    #[inline]
    fn write_u16(&mut self, i: u16) {
        self.add_to_hash(i as u64);
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.add_to_hash(i as u64);
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.add_to_hash(i);
    }

    #[inline]
    fn write_usize(&mut self, i: usize) {
        self.add_to_hash(i as u64);
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }
}
