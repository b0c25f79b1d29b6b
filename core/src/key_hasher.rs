//! Maps keys to bucket ids.  The builder and every reader of an index must hash with the same
//! hasher, the index header carries a salt/pepper pair so a reader can verify this.

use crate::fxhasher::FxBuildHasher;
use std::hash::{BuildHasher, Hasher};

/// Hash keys exactly as stored (case included).  Case folding happens at compare time so a
/// substring match is not limited to keys that fold to the same hash.
#[derive(Debug, Clone, Default)]
pub struct KeyHasher<S = FxBuildHasher> {
    build_hasher: S,
}

impl<S: BuildHasher + Default> KeyHasher<S> {
    /// Create a key hasher using the default instance of S.
    pub fn new() -> Self {
        Self {
            build_hasher: S::default(),
        }
    }

    /// Return the u64 hash of key's bytes.
    pub fn hash<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> u64 {
        let mut hasher = self.build_hasher.build_hasher();
        hasher.write(key.as_ref());
        hasher.finish()
    }

    /// Return the bucket key hashes to in a table of bucket_count buckets.
    /// Panics if bucket_count is 0.
    pub fn home_bucket<K: AsRef<[u8]> + ?Sized>(&self, key: &K, bucket_count: u32) -> u32 {
        (self.hash(key) % bucket_count as u64) as u32
    }

    /// Hash of a salt value, stored in the index header to detect a hasher mismatch.
    pub(crate) fn pepper(&self, salt: u64) -> u64 {
        let mut hasher = self.build_hasher.build_hasher();
        hasher.write_u64(salt);
        hasher.finish()
    }
}
