//! The window of buckets a search visits around a key's home bucket.

/// Inclusive range of bucket indices [first, last] around home, clipped to the bucket table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProbeWindow {
    home: u32,
    first: u32,
    last: u32,
}

impl ProbeWindow {
    /// Window of radius buckets either side of home.  bucket_count must be > 0 and home must be a
    /// valid bucket.
    pub fn new(home: u32, radius: u32, bucket_count: u32) -> Self {
        let first = home.saturating_sub(radius);
        let last = home.saturating_add(radius).min(bucket_count - 1);
        Self { home, first, last }
    }

    /// The bucket the key hashes to.
    pub fn home(&self) -> u32 {
        self.home
    }

    /// Lowest bucket visited.
    pub fn first(&self) -> u32 {
        self.first
    }

    /// Highest bucket visited.
    pub fn last(&self) -> u32 {
        self.last
    }

    /// Number of buckets in the window.
    pub fn len(&self) -> u32 {
        self.last - self.first + 1
    }

    /// Never true, a window always contains home.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Buckets in ascending order.
    pub fn buckets(&self) -> impl Iterator<Item = u32> {
        self.first..=self.last
    }
}
