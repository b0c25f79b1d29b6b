//! Define the configuration shared by the index builder and reader.

use crate::error::build::BuildError;
use crate::error::search::SearchError;
use crate::fxhasher::FxBuildHasher;
use crate::index::builder::{BuildStats, IndexBuilder};
use crate::index::reader::{IndexReader, Query, SearchResults};
use std::path::{Path, PathBuf};

/// Buckets written by a new index.  Also the fallback if an index header reports 0 buckets.
pub const DEFAULT_BUCKET_COUNT: u32 = 1000;
/// Bytes reserved for each stored key, including the terminating zero.
pub const DEFAULT_KEY_CAPACITY: u16 = 256;
/// Column (0 based) holding the key, `title` in the arXiv metadata export.
pub const DEFAULT_KEY_COLUMN: usize = 3;
/// Column (0 based) holding the secondary filter, `update_date` in the arXiv metadata export.
pub const DEFAULT_FILTER_COLUMN: usize = 11;
/// Buckets probed on each side of a query's home bucket.
pub const DEFAULT_PROBE_RADIUS: u32 = 12;
/// Maximum records returned by one search.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Configuration for an index.
/// The bucket count and key capacity only matter when building, a reader always takes them from
/// the index header of the file it opens.
#[derive(Clone, Debug)]
pub struct IndexConfig {
    pub(crate) record_store: PathBuf,
    pub(crate) index_path: PathBuf,
    pub(crate) bucket_count: u32,
    pub(crate) key_capacity: u16,
    pub(crate) key_column: usize,
    pub(crate) filter_column: usize,
    pub(crate) probe_radius: u32,
    pub(crate) max_results: usize,
}

impl IndexConfig {
    /// Create a new config for the record store and index file.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(record_store: P, index_path: Q) -> Self {
        Self {
            record_store: record_store.into(),
            index_path: index_path.into(),
            bucket_count: DEFAULT_BUCKET_COUNT,
            key_capacity: DEFAULT_KEY_CAPACITY,
            key_column: DEFAULT_KEY_COLUMN,
            filter_column: DEFAULT_FILTER_COLUMN,
            probe_radius: DEFAULT_PROBE_RADIUS,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Set the number of buckets a build writes.
    /// Panics if buckets is 0.
    pub fn set_bucket_count(mut self, buckets: u32) -> Self {
        if buckets == 0 {
            panic!("Invalid bucket count, must be at least 1");
        }
        self.bucket_count = buckets;
        self
    }

    /// Set the bytes stored per key.  Longer keys are truncated to capacity - 1 bytes.
    /// Panics if capacity is less than 2.
    pub fn set_key_capacity(mut self, capacity: u16) -> Self {
        if capacity < 2 {
            panic!("Invalid key capacity, must be at least 2");
        }
        self.key_capacity = capacity;
        self
    }

    /// Set the 0 based column holding the key.
    pub fn set_key_column(mut self, column: usize) -> Self {
        self.key_column = column;
        self
    }

    /// Set the 0 based column holding the secondary filter field.
    pub fn set_filter_column(mut self, column: usize) -> Self {
        self.filter_column = column;
        self
    }

    /// Set the probe radius, a substring search looks at up to 2 * radius + 1 buckets.
    pub fn set_probe_radius(mut self, radius: u32) -> Self {
        self.probe_radius = radius;
        self
    }

    /// Set the maximum number of records a search returns.
    pub fn set_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Path to the record store.
    pub fn record_store(&self) -> &Path {
        &self.record_store
    }

    /// Path to the index file.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Buckets a build will write.
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// Key capacity a build will use.
    pub fn key_capacity(&self) -> u16 {
        self.key_capacity
    }

    /// Column of the key field.
    pub fn key_column(&self) -> usize {
        self.key_column
    }

    /// Column of the secondary filter field.
    pub fn filter_column(&self) -> usize {
        self.filter_column
    }

    /// Probe radius for substring searches.
    pub fn probe_radius(&self) -> u32 {
        self.probe_radius
    }

    /// Result cap for a search.
    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Build (or rebuild from scratch) the index file with the default hasher.
    pub fn build_index(&self) -> Result<BuildStats, BuildError> {
        IndexBuilder::<FxBuildHasher>::new(self.clone()).build()
    }

    /// Consumes the config and opens a reader with the default hasher.
    /// Builds the index first if the index file does not exist.
    pub fn open_reader(self) -> Result<IndexReader, SearchError> {
        IndexReader::<FxBuildHasher>::open(self)
    }

    /// Open a reader, run one query and close it again.
    pub fn search(&self, query: &Query) -> Result<SearchResults, SearchError> {
        let mut reader = self.clone().open_reader()?;
        Ok(reader.search(query))
    }
}
