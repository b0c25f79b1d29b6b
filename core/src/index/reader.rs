//! Query side of the index.  A search hashes the query to its home bucket, walks the chains of a
//! window of buckets around it and re-reads the record store for every key match.
//!
//! A substring's hash says nothing about the hash of a key containing it so substring mode is an
//! approximation: only keys that landed within probe_radius buckets of the query's home bucket
//! can be found.  Exact mode only needs the home bucket.

use crate::csv::extract_column;
use crate::error::search::SearchError;
use crate::fxhasher::FxBuildHasher;
use crate::index::builder::IndexBuilder;
use crate::index::chain_iter::ChainIter;
use crate::index::entry::truncate_key;
use crate::index::header::IndexHeader;
use crate::index::probe::ProbeWindow;
use crate::index::read_bucket_head;
use crate::index_config::{IndexConfig, DEFAULT_BUCKET_COUNT};
use crate::key_hasher::KeyHasher;
use crate::record_store::RecordStore;
use log::{info, warn};
use std::fs::File;
use std::hash::BuildHasher;

/// How a query key is compared to stored keys.  Both ignore ASCII case.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MatchMode {
    /// The query occurs anywhere in the stored key.
    Substring,
    /// The query equals the stored key.
    Exact,
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    key: String,
    filter: Option<String>,
    mode: MatchMode,
}

impl Query {
    /// Substring query for key (trimmed).
    pub fn substring<K: Into<String>>(key: K) -> Self {
        Self::new(key.into(), MatchMode::Substring)
    }

    /// Exact (case insensitive) query for key (trimmed).
    pub fn exact<K: Into<String>>(key: K) -> Self {
        Self::new(key.into(), MatchMode::Exact)
    }

    fn new(key: String, mode: MatchMode) -> Self {
        // Stored keys end at their first zero byte.
        let key = match key.find('\0') {
            Some(nul) => &key[..nul],
            None => &key[..],
        };
        Self {
            key: key.trim().to_string(),
            filter: None,
            mode,
        }
    }

    /// Also require the record's filter column to equal filter (ignoring case).  An empty
    /// filter means no filter.
    pub fn with_filter<F: AsRef<str>>(mut self, filter: F) -> Self {
        let filter = filter.as_ref().trim();
        self.filter = if filter.is_empty() {
            None
        } else {
            Some(filter.to_string())
        };
        self
    }

    /// The key being searched for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The secondary filter value if any.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// The match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }
}

/// Counters for one search.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Buckets whose chains were walked.
    pub buckets_probed: u32,
    /// Entries read from chains.
    pub entries_examined: u64,
    /// Entries whose key matched the query.
    pub key_matches: u64,
    /// Key matches dropped by the secondary filter (or an unreadable record).
    pub filter_rejected: u64,
    /// Buckets whose slot or chain could not be fully read.
    pub chain_errors: u32,
}

/// Records found by a search, in bucket window order then newest first within a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Full record store lines (line terminator removed).
    pub records: Vec<String>,
    /// What the search did to find them.
    pub stats: SearchStats,
}

impl SearchResults {
    /// Number of records found, 0 means no matches.
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

fn key_matches(stored: &[u8], query: &[u8], mode: MatchMode) -> bool {
    match mode {
        MatchMode::Exact => stored.eq_ignore_ascii_case(query),
        MatchMode::Substring => {
            query.len() <= stored.len()
                && stored
                    .windows(query.len())
                    .any(|window| window.eq_ignore_ascii_case(query))
        }
    }
}

/// An open index and its record store.  Any number of readers may search the same files as
/// long as nothing rebuilds the index underneath them.
pub struct IndexReader<S = FxBuildHasher> {
    config: IndexConfig,
    header: IndexHeader,
    index_file: File,
    index_len: u64,
    records: RecordStore,
    hasher: KeyHasher<S>,
}

impl<S: BuildHasher + Default> IndexReader<S> {
    /// Open the index and record store in config.  If the index file does not exist it is built
    /// first.
    pub fn open(config: IndexConfig) -> Result<Self, SearchError> {
        if !config.index_path.exists() {
            info!(
                "index {} not found, building it",
                config.index_path.display()
            );
            IndexBuilder::<S>::new(config.clone()).build()?;
        }
        let mut index_file = File::open(&config.index_path).map_err(SearchError::IndexOpen)?;
        let index_len = index_file
            .metadata()
            .map_err(SearchError::IndexOpen)?
            .len();
        let mut header =
            IndexHeader::load_header(&mut index_file).map_err(SearchError::IndexHeader)?;
        if header.bucket_count() == 0 {
            warn!(
                "index {} reports 0 buckets, assuming {}",
                config.index_path.display(),
                DEFAULT_BUCKET_COUNT
            );
            header = header.with_bucket_count(DEFAULT_BUCKET_COUNT);
        }
        let hasher = KeyHasher::new();
        header
            .verify_hasher(&hasher)
            .map_err(SearchError::IndexHeader)?;
        let records =
            RecordStore::open(&config.record_store).map_err(SearchError::RecordStoreOpen)?;
        if records.len() != header.record_store_len() {
            warn!(
                "record store {} is {} bytes but was {} bytes when {} was built, \
                 results may be wrong",
                config.record_store.display(),
                records.len(),
                header.record_store_len(),
                config.index_path.display()
            );
        }
        Ok(Self {
            config,
            header,
            index_file,
            index_len,
            records,
            hasher,
        })
    }

    /// Header of the open index (with the bucket count fallback applied).
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// The probe window query would use.
    pub fn probe_window(&self, query: &Query) -> ProbeWindow {
        let key = truncate_key(query.key.as_bytes(), self.header.key_capacity());
        let bucket_count = self.header.bucket_count();
        let home = self.hasher.home_bucket(key, bucket_count);
        let radius = match query.mode {
            MatchMode::Exact => 0,
            MatchMode::Substring => self.config.probe_radius,
        };
        ProbeWindow::new(home, radius, bucket_count)
    }

    /// Run query.  Unreadable slots, entries and records are skipped (and counted) so this never
    /// fails, an empty result is "no matches".
    pub fn search(&mut self, query: &Query) -> SearchResults {
        let mut results = SearchResults::default();
        if query.key.is_empty() {
            return results;
        }
        let key_capacity = self.header.key_capacity();
        let needle = truncate_key(query.key.as_bytes(), key_capacity);
        let window = self.probe_window(query);
        let max_results = self.config.max_results;
        let stats = &mut results.stats;
        for bucket in window.buckets() {
            if results.records.len() >= max_results {
                break;
            }
            stats.buckets_probed += 1;
            let slot = self.header.bucket_slot_offset(bucket);
            let head = match read_bucket_head(&mut self.index_file, slot) {
                Ok(head) => head,
                Err(err) => {
                    warn!("unreadable bucket {}, skipping: {}", bucket, err);
                    stats.chain_errors += 1;
                    continue;
                }
            };
            let mut chain = ChainIter::new(
                &mut self.index_file,
                head,
                key_capacity,
                self.header.entry_region_offset(),
                self.index_len,
            );
            for entry in &mut chain {
                stats.entries_examined += 1;
                if !key_matches(&entry.key, needle, query.mode) {
                    continue;
                }
                stats.key_matches += 1;
                let line = match self.records.read_line_at(entry.record_offset) {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        warn!(
                            "record offset {} is past the end of the record store",
                            entry.record_offset
                        );
                        stats.filter_rejected += 1;
                        continue;
                    }
                    Err(err) => {
                        warn!("unreadable record at {}: {}", entry.record_offset, err);
                        stats.filter_rejected += 1;
                        continue;
                    }
                };
                if let Some(filter) = &query.filter {
                    let accepted = extract_column(&line, self.config.filter_column)
                        .map(|field| field.eq_ignore_ascii_case(filter))
                        .unwrap_or(false);
                    if !accepted {
                        stats.filter_rejected += 1;
                        continue;
                    }
                }
                results.records.push(line);
                if results.records.len() >= max_results {
                    break;
                }
            }
            if chain.failed() {
                warn!("bucket {} chain is corrupt, skipped the rest of it", bucket);
                stats.chain_errors += 1;
            }
        }
        info!(
            "search {:?} ({:?}) in buckets {}..={}: {} results, {} entries examined",
            query.key,
            query.mode,
            window.first(),
            window.last(),
            results.records.len(),
            stats.entries_examined
        );
        results
    }
}
