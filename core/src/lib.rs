#![deny(missing_docs)]

//! Disk resident hash index over a line oriented, comma delimited record store (one record per
//! line, the first line is a column header).
//! The index never copies records.  Each entry holds a (possibly truncated) copy of the record's
//! key column and the byte offset of the record's line, so the record store is left untouched and
//! is read a second time to recover full records.
//!
//! The index file is a fixed header, a table of bucket slots and an append only region of fixed
//! size entries.  Every bucket is the head of a singly linked chain of entries, newest first,
//! where links are byte offsets into the index file.  It is built once (truncate and rewrite) and
//! only read after that.
//!
//! Searches are case insensitive substring (or exact) matches of the key column.  A substring has
//! no useful relation to the hash of the keys containing it so a substring search only probes a
//! window of buckets around the query's home bucket, trading recall for bounded work.
//!
//! Keys are hashed with FxHasher from the Rust compiler.  The index requires a stable hasher so
//! the default Rust hasher is NOT appropriate, the header stores a salt/pepper pair so a reader
//! with a different hasher refuses the file instead of silently returning nothing.
//!
//! The header and every entry carry CRC32 checksums (See https://github.com/srijs/rust-crc32fast).

pub(crate) mod crc;
pub mod csv;
pub mod error;
pub mod fxhasher;
pub mod index;
pub mod index_config;
pub mod key_hasher;
pub mod record_store;

pub use crate::error::build::BuildError;
pub use crate::error::search::SearchError;
pub use crate::index::builder::BuildStats;
pub use crate::index::reader::{MatchMode, Query, SearchResults, SearchStats};
pub use crate::index_config::IndexConfig;

use std::path::Path;

/// Build (or rebuild from scratch) the index at index from record_store using the default
/// configuration.
pub fn build_index<P: AsRef<Path>, Q: AsRef<Path>>(
    record_store: P,
    index: Q,
) -> Result<BuildStats, BuildError> {
    IndexConfig::new(record_store.as_ref(), index.as_ref()).build_index()
}

/// Substring search for query (optionally filtered on the filter column) using the default
/// configuration.  Builds the index first if it does not exist.
pub fn search<Q: AsRef<Path>, R: AsRef<Path>>(
    query: &str,
    filter: Option<&str>,
    index: Q,
    record_store: R,
) -> Result<SearchResults, SearchError> {
    let mut query = Query::substring(query);
    if let Some(filter) = filter {
        query = query.with_filter(filter);
    }
    IndexConfig::new(record_store.as_ref(), index.as_ref()).search(&query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_build_then_search() {
        let dir = tempfile::tempdir().unwrap();
        let record_store = dir.path().join("arxiv.csv");
        let index = dir.path().join("arxiv.idx");
        fs::write(
            &record_store,
            "id,submitter,authors,title,c,j,d,r,cat,lic,abstract,update_date\n\
             1,s,a,Deep Learning Basics,c,j,d,r,cat,lic,abs,2020-01-01\n",
        )
        .unwrap();
        let stats = build_index(&record_store, &index).unwrap();
        assert_eq!(stats.indexed, 1);
        let results = search("Deep Learning Basics", None, &index, &record_store).unwrap();
        assert_eq!(results.count(), 1);
        let results = search(
            "Deep Learning Basics",
            Some("2020-01-01"),
            &index,
            &record_store,
        )
        .unwrap();
        assert_eq!(results.count(), 1);
        let results = search(
            "Deep Learning Basics",
            Some("2000-01-01"),
            &index,
            &record_store,
        )
        .unwrap();
        assert_eq!(results.count(), 0);
    }
}
