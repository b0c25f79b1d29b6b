//! Builds an index file from a record store in one pass.

use crate::csv::extract_column;
use crate::error::build::BuildError;
use crate::fxhasher::FxBuildHasher;
use crate::index::entry::{encode_entry, truncate_key};
use crate::index::header::IndexHeader;
use crate::index::{write_bucket_table, EMPTY_SLOT};
use crate::index_config::IndexConfig;
use crate::key_hasher::KeyHasher;
use crate::record_store::RecordStore;
use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::fs::{File, OpenOptions};
use std::hash::BuildHasher;
use std::io;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// What happened to one record store line during a build.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// An entry was written for the line.
    Indexed,
    /// The key column was missing or empty.
    SkippedNoKey,
    /// Reading the line or writing its entry failed, the line is not indexed.
    IoError,
}

/// Counters for a finished build.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Lines after the column header line.
    pub lines: u64,
    /// Lines with an entry in the index.
    pub indexed: u64,
    /// Lines without a usable key.
    pub skipped_no_key: u64,
    /// Lines lost to io errors.
    pub io_errors: u64,
    /// Buckets in the index.
    pub buckets: u32,
    /// Size of the entry region.
    pub entry_bytes: u64,
}

impl BuildStats {
    fn record(&mut self, outcome: LineOutcome) {
        self.lines += 1;
        match outcome {
            LineOutcome::Indexed => self.indexed += 1,
            LineOutcome::SkippedNoKey => self.skipped_no_key += 1,
            LineOutcome::IoError => self.io_errors += 1,
        }
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} lines, {} indexed, {} without key, {} io errors, {} buckets, {} entry bytes",
            self.lines,
            self.indexed,
            self.skipped_no_key,
            self.io_errors,
            self.buckets,
            self.entry_bytes
        )
    }
}

/// Path the index is written to before it is renamed over index_path.
fn building_path(index_path: &Path) -> PathBuf {
    let mut name = index_path.as_os_str().to_owned();
    name.push(".building");
    PathBuf::from(name)
}

/// Strip one leading and one trailing quote then trailing whitespace from a raw key field.
/// Stored keys end at their first zero byte so anything from a NUL on is dropped first.
pub fn clean_key(field: &str) -> &str {
    let field = match field.find('\0') {
        Some(nul) => &field[..nul],
        None => field,
    };
    let key = field.strip_prefix('"').unwrap_or(field);
    let key = key.strip_suffix('"').unwrap_or(key);
    key.trim_end()
}

/// Index file writer.  Entries are appended in record order, the newest entry of a bucket becomes
/// its head and links to the previous head.
struct IndexWriter {
    file: BufWriter<File>,
    // Where the writer is positioned, None after a failed write.
    pos: Option<u64>,
}

impl IndexWriter {
    fn append(&mut self, at: u64, entry: &[u8]) -> io::Result<()> {
        let positioned = self.pos == Some(at);
        self.pos = None;
        if !positioned {
            self.file.seek(SeekFrom::Start(at))?;
        }
        self.file.write_all(entry)?;
        self.pos = Some(at + entry.len() as u64);
        Ok(())
    }
}

/// Builds the index described by an IndexConfig.
pub struct IndexBuilder<S = FxBuildHasher> {
    config: IndexConfig,
    hasher: KeyHasher<S>,
}

impl<S: BuildHasher + Default> IndexBuilder<S> {
    /// New builder for config.
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            hasher: KeyHasher::new(),
        }
    }

    /// Index every line of the record store after the column header line and replace the index
    /// file with the result.  The index is written next to its final path and only renamed into
    /// place once complete, so a failed build never leaves a partial index behind.
    /// Only failing to open/create either file, an empty record store or failing to write the
    /// fixed parts of the index are errors.
    pub fn build(&self) -> Result<BuildStats, BuildError> {
        let config = &self.config;
        debug!(
            "building index {} from {}",
            config.index_path.display(),
            config.record_store.display()
        );
        let mut records =
            RecordStore::open(&config.record_store).map_err(BuildError::RecordStoreOpen)?;
        let mut line = Vec::new();
        match records.next_line(&mut line) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(BuildError::EmptyRecordStore),
            Err(err) => return Err(BuildError::ReadHeaderLine(err)),
        }

        let building = building_path(&config.index_path);
        let stats = self
            .write_index(&mut records, &building)
            .and_then(|stats| {
                fs::rename(&building, &config.index_path).map_err(BuildError::IndexRename)?;
                Ok(stats)
            })
            .map_err(|err| {
                let _ = fs::remove_file(&building);
                err
            })?;
        info!("built index {}: {}", config.index_path.display(), stats);
        Ok(stats)
    }

    /// Write a complete index for records (positioned after the header line) to path.
    fn write_index(
        &self,
        records: &mut RecordStore,
        path: &Path,
    ) -> Result<BuildStats, BuildError> {
        let config = &self.config;
        let index_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(BuildError::IndexCreate)?;
        let mut writer = IndexWriter {
            file: BufWriter::with_capacity(WRITE_BUFFER_SIZE, index_file),
            pos: None,
        };
        let header = IndexHeader::new(config, records.len(), &self.hasher);
        header
            .write_header(&mut writer.file)
            .map_err(BuildError::WriteIndexHeader)?;
        let mut heads = vec![EMPTY_SLOT; header.bucket_count() as usize];
        write_bucket_table(&mut writer.file, header.bucket_table_offset(), &heads)
            .map_err(BuildError::WriteBucketTable)?;
        writer.pos = Some(header.entry_region_offset());

        let mut stats = BuildStats {
            buckets: header.bucket_count(),
            ..BuildStats::default()
        };
        let mut line = Vec::new();
        let mut entry = vec![0_u8; header.entry_size()];
        let mut entry_end = header.entry_region_offset();
        loop {
            match records.next_line(&mut line) {
                Ok(Some(record_offset)) => {
                    let outcome = self.index_line(
                        &mut writer,
                        &header,
                        &line,
                        record_offset,
                        &mut heads,
                        &mut entry,
                        &mut entry_end,
                    );
                    stats.record(outcome);
                }
                Ok(None) => break,
                Err(err) => {
                    // The reader position is unknown after a failed read so give up on the rest.
                    warn!(
                        "read error in {} after {} lines, stopping: {}",
                        config.record_store.display(),
                        stats.lines,
                        err
                    );
                    stats.record(LineOutcome::IoError);
                    break;
                }
            }
        }
        stats.entry_bytes = entry_end - header.entry_region_offset();

        write_bucket_table(&mut writer.file, header.bucket_table_offset(), &heads)
            .map_err(BuildError::WriteBucketTable)?;
        let index_file = writer
            .file
            .into_inner()
            .map_err(|err| BuildError::IndexSync(err.into_error()))?;
        index_file.sync_all().map_err(BuildError::IndexSync)?;
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn index_line(
        &self,
        writer: &mut IndexWriter,
        header: &IndexHeader,
        line: &[u8],
        record_offset: u64,
        heads: &mut [u64],
        entry: &mut [u8],
        entry_end: &mut u64,
    ) -> LineOutcome {
        let text = String::from_utf8_lossy(line);
        let field = match extract_column(&text, self.config.key_column) {
            Some(field) => field,
            None => return LineOutcome::SkippedNoKey,
        };
        let key = clean_key(&field);
        if key.is_empty() {
            return LineOutcome::SkippedNoKey;
        }
        // Hash what is stored so a truncated query lands in the same bucket.
        let key = truncate_key(key.as_bytes(), header.key_capacity());
        let bucket = self.hasher.home_bucket(key, header.bucket_count()) as usize;
        encode_entry(
            entry,
            header.key_capacity(),
            key,
            record_offset,
            heads[bucket],
        );
        if let Err(err) = writer.append(*entry_end, entry) {
            warn!(
                "failed to write entry for record at {}, skipping: {}",
                record_offset, err
            );
            return LineOutcome::IoError;
        }
        heads[bucket] = *entry_end;
        *entry_end += entry.len() as u64;
        LineOutcome::Indexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::chain_iter::ChainIter;
    use crate::index::read_bucket_head;
    use std::fs;

    const RECORDS: &str = "id,submitter,authors,title,comments\n\
        1,a,x,Deep Learning Basics,c\n\
        2,b,y,\"deep space research\",c\n\
        3,c,z,,c\n\
        4,d,w,Shallow Networks,c\n\
        short line\n";

    fn config(dir: &tempfile::TempDir, records: &str) -> IndexConfig {
        let record_store = dir.path().join("records.csv");
        fs::write(&record_store, records).unwrap();
        IndexConfig::new(record_store, dir.path().join("records.idx")).set_bucket_count(7)
    }

    #[test]
    fn test_clean_key() {
        assert_eq!(clean_key("\"Quoted\""), "Quoted");
        assert_eq!(clean_key("\"Half"), "Half");
        assert_eq!(clean_key("Trailing  \t"), "Trailing");
        assert_eq!(clean_key("  leading kept"), "  leading kept");
        assert_eq!(clean_key("\""), "");
        assert_eq!(clean_key("Before\0After"), "Before");
        assert_eq!(clean_key("\"Quoted \0rest\""), "Quoted");
        assert_eq!(clean_key("\0leading"), "");
    }

    #[test]
    fn test_build_stats() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, RECORDS);
        let stats = IndexBuilder::<FxBuildHasher>::new(config.clone())
            .build()
            .unwrap();
        assert_eq!(stats.lines, 5);
        assert_eq!(stats.indexed, 3);
        assert_eq!(stats.skipped_no_key, 2);
        assert_eq!(stats.io_errors, 0);
        assert_eq!(stats.buckets, 7);
        assert_eq!(stats.entry_bytes, 3 * (256 + 20));
        let len = fs::metadata(config.index_path()).unwrap().len();
        assert_eq!(len, (72 + 7 * 8 + 3 * (256 + 20)) as u64);
    }

    #[test]
    fn test_bucket_containment() {
        let dir = tempfile::tempdir().unwrap();
        let mut records = String::from("id,s,a,title\n");
        for i in 0..200 {
            records.push_str(&format!("{},s,a,Title number {}\n", i, i));
        }
        let config = config(&dir, &records);
        IndexBuilder::<FxBuildHasher>::new(config.clone())
            .build()
            .unwrap();
        let mut file = fs::File::open(config.index_path()).unwrap();
        let header = IndexHeader::load_header(&mut file).unwrap();
        let end = fs::metadata(config.index_path()).unwrap().len();
        let hasher: KeyHasher = KeyHasher::new();
        let mut total = 0;
        for bucket in 0..header.bucket_count() {
            let head = read_bucket_head(&mut file, header.bucket_slot_offset(bucket)).unwrap();
            let mut chain = ChainIter::new(
                &mut file,
                head,
                header.key_capacity(),
                header.entry_region_offset(),
                end,
            );
            let mut last_record = u64::MAX;
            for entry in &mut chain {
                assert_eq!(hasher.home_bucket(&entry.key, 7), bucket);
                // Newest first.
                assert!(entry.record_offset < last_record);
                last_record = entry.record_offset;
                total += 1;
            }
            assert!(!chain.failed());
        }
        assert_eq!(total, 200);
    }

    #[test]
    fn test_fatal_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig::new(dir.path().join("missing.csv"), dir.path().join("i.idx"));
        assert!(matches!(
            IndexBuilder::<FxBuildHasher>::new(config).build(),
            Err(BuildError::RecordStoreOpen(_))
        ));

        let config = self::config(&dir, "");
        assert!(matches!(
            IndexBuilder::<FxBuildHasher>::new(config).build(),
            Err(BuildError::EmptyRecordStore)
        ));

        let record_store = dir.path().join("records.csv");
        fs::write(&record_store, "id,s,a,title\n").unwrap();
        let config = IndexConfig::new(record_store, dir.path().join("no_dir").join("i.idx"));
        assert!(matches!(
            IndexBuilder::<FxBuildHasher>::new(config).build(),
            Err(BuildError::IndexCreate(_))
        ));
    }

    #[test]
    fn test_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, "id,s,a,title\n");
        let stats = IndexBuilder::<FxBuildHasher>::new(config).build().unwrap();
        assert_eq!(stats.lines, 0);
        assert_eq!(stats.entry_bytes, 0);
    }

    #[test]
    fn test_failed_build_leaves_no_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, "");
        let building = building_path(config.index_path());
        for _ in 0..2 {
            assert!(matches!(
                IndexBuilder::<FxBuildHasher>::new(config.clone()).build(),
                Err(BuildError::EmptyRecordStore)
            ));
            assert!(!config.index_path().exists());
            assert!(!building.exists());
        }
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, RECORDS);
        IndexBuilder::<FxBuildHasher>::new(config.clone())
            .build()
            .unwrap();
        let before = fs::read(config.index_path()).unwrap();
        fs::write(config.record_store(), "").unwrap();
        assert!(IndexBuilder::<FxBuildHasher>::new(config.clone())
            .build()
            .is_err());
        assert_eq!(fs::read(config.index_path()).unwrap(), before);
        assert!(!building_path(config.index_path()).exists());
    }

    #[test]
    fn test_nul_in_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, "id,s,a,title\n1,s,a,Before\0After\n");
        let stats = IndexBuilder::<FxBuildHasher>::new(config.clone())
            .build()
            .unwrap();
        assert_eq!(stats.indexed, 1);
        let mut file = fs::File::open(config.index_path()).unwrap();
        let header = IndexHeader::load_header(&mut file).unwrap();
        let end = fs::metadata(config.index_path()).unwrap().len();
        let hasher: KeyHasher = KeyHasher::new();
        let bucket = hasher.home_bucket("Before", 7);
        let head = read_bucket_head(&mut file, header.bucket_slot_offset(bucket)).unwrap();
        let entries: Vec<_> = ChainIter::new(
            &mut file,
            head,
            header.key_capacity(),
            header.entry_region_offset(),
            end,
        )
        .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, b"Before");
    }
}
