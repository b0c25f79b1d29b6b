#![deny(missing_docs)]

//! Provide a tokio search service around the titledx index.  This is the worker side of a
//! request/response exchange: it accepts fixed size request frames naming a title (and
//! optionally an update date) and answers with the matching records or `NA`.
//! This is tokio specific but should be easily adaptable to other runtimes.

use crate::protocol::{Request, Response, REQUEST_SIZE};
use crate::rebuild_thread::{rebuild_thread, RebuildCommand};
use dashmap::DashMap;
use log::{debug, warn};
use std::io;
use std::sync::Arc;
use titledx_core::{BuildStats, IndexConfig, Query, SearchError, SearchResults};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, RwLock, RwLockReadGuard};

pub mod error;
pub mod protocol;
mod rebuild_thread;

pub use crate::error::ServiceError;

/// Default number of responses kept before the cache is cleared.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Normalized (title, update date) of a request.
pub(crate) type CacheKey = (String, Option<String>);
pub(crate) type ResponseCache = DashMap<CacheKey, Response>;

/// Async search service over one index and record store.
/// Searches use synchronous reads once they hold the index lock.  A search opens its own
/// reader so any number can run at once, rebuilds run on a dedicated thread and hold the lock
/// exclusively so a search never sees a partially written index.
/// Responses are cached until the next rebuild or until the cache fills up.
pub struct SearchService {
    config: Arc<IndexConfig>,
    index_lock: Arc<RwLock<()>>,
    response_cache: Arc<ResponseCache>,
    cache_capacity: usize,
    rebuild_tx: mpsc::Sender<RebuildCommand>,
    rebuild_thread: Option<std::thread::JoinHandle<()>>,
}

impl Drop for SearchService {
    fn drop(&mut self) {
        let _ = self.rebuild_tx.try_send(RebuildCommand::Done);
        if let Some(rebuild_thread) = self.rebuild_thread.take() {
            let _ = rebuild_thread.join();
        }
    }
}

impl SearchService {
    /// Open the service, building the index first if the index file does not exist.
    pub fn open(config: IndexConfig) -> Result<Self, ServiceError> {
        if !config.index_path().exists() {
            config.build_index()?;
        }
        let config = Arc::new(config);
        let index_lock = Arc::new(RwLock::new(()));
        let response_cache: Arc<ResponseCache> = Arc::new(DashMap::new());
        let (rebuild_tx, rebuild_rx) = mpsc::channel(16);
        let config_clone = config.clone();
        let lock_clone = index_lock.clone();
        let cache_clone = response_cache.clone();
        let rebuild_thread = std::thread::spawn(move || {
            rebuild_thread(config_clone, lock_clone, cache_clone, rebuild_rx)
        });
        Ok(Self {
            config,
            index_lock,
            response_cache,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            rebuild_tx,
            rebuild_thread: Some(rebuild_thread),
        })
    }

    /// Set the number of responses to cache.  When the cache is full it is cleared before the
    /// next insert.  0 turns the cache off.
    pub fn set_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// The configuration this service searches with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of responses currently cached.
    pub fn cached_responses(&self) -> usize {
        self.response_cache.len()
    }

    /// Hold the index for reading.  If the index file has gone missing it is rebuilt first.
    async fn read_index(&self) -> Result<RwLockReadGuard<'_, ()>, SearchError> {
        let guard = self.index_lock.read().await;
        if self.config.index_path().exists() {
            return Ok(guard);
        }
        drop(guard);
        let guard = self.index_lock.write().await;
        // Another search may have built it while we waited for the lock.
        if !self.config.index_path().exists() {
            self.config.build_index()?;
            self.response_cache.clear();
        }
        Ok(guard.downgrade())
    }

    /// Run query against the index.  If the index file has gone missing it is rebuilt first.
    pub async fn search(&self, query: &Query) -> Result<SearchResults, SearchError> {
        let _guard = self.read_index().await?;
        self.config.search(query)
    }

    fn cache_response(&self, cache_key: CacheKey, response: Response) {
        if self.cache_capacity == 0 {
            return;
        }
        if self.response_cache.len() >= self.cache_capacity {
            debug!("response cache full at {} entries, clearing", self.cache_capacity);
            self.response_cache.clear();
        }
        self.response_cache.insert(cache_key, response);
    }

    /// Answer a request.  No title, no matches or a failed search are all answered with `NA`.
    pub async fn respond(&self, request: &Request) -> Response {
        let title = match request.title() {
            Some(title) => title,
            None => return Response::no_results(),
        };
        let update_date = request.update_date();
        let cache_key = (title, update_date);
        if let Some(response) = self.response_cache.get(&cache_key) {
            return response.clone();
        }
        let mut query = Query::substring(cache_key.0.as_str());
        if let Some(date) = &cache_key.1 {
            query = query.with_filter(date);
        }
        // The read guard is held until the response is cached so a rebuild can not clear the
        // cache between the search and the insert.
        let result = match self.read_index().await {
            Ok(guard) => self.config.search(&query).map(|results| (guard, results)),
            Err(err) => Err(err),
        };
        match result {
            Ok((_guard, results)) => {
                let response = Response::from_records(&results.records);
                self.cache_response(cache_key, response.clone());
                response
            }
            Err(err) => {
                warn!("search for {:?} failed: {}", cache_key.0, err);
                Response::no_results()
            }
        }
    }

    /// Rebuild the index from the record store and wait for it to finish.
    pub async fn rebuild(&self) -> Result<BuildStats, ServiceError> {
        let (tx, rx) = oneshot::channel();
        if self
            .rebuild_tx
            .send(RebuildCommand::Rebuild(tx))
            .await
            .is_err()
        {
            // An error here means the receiver in the rebuild thread was dropped/closed.
            return Err(ServiceError::SendChannelClosed);
        }
        match rx.await {
            Ok(result) => result.map_err(ServiceError::Build),
            Err(_err) => Err(ServiceError::ReceiveFailed),
        }
    }

    /// Schedule a rebuild but don't wait for it to complete.
    pub async fn rebuild_bg(&self) {
        // An error here indicates the receiver in the rebuild thread was closed/dropped.
        let _ = self.rebuild_tx.send(RebuildCommand::RebuildBG).await;
    }

    /// Serve request frames from reader until it ends, writing one response frame per request
    /// to writer.  A trailing partial frame is ignored.  Returns the number of requests served.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> io::Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut served = 0;
        let mut frame = [0_u8; REQUEST_SIZE];
        loop {
            match reader.read_exact(&mut frame).await {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err),
            }
            let response = self.respond(&Request::decode(&frame)).await;
            writer.write_all(response.as_bytes()).await?;
            writer.flush().await?;
            served += 1;
        }
        debug!("served {} requests", served);
        Ok(served)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RESPONSE_SIZE;
    use std::fs;

    const HEADER_LINE: &str = concat!(
        "id,submitter,authors,title,comments,journal-ref,doi,report-no,",
        "categories,license,abstract,update_date\n"
    );

    fn record(id: u32, title: &str, date: &str) -> String {
        format!("{},s,a,{},c,j,d,r,cat,lic,abs,{}", id, title, date)
    }

    fn scratch(records: &[String]) -> (tempfile::TempDir, IndexConfig) {
        let dir = tempfile::tempdir().unwrap();
        let record_store = dir.path().join("arxiv.csv");
        let mut contents = String::from(HEADER_LINE);
        for record in records {
            contents.push_str(record);
            contents.push('\n');
        }
        fs::write(&record_store, contents).unwrap();
        // 8 buckets so the probe window covers the whole table.
        let config =
            IndexConfig::new(record_store, dir.path().join("arxiv.idx")).set_bucket_count(8);
        (dir, config)
    }

    fn deep_records() -> Vec<String> {
        vec![
            record(1, "Deep Learning Basics", "2020-01-01"),
            record(2, "deep space research", "2021-06-30"),
            record(3, "Shallow Networks", "2020-01-01"),
        ]
    }

    #[tokio::test]
    async fn test_open_builds_index() {
        let (_dir, config) = scratch(&deep_records());
        assert!(!config.index_path().exists());
        let service = SearchService::open(config.clone()).unwrap();
        assert!(config.index_path().exists());
        let results = service.search(&Query::substring("deep")).await.unwrap();
        assert_eq!(results.count(), 2);
    }

    #[tokio::test]
    async fn test_respond() {
        let records = deep_records();
        let (_dir, config) = scratch(&records);
        let service = SearchService::open(config).unwrap();

        let response = service.respond(&Request::new("Shallow", None)).await;
        assert_eq!(response.records(), vec![records[2].clone()]);

        let response = service
            .respond(&Request::new("deep", Some("2021-06-30")))
            .await;
        assert_eq!(response.records(), vec![records[1].clone()]);

        let response = service
            .respond(&Request::new("deep", Some("1999-01-01")))
            .await;
        assert!(response.is_no_results());

        let response = service.respond(&Request::new("quantum", None)).await;
        assert!(response.is_no_results());

        let response = service
            .respond(&Request::with_fields(("author", "x"), ("", "")))
            .await;
        assert!(response.is_no_results());
    }

    #[tokio::test]
    async fn test_cache_cleared_by_rebuild() {
        let records = deep_records();
        let (dir, config) = scratch(&records);
        let service = SearchService::open(config).unwrap();
        let before = service.respond(&Request::new("Networks", None)).await;
        assert_eq!(before.records().len(), 1);

        let mut extra = records.clone();
        extra.push(record(4, "Neural Networks", "2022-02-02"));
        let mut contents = String::from(HEADER_LINE);
        for record in &extra {
            contents.push_str(record);
            contents.push('\n');
        }
        fs::write(dir.path().join("arxiv.csv"), contents).unwrap();
        // Still cached.
        assert_eq!(service.respond(&Request::new("Networks", None)).await, before);

        let stats = service.rebuild().await.unwrap();
        assert_eq!(stats.indexed, 4);
        let after = service.respond(&Request::new("Networks", None)).await;
        assert_eq!(after.records().len(), 2);
    }

    #[tokio::test]
    async fn test_search_rebuilds_deleted_index() {
        let (_dir, config) = scratch(&deep_records());
        let service = SearchService::open(config.clone()).unwrap();
        let first = service.search(&Query::substring("deep")).await.unwrap();
        fs::remove_file(config.index_path()).unwrap();
        let second = service.search(&Query::substring("deep")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_rebuild_failure() {
        let (dir, config) = scratch(&deep_records());
        let service = SearchService::open(config.clone()).unwrap();
        let before = fs::read(config.index_path()).unwrap();
        fs::write(dir.path().join("arxiv.csv"), "").unwrap();
        assert!(matches!(
            service.rebuild().await,
            Err(ServiceError::Build(_))
        ));
        // The failed rebuild left the previous index in place.
        assert_eq!(fs::read(config.index_path()).unwrap(), before);
        fs::remove_file(dir.path().join("arxiv.csv")).unwrap();
        assert!(service.rebuild().await.is_err());
    }

    #[tokio::test]
    async fn test_serve() {
        let records = deep_records();
        let (_dir, config) = scratch(&records);
        let service = SearchService::open(config).unwrap();
        let mut input = Vec::new();
        input.extend_from_slice(&Request::new("deep", None).encode());
        input.extend_from_slice(&Request::new("nothing here", None).encode());
        // A trailing partial frame is dropped.
        input.extend_from_slice(&[1, 2, 3]);
        let mut output = Vec::new();
        let served = service.serve(&input[..], &mut output).await.unwrap();
        assert_eq!(served, 2);
        assert_eq!(output.len(), 2 * RESPONSE_SIZE);
        let mut frame = [0_u8; RESPONSE_SIZE];
        frame.copy_from_slice(&output[..RESPONSE_SIZE]);
        let mut found = Response::decode(&frame).records();
        found.sort();
        let mut expected = vec![records[0].clone(), records[1].clone()];
        expected.sort();
        assert_eq!(found, expected);
        frame.copy_from_slice(&output[RESPONSE_SIZE..]);
        assert_eq!(Response::decode(&frame).text(), "NA");
    }

    #[tokio::test]
    async fn test_serve_duplex() {
        let (_dir, config) = scratch(&deep_records());
        let service = SearchService::open(config).unwrap();
        let (mut client, server) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let client_task = async move {
            client
                .write_all(&Request::new("Shallow", Some("2020-01-01")).encode())
                .await
                .unwrap();
            let mut frame = [0_u8; RESPONSE_SIZE];
            client.read_exact(&mut frame).await.unwrap();
            drop(client);
            Response::decode(&frame)
        };
        let (served, response) =
            tokio::join!(service.serve(server_read, server_write), client_task);
        assert_eq!(served.unwrap(), 1);
        assert_eq!(response.records().len(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_bg_then_drop() {
        let (_dir, config) = scratch(&deep_records());
        let service = SearchService::open(config).unwrap();
        service.rebuild_bg().await;
        // Drop waits for the rebuild thread to finish.
        drop(service);
    }

    #[tokio::test]
    async fn test_rebuild_waits_for_readers() {
        let (_dir, config) = scratch(&deep_records());
        let service = SearchService::open(config).unwrap();
        service.respond(&Request::new("deep", None)).await;
        assert_eq!(service.cached_responses(), 1);

        let guard = service.index_lock.read().await;
        service.rebuild_bg().await;
        std::thread::sleep(std::time::Duration::from_millis(100));
        // The rebuild thread is parked on the write lock so the cache is untouched.
        assert_eq!(service.cached_responses(), 1);
        drop(guard);

        // Rebuild commands run in order, so this one finishes after the background one.
        service.rebuild().await.unwrap();
        assert_eq!(service.cached_responses(), 0);
    }

    #[tokio::test]
    async fn test_cache_capacity() {
        let (_dir, config) = scratch(&deep_records());
        let service = SearchService::open(config).unwrap().set_cache_capacity(2);
        for title in ["deep", "Shallow", "Networks", "Learning", "space"] {
            assert!(!service.respond(&Request::new(title, None)).await.is_no_results());
            assert!(service.cached_responses() <= 2);
        }
        // A full cache is cleared before the fifth insert.
        assert_eq!(service.cached_responses(), 1);

        let (_dir, config) = scratch(&deep_records());
        let service = SearchService::open(config).unwrap().set_cache_capacity(0);
        let first = service.respond(&Request::new("deep", None)).await;
        assert_eq!(service.cached_responses(), 0);
        assert_eq!(service.respond(&Request::new("deep", None)).await, first);
    }
}
