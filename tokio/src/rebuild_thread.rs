//! Background thread that rebuilds the index for a SearchService.

use crate::ResponseCache;
use log::{debug, warn};
use std::sync::Arc;
use titledx_core::error::build::BuildError;
use titledx_core::{BuildStats, IndexConfig};
use tokio::sync::{mpsc, oneshot, RwLock};

/// Commands that can be sent to the rebuild thread.
pub(crate) enum RebuildCommand {
    Rebuild(oneshot::Sender<Result<BuildStats, BuildError>>),
    RebuildBG,
    Done,
}

/// Rebuild the index while holding the write lock so no search sees a half written file.
/// Must not be called from inside the runtime.
fn rebuild_index(
    config: &IndexConfig,
    index_lock: &RwLock<()>,
    response_cache: &ResponseCache,
) -> Result<BuildStats, BuildError> {
    let _guard = index_lock.blocking_write();
    let result = config.build_index();
    // Cached responses belong to the old index.
    response_cache.clear();
    if let Err(err) = &result {
        warn!(
            "rebuild of {} failed: {}",
            config.index_path().display(),
            err
        );
    }
    result
}

/// Run a background thread that rebuilds the index on request.
pub(crate) fn rebuild_thread(
    config: Arc<IndexConfig>,
    index_lock: Arc<RwLock<()>>,
    response_cache: Arc<ResponseCache>,
    mut rebuild_rx: mpsc::Receiver<RebuildCommand>,
) {
    let mut done = false;
    while !done {
        match rebuild_rx.blocking_recv() {
            Some(RebuildCommand::Rebuild(tx)) => {
                let _ = tx.send(rebuild_index(&config, &index_lock, &response_cache));
            }
            Some(RebuildCommand::RebuildBG) => {
                let _ = rebuild_index(&config, &index_lock, &response_cache);
            }
            Some(RebuildCommand::Done) => done = true,
            None => done = true, // The sender has been closed or dropped so nothing left to do.
        }
    }
    debug!("rebuild thread done");
}
