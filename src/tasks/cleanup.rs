//! TTL Cleanup Task
//!
//! Background task that periodically purges expired in-memory entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Spawns a background task that periodically purges expired entries.
///
/// The task holds only a weak reference, so it stops on its own once the
/// store is dropped. It is also aborted by the store's `shutdown`.
///
/// # Arguments
/// * `store` - Weak reference to the store to sweep
/// * `cleanup_interval_secs` - Interval in seconds between sweeps
///
/// # Example
/// ```ignore
/// let store = Arc::new(MemoryStore::new());
/// let cleanup_handle = spawn_cleanup_task(Arc::downgrade(&store), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(store: Weak<MemoryStore>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(store) = store.upgrade() else {
                debug!("Memory store dropped, stopping TTL cleanup");
                break;
            };

            let removed = store.purge_expired().await;
            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
