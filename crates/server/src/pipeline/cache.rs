//! Rendered-result cache over the object store.
//!
//! Reads are awaited on the request path but can only ever produce a hit or a
//! miss. Writes go through [`CacheWriter`], a bounded queue drained by a fixed
//! pool of workers, so a slow or failing store never holds up a response.

use crate::metrics::{
    self, CACHE_HITS, CACHE_LOOKUP_ERRORS, CACHE_MISSES, STORE_QUEUE_DEPTH,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use vignette_core::config::CacheConfig;
use vignette_core::{CacheEntry, CacheKey, RenderResult};
use vignette_storage::{ObjectStore, PutOptions};

/// Lookup and fire-and-forget store of rendered thumbnails.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn ObjectStore>,
    writer: CacheWriter,
}

impl ResultCache {
    /// Create the cache and start its writer pool. Must be called inside a
    /// Tokio runtime.
    pub fn new(store: Arc<dyn ObjectStore>, config: &CacheConfig) -> Self {
        let writer = CacheWriter::spawn(
            store.clone(),
            config.store_queue_capacity,
            config.store_workers,
        );
        Self { store, writer }
    }

    /// Look up a rendered thumbnail.
    ///
    /// Every failure, including an object that is not an image, is logged and
    /// reported as a miss.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.store.get(key.as_str()).await {
            Ok(bytes) => match CacheEntry::from_stored(key.clone(), bytes) {
                Ok(entry) => {
                    CACHE_HITS.inc();
                    Some(entry)
                }
                Err(e) => {
                    CACHE_LOOKUP_ERRORS.inc();
                    tracing::warn!(key = %key, error = %e, "Cached object is unusable, treating as miss");
                    None
                }
            },
            Err(e) if e.is_not_found() => {
                CACHE_MISSES.inc();
                None
            }
            Err(e) => {
                CACHE_LOOKUP_ERRORS.inc();
                tracing::warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Schedule a store of a fresh render. Returns whether it was queued.
    pub fn store(&self, result: RenderResult) -> bool {
        self.writer.enqueue(CacheEntry::from(result))
    }

    pub fn stats(&self) -> CacheWriterStats {
        self.writer.stats()
    }
}

/// Outcome counts of background stores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheWriterStats {
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct WriterCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Bounded queue of pending cache writes with a fixed worker pool.
///
/// Entries that do not fit in the queue are dropped, not awaited. Workers stop
/// once every handle is gone and the queue is drained.
#[derive(Clone)]
pub struct CacheWriter {
    sender: mpsc::Sender<CacheEntry>,
    counters: Arc<WriterCounters>,
}

impl CacheWriter {
    pub fn spawn(store: Arc<dyn ObjectStore>, capacity: usize, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(WriterCounters::default());

        for worker in 0..workers.max(1) {
            let receiver = receiver.clone();
            let store = store.clone();
            let counters = counters.clone();
            tokio::spawn(async move {
                loop {
                    // the lock is only held while waiting for the next entry
                    let next = receiver.lock().await.recv().await;
                    let Some(entry) = next else { break };
                    STORE_QUEUE_DEPTH.dec();
                    write_entry(store.as_ref(), entry, &counters, worker).await;
                }
                tracing::debug!(worker, "Cache writer stopped");
            });
        }

        Self { sender, counters }
    }

    /// Queue an entry without waiting. Returns `false` if it was dropped.
    pub fn enqueue(&self, entry: CacheEntry) -> bool {
        STORE_QUEUE_DEPTH.inc();
        match self.sender.try_send(entry) {
            Ok(()) => true,
            Err(err) => {
                STORE_QUEUE_DEPTH.dec();
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_store("dropped");
                let reason = match &err {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "writer stopped",
                };
                let entry = err.into_inner();
                tracing::warn!(key = %entry.key, reason, "Dropping cache store");
                false
            }
        }
    }

    pub fn stats(&self) -> CacheWriterStats {
        CacheWriterStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn write_entry(
    store: &dyn ObjectStore,
    entry: CacheEntry,
    counters: &WriterCounters,
    worker: usize,
) {
    let options = PutOptions::with_content_type(entry.content_type.content_type());
    match store
        .put_with_options(entry.key.as_str(), entry.bytes, &options)
        .await
    {
        Ok(()) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
            metrics::record_store("completed");
            tracing::debug!(worker, key = %entry.key, size = entry.content_length, "Stored rendered thumbnail");
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            metrics::record_store("failed");
            tracing::error!(worker, key = %entry.key, error = %e, "Failed to store rendered thumbnail");
        }
    }
}
